use std::collections::HashMap;

use mlm_api::auth::ErrorKind as AuthErrorKind;
use mlm_api::client::ErrorKind;
use mlm_api::{ConfigOverrides, ConnectionConfig};

use crate::common::{api, client_with, mock_login};

fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_profile_store_supplies_connection() {
    let mut server = mockito::Server::new();
    let login = server
        .mock("POST", api("/auth/login").as_str())
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({"login": "lab-admin"})))
        .with_status(200)
        .with_header("set-cookie", "pxt-session-cookie=lab; Path=/")
        .with_body(r#"{"success": true}"#)
        .create();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    std::fs::write(
        &path,
        format!(
            "default: production\ninstances:\n  production:\n    url: https://mlm.invalid\n    username: prod\n    password: prod-pw\n  lab:\n    url: {}\n    username: lab-admin\n    password: lab-pw\n    validate_certs: false\n",
            server.url()
        ),
    )
    .unwrap();

    let overrides = ConfigOverrides::new()
        .with_instance("lab")
        .with_profile_path(path.clone());
    let config = ConnectionConfig::resolve_with_env(&overrides, HashMap::<String, String>::new())
        .unwrap();

    assert_eq!(config.credentials().instance(), Some("lab"));
    assert!(!config.credentials().validate_certs());
    assert_eq!(config.endpoint(), format!("{}/rhn/manager/api", server.url()));

    let details = server
        .mock("GET", api("/org/getDetails").as_str())
        .match_header("cookie", "pxt-session-cookie=lab")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"success": true, "result": {"name": "lab-org"}}"#)
        .create();

    let mut client = mlm_api::MlmClient::with_config(config).unwrap();
    assert_eq!(client.login().unwrap(), "pxt-session-cookie=lab");
    let org = client.get("/org/getDetails").unwrap().into_value();
    assert_eq!(org["name"], "lab-org");

    login.assert();
    details.assert();
}

#[test]
fn test_environment_beats_profile_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    std::fs::write(
        &path,
        "instances:\n  only:\n    url: https://profile.example.com\n    username: profile-user\n    password: profile-pw\n",
    )
    .unwrap();

    let overrides = ConfigOverrides::new().with_profile_path(path.clone());
    let config = ConnectionConfig::resolve_with_env(
        &overrides,
        env(&[
            ("MLM_URL", "https://env.example.com/"),
            ("MLM_API_BASE_PATH", "api/v2/"),
        ]),
    )
    .unwrap();

    assert_eq!(config.endpoint(), "https://env.example.com/api/v2");
    assert_eq!(config.credentials().username(), "profile-user");
    assert_eq!(config.credentials().instance(), Some("only"));
}

#[test]
fn test_explicit_values_win() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);

    let overrides = ConfigOverrides::new()
        .with_url(server.url())
        .with_username("admin")
        .with_password("explicit-pw")
        .without_profile_store();
    let config = ConnectionConfig::resolve_with_env(
        &overrides,
        env(&[("MLM_URL", "https://ignored.example.com"), ("MLM_PASSWORD", "env-pw")]),
    )
    .unwrap();
    assert_eq!(config.credentials().password(), "explicit-pw");

    let mut client = client_with(&overrides);
    client.login().unwrap();
}

#[test]
fn test_missing_fields_are_named() {
    let overrides = ConfigOverrides::new()
        .with_password("never-printed")
        .without_profile_store();
    let err = ConnectionConfig::resolve_with_env(&overrides, HashMap::<String, String>::new())
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Configuration(_)));
    let message = err.to_string();
    assert!(message.contains("url (or MLM_URL environment variable)"));
    assert!(message.contains("username (or MLM_USERNAME environment variable)"));
    assert!(!message.contains("password"));
    assert!(!message.contains("never-printed"));

    let source = std::error::Error::source(&err)
        .and_then(|s| s.downcast_ref::<mlm_api::auth::Error>())
        .expect("auth error kept as source");
    assert!(matches!(source.kind, AuthErrorKind::MissingFields(ref f) if f.len() == 2));
}

#[test]
fn test_broken_profile_store_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("credentials.yaml");
    std::fs::write(&path, "instances: [not, a, mapping]").unwrap();

    let overrides = ConfigOverrides::new().with_profile_path(path.clone());
    let config = ConnectionConfig::resolve_with_env(
        &overrides,
        env(&[
            ("MLM_URL", "https://mlm.example.com"),
            ("MLM_USERNAME", "admin"),
            ("MLM_PASSWORD", "pw"),
        ]),
    )
    .unwrap();
    assert_eq!(config.credentials().instance(), None);
}

#[test]
fn test_invalid_url_is_rejected() {
    let overrides = ConfigOverrides::new()
        .with_url("not a url")
        .with_username("admin")
        .with_password("pw")
        .without_profile_store();
    let err = ConnectionConfig::resolve_with_env(&overrides, HashMap::<String, String>::new())
        .unwrap_err();
    assert_eq!(err.context.parameter.as_deref(), Some("url"));
}
