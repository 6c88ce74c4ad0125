use mockito::Matcher;
use serde_json::json;

use mlm_api::client::{ErrorKind, NormalizedResponse};
use mlm_api::ConfigOverrides;

use crate::common::{api, client_for, client_with, overrides_for};

#[test]
fn test_server_errors_retry_until_exhausted() {
    let mut server = mockito::Server::new();
    let failing = server
        .mock("GET", api("/org/listOrgs").as_str())
        .with_status(503)
        .expect(3)
        .create();

    let mut client = client_for(&server);
    let err = client.get("/org/listOrgs").unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Server { status: 503, attempts: 3 }));
    assert!(err.is_retryable());
    assert_eq!(err.attempts(), Some(3));
    failing.assert();
}

#[test]
fn test_rate_limit_retries() {
    let mut server = mockito::Server::new();
    let limited = server
        .mock("GET", api("/org/listOrgs").as_str())
        .with_status(429)
        .expect(3)
        .create();

    let mut client = client_for(&server);
    let err = client.get("/org/listOrgs").unwrap_err();

    assert!(err.is_rate_limited());
    limited.assert();
}

#[test]
fn test_client_errors_are_not_retried() {
    let mut server = mockito::Server::new();
    let missing = server
        .mock("GET", api("/org/getDetails").as_str())
        .with_status(404)
        .with_body(r#"{"message": "No such organization"}"#)
        .expect(1)
        .create();

    let mut client = client_for(&server);
    let err = client.get("/org/getDetails").unwrap_err();

    match &err.kind {
        ErrorKind::Http { status, message } => {
            assert_eq!(*status, 404);
            assert!(message.contains("No such organization"));
        }
        other => panic!("unexpected error kind: {:?}", other),
    }
    assert!(!err.is_retryable());
    assert!(err.to_string().starts_with("GET /org/getDetails: "));
    missing.assert();
}

#[test]
fn test_unreachable_server_is_transport_error() {
    let overrides = ConfigOverrides::new()
        .with_url("http://127.0.0.1:1")
        .with_username("admin")
        .with_password("s3cret-pw")
        .without_profile_store()
        .with_retry(
            mlm_api::client::RetryConfig::default()
                .with_max_retries(1)
                .with_unit(std::time::Duration::from_millis(1)),
        );

    let mut client = client_with(&overrides);
    let err = client.get("/org/listOrgs").unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Transport { attempts: 2, .. }));
}

#[test]
fn test_in_body_failure_is_api_error() {
    let mut server = mockito::Server::new();
    let _m = server
        .mock("GET", api("/system/getDetails").as_str())
        .with_status(200)
        .with_body(r#"{"success": false, "message": "No such system: 42"}"#)
        .create();

    let mut client = client_for(&server);
    let err = client.get("/system/getDetails").unwrap_err();

    assert!(err.is_api_error());
    assert!(err.to_string().contains("No such system: 42"));
}

#[test]
fn test_envelope_and_blank_bodies() {
    let mut server = mockito::Server::new();
    let _detail = server
        .mock("GET", api("/org/getDetails").as_str())
        .with_status(200)
        .with_body(r#"{"success": true, "result": {"id": 1, "name": "Default"}}"#)
        .create();
    let _deleted = server
        .mock("DELETE", api("/org/delete").as_str())
        .with_status(204)
        .create();

    let mut client = client_for(&server);

    let record = client.get("/org/getDetails").unwrap().into_record().unwrap();
    assert_eq!(record["name"], json!("Default"));

    let deleted = client.delete("/org/delete").unwrap();
    assert_eq!(deleted, NormalizedResponse::Empty);
}

#[test]
fn test_query_parameters_are_encoded() {
    let mut server = mockito::Server::new();
    let lookup = server
        .mock("GET", Matcher::Regex(format!("^{}", api("/user/getDetails"))))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("login".into(), "jane doe".into()),
            Matcher::UrlEncoded("org".into(), "R&D".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result": {"login": "jane doe"}}"#)
        .create();

    let mut client = client_for(&server);
    let user = client
        .get_with_params("/user/getDetails", &[("login", "jane doe"), ("org", "R&D")])
        .unwrap()
        .into_record()
        .unwrap();

    assert_eq!(user["login"], json!("jane doe"));
    lookup.assert();
}

#[test]
fn test_existing_project_counts_as_created() {
    let mut server = mockito::Server::new();
    let _create = server
        .mock("POST", api("/contentmanagement/createProject").as_str())
        .with_status(400)
        .with_body(r#"{"success": false, "code": "ALREADY_EXISTS"}"#)
        .create();
    let _org = server
        .mock("POST", api("/org/create").as_str())
        .with_status(400)
        .with_body(r#"{"message": "Organization already exists"}"#)
        .create();

    let mut client = client_for(&server);

    let created = client
        .post("/contentmanagement/createProject", Some(json!({"projectLabel": "dev"})))
        .unwrap();
    assert!(created.is_empty());

    // only configured paths are treated as idempotent
    let err = client
        .post("/org/create", Some(json!({"orgName": "dev"})))
        .unwrap_err();
    assert_eq!(err.status(), Some(400));
}

#[test]
fn test_pagination_collects_every_page() {
    let mut server = mockito::Server::new();
    let path = api("/channel/listAllChannels");
    let first = server
        .mock("GET", Matcher::Regex(format!("^{}", path)))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("page_size".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result": [{"label": "a"}, {"label": "b"}]}"#)
        .create();
    let second = server
        .mock("GET", Matcher::Regex(format!("^{}", path)))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("page_size".into(), "2".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"result": {"items": [{"label": "c"}]}}"#)
        .create();

    let mut client = client_for(&server);
    let channels = client.get_paginated("/channel/listAllChannels", 2).unwrap();

    let labels: Vec<_> = channels.iter().map(|c| c["label"].clone()).collect();
    assert_eq!(labels, vec![json!("a"), json!("b"), json!("c")]);
    first.assert();
    second.assert();
}

#[test]
fn test_find_by_field() {
    let mut server = mockito::Server::new();
    let _m = server
        .mock("GET", api("/activationkey/listActivationKeys").as_str())
        .with_status(200)
        .with_body(r#"{"result": [{"key": "1-web", "description": "web"}, {"key": "1-db"}]}"#)
        .create();

    let mut client = client_for(&server);
    let found = client
        .find_by_field("/activationkey/listActivationKeys", "key", &json!("1-db"))
        .unwrap();
    assert_eq!(found.unwrap()["key"], json!("1-db"));
}

#[test]
fn test_custom_endpoint_path() {
    let mut server = mockito::Server::new();
    let login = server
        .mock("POST", api("/auth/signin").as_str())
        .with_status(200)
        .with_header("set-cookie", "JSESSIONID=77; Path=/")
        .with_body(r#"{"success": true}"#)
        .create();

    let overrides = overrides_for(&server).with_endpoint("login", "auth/signin");
    let mut client = client_with(&overrides);
    client.login().unwrap();
    assert_eq!(client.session().cookie(), Some("JSESSIONID=77"));
    login.assert();
}
