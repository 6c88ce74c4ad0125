use std::collections::HashMap;
use std::time::Duration;

use mlm_api::client::RetryConfig;
use mlm_api::{ConfigOverrides, ConnectionConfig, MlmClient};

pub const API: &str = "/rhn/manager/api";
pub const SESSION_COOKIE: &str = "pxt-session-cookie=4711x9";

/// Full mock path of an API endpoint.
pub fn api(path: &str) -> String {
    format!("{}{}", API, path)
}

/// Overrides pointing at the mock server, isolated from the environment and
/// the user's credentials file, with millisecond backoff.
pub fn overrides_for(server: &mockito::Server) -> ConfigOverrides {
    ConfigOverrides::new()
        .with_url(server.url())
        .with_username("admin")
        .with_password("s3cret-pw")
        .without_profile_store()
        .with_retry(
            RetryConfig::default()
                .with_max_retries(2)
                .with_unit(Duration::from_millis(1)),
        )
}

pub fn client_with(overrides: &ConfigOverrides) -> MlmClient {
    let config = ConnectionConfig::resolve_with_env(overrides, HashMap::<String, String>::new())
        .expect("mock configuration resolves");
    MlmClient::with_config(config).expect("HTTP client builds")
}

pub fn client_for(server: &mockito::Server) -> MlmClient {
    client_with(&overrides_for(server))
}

/// Mock a successful login that hands out [`SESSION_COOKIE`].
pub fn mock_login(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("POST", api("/auth/login").as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("set-cookie", &format!("{}; Max-Age=3600; Path=/; HttpOnly", SESSION_COOKIE))
        .with_body(r#"{"success": true, "messages": []}"#)
        .create()
}

/// Mock a confirmed logout.
pub fn mock_logout(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("POST", api("/auth/logout").as_str())
        .match_header("cookie", SESSION_COOKIE)
        .with_status(200)
        .with_body(r#"{"success": true, "result": 1}"#)
        .create()
}
