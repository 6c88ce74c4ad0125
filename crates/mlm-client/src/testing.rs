//! Helpers shared by unit tests.

use std::time::Duration;

use mlm_auth::Credentials;
use serde_json::json;

use crate::client::MlmClient;
use crate::config::{ConfigOverrides, ConnectionConfig};
use crate::retry::RetryConfig;
use crate::scripted::ScriptedTransport;
use crate::transport::HttpResponse;

/// A client for `https://mlm.example.com` over the given script, with
/// millisecond backoff.
pub(crate) fn test_client(transport: &ScriptedTransport) -> MlmClient {
    let credentials = Credentials::new(
        "https://mlm.example.com",
        "admin",
        "secret",
        "/rhn/manager/api",
    );
    let overrides = ConfigOverrides::new()
        .with_retry(RetryConfig::default().with_unit(Duration::from_millis(1)));
    let config = ConnectionConfig::from_credentials(credentials, &overrides)
        .expect("test configuration is valid");
    MlmClient::with_transport(config, transport.clone())
}

/// A successful login response carrying a session cookie.
pub(crate) fn login_ok() -> HttpResponse {
    HttpResponse::new(200)
        .with_header("Set-Cookie", "pxt-session-cookie=abc123; Max-Age=3600; Path=/")
        .with_json(&json!({"success": true, "messages": []}))
}

/// A client that has already logged in with [`login_ok`].
pub(crate) fn logged_in_client(transport: &ScriptedTransport) -> MlmClient {
    transport.push(login_ok());
    let mut client = test_client(transport);
    client.login().expect("scripted login succeeds");
    client
}
