use mockito::Matcher;
use serde_json::json;

use crate::common::{api, client_for, mock_login, mock_logout, SESSION_COOKIE};

#[test]
fn test_login_sends_credentials_and_reuses_cookie() {
    let mut server = mockito::Server::new();
    let login = server
        .mock("POST", api("/auth/login").as_str())
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({"login": "admin", "password": "s3cret-pw"})))
        .with_status(200)
        .with_header("set-cookie", &format!("{}; Path=/", SESSION_COOKIE))
        .with_body(r#"{"success": true}"#)
        .create();
    let orgs = server
        .mock("GET", api("/org/listOrgs").as_str())
        .match_header("cookie", SESSION_COOKIE)
        .with_status(200)
        .with_body(r#"{"success": true, "result": [{"id": 1, "name": "Default"}]}"#)
        .create();

    let mut client = client_for(&server);
    client.login().unwrap();
    assert!(client.is_authenticated());

    // a second login is a no-op
    client.login().unwrap();

    let records = client.get("/org/listOrgs").unwrap().into_records();
    assert_eq!(records, vec![json!({"id": 1, "name": "Default"})]);

    login.assert();
    orgs.assert();
}

#[test]
fn test_logout_clears_session() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    let logout = mock_logout(&mut server);

    let mut client = client_for(&server);
    client.login().unwrap();
    assert!(client.logout());
    assert!(!client.is_authenticated());

    // nothing to do without a session
    assert!(client.logout());
    logout.assert();
}

#[test]
fn test_unconfirmed_logout_keeps_session() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    let _logout = server
        .mock("POST", api("/auth/logout").as_str())
        .with_status(403)
        .create();

    let mut client = client_for(&server);
    client.login().unwrap();
    assert!(!client.logout());
    assert!(client.is_authenticated());
}

#[test]
fn test_rejected_login_is_auth_error_without_password() {
    let mut server = mockito::Server::new();
    let _login = server
        .mock("POST", api("/auth/login").as_str())
        .with_status(401)
        .with_body(r#"{"success": false, "message": "Invalid credentials"}"#)
        .create();

    let mut client = client_for(&server);
    let err = client.login().unwrap_err();

    assert!(err.is_auth_error());
    assert!(!client.is_authenticated());
    let rendered = format!("{} {:?}", err, err);
    assert!(rendered.contains("Failed to authenticate with MLM API"));
    assert!(!rendered.contains("s3cret-pw"));
}

#[test]
fn test_in_body_login_failure() {
    let mut server = mockito::Server::new();
    let _login = server
        .mock("POST", api("/auth/login").as_str())
        .with_status(200)
        .with_body(r#"{"success": false, "messages": ["Account locked"]}"#)
        .create();

    let mut client = client_for(&server);
    let err = client.login().unwrap_err();
    assert!(err.is_auth_error());
    assert!(err.to_string().contains("Account locked"));
}

#[test]
fn test_with_session_logs_out_after_failure() {
    let mut server = mockito::Server::new();
    let _login = mock_login(&mut server);
    let logout = mock_logout(&mut server);
    let _missing = server
        .mock("GET", api("/org/getDetails").as_str())
        .with_status(404)
        .create();

    let mut client = client_for(&server);
    let result = client.with_session(|c| c.get("/org/getDetails"));

    assert_eq!(result.unwrap_err().status(), Some(404));
    assert!(!client.is_authenticated());
    logout.assert();
}
