//! Session lifecycle: login, logout and the session cookie.

use serde_json::{json, Value};
use tracing::{info, instrument, warn};

use crate::client::MlmClient;
use crate::error::{Error, ErrorKind, Result};
use crate::request::RequestMethod;
use crate::response::envelope_message;

/// Session state of a client.
///
/// The cookie is redacted in Debug output.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Session {
    /// No login has succeeded yet, or the session was dropped.
    #[default]
    Unauthenticated,
    /// Logged in. The cookie may be empty when the server set none.
    Authenticated { cookie: String },
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Session::Unauthenticated => f.write_str("Unauthenticated"),
            Session::Authenticated { cookie } => f
                .debug_struct("Authenticated")
                .field("cookie", &if cookie.is_empty() { "" } else { "[REDACTED]" })
                .finish(),
        }
    }
}

impl Session {
    /// Returns true after a successful login.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Session::Authenticated { .. })
    }

    /// The cookie to send, if there is a non-empty one.
    pub fn cookie(&self) -> Option<&str> {
        match self {
            Session::Authenticated { cookie } if !cookie.is_empty() => Some(cookie),
            _ => None,
        }
    }
}

impl MlmClient {
    /// Log in and keep the session cookie for later calls. Returns the
    /// cookie, which is empty when the server set none.
    ///
    /// When already logged in, returns the held cookie without a request.
    /// Any status other than 200, or an in-body failure on a 200, is an
    /// authentication error.
    #[instrument(skip(self), fields(endpoint = %self.config.endpoint(), username = %self.config.credentials().username()))]
    pub fn login(&mut self) -> Result<String> {
        if let Session::Authenticated { cookie } = &self.session {
            return Ok(cookie.clone());
        }

        let path = self.config.endpoints().login.clone();
        let body = json!({
            "login": self.config.credentials().username(),
            "password": self.config.credentials().password(),
        });

        let outcome = self
            .execute(RequestMethod::Post, &path, Some(&body), &[])
            .map_err(|e| auth_failure(e.to_string(), e).in_operation("login", &path))?;

        if outcome.status != 200 {
            let detail = if outcome.message.is_empty() {
                format!("HTTP {}", outcome.status)
            } else {
                format!("HTTP {} {}", outcome.status, outcome.message)
            };
            return Err(Error::new(ErrorKind::Authentication(format!(
                "Failed to authenticate with MLM API: {}",
                detail
            )))
            .in_operation("login", &path));
        }

        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&outcome.body) {
            if map.get("success") == Some(&Value::Bool(false)) {
                let message = envelope_message(&map).unwrap_or_else(|| "login rejected".to_string());
                return Err(Error::new(ErrorKind::Authentication(format!(
                    "Failed to authenticate with MLM API: {}",
                    message
                )))
                .in_operation("login", &path));
            }
        }

        let cookie = outcome.session_cookie().unwrap_or_default();
        if cookie.is_empty() {
            warn!("Login succeeded without a session cookie");
        }
        self.session = Session::Authenticated {
            cookie: cookie.clone(),
        };
        info!("Logged in");
        Ok(cookie)
    }

    /// Log out. Returns true if there was no session or the server
    /// confirmed the logout; failures are logged, never raised.
    ///
    /// The local session is only dropped once the server confirms.
    #[instrument(skip(self))]
    pub fn logout(&mut self) -> bool {
        if !self.session.is_authenticated() {
            return true;
        }

        let path = self.config.endpoints().logout.clone();
        match self.execute(RequestMethod::Post, &path, None, &[]) {
            Ok(outcome) if outcome.status == 200 => {
                self.session = Session::Unauthenticated;
                info!("Logged out");
                true
            }
            Ok(outcome) => {
                warn!(status = outcome.status, "Logout was not confirmed");
                false
            }
            Err(e) => {
                warn!(error = %e, "Logout failed");
                false
            }
        }
    }

    /// Returns true while a session is held.
    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Current session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Log in, run `op`, then log out whatever `op` returned.
    pub fn with_session<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&mut MlmClient) -> Result<T>,
    {
        self.login()?;
        let result = op(self);
        self.logout();
        result
    }
}

fn auth_failure(message: String, source: Error) -> Error {
    Error::with_source(
        ErrorKind::Authentication(format!("Failed to authenticate with MLM API: {}", message)),
        source,
    )
}
