//! The MLM API client.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};

use crate::config::{ConfigOverrides, ConnectionConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::executor::{RequestExecutor, RequestOutcome};
use crate::request::{ApiCall, RequestBuilder, RequestMethod};
use crate::response::{envelope_message, normalize, sanitize_error_message, NormalizedResponse, Shape};
use crate::session::Session;
use crate::transport::{ReqwestTransport, Transport};

/// Structured error codes meaning "the entity already exists".
pub const ALREADY_EXISTS_CODES: [&str; 3] = ["ALREADY_EXISTS", "EntityExistsException", "already_exists"];

/// Client for the SUSE Multi-Linux Manager JSON API.
///
/// One client owns one configuration and at most one session. Calls take
/// `&mut self` because a request can change the session state.
///
/// # Example
///
/// ```rust,no_run
/// use mlm_client::{ConfigOverrides, MlmClient};
///
/// # fn main() -> mlm_client::Result<()> {
/// let mut client = MlmClient::new(ConfigOverrides::new().with_instance("production"))?;
/// client.login()?;
/// let systems = client.list_systems()?;
/// println!("{} systems", systems.len());
/// client.logout();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MlmClient {
    pub(crate) config: ConnectionConfig,
    executor: RequestExecutor,
    pub(crate) session: Session,
}

impl MlmClient {
    /// Resolve configuration from overrides, environment and profile store,
    /// and create a client using the reqwest transport.
    pub fn new(overrides: ConfigOverrides) -> Result<Self> {
        let config = ConnectionConfig::resolve(&overrides)?;
        Self::with_config(config)
    }

    /// Create a client using the reqwest transport.
    pub fn with_config(config: ConnectionConfig) -> Result<Self> {
        let transport =
            ReqwestTransport::new(config.timeout(), config.credentials().validate_certs())?;
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client over a custom transport.
    pub fn with_transport(config: ConnectionConfig, transport: impl Transport + 'static) -> Self {
        let executor = RequestExecutor::new(Arc::new(transport), config.retry().clone());
        Self {
            config,
            executor,
            session: Session::default(),
        }
    }

    /// Get the connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Absolute URL of an API path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.config.endpoint(), path)
        } else {
            format!("{}/{}", self.config.endpoint(), path)
        }
    }

    /// Send one request through the retrying executor.
    ///
    /// The session cookie is attached unless the caller supplied a `Cookie`
    /// header or the path is the login path. When retries run out the
    /// session is dropped.
    pub fn execute(
        &mut self,
        method: RequestMethod,
        path: &str,
        body: Option<&Value>,
        headers: &[(String, String)],
    ) -> Result<RequestOutcome> {
        let mut request = RequestBuilder::new(method, self.url_for(path));
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let bare_path = path.split('?').next().unwrap_or(path);
        if bare_path != self.config.endpoints().login && request.header_value("Cookie").is_none() {
            if let Some(cookie) = self.session.cookie() {
                request = request.header("Cookie", cookie);
            }
        }

        if let Some(body) = body {
            request = request.json_value(body.clone());
        }

        match self.executor.execute(&request) {
            Err(err) if err.is_retryable() => {
                if self.session.is_authenticated() {
                    warn!(path = bare_path, "Retries exhausted, dropping session");
                    self.session = Session::Unauthenticated;
                }
                Err(err)
            }
            other => other,
        }
    }

    /// Send a call and normalize the response to the call's shape.
    #[instrument(skip(self, call), fields(method = %call.method, path = %call.path))]
    pub fn send(&mut self, call: ApiCall) -> Result<NormalizedResponse> {
        let target = call.target();
        let operation = call.method.as_str();

        let outcome = self
            .execute(call.method, &target, call.body.as_ref(), &call.headers)
            .map_err(|e| e.in_operation(operation, &call.path))?;

        self.interpret(&call, outcome)
            .map_err(|e| e.in_operation(operation, &call.path))
    }

    fn interpret(&self, call: &ApiCall, outcome: RequestOutcome) -> Result<NormalizedResponse> {
        if outcome.is_success() {
            if outcome.is_no_content() {
                return Ok(NormalizedResponse::empty(call.shape));
            }
            return normalize(&outcome.body, call.shape);
        }

        if outcome.status == 400
            && self.config.is_idempotent_create(&call.path)
            && already_exists(&outcome)
        {
            info!(path = %call.path, "Entity already exists, nothing to create");
            return Ok(NormalizedResponse::empty(call.shape));
        }

        let message = sanitize_error_message(&failure_detail(&outcome));
        let kind = match outcome.status {
            401 => ErrorKind::Authentication(message),
            status => ErrorKind::Http { status, message },
        };
        Err(Error::new(kind))
    }

    /// GET a path.
    pub fn get(&mut self, path: &str) -> Result<NormalizedResponse> {
        self.send(ApiCall::get(path))
    }

    /// GET a path with query parameters.
    pub fn get_with_params(
        &mut self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<NormalizedResponse> {
        let call = params
            .iter()
            .fold(ApiCall::get(path), |call, (k, v)| call.param(*k, v));
        self.send(call)
    }

    /// POST to a path.
    pub fn post(&mut self, path: &str, body: Option<Value>) -> Result<NormalizedResponse> {
        self.send(with_body(ApiCall::post(path), body))
    }

    /// PUT to a path.
    pub fn put(&mut self, path: &str, body: Option<Value>) -> Result<NormalizedResponse> {
        self.send(with_body(ApiCall::put(path), body))
    }

    /// DELETE a path.
    pub fn delete(&mut self, path: &str) -> Result<NormalizedResponse> {
        self.send(ApiCall::delete(path))
    }

    /// List the entities at `path` and return the first whose `field` equals `value`.
    pub fn find_by_field(
        &mut self,
        path: &str,
        field: &str,
        value: &Value,
    ) -> Result<Option<Map<String, Value>>> {
        let records = self.send(ApiCall::get(path).expect(Shape::List))?.into_records();
        Ok(records.into_iter().find_map(|record| match record {
            Value::Object(map) if map.get(field) == Some(value) => Some(map),
            _ => None,
        }))
    }
}

fn with_body(call: ApiCall, body: Option<Value>) -> ApiCall {
    match body {
        Some(body) => call.body(body),
        None => call,
    }
}

/// Does a 400 response say the entity already exists?
fn already_exists(outcome: &RequestOutcome) -> bool {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&outcome.body) {
        let coded = ["code", "errorCode", "error_code"]
            .iter()
            .filter_map(|k| map.get(*k).and_then(Value::as_str))
            .any(|code| ALREADY_EXISTS_CODES.contains(&code));
        if coded {
            return true;
        }
    }

    outcome.message.to_lowercase().contains("already exists")
        || outcome.text().to_lowercase().contains("already exists")
}

/// Human-readable description of a failed response.
fn failure_detail(outcome: &RequestOutcome) -> String {
    let detail = match serde_json::from_slice::<Value>(&outcome.body) {
        Ok(Value::Object(map)) => envelope_message(&map).or_else(|| match map.get("error") {
            Some(Value::String(s)) => Some(s.clone()),
            _ => None,
        }),
        _ => None,
    }
    .unwrap_or_else(|| outcome.text().trim().to_string());

    match (outcome.message.is_empty(), detail.is_empty()) {
        (_, true) => outcome.message.clone(),
        (true, false) => detail,
        (false, false) => format!("{}: {}", outcome.message, detail),
    }
}
