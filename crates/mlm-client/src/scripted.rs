//! In-memory transport that replays a fixed script of responses.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::request::RequestBuilder;
use crate::transport::{HttpResponse, Transport, TransportFailure};

type Reply = std::result::Result<HttpResponse, TransportFailure>;

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Reply>,
    requests: Vec<RequestBuilder>,
}

/// A [`Transport`] that answers requests from a queue and records them.
///
/// Clones share the same script, so a test can keep one handle while the
/// client owns another.
///
/// ```rust,ignore
/// use mlm_client::{HttpResponse, ScriptedTransport};
///
/// let transport = ScriptedTransport::new();
/// transport
///     .push_status(503)
///     .push(HttpResponse::new(200).with_json(&serde_json::json!([])));
/// assert_eq!(transport.remaining(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a response.
    pub fn push(&self, response: HttpResponse) -> &Self {
        self.lock().replies.push_back(Ok(response));
        self
    }

    /// Queue a response with a JSON body.
    pub fn push_json(&self, status: u16, body: serde_json::Value) -> &Self {
        self.push(HttpResponse::new(status).with_json(&body))
    }

    /// Queue an empty response with the given status.
    pub fn push_status(&self, status: u16) -> &Self {
        self.push(HttpResponse::new(status))
    }

    /// Queue a failure with no response.
    pub fn push_failure(&self, message: impl Into<String>) -> &Self {
        self.lock()
            .replies
            .push_back(Err(TransportFailure::new(message)));
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RequestBuilder> {
        self.lock().requests.clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Number of replies not yet used.
    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &RequestBuilder) -> Reply {
        let mut script = self.lock();
        script.requests.push(request.clone());
        script.replies.pop_front().unwrap_or_else(|| {
            Err(TransportFailure::new(format!(
                "no scripted reply for {} {}",
                request.method(),
                request.url()
            )))
        })
    }
}
