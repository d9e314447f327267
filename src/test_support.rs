//! Scripted fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{TransportError, TransportErrorKind};
use crate::transport::{Transport, TransportRequest};
use crate::tv_network_check::Pinger;

// ------------------------------------------------------------------------------------------------
// Transport

#[derive(Default)]
struct ScriptedTransportInner {
    replies: HashMap<String, VecDeque<Result<String, TransportError>>>,
    requests: Vec<TransportRequest>,
}

/// A [`Transport`] answering from per-method reply queues.
///
/// Requests are keyed by their JSON-RPC method name, or by their path when the body is not JSON
/// (IRCC). Queued replies are consumed in order; the last one is repeated.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    inner: Arc<Mutex<ScriptedTransportInner>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, key: &str, body: &str) -> &Self {
        self.push(key, Ok(body.to_string()))
    }

    pub fn fail(&self, key: &str, kind: TransportErrorKind) -> &Self {
        self.push(key, Err(TransportError::new(kind, "scripted failure")))
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.inner.lock().unwrap().requests.clone()
    }

    /// Keys of all requests seen so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.requests().iter().map(request_key).collect()
    }

    pub fn count(&self, key: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == key).count()
    }

    fn push(&self, key: &str, reply: Result<String, TransportError>) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .replies
            .entry(key.to_string())
            .or_default()
            .push_back(reply);

        self
    }
}

fn request_key(request: &TransportRequest) -> String {
    serde_json::from_str::<serde_json::Value>(&request.body)
        .ok()
        .and_then(|body| body.get("method").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| request.path.clone())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, request: &TransportRequest) -> Result<String, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push(request.clone());

        let key = request_key(request);

        match inner.replies.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Err(TransportError::new(
                TransportErrorKind::Connect,
                format!("no scripted reply for {}", key),
            )),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// Pinger

/// A [`Pinger`] answering from a queue of results, then with a fixed default.
pub(crate) struct ScriptedPinger {
    results: Mutex<VecDeque<bool>>,
    default: bool,
    pings: AtomicUsize,
}

impl ScriptedPinger {
    pub fn reachable() -> Arc<Self> {
        Arc::new(Self::with_results(vec![], true))
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self::with_results(vec![], false))
    }

    pub fn with_results(results: Vec<bool>, default: bool) -> Self {
        ScriptedPinger {
            results: Mutex::new(results.into()),
            default,
            pings: AtomicUsize::new(0),
        }
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for ScriptedPinger {
    async fn ping(&self, _host: &str, _timeout: Duration) -> bool {
        self.pings.fetch_add(1, Ordering::SeqCst);

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default)
    }
}
