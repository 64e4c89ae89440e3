//! In-memory transport for unit tests.
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::{DriverError, DriverResult};
use crate::protocol::transport::{Endpoint, Transport};

/// Replays queued replies per endpoint, then falls back to a repeated reply.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    queued: Mutex<HashMap<Endpoint, VecDeque<DriverResult<Value>>>>,
    repeated: Mutex<HashMap<Endpoint, Value>>,
    calls: Mutex<Vec<(Endpoint, Value)>>,
    delays: Mutex<HashMap<Endpoint, Duration>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot reply, consumed in FIFO order.
    pub fn push(&self, endpoint: Endpoint, reply: DriverResult<Value>) {
        self.queued
            .lock()
            .unwrap()
            .entry(endpoint)
            .or_default()
            .push_back(reply);
    }

    /// Reply used whenever the queue for `endpoint` is empty.
    pub fn repeat(&self, endpoint: Endpoint, value: Value) {
        self.repeated.lock().unwrap().insert(endpoint, value);
    }

    /// Holds every later call to `endpoint` for `delay` before replying.
    pub fn delay(&self, endpoint: Endpoint, delay: Duration) {
        self.delays.lock().unwrap().insert(endpoint, delay);
    }

    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .count()
    }

    pub fn last_call(&self) -> Option<(Endpoint, Value)> {
        self.calls.lock().unwrap().last().cloned()
    }

    pub fn calls_to(&self, endpoint: Endpoint) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, endpoint: Endpoint, params: Value) -> DriverResult<Value> {
        self.calls.lock().unwrap().push((endpoint, params));
        let delay = self.delays.lock().unwrap().get(&endpoint).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reply) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&endpoint)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.repeated
            .lock()
            .unwrap()
            .get(&endpoint)
            .cloned()
            .ok_or_else(|| DriverError::Remote {
                error: "unscripted".into(),
                message: format!("no reply scripted for {endpoint}"),
            })
    }
}
