//! Scripted channel collaborator shared by the integration tests.
//!
//! A [`ScriptedConnector`] hands out channels that record every attempt and
//! answer from a script of outcomes, falling back to a responder closure and
//! finally to `"ok"`. Clones share state, so a test keeps one clone for
//! assertions and gives the other to the proxy.

#![allow(dead_code)]

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use proxyrpc_common::{
    Channel, ChannelCreationError, ChannelHandle, Connector, Fault, OperationDescriptor,
};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub type Outcome = Result<Value, Fault>;

type Responder = Arc<dyn Fn(&str, &[Value]) -> Outcome + Send + Sync>;

/// One attempt as seen by the channel.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub args: Vec<Value>,
    /// Which channel (1 = first connect) served the attempt
    pub generation: usize,
    pub at: Instant,
}

#[derive(Default)]
struct Shared {
    connects: AtomicUsize,
    closes: AtomicUsize,
    refused_connects: AtomicUsize,
    hung_connects: AtomicUsize,
    calls: Mutex<Vec<RecordedCall>>,
    script: Mutex<VecDeque<Outcome>>,
    responder: Mutex<Option<Responder>>,
    delay: Mutex<Option<Duration>>,
}

#[derive(Clone, Default)]
pub struct ScriptedConnector {
    shared: Arc<Shared>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(outcomes: impl IntoIterator<Item = Outcome>) -> Self {
        let connector = Self::new();
        connector.shared.script.lock().extend(outcomes);
        connector
    }

    /// Every call fails with the same fault.
    pub fn always_failing(fault: Fault) -> Self {
        let connector = Self::new();
        connector.respond_with(move |_, _| Err(fault.clone()));
        connector
    }

    pub fn push(&self, outcome: Outcome) {
        self.shared.script.lock().push_back(outcome);
    }

    pub fn respond_with(&self, f: impl Fn(&str, &[Value]) -> Outcome + Send + Sync + 'static) {
        *self.shared.responder.lock() = Some(Arc::new(f));
    }

    /// Delays every attempt by `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.shared.delay.lock() = Some(delay);
    }

    /// Fails the next `n` connects.
    pub fn refuse_next_connects(&self, n: usize) {
        self.shared.refused_connects.store(n, Ordering::SeqCst);
    }

    /// Makes the next `n` connects (after any refused ones) never complete.
    pub fn hang_next_connects(&self, n: usize) {
        self.shared.hung_connects.store(n, Ordering::SeqCst);
    }

    pub fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    /// Successful connects after the first one.
    pub fn recreations(&self) -> usize {
        self.connects().saturating_sub(1)
    }

    pub fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.shared.calls.lock().clone()
    }

    pub fn attempts(&self) -> usize {
        self.shared.calls.lock().len()
    }
}

impl Connector for ScriptedConnector {
    fn connect(&self) -> BoxFuture<'_, Result<ChannelHandle, ChannelCreationError>> {
        Box::pin(async move {
            let refused = self
                .shared
                .refused_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if refused.is_ok() {
                return Err(ChannelCreationError::new("connection refused"));
            }
            let hung = self
                .shared
                .hung_connects
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if hung.is_ok() {
                std::future::pending::<()>().await;
            }

            let generation = self.shared.connects.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Arc::new(ScriptedChannel {
                shared: self.shared.clone(),
                generation,
            }) as ChannelHandle)
        })
    }
}

struct ScriptedChannel {
    shared: Arc<Shared>,
    generation: usize,
}

impl Channel for ScriptedChannel {
    fn invoke<'a>(
        &'a self,
        operation: &'a OperationDescriptor,
        args: &'a [Value],
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            self.shared.calls.lock().push(RecordedCall {
                operation: operation.name().to_string(),
                args: args.to_vec(),
                generation: self.generation,
                at: Instant::now(),
            });

            let delay = *self.shared.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let scripted = self.shared.script.lock().pop_front();
            if let Some(outcome) = scripted {
                return outcome;
            }
            let responder = self.shared.responder.lock().clone();
            match responder {
                Some(respond) => respond(operation.name(), args),
                None => Ok(json!("ok")),
            }
        })
    }

    fn close(&self) {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn transport(message: &str) -> Outcome {
    Err(Fault::Transport(message.to_string()))
}

/// Installs a test-writer subscriber once; `RUST_LOG` overrides the filter.
pub fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}
