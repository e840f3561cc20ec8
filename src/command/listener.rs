use crate::agent::Agent;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type ListenerFn = dyn Fn(Value, Arc<Agent>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync;

/// Callback invoked with `(data, agent)` for every command of its event type.
///
/// Clones share the callback; `off` matches by that identity.
#[derive(Clone)]
pub struct CommandListener {
    callback: Arc<ListenerFn>,
}

impl CommandListener {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(Value, Arc<Agent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            callback: Arc::new(move |data: Value, agent: Arc<Agent>| callback(data, agent).boxed()),
        }
    }

    /// Listener backed by a synchronous closure
    pub fn from_fn<F>(callback: F) -> Self
    where
        F: Fn(Value, Arc<Agent>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |data: Value, agent: Arc<Agent>| {
                futures::future::ready(callback(data, agent)).boxed()
            }),
        }
    }

    pub fn call(&self, data: Value, agent: Arc<Agent>) -> BoxFuture<'static, anyhow::Result<()>> {
        (self.callback)(data, agent)
    }

    /// Whether both handles refer to the same registered callback
    pub fn ptr_eq(&self, other: &CommandListener) -> bool {
        Arc::ptr_eq(&self.callback, &other.callback)
    }
}

impl fmt::Debug for CommandListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandListener")
            .field("callback", &Arc::as_ptr(&self.callback))
            .finish()
    }
}
