use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::codec::ExtValue;
use crate::context::RequestContext;
use crate::failure::HandlerResult;
use crate::handler::{FunctionHandler, JsonRpcHandler, SyncFunctionHandler};

/// A registered method
pub struct MethodEntry<C> {
    pub name: String,
    pub handler: Arc<dyn JsonRpcHandler<C>>,
}

impl<C> Clone for MethodEntry<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: Arc::clone(&self.handler),
        }
    }
}

impl<C> std::fmt::Debug for MethodEntry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodEntry")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Name → handler mapping.
///
/// Registration takes `&mut self`, so once the registry is shared behind an
/// [`Arc`] (as the endpoint is while serving) it can no longer change.
/// Method names are not validated.
pub struct MethodRegistry<C> {
    entries: HashMap<String, MethodEntry<C>>,
}

impl<C> MethodRegistry<C>
where
    C: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Store `handler` under `name`, replacing any previous entry
    pub fn register<H>(&mut self, name: impl Into<String>, handler: H)
    where
        H: JsonRpcHandler<C> + 'static,
    {
        self.register_arc(name, Arc::new(handler));
    }

    /// Store an already shared handler, e.g. one serving several names
    pub fn register_arc(&mut self, name: impl Into<String>, handler: Arc<dyn JsonRpcHandler<C>>) {
        let name = name.into();
        if self.entries.contains_key(&name) {
            debug!("Replacing handler for method {}", name);
        }
        self.entries
            .insert(name.clone(), MethodEntry { name, handler });
    }

    /// Register an async closure
    pub fn register_fn<F, Fut, R>(&mut self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(RequestContext, Arc<C>, ExtValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult<R>> + Send + 'static,
        R: Into<ExtValue> + 'static,
    {
        self.register(name, FunctionHandler::new(handler_fn));
    }

    /// Register a synchronous closure
    pub fn register_sync<F, R>(&mut self, name: impl Into<String>, handler_fn: F)
    where
        F: Fn(&RequestContext, &C, ExtValue) -> HandlerResult<R> + Send + Sync + 'static,
        R: Into<ExtValue> + 'static,
    {
        self.register(name, SyncFunctionHandler::new(handler_fn));
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn JsonRpcHandler<C>>> {
        self.entries.get(name).map(|entry| Arc::clone(&entry.handler))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Read-only view of every entry, in no particular order
    pub fn list(&self) -> impl Iterator<Item = &MethodEntry<C>> {
        self.entries.values()
    }

    /// Registered method names, sorted
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C> Default for MethodRegistry<C>
where
    C: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
