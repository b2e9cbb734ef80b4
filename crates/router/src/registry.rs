//! Resolution of handler and middleware keys to live objects.
//!
//! Routes refer to handlers and middleware by key so the route table stays serializable. The
//! registry maps those keys to `Arc<dyn RequestHandler>` / `Arc<dyn Middleware>` and is consulted
//! once, while the router is built: an unknown key is a boot error, never a request-time error.
//!
//! A middleware key may also name a group, an ordered list of other keys (groups included)
//! that expands in place.

use crate::error::BootError;
use crate::handler::RequestHandler;
use crate::middleware::Middleware;
use crate::route::{HandlerRef, MiddlewareRef};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<dyn RequestHandler>>,
    middleware: HashMap<String, Arc<dyn Middleware>>,
    groups: HashMap<String, Vec<MiddlewareRef>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn handler(mut self, key: impl Into<String>, handler: impl RequestHandler + 'static) -> Self {
        self.handlers.insert(key.into(), Arc::new(handler));
        self
    }

    #[must_use]
    pub fn middleware(mut self, key: impl Into<String>, middleware: impl Middleware + 'static) -> Self {
        self.middleware.insert(key.into(), Arc::new(middleware));
        self
    }

    /// Registers a middleware group expanding to `members`, in order.
    #[must_use]
    pub fn middleware_group<I, M>(mut self, key: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.groups.insert(key.into(), members.into_iter().map(Into::into).collect());
        self
    }

    /// # Errors
    /// [`BootError::UnknownHandler`] when nothing is registered under the key.
    pub fn resolve_handler(&self, key: &HandlerRef) -> Result<Arc<dyn RequestHandler>, BootError> {
        self.handlers
            .get(key.as_str())
            .map(Arc::clone)
            .ok_or_else(|| BootError::UnknownHandler { key: key.to_string() })
    }

    /// Resolves a list of middleware keys, expanding groups in place.
    ///
    /// A plain middleware takes precedence over a group of the same name.
    ///
    /// # Errors
    /// [`BootError::UnknownMiddleware`] for an unknown key, [`BootError::MiddlewareGroupCycle`]
    /// when a group contains itself, directly or indirectly.
    pub fn resolve_middleware<'a, I>(&self, keys: I) -> Result<Vec<Arc<dyn Middleware>>, BootError>
    where
        I: IntoIterator<Item = &'a MiddlewareRef>,
    {
        let mut resolved = Vec::new();
        let mut expanding = Vec::new();
        for key in keys {
            self.expand(key, &mut expanding, &mut resolved)?;
        }
        Ok(resolved)
    }

    fn expand<'a>(
        &'a self,
        key: &'a MiddlewareRef,
        expanding: &mut Vec<&'a str>,
        resolved: &mut Vec<Arc<dyn Middleware>>,
    ) -> Result<(), BootError> {
        if let Some(middleware) = self.middleware.get(key.as_str()) {
            resolved.push(Arc::clone(middleware));
            return Ok(());
        }

        let members = self.groups.get(key.as_str()).ok_or_else(|| BootError::UnknownMiddleware { key: key.to_string() })?;

        if expanding.contains(&key.as_str()) {
            return Err(BootError::MiddlewareGroupCycle { key: key.to_string() });
        }

        expanding.push(key.as_str());
        for member in members {
            self.expand(member, expanding, resolved)?;
        }
        expanding.pop();
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut handlers = self.handlers.keys().collect::<Vec<_>>();
        handlers.sort();
        let mut middleware = self.middleware.keys().collect::<Vec<_>>();
        middleware.sort();

        f.debug_struct("Registry")
            .field("handlers", &handlers)
            .field("middleware", &middleware)
            .field("groups", &self.groups)
            .finish()
    }
}
