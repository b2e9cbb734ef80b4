//! Route resolution and dispatch.
//!
//! Routes are tested strictly in registration order and the first route whose pattern and
//! method both match wins. There is no specificity ordering: registering `/users/{id}` before
//! `/users/new` means `/users/new` is served by the `{id}` route.
//!
//! When no route matches, the outcome depends on whether any pattern matched the path:
//! - no pattern matched: [`RouteMatch::NotFound`], answered with `404 Not Found`
//! - a pattern matched for other methods only: [`RouteMatch::MethodNotAllowed`], answered with
//!   `405 Method Not Allowed` and an `Allow` header
//!
//! Both fallback responses pass through the global middleware, like any matched route.

use crate::body::{Response, plain_text};
use crate::error::{BootError, RouteError, UrlError};
use crate::handler::{HandlerResult, RequestHandler};
use crate::middleware::{Middleware, compose};
use crate::registry::Registry;
use crate::request::{MatchedRoute, PathParams, Request};
use crate::route::{CompiledRoute, MiddlewareRef, RouteTable};
use async_trait::async_trait;
use http::{HeaderValue, Method, StatusCode, header};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Outcome of resolving a method and path against the route table.
#[derive(Debug)]
pub enum RouteMatch<'router> {
    Found { route: &'router CompiledRoute, params: PathParams },
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

/// Methods accepted at a path, attached to the request before the 405 fallback runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedMethods(pub Vec<Method>);

struct ResolvedRoute {
    route: CompiledRoute,
    chain: Arc<dyn RequestHandler>,
}

/// An immutable, shareable route table with every pipeline resolved.
///
/// Each route's pipeline is the global middleware followed by the route's own middleware,
/// ending in the route handler. Pipelines are composed once while the router is built.
pub struct Router {
    routes: Vec<ResolvedRoute>,
    names: HashMap<String, usize>,
    not_found: Arc<dyn RequestHandler>,
    method_not_allowed: Arc<dyn RequestHandler>,
}

impl Router {
    pub fn builder(registry: Registry) -> RouterBuilder {
        RouterBuilder::new(registry)
    }

    /// Resolves `method` and `path` to a route.
    pub fn at(&self, method: &Method, path: &str) -> RouteMatch<'_> {
        match self.find(method, path) {
            Resolution::Found { index, params } => RouteMatch::Found { route: &self.routes[index].route, params },
            Resolution::MethodNotAllowed(allowed) => RouteMatch::MethodNotAllowed { allowed },
            Resolution::NotFound => RouteMatch::NotFound,
        }
    }

    /// Runs the request through the pipeline of the route it resolves to, or through the
    /// not-found / method-not-allowed fallbacks.
    ///
    /// # Errors
    /// Errors raised by middleware or handlers are returned unchanged.
    pub async fn dispatch(&self, mut req: Request) -> HandlerResult {
        let chain = match self.find(req.method(), req.path()) {
            Resolution::Found { index, params } => {
                let route = &self.routes[index].route;
                debug!(method = %req.method(), path = req.path(), pattern = route.pattern().source(), name = ?route.name(), "route matched");

                req.set_path_params(params);
                req.extensions_mut()
                    .insert(MatchedRoute { name: route.name().map(str::to_owned), pattern: route.pattern().source().to_owned() });
                &self.routes[index].chain
            }
            Resolution::MethodNotAllowed(allowed) => {
                debug!(method = %req.method(), path = req.path(), ?allowed, "method not allowed");
                req.extensions_mut().insert(AllowedMethods(allowed));
                &self.method_not_allowed
            }
            Resolution::NotFound => {
                debug!(method = %req.method(), path = req.path(), "no route matched");
                &self.not_found
            }
        };

        chain.invoke(&mut req, Response::default()).await
    }

    fn find(&self, method: &Method, path: &str) -> Resolution {
        let mut allowed: Vec<Method> = Vec::new();

        for (index, resolved) in self.routes.iter().enumerate() {
            let route = &resolved.route;
            let Some(params) = route.pattern().matches(path) else {
                continue;
            };

            if route.allows(method) {
                return Resolution::Found { index, params };
            }

            for candidate in route.methods() {
                if !allowed.contains(candidate) {
                    allowed.push(candidate.clone());
                }
            }
        }

        if allowed.is_empty() { Resolution::NotFound } else { Resolution::MethodNotAllowed(allowed) }
    }

    /// Builds the URL of a named route, see [`RouteTable::resolve_url`].
    ///
    /// # Errors
    /// [`UrlError::UnknownRouteName`] or [`UrlError::MissingParameter`].
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        let index = self.names.get(name).ok_or_else(|| UrlError::UnknownRouteName { name: name.to_owned() })?;
        self.routes[*index].route.pattern().format(name, params)
    }

    /// Compiled routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = &CompiledRoute> {
        self.routes.iter().map(|resolved| &resolved.route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

enum Resolution {
    Found { index: usize, params: PathParams },
    MethodNotAllowed(Vec<Method>),
    NotFound,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router").field("routes", &self.routes().collect::<Vec<_>>()).finish_non_exhaustive()
    }
}

pub struct RouterBuilder {
    registry: Registry,
    routes: Vec<CompiledRoute>,
    global_middleware: Vec<MiddlewareRef>,
    not_found: Option<Arc<dyn RequestHandler>>,
    method_not_allowed: Option<Arc<dyn RequestHandler>>,
}

impl RouterBuilder {
    fn new(registry: Registry) -> Self {
        Self { registry, routes: Vec::new(), global_middleware: Vec::new(), not_found: None, method_not_allowed: None }
    }

    /// Appends compiled routes, e.g. from the route cache. Registration order is preserved.
    #[must_use]
    pub fn routes(mut self, routes: impl IntoIterator<Item = CompiledRoute>) -> Self {
        self.routes.extend(routes);
        self
    }

    #[must_use]
    pub fn route_table(self, table: RouteTable) -> Self {
        self.routes(table.into_routes())
    }

    /// Appends global middleware, which runs before any route middleware.
    #[must_use]
    pub fn global_middleware<I, M>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.global_middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Replaces the default `404 Not Found` handler.
    #[must_use]
    pub fn not_found(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    /// Replaces the default `405 Method Not Allowed` handler. The accepted methods are
    /// available as [`AllowedMethods`] in the request extensions.
    #[must_use]
    pub fn method_not_allowed(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.method_not_allowed = Some(Arc::new(handler));
        self
    }

    /// Resolves every handler and middleware key and composes the pipelines.
    ///
    /// # Errors
    /// Fails on unknown handler or middleware keys, middleware group cycles and duplicate
    /// route names.
    pub fn build(self) -> Result<Router, BootError> {
        let global = self.registry.resolve_middleware(&self.global_middleware)?;

        let mut names = HashMap::new();
        let mut routes = Vec::with_capacity(self.routes.len());

        for route in self.routes {
            if let Some(name) = route.name()
                && names.insert(name.to_owned(), routes.len()).is_some()
            {
                return Err(RouteError::duplicate_route_name(name).into());
            }

            let handler = self.registry.resolve_handler(route.handler())?;
            let route_middleware = self.registry.resolve_middleware(route.middleware())?;
            let chain = compose(pipeline(&global, route_middleware), handler);
            routes.push(ResolvedRoute { route, chain });
        }

        let not_found = self.not_found.unwrap_or_else(|| Arc::new(NotFound));
        let method_not_allowed = self.method_not_allowed.unwrap_or_else(|| Arc::new(MethodNotAllowed));

        info!(routes = routes.len(), global_middleware = global.len(), "router built");

        Ok(Router {
            routes,
            names,
            not_found: compose(global.clone(), not_found),
            method_not_allowed: compose(global, method_not_allowed),
        })
    }
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("registry", &self.registry)
            .field("routes", &self.routes)
            .field("global_middleware", &self.global_middleware)
            .finish_non_exhaustive()
    }
}

fn pipeline(global: &[Arc<dyn Middleware>], route: Vec<Arc<dyn Middleware>>) -> Vec<Arc<dyn Middleware>> {
    let mut pipeline = Vec::with_capacity(global.len() + route.len());
    pipeline.extend(global.iter().map(Arc::clone));
    pipeline.extend(route);
    pipeline
}

struct NotFound;

#[async_trait]
impl RequestHandler for NotFound {
    async fn invoke(&self, _req: &mut Request, res: Response) -> HandlerResult {
        Ok(plain_text(res, StatusCode::NOT_FOUND, "404 Not Found"))
    }
}

struct MethodNotAllowed;

#[async_trait]
impl RequestHandler for MethodNotAllowed {
    async fn invoke(&self, req: &mut Request, res: Response) -> HandlerResult {
        let mut res = plain_text(res, StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
        if let Some(AllowedMethods(allowed)) = req.extensions().get::<AllowedMethods>() {
            let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            res.headers_mut().insert(header::ALLOW, HeaderValue::from_str(&allow)?);
        }
        Ok(res)
    }
}
