//! Boot sequence and request entry point.
//!
//! Booting resolves, in order: the runtime mode hint, the configuration (through the config
//! cache), the route table (through the route cache), and finally the router with every pipeline
//! composed. Once built, a [`Kernel`] is immutable and can be shared across tasks.
//!
//! ```no_run
//! use micro_router::kernel::Kernel;
//! use micro_router::registry::Registry;
//! use micro_router::{Request, Response, handler_fn};
//!
//! # async fn boot() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let registry = Registry::new().handler("home", handler_fn(|_req: &mut Request, res: Response| async { Ok(res) }));
//!
//! let kernel = Kernel::builder()
//!     .config_dir("config")
//!     .route_dir("modules")
//!     .cache_dir("storage/cache")
//!     .registry(registry)
//!     .build()?;
//!
//! let res = kernel.handle(Request::new(http::Method::GET, http::Uri::from_static("/"))).await?;
//! # let _ = res;
//! # Ok(())
//! # }
//! ```

use crate::cache::{CacheStatus, RouteCache, RuntimeMode};
use crate::config::{Config, ConfigCache};
use crate::error::{BootError, UrlError};
use crate::handler::{HandlerResult, RequestHandler};
use crate::registry::Registry;
use crate::request::Request;
use crate::route::MiddlewareRef;
use crate::router::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// File name of the route cache inside the cache directory.
pub const ROUTE_CACHE_FILE: &str = "routes.json";
/// File name of the config cache inside the cache directory.
pub const CONFIG_CACHE_FILE: &str = "config.json";
/// Config key listing global middleware appended after the builder's own.
pub const GLOBAL_MIDDLEWARE_KEY: &str = "app.middleware";

#[derive(Debug)]
pub struct Kernel {
    config: Config,
    router: Router,
    mode: RuntimeMode,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    /// Dispatches a request through the router.
    ///
    /// # Errors
    /// Errors raised by middleware or handlers are returned unchanged.
    pub async fn handle(&self, req: Request) -> HandlerResult {
        self.router.dispatch(req).await
    }

    /// # Errors
    /// See [`Router::url`].
    pub fn url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        self.router.url(name, params)
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }
}

pub struct KernelBuilder {
    config_dirs: Vec<PathBuf>,
    route_dirs: Vec<PathBuf>,
    cache_dir: PathBuf,
    registry: Registry,
    global_middleware: Vec<MiddlewareRef>,
    mode: Option<RuntimeMode>,
    not_found: Option<Arc<dyn RequestHandler>>,
    method_not_allowed: Option<Arc<dyn RequestHandler>>,
}

impl KernelBuilder {
    fn new() -> Self {
        Self {
            config_dirs: Vec::new(),
            route_dirs: Vec::new(),
            cache_dir: PathBuf::from("cache"),
            registry: Registry::new(),
            global_middleware: Vec::new(),
            mode: None,
            not_found: None,
            method_not_allowed: None,
        }
    }

    /// Adds a config directory. Later directories override earlier ones.
    #[must_use]
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dirs.push(dir.into());
        self
    }

    /// Adds a directory searched recursively for route files. Earlier directories register first.
    #[must_use]
    pub fn route_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.route_dirs.push(dir.into());
        self
    }

    /// Directory holding the route and config cache files, created on first write.
    #[must_use]
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn global_middleware<I, M>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.global_middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Forces the runtime mode, overriding `APP_DEBUG` and `app.debug`.
    #[must_use]
    pub fn mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = Some(mode);
        self
    }

    #[must_use]
    pub fn not_found(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.not_found = Some(Arc::new(handler));
        self
    }

    #[must_use]
    pub fn method_not_allowed(mut self, handler: impl RequestHandler + 'static) -> Self {
        self.method_not_allowed = Some(Arc::new(handler));
        self
    }

    pub fn route_cache(&self) -> RouteCache {
        RouteCache::new(self.cache_dir.join(ROUTE_CACHE_FILE), self.route_dirs.clone())
    }

    pub fn config_cache(&self) -> ConfigCache {
        ConfigCache::new(self.cache_dir.join(CONFIG_CACHE_FILE), self.config_dirs.clone())
    }

    /// Compiles routes and config from source and writes both caches, whatever their state.
    ///
    /// # Errors
    /// Compilation and cache write errors.
    pub fn rebuild_caches(&self) -> Result<(), BootError> {
        self.config_cache().rebuild()?;
        self.route_cache().rebuild()?;
        Ok(())
    }

    /// Deletes both cache files.
    ///
    /// # Errors
    /// Fails when an existing cache file cannot be removed.
    pub fn clear_caches(&self) -> Result<(), BootError> {
        self.config_cache().clear()?;
        self.route_cache().clear()?;
        Ok(())
    }

    /// Boots the kernel.
    ///
    /// # Errors
    /// Config or route compilation errors, unknown handler or middleware keys, middleware
    /// group cycles and duplicate route names.
    pub fn build(self) -> Result<Kernel, BootError> {
        let hint = self.mode.or_else(RuntimeMode::from_env);
        let (config, mode, config_status) = self.config_cache().resolve(hint)?;
        let (entry, route_status) = self.route_cache().resolve(mode)?;

        let mut global_middleware = self.global_middleware;
        if let Some(configured) = config.get_as::<Vec<MiddlewareRef>>(GLOBAL_MIDDLEWARE_KEY)? {
            global_middleware.extend(configured);
        }

        let mut builder = Router::builder(self.registry).routes(entry.routes).global_middleware(global_middleware);
        if let Some(handler) = self.not_found {
            builder = builder.not_found(handler);
        }
        if let Some(handler) = self.method_not_allowed {
            builder = builder.method_not_allowed(handler);
        }
        let router = builder.build()?;

        info!(
            ?mode,
            routes = router.len(),
            config_cache = status_name(config_status),
            route_cache = status_name(route_status),
            "kernel booted"
        );
        Ok(Kernel { config, router, mode })
    }
}

fn status_name(status: CacheStatus) -> &'static str {
    match status {
        CacheStatus::Fresh => "fresh",
        CacheStatus::Stale => "stale",
        CacheStatus::Rebuilt => "rebuilt",
    }
}

impl std::fmt::Debug for KernelBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelBuilder")
            .field("config_dirs", &self.config_dirs)
            .field("route_dirs", &self.route_dirs)
            .field("cache_dir", &self.cache_dir)
            .field("registry", &self.registry)
            .field("global_middleware", &self.global_middleware)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
