//! Middleware and pipeline composition.
//!
//! A pipeline is built by decorating the terminal handler: starting from the handler, every
//! middleware (taken in reverse order) wraps the handler built so far and becomes the new
//! outermost link. For `[m1, m2]` and handler `h` the result behaves like
//! `m1(req, res, || m2(req, res, || h(req, res)))`.
//!
//! Each link either returns a response itself (short-circuit) or hands the request on through
//! [`Next::run`]. Links run one after the other on the caller's task, never concurrently.

use crate::body::Response;
use crate::handler::{HandlerResult, RequestHandler};
use crate::request::Request;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = HandlerResult> + Send + 'a>>;

/// A request/response interceptor that can short-circuit or delegate to the rest of the chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: &mut Request, res: Response, next: Next<'_>) -> HandlerResult;
}

/// The remainder of the pipeline after the current middleware.
///
/// Calling it more than once, or not at all, is up to the middleware. Nothing prevents a second
/// call, but a middleware is expected to run the rest of the chain at most once per request.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    next: &'a dyn RequestHandler,
}

impl<'a> Next<'a> {
    pub fn new(next: &'a dyn RequestHandler) -> Self {
        Self { next }
    }

    pub async fn run(self, req: &mut Request, res: Response) -> HandlerResult {
        self.next.invoke(req, res).await
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// One link of a composed pipeline: a middleware decorating the rest of the chain.
struct Link {
    middleware: Arc<dyn Middleware>,
    next: Arc<dyn RequestHandler>,
}

#[async_trait]
impl RequestHandler for Link {
    async fn invoke(&self, req: &mut Request, res: Response) -> HandlerResult {
        self.middleware.handle(req, res, Next::new(self.next.as_ref())).await
    }
}

/// Composes middleware around a terminal handler, right to left.
///
/// The first middleware of `middleware` becomes the outermost link and runs first.
pub fn compose<I>(middleware: I, terminal: Arc<dyn RequestHandler>) -> Arc<dyn RequestHandler>
where
    I: IntoIterator<Item = Arc<dyn Middleware>>,
    I::IntoIter: DoubleEndedIterator,
{
    middleware.into_iter().rev().fold(terminal, |next, middleware| {
        let link: Arc<dyn RequestHandler> = Arc::new(Link { middleware, next });
        link
    })
}

/// A [`Middleware`] backed by a closure returning a boxed future.
pub struct FnMiddleware<F> {
    f: F,
}

/// Creates a middleware from a closure.
///
/// ```
/// use micro_router::middleware::middleware_fn;
/// use micro_router::Response;
///
/// let powered_by = middleware_fn(|req, res, next| {
///     Box::pin(async move {
///         let mut res = next.run(req, res).await?;
///         res.headers_mut().insert("x-powered-by", "micro-router".parse()?);
///         Ok(res)
///     })
/// });
/// # let _ = powered_by;
/// ```
pub fn middleware_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, Response, Next<'a>) -> BoxFuture<'a> + Send + Sync,
{
    FnMiddleware { f }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Request, Response, Next<'a>) -> BoxFuture<'a> + Send + Sync,
{
    async fn handle(&self, req: &mut Request, res: Response, next: Next<'_>) -> HandlerResult {
        (self.f)(req, res, next).await
    }
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware").finish_non_exhaustive()
    }
}
