use crate::body::Response;
use crate::error::BoxError;
use crate::request::Request;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// What every link of the pipeline returns.
pub type HandlerResult = Result<Response, BoxError>;

/// The terminal link of a pipeline: a route handler.
///
/// A handler receives the request, with its path parameters already extracted, and the
/// response built so far. It returns the response to send or an error, which propagates
/// unchanged out of dispatch.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn invoke(&self, req: &mut Request, res: Response) -> HandlerResult;
}

#[async_trait]
impl<H: RequestHandler + ?Sized> RequestHandler for Arc<H> {
    async fn invoke(&self, req: &mut Request, res: Response) -> HandlerResult {
        (**self).invoke(req, res).await
    }
}

/// A [`RequestHandler`] backed by a closure.
pub struct FnHandler<F> {
    f: F,
}

/// Creates a handler from a closure.
///
/// The closure reads what it needs from the request and returns a future that owns its data.
///
/// ```
/// use micro_router::{Request, Response, handler_fn};
///
/// let show = handler_fn(|req: &mut Request, mut res: Response| {
///     let id = req.param("id").unwrap_or_default().to_owned();
///     async move {
///         *res.body_mut() = format!("contact {id}").into();
///         Ok(res)
///     }
/// });
/// # let _ = show;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(&mut Request, Response) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> RequestHandler for FnHandler<F>
where
    F: Fn(&mut Request, Response) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn invoke(&self, req: &mut Request, res: Response) -> HandlerResult {
        (self.f)(req, res).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{Method, StatusCode, Uri};

    fn assert_is_handler<T: RequestHandler>(_handler: &T) {
        // no op
    }

    #[tokio::test]
    async fn test_fn_handler_reads_request() {
        let handler = handler_fn(|req: &mut Request, mut res: Response| {
            let method = req.method().clone();
            async move {
                *res.status_mut() = StatusCode::CREATED;
                *res.body_mut() = method.to_string().into();
                Ok(res)
            }
        });
        assert_is_handler(&handler);

        let mut req = Request::new(Method::POST, Uri::from_static("/contacts"));
        let res = handler.invoke(&mut req, Response::default()).await.unwrap();

        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.body().as_bytes().as_ref(), b"POST");
    }

    #[tokio::test]
    async fn test_fn_handler_error_propagates() {
        let handler = handler_fn(|_req: &mut Request, _res: Response| async { Err::<Response, BoxError>("boom".into()) });

        let mut req = Request::new(Method::GET, Uri::from_static("/"));
        let err = handler.invoke(&mut req, Response::default()).await.unwrap_err();

        assert_eq!(err.to_string(), "boom");
    }
}
