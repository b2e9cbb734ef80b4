//! Boots a kernel from the route and config files under `examples/contacts` and dispatches a few
//! requests through it.
//!
//! cargo run --example contacts

use http::{Method, Uri, header};
use micro_router::kernel::Kernel;
use micro_router::logging::init_logging;
use micro_router::middleware::middleware_fn;
use micro_router::registry::Registry;
use micro_router::{BoxError, Request, Response, RuntimeMode, handler_fn};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Deserialize, Debug)]
struct NewContact {
    name: String,
    email: String,
}

fn registry() -> Registry {
    Registry::new()
        .handler("home", handler_fn(|_req: &mut Request, mut res: Response| async move {
            *res.body_mut() = "contacts demo".into();
            Ok(res)
        }))
        .handler("contacts.index", handler_fn(|req: &mut Request, mut res: Response| {
            let page = req.query_pairs().ok().and_then(|pairs| pairs.into_iter().find(|(k, _)| k == "page")).map(|(_, v)| v);
            async move {
                *res.body_mut() = format!("contacts, page {}", page.as_deref().unwrap_or("1")).into();
                Ok(res)
            }
        }))
        .handler("contacts.show", handler_fn(|req: &mut Request, mut res: Response| {
            let id = req.param("id").unwrap_or_default().to_owned();
            async move {
                *res.body_mut() = format!("contact #{id}").into();
                Ok(res)
            }
        }))
        .handler("contacts.store", handler_fn(|req: &mut Request, mut res: Response| {
            let contact = req.form::<NewContact>();
            async move {
                let contact = contact?;
                *res.status_mut() = http::StatusCode::CREATED;
                *res.body_mut() = format!("created {} <{}>", contact.name, contact.email).into();
                Ok(res)
            }
        }))
        .middleware("request_log", middleware_fn(|req, res, next| {
            Box::pin(async move {
                let (method, path) = (req.method().clone(), req.path().to_owned());
                let res = next.run(req, res).await?;
                info!(%method, path, status = res.status().as_u16(), "request handled");
                Ok(res)
            })
        }))
        .middleware("session", middleware_fn(|req, res, next| {
            Box::pin(async move {
                let mut res = next.run(req, res).await?;
                res.headers_mut().insert(header::SET_COOKIE, "session=demo; HttpOnly".parse()?);
                Ok(res)
            })
        }))
        .middleware("auth", middleware_fn(|req, mut res, next| {
            Box::pin(async move {
                if req.headers().contains_key(header::AUTHORIZATION) {
                    return next.run(req, res).await;
                }
                *res.status_mut() = http::StatusCode::UNAUTHORIZED;
                Ok(res)
            })
        }))
        .middleware_group("web", ["session"])
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let base = Path::new(env!("CARGO_MANIFEST_DIR")).join("examples/contacts");
    let cache_dir = std::env::temp_dir().join("micro-router-contacts-demo");

    init_logging(RuntimeMode::Debug)?;

    let kernel = Kernel::builder()
        .config_dir(base.join("config"))
        .route_dir(base.join("modules"))
        .cache_dir(&cache_dir)
        .registry(registry())
        .build()?;

    info!(mode = ?kernel.mode(), show = kernel.url("contacts.show", &[("id", "7")])?, "kernel ready");

    let mut store = Request::new(Method::POST, Uri::from_static("/contacts"));
    store.headers_mut().insert(header::AUTHORIZATION, "Bearer demo".parse()?);
    store.headers_mut().insert(header::CONTENT_TYPE, mime::APPLICATION_WWW_FORM_URLENCODED.as_ref().parse()?);
    store.set_body("name=Ada&email=ada%40example.com");

    let requests = vec![
        Request::new(Method::GET, Uri::from_static("/")),
        Request::new(Method::GET, Uri::from_static("/contacts?page=2")),
        Request::new(Method::GET, Uri::from_static("/contacts/7")),
        Request::new(Method::POST, Uri::from_static("/contacts")),
        store,
        Request::new(Method::DELETE, Uri::from_static("/contacts/7")),
        Request::new(Method::GET, Uri::from_static("/missing")),
    ];

    for req in requests {
        let line = format!("{} {}", req.method(), req.uri());
        let res = kernel.handle(req).await?;
        println!("{line} -> {} {}", res.status(), String::from_utf8_lossy(res.body().as_bytes()));
    }

    Ok(())
}
