use bencher::{handler_keys, TestCase, TestGroup};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use http::{Method, Uri};
use micro_router::pattern::CompiledPattern;
use micro_router::registry::Registry;
use micro_router::{handler_fn, Request, Response, Router};
use std::hint::black_box;

fn create_test_cases() -> Vec<TestCase> {
    vec![
        TestCase::small("first_route", "/api/v1/contacts"),
        TestCase::normal("middle_route", "/api/v1/products/42"),
        TestCase::large("last_route", "/api/v1/settings/7/comments/3"),
        TestCase::large("not_found", "/api/v2/unknown"),
    ]
}

fn router(group: TestGroup, table: micro_router::route::RouteTable) -> Router {
    let registry = handler_keys(group.resources()).into_iter().fold(Registry::new(), |registry, key| {
        registry.handler(key, handler_fn(|_req: &mut Request, res: Response| async move { Ok(res) }))
    });
    Router::builder(registry).route_table(table).build().expect("benchmark router should build")
}

fn benchmark_pattern(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("pattern");

    group.bench_function("compile", |b| {
        b.iter(|| CompiledPattern::compile(black_box("/api/v1/users/{user}/posts/{post}")).expect("pattern should compile"));
    });

    let pattern = CompiledPattern::compile("/api/v1/users/{user}/posts/{post}").expect("pattern should compile");
    group.bench_function("match", |b| {
        b.iter(|| black_box(pattern.matches(black_box("/api/v1/users/ada%20lovelace/posts/42"))));
    });
    group.bench_function("format", |b| {
        b.iter(|| black_box(pattern.format("posts.show", black_box(&[("user", "ada"), ("post", "42"), ("page", "2")]))));
    });

    group.finish();
}

fn benchmark_router_at(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("router_at");

    for case in create_test_cases() {
        let router = router(case.group(), case.table());
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &case, |b, case| {
            b.iter(|| {
                let found = router.at(&Method::GET, black_box(case.path()));
                black_box(matches!(found, micro_router::router::RouteMatch::Found { .. }));
            });
        });
    }

    group.finish();
}

fn benchmark_url(criterion: &mut Criterion) {
    let router = router(TestGroup::Large, TestCase::large("url", "/").table());
    criterion.bench_function("router_url", |b| {
        b.iter(|| black_box(router.url(black_box("api.settings.comment"), &[("id", "7"), ("comment", "3")])));
    });
}

fn benchmark_dispatch(criterion: &mut Criterion) {
    let router = router(TestGroup::Normal, TestCase::normal("dispatch", "/").table());
    let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime should build");

    criterion.bench_function("router_dispatch", |b| {
        b.iter(|| {
            let req = Request::new(Method::GET, Uri::from_static("/api/v1/products/42"));
            black_box(runtime.block_on(router.dispatch(req)).expect("dispatch should succeed"));
        });
    });
}

criterion_group!(router_benches, benchmark_pattern, benchmark_router_at, benchmark_url, benchmark_dispatch);
criterion_main!(router_benches);
