use super::{CompiledRoute, HandlerRef, MiddlewareRef, Route, RouteDefinition};
use crate::error::{RouteError, UrlError};
use crate::pattern;
use http::Method;
use std::collections::HashMap;
use tracing::debug;

/// Shared prefix, middleware and name prefix applied to every route registered inside
/// [`RouteTable::group`].
#[derive(Debug, Clone, Default)]
pub struct Group {
    prefix: String,
    middleware: Vec<MiddlewareRef>,
    name_prefix: String,
}

impl Group {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), ..Self::default() }
    }

    #[must_use]
    pub fn middleware<I, M>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    /// Prepended to the name of every named route in the group, e.g. `admin.`.
    #[must_use]
    pub fn name_prefix(mut self, name_prefix: impl Into<String>) -> Self {
        self.name_prefix = name_prefix.into();
        self
    }
}

/// Registration-ordered collection of routes.
///
/// Every route is compiled as it is registered, so a malformed pattern or a clashing name
/// fails the registration that introduced it.
#[derive(Debug, Default)]
pub struct RouteTable {
    definitions: Vec<RouteDefinition>,
    routes: Vec<CompiledRoute>,
    names: HashMap<String, usize>,
    scopes: Vec<Group>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a route, applying the prefixes, middleware and name prefixes of all enclosing
    /// groups (outermost first).
    ///
    /// # Errors
    /// [`RouteError::InvalidPattern`] for a malformed pattern, [`RouteError::EmptyMethods`]
    /// without methods and [`RouteError::DuplicateRouteName`] when the name is taken.
    pub fn register(
        &mut self,
        methods: Vec<Method>,
        pattern: &str,
        handler: HandlerRef,
        middleware: Vec<MiddlewareRef>,
        name: Option<String>,
    ) -> Result<&RouteDefinition, RouteError> {
        let pattern = self.scopes.iter().rev().fold(pattern.to_owned(), |pattern, scope| pattern::join(&scope.prefix, &pattern));

        let middleware = self.scopes.iter().flat_map(|scope| scope.middleware.iter().cloned()).chain(middleware).collect();

        let name = name.map(|name| {
            let mut full = self.scopes.iter().map(|scope| scope.name_prefix.as_str()).collect::<String>();
            full.push_str(&name);
            full
        });

        let definition = RouteDefinition { methods, pattern, handler, middleware, name };
        let route = CompiledRoute::compile(&definition)?;

        if let Some(name) = &definition.name {
            if self.names.contains_key(name) {
                return Err(RouteError::duplicate_route_name(name));
            }
            self.names.insert(name.clone(), self.routes.len());
        }

        debug!(
            methods = ?definition.methods,
            pattern = %definition.pattern,
            handler = %definition.handler,
            name = ?definition.name,
            "route registered"
        );

        self.routes.push(route);
        self.definitions.push(definition);
        Ok(&self.definitions[self.definitions.len() - 1])
    }

    /// Registers a [`Route`] built fluently.
    ///
    /// # Errors
    /// See [`RouteTable::register`].
    pub fn add(&mut self, route: Route) -> Result<&RouteDefinition, RouteError> {
        let Route { methods, pattern, handler, middleware, name } = route;
        self.register(methods, &pattern, handler, middleware, name)
    }

    /// Registers the routes added by `f` inside `group`. Groups nest: prefixes are joined,
    /// middleware lists concatenate outer to inner, name prefixes are concatenated.
    ///
    /// # Errors
    /// Returns the first registration error raised by `f`.
    pub fn group<F>(&mut self, group: Group, f: F) -> Result<(), RouteError>
    where
        F: FnOnce(&mut Self) -> Result<(), RouteError>,
    {
        self.scopes.push(group);
        let result = f(self);
        self.scopes.pop();
        result
    }

    /// Builds the URL of a named route.
    ///
    /// # Errors
    /// [`UrlError::UnknownRouteName`] if no route has that name, [`UrlError::MissingParameter`]
    /// if a placeholder has no value in `params`.
    pub fn resolve_url(&self, name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        let route = self.route(name).ok_or_else(|| UrlError::UnknownRouteName { name: name.to_owned() })?;
        route.pattern().format(name, params)
    }

    /// The compiled route registered under `name`.
    pub fn route(&self, name: &str) -> Option<&CompiledRoute> {
        self.names.get(name).map(|&index| &self.routes[index])
    }

    pub fn definitions(&self) -> &[RouteDefinition] {
        &self.definitions
    }

    /// Compiled routes in registration order.
    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn into_routes(self) -> Vec<CompiledRoute> {
        self.routes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(route: &CompiledRoute) -> Vec<&str> {
        route.middleware().iter().map(MiddlewareRef::as_str).collect()
    }

    #[test]
    fn test_register_returns_definition() {
        let mut table = RouteTable::new();
        let definition = table
            .register(vec![Method::GET], "/contacts/{id}/", "contacts.show".into(), vec![], Some("contacts.show".into()))
            .unwrap();

        assert_eq!(definition.pattern, "/contacts/{id}/");
        assert_eq!(table.len(), 1);
        assert_eq!(table.routes()[0].pattern().source(), "/contacts/{id}");
    }

    #[test]
    fn test_register_fails_fast_on_bad_pattern() {
        let mut table = RouteTable::new();
        let result = table.add(Route::get("/contacts/{id", "contacts.show"));

        assert!(matches!(result, Err(RouteError::InvalidPattern { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_name() {
        let mut table = RouteTable::new();
        table.add(Route::get("/a", "a").name("same")).unwrap();

        let result = table.add(Route::get("/b", "b").name("same"));

        assert!(matches!(result, Err(RouteError::DuplicateRouteName { name }) if name == "same"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_unnamed_routes_never_clash() {
        let mut table = RouteTable::new();
        table.add(Route::get("/a", "a")).unwrap();
        table.add(Route::post("/a", "a")).unwrap();

        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_group_prefix_and_middleware() {
        let mut table = RouteTable::new();
        table.add(Route::get("/", "home").middleware(["web"])).unwrap();
        table
            .group(Group::new("/admin").middleware(["auth"]).name_prefix("admin."), |table| {
                table.add(Route::get("/", "admin.dashboard").name("dashboard"))?;
                table.group(Group::new("users").middleware(["audit"]).name_prefix("users."), |table| {
                    table.add(Route::get("/{id}", "admin.users.show").middleware(["etag"]).name("show"))?;
                    Ok(())
                })
            })
            .unwrap();
        table.add(Route::get("/after", "after")).unwrap();

        let routes = table.routes();
        assert_eq!(routes[0].pattern().source(), "/");
        assert_eq!(refs(&routes[0]), vec!["web"]);

        assert_eq!(routes[1].pattern().source(), "/admin");
        assert_eq!(refs(&routes[1]), vec!["auth"]);
        assert_eq!(routes[1].name(), Some("admin.dashboard"));

        assert_eq!(routes[2].pattern().source(), "/admin/users/{id}");
        assert_eq!(refs(&routes[2]), vec!["auth", "audit", "etag"]);
        assert_eq!(routes[2].name(), Some("admin.users.show"));

        // the group scope ends with the closure
        assert_eq!(routes[3].pattern().source(), "/after");
        assert!(routes[3].middleware().is_empty());
    }

    #[test]
    fn test_group_scope_is_popped_on_error() {
        let mut table = RouteTable::new();
        let result = table.group(Group::new("/api"), |table| {
            table.add(Route::get("/{", "broken"))?;
            Ok(())
        });
        assert!(result.is_err());

        table.add(Route::get("/ok", "ok")).unwrap();
        assert_eq!(table.routes()[0].pattern().source(), "/ok");
    }

    #[test]
    fn test_resolve_url() {
        let mut table = RouteTable::new();
        table.add(Route::get("/users/{user}/posts/{post}", "posts.show").name("posts.show")).unwrap();

        assert_eq!(table.resolve_url("posts.show", &[("post", "9"), ("user", "ada")]).unwrap(), "/users/ada/posts/9");
        assert_eq!(
            table.resolve_url("posts.index", &[]),
            Err(UrlError::UnknownRouteName { name: "posts.index".into() })
        );
        assert_eq!(
            table.resolve_url("posts.show", &[("user", "ada")]),
            Err(UrlError::MissingParameter { name: "posts.show".into(), param: "post".into() })
        );
    }
}
