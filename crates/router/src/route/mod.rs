//! Route definitions and their compiled, cacheable form.
//!
//! Handlers and middleware are referenced by string keys ([`HandlerRef`], [`MiddlewareRef`])
//! rather than closures, so a compiled route table can be written to disk and read back. The
//! keys are resolved against a [`Registry`](crate::registry::Registry) when the router is built.

mod file;
mod table;

pub use file::RouteFile;
pub use table::{Group, RouteTable};

use crate::error::RouteError;
use crate::pattern::CompiledPattern;
use http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Methods registered by [`Route::any`].
pub const ANY_METHODS: [Method; 7] =
    [Method::GET, Method::HEAD, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS];

macro_rules! string_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_ref!(
    /// Key of a handler in the registry, e.g. `contacts.show`.
    HandlerRef
);

string_ref!(
    /// Key of a middleware or middleware group in the registry, e.g. `auth`.
    MiddlewareRef
);

/// A route as registered, after group prefixes and group middleware have been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    #[serde(with = "methods_serde")]
    pub methods: Vec<Method>,
    pub pattern: String,
    pub handler: HandlerRef,
    pub middleware: Vec<MiddlewareRef>,
    pub name: Option<String>,
}

/// The compiled form of a [`RouteDefinition`], as kept by the router and the route cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledRoute {
    #[serde(with = "methods_serde")]
    methods: Vec<Method>,
    pattern: CompiledPattern,
    handler: HandlerRef,
    middleware: Vec<MiddlewareRef>,
    name: Option<String>,
}

impl CompiledRoute {
    /// Compiles a definition.
    ///
    /// # Errors
    /// Fails when the pattern is malformed or the method set is empty.
    pub fn compile(definition: &RouteDefinition) -> Result<Self, RouteError> {
        if definition.methods.is_empty() {
            return Err(RouteError::EmptyMethods { pattern: definition.pattern.clone() });
        }

        Ok(Self {
            methods: definition.methods.clone(),
            pattern: CompiledPattern::compile(&definition.pattern)?,
            handler: definition.handler.clone(),
            middleware: definition.middleware.clone(),
            name: definition.name.clone(),
        })
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Returns true if `method` is one of the route's methods.
    #[inline]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    pub fn pattern(&self) -> &CompiledPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &HandlerRef {
        &self.handler
    }

    pub fn middleware(&self) -> &[MiddlewareRef] {
        &self.middleware
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// Fluent route builder, added to a table with [`RouteTable::add`].
///
/// ```
/// use micro_router::route::{Route, RouteTable};
///
/// let mut table = RouteTable::new();
/// table.add(Route::get("/contacts/{id}", "contacts.show").middleware(["auth"]).name("contacts.show")).unwrap();
/// assert_eq!(table.resolve_url("contacts.show", &[("id", "42")]).unwrap(), "/contacts/42");
/// ```
#[derive(Debug, Clone)]
pub struct Route {
    methods: Vec<Method>,
    pattern: String,
    handler: HandlerRef,
    middleware: Vec<MiddlewareRef>,
    name: Option<String>,
}

macro_rules! method_route {
    ($fn_name:ident, $method:ident) => {
        pub fn $fn_name(pattern: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
            Self::new([Method::$method], pattern, handler)
        }
    };
}

impl Route {
    pub fn new(methods: impl IntoIterator<Item = Method>, pattern: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        Self {
            methods: methods.into_iter().collect(),
            pattern: pattern.into(),
            handler: handler.into(),
            middleware: Vec::new(),
            name: None,
        }
    }

    method_route!(get, GET);
    method_route!(post, POST);
    method_route!(put, PUT);
    method_route!(patch, PATCH);
    method_route!(delete, DELETE);
    method_route!(head, HEAD);
    method_route!(options, OPTIONS);

    /// A route answering every method in [`ANY_METHODS`].
    pub fn any(pattern: impl Into<String>, handler: impl Into<HandlerRef>) -> Self {
        Self::new(ANY_METHODS, pattern, handler)
    }

    /// Appends route middleware, which runs after global and group middleware.
    #[must_use]
    pub fn middleware<I, M>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = M>,
        M: Into<MiddlewareRef>,
    {
        self.middleware.extend(middleware.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

mod methods_serde {
    use http::Method;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(methods: &[Method], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(methods.iter().map(Method::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Method>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .iter()
            .map(|name| Method::from_bytes(name.as_bytes()).map_err(D::Error::custom))
            .collect()
    }
}
