//! Declarative route files.
//!
//! A route file is itself a group: its top-level `prefix`, `middleware` and `name_prefix` apply to
//! every route it declares. Routes are `[[route]]` tables, nested groups are `[[group]]` tables.
//!
//! ```toml
//! prefix = "/contacts"
//! middleware = ["web"]
//! name_prefix = "contacts."
//!
//! [[route]]
//! method = "GET"
//! path = "/"
//! handler = "contacts.index"
//! name = "index"
//!
//! [[group]]
//! prefix = "/{id}"
//! middleware = ["auth"]
//!
//! [[group.route]]
//! method = ["PUT", "PATCH"]
//! path = "/"
//! handler = "contacts.update"
//! ```
//!
//! Inside one group, `[[route]]` entries register before nested `[[group]]` entries.

use super::{ANY_METHODS, Group, HandlerRef, MiddlewareRef, RouteTable};
use crate::error::RouteError;
use http::Method;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteFile {
    #[serde(default)]
    prefix: String,
    #[serde(default)]
    middleware: Vec<MiddlewareRef>,
    #[serde(default)]
    name_prefix: String,
    #[serde(default, rename = "route")]
    routes: Vec<RouteEntry>,
    #[serde(default, rename = "group")]
    groups: Vec<RouteFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteEntry {
    method: MethodSpec,
    path: String,
    handler: HandlerRef,
    #[serde(default)]
    middleware: Vec<MiddlewareRef>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MethodSpec {
    One(String),
    Many(Vec<String>),
}

impl MethodSpec {
    fn methods(&self) -> Result<Vec<Method>, RouteError> {
        let names = match self {
            Self::One(name) => std::slice::from_ref(name),
            Self::Many(names) => names.as_slice(),
        };

        let mut methods = Vec::with_capacity(names.len());
        for name in names {
            let expanded = if name.eq_ignore_ascii_case("any") {
                ANY_METHODS.to_vec()
            } else {
                let method = Method::from_bytes(name.to_ascii_uppercase().as_bytes())
                    .ok()
                    .ok_or_else(|| RouteError::InvalidMethod { method: name.clone() })?;
                vec![method]
            };
            for method in expanded {
                if !methods.contains(&method) {
                    methods.push(method);
                }
            }
        }
        Ok(methods)
    }
}

impl RouteFile {
    /// Parses the toml source of a route file.
    ///
    /// # Errors
    /// Returns the toml error for malformed input or unknown keys.
    pub fn parse(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Registers every route of the file into `table`, in declaration order.
    ///
    /// # Errors
    /// Returns the first registration error.
    pub fn register_into(self, table: &mut RouteTable) -> Result<(), RouteError> {
        let group = Group::new(self.prefix).middleware(self.middleware).name_prefix(self.name_prefix);
        let routes = self.routes;
        let groups = self.groups;

        table.group(group, move |table| {
            for entry in routes {
                table.register(entry.method.methods()?, &entry.path, entry.handler, entry.middleware, entry.name)?;
            }
            for nested in groups {
                nested.register_into(table)?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTACTS: &str = r#"
prefix = "/contacts"
middleware = ["web"]
name_prefix = "contacts."

[[route]]
method = "get"
path = "/"
handler = "contacts.index"
name = "index"

[[route]]
method = "ANY"
path = "/legacy"
handler = "contacts.legacy"

[[group]]
prefix = "/{id}"
middleware = ["auth"]

[[group.route]]
method = ["PUT", "PATCH"]
path = "/"
handler = "contacts.update"
middleware = ["audit"]
name = "update"
"#;

    #[test]
    fn test_register_route_file() {
        let mut table = RouteTable::new();
        RouteFile::parse(CONTACTS).unwrap().register_into(&mut table).unwrap();

        let routes = table.routes();
        assert_eq!(routes.len(), 3);

        assert_eq!(routes[0].methods(), &[Method::GET]);
        assert_eq!(routes[0].pattern().source(), "/contacts");
        assert_eq!(routes[0].name(), Some("contacts.index"));

        assert_eq!(routes[1].methods(), &ANY_METHODS);
        assert_eq!(routes[1].name(), None);

        assert_eq!(routes[2].methods(), &[Method::PUT, Method::PATCH]);
        assert_eq!(routes[2].pattern().source(), "/contacts/{id}");
        assert_eq!(routes[2].name(), Some("contacts.update"));
        assert_eq!(
            routes[2].middleware(),
            &[MiddlewareRef::from("web"), MiddlewareRef::from("auth"), MiddlewareRef::from("audit")]
        );
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(RouteFile::parse("[[route]]\nmethod = \"GET\"\npath = \"/\"\nhandler = \"h\"\nverb = \"x\"\n").is_err());
    }

    #[test]
    fn test_invalid_method() {
        let file = RouteFile::parse("[[route]]\nmethod = \"GE T\"\npath = \"/\"\nhandler = \"h\"\n").unwrap();
        let result = file.register_into(&mut RouteTable::new());

        assert!(matches!(result, Err(RouteError::InvalidMethod { method }) if method == "GE T"));
    }

    #[test]
    fn test_bad_pattern_in_file() {
        let file = RouteFile::parse("[[route]]\nmethod = \"GET\"\npath = \"/{id\"\nhandler = \"h\"\n").unwrap();
        assert!(matches!(file.register_into(&mut RouteTable::new()), Err(RouteError::InvalidPattern { .. })));
    }
}
