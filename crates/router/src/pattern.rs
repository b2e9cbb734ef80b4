//! Route pattern compilation and matching.
//!
//! A pattern such as `/contacts/{id}/notes/{note}` is split on `/` into literal and parameter
//! segments. Both kinds compare against the percent-decoded request segment: literal segments
//! match it exactly and case-sensitively, a parameter segment captures it whole. [`CompiledPattern::format`]
//! encodes literals and values alike, so a literal such as `café` round-trips.
//!
//! Patterns and request paths are normalized the same way: a missing leading slash is implied
//! and trailing slashes are dropped, except for the root path `/`.
//!
//! ```
//! use micro_router::pattern::CompiledPattern;
//!
//! let pattern = CompiledPattern::compile("/contacts/{id}").unwrap();
//! let params = pattern.matches("/contacts/42/").unwrap();
//! assert_eq!(params.get("id"), Some("42"));
//! assert!(pattern.matches("/contacts").is_none());
//! ```

use crate::error::{RouteError, UrlError};
use crate::request::PathParams;
use serde::{Deserialize, Serialize};

/// A single `/`-separated piece of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Static(String),
    Param(String),
}

/// A compiled route pattern: its normalized source, segments and parameter names in
/// declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledPattern {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<String>,
}

impl CompiledPattern {
    /// Compiles a textual pattern.
    ///
    /// # Errors
    /// Returns [`RouteError::InvalidPattern`] for unbalanced or stray braces, placeholders that
    /// do not span a whole segment, invalid or duplicated parameter names and empty segments.
    pub fn compile(pattern: &str) -> Result<Self, RouteError> {
        let source = normalize(pattern);
        let mut segments = Vec::new();
        let mut param_names: Vec<String> = Vec::new();

        for raw in split_segments(&source) {
            if raw.is_empty() {
                return Err(RouteError::invalid_pattern(pattern, "empty path segment"));
            }

            match parse_placeholder(raw) {
                Placeholder::Param(name) => {
                    if !is_valid_name(name) {
                        return Err(RouteError::invalid_pattern(pattern, format!("invalid parameter name '{name}'")));
                    }
                    if param_names.iter().any(|existing| existing == name) {
                        return Err(RouteError::invalid_pattern(pattern, format!("duplicate parameter '{name}'")));
                    }
                    param_names.push(name.to_owned());
                    segments.push(Segment::Param(name.to_owned()));
                }
                Placeholder::Literal => segments.push(Segment::Static(raw.to_owned())),
                Placeholder::Malformed(reason) => return Err(RouteError::invalid_pattern(pattern, reason)),
            }
        }

        Ok(Self { source, segments, param_names })
    }

    /// The normalized pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in declaration order.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Matches a request path against the whole pattern.
    ///
    /// Returns `None` unless every segment matches; partial or prefix matches are rejected.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let path = normalize(path);
        let mut raw_segments = split_segments(&path);
        let mut params = PathParams::with_capacity(self.param_names.len());

        for segment in &self.segments {
            let raw = raw_segments.next()?;
            if raw.is_empty() {
                return None;
            }
            let decoded = urlencoding::decode(raw).ok()?;
            match segment {
                Segment::Static(literal) => {
                    if *literal != decoded {
                        return None;
                    }
                }
                Segment::Param(name) => params.push(name.clone(), decoded.into_owned()),
            }
        }

        if raw_segments.next().is_some() {
            return None;
        }

        Some(params)
    }

    /// Renders the pattern with the given parameter values, percent-encoding literals and values.
    ///
    /// Parameters that are not placeholders of this pattern are appended as a query string in
    /// the order they were given.
    ///
    /// # Errors
    /// Returns [`UrlError::MissingParameter`] naming `route_name` when a placeholder has no value.
    pub fn format(&self, route_name: &str, params: &[(&str, &str)]) -> Result<String, UrlError> {
        let mut path = String::with_capacity(self.source.len());

        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Static(literal) => path.push_str(&urlencoding::encode(literal)),
                Segment::Param(name) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| UrlError::MissingParameter { name: route_name.to_owned(), param: name.clone() })?;
                    path.push_str(&urlencoding::encode(value));
                }
            }
        }

        if path.is_empty() {
            path.push('/');
        }

        let extra = params
            .iter()
            .filter(|(key, _)| !self.param_names.iter().any(|name| name == key))
            .collect::<Vec<_>>();

        if !extra.is_empty() {
            // encoding a list of string pairs cannot fail
            if let Ok(query) = serde_urlencoded::to_string(extra) {
                path.push('?');
                path.push_str(&query);
            }
        }

        Ok(path)
    }
}

enum Placeholder<'a> {
    Param(&'a str),
    Literal,
    Malformed(&'static str),
}

fn parse_placeholder(segment: &str) -> Placeholder<'_> {
    let opens = segment.matches('{').count();
    let closes = segment.matches('}').count();

    match (opens, closes) {
        (0, 0) => Placeholder::Literal,
        (1, 1) => match segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Placeholder::Param(name),
            None => Placeholder::Malformed("placeholders must span a whole segment"),
        },
        (o, c) if o != c => Placeholder::Malformed("unbalanced braces"),
        _ => Placeholder::Malformed("only one placeholder is allowed per segment"),
    }
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Normalizes a path or pattern: ensures a leading `/` and strips trailing slashes except for
/// the root.
pub fn normalize(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_owned();
    }
    if trimmed.starts_with('/') { trimmed.to_owned() } else { format!("/{trimmed}") }
}

/// Joins a group prefix and a route pattern into one normalized pattern.
pub fn join(prefix: &str, pattern: &str) -> String {
    let prefix = normalize(prefix);
    let pattern = normalize(pattern);
    match (prefix.as_str(), pattern.as_str()) {
        ("/", _) => pattern,
        (_, "/") => prefix,
        _ => format!("{prefix}{pattern}"),
    }
}

fn split_segments(normalized: &str) -> std::str::Split<'_, char> {
    // the root path has no segments: "".split('/') would yield one empty segment
    let rest = normalized.strip_prefix('/').unwrap_or(normalized);
    let mut split = rest.split('/');
    if rest.is_empty() {
        split.next();
    }
    split
}
