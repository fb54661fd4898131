//! Route registry
//!
//! Maps tool names, prompt names and resource URI patterns to handlers.
//! Resource patterns look like `todo://{todo_id}`: a literal scheme, then
//! `/`-separated segments that are either literals or whole-segment
//! placeholders.

use std::fmt;

use serde_json::Value;

use crate::error::{HandlerError, RouteError};
use crate::mcp::types::{Params, PromptArgument};

/// What a handler returns to the dispatcher
pub type HandlerResult = Result<Value, HandlerError>;

/// Handler callback. Receives the dispatcher-owned state and the call params.
pub type Handler<S> = Box<dyn Fn(&mut S, Params) -> HandlerResult + Send + Sync>;

const SCHEME_SEPARATOR: &str = "://";
const SEGMENT_SEPARATOR: char = '/';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Tool,
    Resource,
    Prompt,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteKind::Tool => "tool",
            RouteKind::Resource => "resource",
            RouteKind::Prompt => "prompt",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

/// A parsed route pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    scheme: Option<String>,
    segments: Vec<Segment>,
}

impl Pattern {
    pub fn parse(kind: RouteKind, raw: &str) -> Result<Self, RouteError> {
        let invalid = |message: &str| RouteError::InvalidPattern {
            kind,
            pattern: raw.to_string(),
            message: message.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        if kind != RouteKind::Resource {
            if raw.contains(['{', '}']) {
                return Err(invalid("names cannot contain placeholders"));
            }
            return Ok(Self {
                raw: raw.to_string(),
                scheme: None,
                segments: vec![Segment::Literal(raw.to_string())],
            });
        }

        let (scheme, rest) = raw
            .split_once(SCHEME_SEPARATOR)
            .ok_or_else(|| invalid("missing scheme separator '://'"))?;
        if scheme.is_empty() || scheme.contains(['{', '}', '/']) {
            return Err(invalid("scheme must be a non-empty literal"));
        }

        let mut segments = Vec::new();
        let mut names: Vec<&str> = Vec::new();
        for segment in rest.split(SEGMENT_SEPARATOR) {
            if let Some(name) = segment
                .strip_prefix('{')
                .and_then(|s| s.strip_suffix('}'))
            {
                if name.is_empty() || name.contains(['{', '}']) {
                    return Err(invalid("placeholder names must be non-empty identifiers"));
                }
                if names.contains(&name) {
                    return Err(invalid("placeholder names must be unique"));
                }
                names.push(name);
                segments.push(Segment::Placeholder(name.to_string()));
            } else if segment.contains(['{', '}']) {
                return Err(invalid("placeholders must span a whole segment"));
            } else {
                segments.push(Segment::Literal(segment.to_string()));
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: Some(scheme.to_string()),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether the pattern has at least one placeholder
    pub fn is_template(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Placeholder(_)))
    }

    /// Whether some concrete target could match both patterns
    fn overlaps(&self, other: &Pattern) -> bool {
        self.scheme == other.scheme
            && self.segments.len() == other.segments.len()
            && self
                .segments
                .iter()
                .zip(&other.segments)
                .all(|pair| match pair {
                    (Segment::Literal(a), Segment::Literal(b)) => a == b,
                    _ => true,
                })
    }

    /// Match a concrete target, returning the captured placeholder values
    fn matches(&self, target: &str) -> Option<Params> {
        let Some(scheme) = &self.scheme else {
            return (target == self.raw).then(Params::new);
        };

        let (target_scheme, rest) = target.split_once(SCHEME_SEPARATOR)?;
        if target_scheme != scheme {
            return None;
        }

        let parts: Vec<&str> = rest.split(SEGMENT_SEPARATOR).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut captures = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Placeholder(name) if !part.is_empty() => {
                    captures.insert(name.clone(), Value::String(part.to_string()));
                }
                _ => return None,
            }
        }
        Some(captures)
    }
}

/// A registered route plus the metadata used by the listing methods
pub struct Route<S> {
    kind: RouteKind,
    pattern: Pattern,
    handler: Handler<S>,
    name: String,
    description: Option<String>,
    input_schema: Option<Value>,
    mime_type: Option<String>,
    arguments: Vec<PromptArgument>,
}

impl<S> Route<S> {
    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn arguments(&self) -> &[PromptArgument] {
        &self.arguments
    }

    pub fn with_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(&mut self, schema: Value) -> &mut Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn with_mime_type(&mut self, mime_type: impl Into<String>) -> &mut Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_argument(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> &mut Self {
        self.arguments.push(PromptArgument {
            name: name.into(),
            description: Some(description.into()),
            required,
        });
        self
    }
}

impl<S> fmt::Debug for Route<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern.raw)
            .finish_non_exhaustive()
    }
}

/// A resolved route and the values its placeholders captured
pub struct Resolved<'a, S> {
    pub route: &'a Route<S>,
    pub captures: Params,
}

impl<S> Resolved<'_, S> {
    /// Run the handler with the captures merged over the supplied params
    pub fn invoke(self, state: &mut S, mut params: Params) -> HandlerResult {
        params.extend(self.captures);
        (self.route.handler)(state, params)
    }
}

/// Route registry
pub struct Router<S> {
    routes: Vec<Route<S>>,
}

impl<S> Default for Router<S> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<S> Router<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Fails if the pattern is invalid or overlaps an
    /// existing route of the same kind.
    pub fn register<F>(
        &mut self,
        pattern: &str,
        kind: RouteKind,
        handler: F,
    ) -> Result<&mut Route<S>, RouteError>
    where
        F: Fn(&mut S, Params) -> HandlerResult + Send + Sync + 'static,
    {
        let pattern = Pattern::parse(kind, pattern)?;

        if let Some(existing) = self
            .routes
            .iter()
            .find(|r| r.kind == kind && r.pattern.overlaps(&pattern))
        {
            return Err(RouteError::DuplicateRoute {
                kind,
                pattern: pattern.raw,
                existing: existing.pattern.raw.clone(),
            });
        }

        tracing::debug!(%kind, pattern = %pattern.raw, "Registered route");

        let index = self.routes.len();
        self.routes.push(Route {
            kind,
            name: pattern.raw.clone(),
            pattern,
            handler: Box::new(handler),
            description: None,
            input_schema: None,
            mime_type: None,
            arguments: Vec::new(),
        });
        Ok(&mut self.routes[index])
    }

    /// Find the route serving `target`
    pub fn resolve(&self, kind: RouteKind, target: &str) -> Result<Resolved<'_, S>, RouteError> {
        self.routes
            .iter()
            .filter(|r| r.kind == kind)
            .find_map(|route| {
                route
                    .pattern
                    .matches(target)
                    .map(|captures| Resolved { route, captures })
            })
            .ok_or_else(|| RouteError::NoRouteFound {
                kind,
                target: target.to_string(),
            })
    }

    /// Routes of one kind, in registration order
    pub fn routes(&self, kind: RouteKind) -> impl Iterator<Item = &Route<S>> {
        self.routes.iter().filter(move |r| r.kind == kind)
    }

    pub fn has_kind(&self, kind: RouteKind) -> bool {
        self.routes(kind).next().is_some()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
