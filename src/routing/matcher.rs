//! Route pattern compilation and matching.
//!
//! # Responsibilities
//! - Compile a pattern string into typed segments
//! - Match a request path against compiled segments
//! - Capture module/namespace/controller/action and parameters
//!
//! # Design Decisions
//! - Literal matching is case-sensitive
//! - Empty path segments are ignored (trailing and doubled slashes)
//! - `:params` swallows the rest of the path and must be last
//! - No regex to guarantee O(n) matching

use std::collections::BTreeMap;

use thiserror::Error;

/// Errors produced when compiling a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("Route pattern must start with '/': {0}")]
    NotAbsolute(String),

    #[error("':params' must be the last segment in {0}")]
    ParamsNotLast(String),

    #[error("Unknown placeholder '{placeholder}' in {pattern}")]
    UnknownPlaceholder { pattern: String, placeholder: String },

    #[error("Placeholder '{name}' appears twice in {pattern}")]
    Duplicate { pattern: String, name: String },
}

/// One compiled path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    /// `{name}`: captured into the named map.
    Named(String),
    Module,
    Namespace,
    Controller,
    Action,
    /// `:int`: a digits-only positional parameter.
    Int,
    /// `:params`: every remaining segment as positional parameters.
    Params,
}

/// Values captured by a successful match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    pub module: Option<String>,
    pub namespace: Option<String>,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub params: Vec<String>,
    pub named: BTreeMap<String, String>,
}

/// A compiled route pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compile a pattern such as `/blog/{slug}` or `/:controller/:action/:params`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if !raw.starts_with('/') {
            return Err(PatternError::NotAbsolute(raw.to_string()));
        }

        let mut segments = Vec::new();
        let mut seen = Vec::new();
        let parts: Vec<&str> = split_path(raw).collect();

        for (i, part) in parts.iter().enumerate() {
            let segment = if let Some(name) = part.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    return Err(PatternError::UnknownPlaceholder {
                        pattern: raw.to_string(),
                        placeholder: part.to_string(),
                    });
                }
                Segment::Named(name.to_string())
            } else if let Some(placeholder) = part.strip_prefix(':') {
                match placeholder {
                    "module" => Segment::Module,
                    "namespace" => Segment::Namespace,
                    "controller" => Segment::Controller,
                    "action" => Segment::Action,
                    "int" => Segment::Int,
                    "params" if i + 1 == parts.len() => Segment::Params,
                    "params" => return Err(PatternError::ParamsNotLast(raw.to_string())),
                    _ => {
                        return Err(PatternError::UnknownPlaceholder {
                            pattern: raw.to_string(),
                            placeholder: part.to_string(),
                        })
                    }
                }
            } else {
                Segment::Literal(part.to_string())
            };

            let key = match &segment {
                Segment::Named(n) => Some(n.clone()),
                Segment::Module => Some(":module".to_string()),
                Segment::Namespace => Some(":namespace".to_string()),
                Segment::Controller => Some(":controller".to_string()),
                Segment::Action => Some(":action".to_string()),
                _ => None,
            };
            if let Some(key) = key {
                if seen.contains(&key) {
                    return Err(PatternError::Duplicate {
                        pattern: raw.to_string(),
                        name: key,
                    });
                }
                seen.push(key);
            }

            segments.push(segment);
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Match a normalized path. Returns the captures on success.
    pub fn matches(&self, path: &str) -> Option<Captures> {
        let parts: Vec<&str> = split_path(path).collect();
        let mut captures = Captures::default();
        let mut idx = 0;

        for segment in &self.segments {
            if let Segment::Params = segment {
                captures
                    .params
                    .extend(parts[idx..].iter().map(|p| p.to_string()));
                idx = parts.len();
                break;
            }

            let part = *parts.get(idx)?;
            match segment {
                Segment::Literal(lit) if lit == part => {}
                Segment::Literal(_) => return None,
                Segment::Named(name) => {
                    captures.named.insert(name.clone(), part.to_string());
                }
                Segment::Module => captures.module = Some(part.to_string()),
                Segment::Namespace => captures.namespace = Some(part.to_string()),
                Segment::Controller => captures.controller = Some(part.to_string()),
                Segment::Action => captures.action = Some(part.to_string()),
                Segment::Int if part.bytes().all(|b| b.is_ascii_digit()) => {
                    captures.params.push(part.to_string());
                }
                Segment::Int => return None,
                Segment::Params => unreachable!("handled above"),
            }
            idx += 1;
        }

        (idx == parts.len()).then_some(captures)
    }
}

/// Reduce a URI to its path: drops scheme/authority, query and fragment.
pub fn normalize_uri(uri: &str) -> &str {
    let without_scheme = match uri.find("://") {
        Some(pos) => {
            let rest = &uri[pos + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("/")
        }
        None => uri,
    };
    let end = without_scheme
        .find(|c| c == '?' || c == '#')
        .unwrap_or(without_scheme.len());
    let path = &without_scheme[..end];
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
