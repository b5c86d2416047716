//! Two-mode variable substitution for free-form configuration strings.
//!
//! `${VAR}` / `${VAR:-default}` are configure-time tokens, resolved against an
//! environment snapshot while compiling. `{{VAR}}` / `{{VAR:-default}}` are
//! passthrough tokens, left for the generated compose file to resolve and
//! re-spelled in its own `${...}` syntax.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SubstError {
    #[error("environment variable '{name}' is not set and has no default")]
    Unresolved { name: String },
    #[error("malformed substitution token at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: &'static str },
    #[error("passthrough token '{{{{{name}}}}}' is not allowed in a value baked into the image")]
    PassthroughNotAllowed { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    ConfigureTime,
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvToken {
    pub kind: TokenKind,
    pub name: String,
    pub default: Option<String>,
}

impl EnvToken {
    /// Spelling understood by the compose file's own interpolation.
    pub fn to_manifest_syntax(&self) -> String {
        match &self.default {
            Some(default) => format!("${{{}:-{default}}}", self.name),
            None => format!("${{{}}}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(EnvToken),
}

/// Where a rendered value ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubstContext {
    /// Compose-level value. Passthrough tokens survive; literal `$` is
    /// escaped as `$$`.
    Manifest,
    /// Value fixed into an image layer or wrapper script. Passthrough tokens
    /// are rejected.
    Baked,
}

pub trait EnvSource {
    fn lookup(&self, name: &str) -> Option<&str>;
}

/// Immutable copy of the environment a compilation runs against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_owned(), value.to_owned());
        self
    }
}

impl EnvSource for EnvSnapshot {
    fn lookup(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// Split `input` into literal text and tokens, left to right.
pub fn parse(input: &str) -> Result<Vec<Segment>, SubstError> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut pos = 0;

    while pos < input.len() {
        let rest = &input[pos..];
        if rest.starts_with("${") {
            let Some((name, default, consumed)) = parse_body(&rest[2..], "}") else {
                return Err(SubstError::Malformed {
                    offset: pos,
                    reason: "expected ${NAME} or ${NAME:-default}",
                });
            };
            flush_literal(&mut literal, &mut segments);
            segments.push(Segment::Token(EnvToken {
                kind: TokenKind::ConfigureTime,
                name,
                default,
            }));
            pos += 2 + consumed;
            continue;
        }
        if rest.starts_with("{{") {
            if let Some((name, default, consumed)) = parse_body(&rest[2..], "}}") {
                flush_literal(&mut literal, &mut segments);
                segments.push(Segment::Token(EnvToken {
                    kind: TokenKind::Passthrough,
                    name,
                    default,
                }));
                pos += 2 + consumed;
                continue;
            }
        }
        let Some(ch) = rest.chars().next() else {
            break;
        };
        literal.push(ch);
        pos += ch.len_utf8();
    }

    flush_literal(&mut literal, &mut segments);
    Ok(segments)
}

fn flush_literal(literal: &mut String, segments: &mut Vec<Segment>) {
    if !literal.is_empty() {
        segments.push(Segment::Literal(std::mem::take(literal)));
    }
}

/// Parse `NAME` or `NAME:-default` followed by `close`. Returns the byte count
/// consumed including the closing delimiter.
fn parse_body(input: &str, close: &str) -> Option<(String, Option<String>, usize)> {
    let name_len = identifier_len(input);
    if name_len == 0 {
        return None;
    }
    let name = input[..name_len].to_owned();
    let after = &input[name_len..];

    if after.starts_with(close) {
        return Some((name, None, name_len + close.len()));
    }
    let default_src = after.strip_prefix(":-")?;
    let end = default_src.find(close)?;
    let default = &default_src[..end];
    if default.contains('}') || default.contains("${") || default.contains("{{") {
        return None;
    }
    Some((
        name,
        Some(default.to_owned()),
        name_len + 2 + end + close.len(),
    ))
}

/// Length of the leading `[A-Za-z_][A-Za-z0-9_]*` run.
pub(crate) fn identifier_len(input: &str) -> usize {
    let mut len = 0;
    for (i, b) in input.bytes().enumerate() {
        let ok = if i == 0 {
            b.is_ascii_alphabetic() || b == b'_'
        } else {
            b.is_ascii_alphanumeric() || b == b'_'
        };
        if !ok {
            break;
        }
        len += 1;
    }
    len
}

/// Render parsed segments for the given context.
pub fn render(
    segments: &[Segment],
    env: &impl EnvSource,
    context: SubstContext,
) -> Result<String, SubstError> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Literal(text) => push_escaped(&mut out, text, context),
            Segment::Token(token) => match token.kind {
                TokenKind::ConfigureTime => {
                    let value = resolve_token(token, env)?;
                    push_escaped(&mut out, &value, context);
                }
                TokenKind::Passthrough => {
                    if context == SubstContext::Baked {
                        return Err(SubstError::PassthroughNotAllowed {
                            name: token.name.clone(),
                        });
                    }
                    out.push_str(&token.to_manifest_syntax());
                }
            },
        }
    }
    Ok(out)
}

fn resolve_token(token: &EnvToken, env: &impl EnvSource) -> Result<String, SubstError> {
    if let Some(value) = env.lookup(&token.name) {
        return Ok(value.to_owned());
    }
    token
        .default
        .clone()
        .ok_or_else(|| SubstError::Unresolved {
            name: token.name.clone(),
        })
}

fn push_escaped(out: &mut String, text: &str, context: SubstContext) {
    match context {
        SubstContext::Manifest => out.push_str(&text.replace('$', "$$")),
        SubstContext::Baked => out.push_str(text),
    }
}

pub fn substitute(
    input: &str,
    env: &impl EnvSource,
    context: SubstContext,
) -> Result<String, SubstError> {
    render(&parse(input)?, env, context)
}
