//! Route pattern compiler.
//!
//! A pattern is split into an ordered list of [`Segment`]s:
//!
//! | Syntax            | Segment                | Matches                                   |
//! |-------------------|------------------------|-------------------------------------------|
//! | `/users`          | [`Segment::Static`]    | the literal text                          |
//! | `{id}`            | [`Segment::Param`]     | anything up to the param's tail character |
//! | `{id:\d+}`        | [`Segment::Regexp`]    | the same run, if the regex accepts it     |
//! | `{:\d+}`          | [`Segment::Regexp`]    | anonymous regex capture                   |
//! | `*`               | [`Segment::CatchAll`]  | the rest of the path, `/` included        |
//!
//! The *tail* of a param is the character right after its closing brace, or
//! `/` when the param ends the pattern. `/{file}.json` therefore captures
//! `report` out of `/report.json`.

use regex::Regex;

use super::error::RouterError;

/// The key under which a trailing wildcard's capture is stored.
pub const WILDCARD_KEY: &str = "*";

/// One compiled element of a route pattern.
#[derive(Debug, Clone)]
pub enum Segment {
    Static(String),
    Param {
        name: String,
        tail: char,
    },
    Regexp {
        name: String,
        regex: Regex,
        tail: char,
    },
    CatchAll,
}

impl Segment {
    /// Returns the param key this segment captures under, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Static(_) => None,
            Self::Param { name, .. } | Self::Regexp { name, .. } => Some(name),
            Self::CatchAll => Some(WILDCARD_KEY),
        }
    }
}

/// A route pattern compiled into segments.
///
/// ```
/// use rmux::router::{Pattern, Segment};
///
/// let pattern = Pattern::parse("/articles/{slug:[a-z-]+}/*").unwrap();
/// assert_eq!(pattern.param_keys(), vec!["slug", "*"]);
/// assert!(matches!(pattern.segments()[0], Segment::Static(ref s) if s == "/articles/"));
/// ```
#[derive(Debug, Clone)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// - [`RouterError::MissingLeadingSlash`] if the pattern does not begin with `/`.
    /// - [`RouterError::WildcardNotLast`] if a `*` is followed by anything.
    /// - [`RouterError::UnclosedParam`] if a `{` has no matching `}`.
    /// - [`RouterError::ReservedRegexChar`] if a param regex contains `/`, `{` or `}`.
    /// - [`RouterError::InvalidRegex`] if a param regex does not compile.
    /// - [`RouterError::DuplicateParam`] if two params share a name.
    pub fn parse(pattern: &str) -> Result<Self, RouterError> {
        if !pattern.starts_with('/') {
            return Err(RouterError::MissingLeadingSlash {
                pattern: pattern.to_owned(),
            });
        }

        let mut segments = Vec::new();
        let mut rest = pattern;

        loop {
            let brace = rest.find('{');
            let star = rest.find('*');

            match (brace, star) {
                (None, None) => {
                    if !rest.is_empty() {
                        segments.push(Segment::Static(rest.to_owned()));
                    }
                    break;
                }
                (Some(b), Some(s)) if s < b => {
                    return Err(RouterError::WildcardNotLast {
                        pattern: pattern.to_owned(),
                    });
                }
                (Some(start), _) => {
                    if start > 0 {
                        segments.push(Segment::Static(rest[..start].to_owned()));
                    }
                    let end = closing_brace(rest, start).ok_or_else(|| RouterError::UnclosedParam {
                        pattern: pattern.to_owned(),
                    })?;
                    let tail = rest[end + 1..].chars().next().unwrap_or('/');
                    segments.push(compile_param(pattern, &rest[start + 1..end], tail)?);
                    rest = &rest[end + 1..];
                }
                (None, Some(start)) => {
                    if start != rest.len() - 1 {
                        return Err(RouterError::WildcardNotLast {
                            pattern: pattern.to_owned(),
                        });
                    }
                    if start > 0 {
                        segments.push(Segment::Static(rest[..start].to_owned()));
                    }
                    segments.push(Segment::CatchAll);
                    break;
                }
            }
        }

        let compiled = Self {
            raw: pattern.to_owned(),
            segments,
        };
        compiled.check_duplicate_keys()?;
        Ok(compiled)
    }

    /// Returns the pattern text as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the param keys in the order their values are captured.
    pub fn param_keys(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(Segment::key)
            .map(str::to_owned)
            .collect()
    }

    fn check_duplicate_keys(&self) -> Result<(), RouterError> {
        let keys: Vec<&str> = self.segments.iter().filter_map(Segment::key).collect();
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(RouterError::DuplicateParam {
                    pattern: self.raw.clone(),
                    param: (*key).to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// Finds the `}` closing the `{` at `start`, counting nested braces so that a
/// brace inside a regex is reported as such rather than as a truncated param.
fn closing_brace(s: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn compile_param(pattern: &str, body: &str, tail: char) -> Result<Segment, RouterError> {
    let Some((name, expr)) = body.split_once(':') else {
        return Ok(Segment::Param {
            name: body.to_owned(),
            tail,
        });
    };

    if expr.is_empty() {
        return Ok(Segment::Param {
            name: name.to_owned(),
            tail,
        });
    }

    if expr.contains(['/', '{', '}']) {
        return Err(RouterError::ReservedRegexChar {
            pattern: pattern.to_owned(),
            param: name.to_owned(),
        });
    }

    let mut anchored = String::with_capacity(expr.len() + 2);
    if !expr.starts_with('^') {
        anchored.push('^');
    }
    anchored.push_str(expr);
    if !expr.ends_with('$') {
        anchored.push('$');
    }

    let regex = Regex::new(&anchored).map_err(|source| RouterError::InvalidRegex {
        expr: anchored.clone(),
        source,
    })?;

    Ok(Segment::Regexp {
        name: name.to_owned(),
        regex,
        tail,
    })
}
