//! Registration-time faults.
//!
//! Every variant describes a defect in the code building the router, never a
//! condition of an incoming request. The registration API raises them as panics
//! through [`fatal`]; [`Pattern::parse`](super::Pattern::parse) hands them back
//! as values for tooling that wants to validate patterns up front.

use thiserror::Error;

/// A route registration error.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("routing pattern must begin with '/' in '{pattern}'")]
    MissingLeadingSlash { pattern: String },

    #[error("wildcard '*' must be the last segment in routing pattern '{pattern}'")]
    WildcardNotLast { pattern: String },

    #[error("route param closing delimiter '}}' is missing in '{pattern}'")]
    UnclosedParam { pattern: String },

    #[error("regexp of param '{param}' in '{pattern}' must not contain '/', '{{' or '}}'")]
    ReservedRegexChar { pattern: String, param: String },

    #[error("invalid regexp pattern '{expr}' in route param: {source}")]
    InvalidRegex {
        expr: String,
        #[source]
        source: regex::Error,
    },

    #[error("routing pattern '{pattern}' contains duplicate param key '{param}'")]
    DuplicateParam { pattern: String, param: String },

    #[error("attempting to mount a handler on an existing path, '{pattern}'")]
    DuplicateMount { pattern: String },

    #[error("'{method}' http method is not supported")]
    UnknownMethod { method: String },

    #[error("all middlewares must be defined before routes on a mux")]
    MiddlewareAfterRoutes,
}

/// Aborts registration with `err`.
#[track_caller]
pub(crate) fn fatal(err: RouterError) -> ! {
    tracing::error!(error = %err, "route registration failed");
    panic!("rmux: {err}")
}
