//! The set of HTTP methods routes may be registered for.
//!
//! The nine standard methods are always known. Extension methods become
//! routable once passed to [`register_method`]; the registry is process-wide
//! so that a method registered at startup is routable on every router.

use std::collections::BTreeSet;
use std::sync::{LazyLock, PoisonError, RwLock};

use super::error::RouterError;
use crate::http::Method;

static CUSTOM_METHODS: LazyLock<RwLock<BTreeSet<String>>> =
    LazyLock::new(|| RwLock::new(BTreeSet::new()));

/// Makes an extension method routable. Names are upper-cased; registering a
/// standard or already-registered method is a no-op.
///
/// ```
/// use rmux::router::{register_method, Mux, Router};
/// use rmux::{Response, StatusCode, context::Context};
///
/// register_method("link");
/// let mut mux = Mux::new();
/// mux.method("LINK", "/link", |_: Context| async { Response::new(StatusCode::Ok) });
/// ```
pub fn register_method(name: &str) {
    let name = name.trim().to_ascii_uppercase();
    if name.is_empty() {
        return;
    }
    let Ok(method) = name.parse::<Method>();
    if method.is_standard() {
        return;
    }
    let inserted = CUSTOM_METHODS
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(name);
    if inserted {
        tracing::debug!(method = %method, "registered custom http method");
    }
}

/// Returns `true` if routes can be registered and matched for `method`.
pub fn is_registered(method: &Method) -> bool {
    match method {
        Method::Custom(name) => CUSTOM_METHODS
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name),
        _ => true,
    }
}

/// Parses a method name for registration, upper-casing it first.
pub(crate) fn parse_registered(name: &str) -> Result<Method, RouterError> {
    let Ok(method) = name.to_ascii_uppercase().parse::<Method>();
    if is_registered(&method) {
        Ok(method)
    } else {
        Err(RouterError::UnknownMethod {
            method: name.to_owned(),
        })
    }
}

/// Every known method: the standard ones, then registered extensions.
pub(crate) fn known_methods() -> Vec<Method> {
    let custom = CUSTOM_METHODS.read().unwrap_or_else(PoisonError::into_inner);
    Method::STANDARD
        .into_iter()
        .chain(custom.iter().cloned().map(Method::Custom))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_methods_are_known() {
        assert!(is_registered(&Method::Get));
        assert_eq!(parse_registered("patch").unwrap(), Method::Patch);
    }

    #[test]
    fn custom_methods_need_registration() {
        assert!(matches!(
            parse_registered("NOTREGISTERED"),
            Err(RouterError::UnknownMethod { .. })
        ));

        register_method("purge");
        assert!(is_registered(&Method::Custom("PURGE".into())));
        assert_eq!(
            parse_registered("Purge").unwrap(),
            Method::Custom("PURGE".into())
        );
        assert!(known_methods().contains(&Method::Custom("PURGE".into())));
    }

    #[test]
    fn registering_standard_or_empty_is_noop() {
        register_method("get");
        register_method("  ");
        assert!(!known_methods().contains(&Method::Custom("GET".into())));
    }
}
