//! The routing-specific part of a request context.

use crate::http::Method;
use crate::router::pattern::WILDCARD_KEY;

/// Captured URL params as two parallel lists.
///
/// The same key may appear more than once: a mount's `*` capture and the
/// sub-router's own params are pushed onto the same stack. Lookups scan from
/// the end so the innermost capture wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
    keys: Vec<String>,
    values: Vec<String>,
}

impl RouteParams {
    pub const fn new() -> Self {
        Self {
            keys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Pushes a `(key, value)` pair.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.keys.push(key.into());
        self.values.push(value.into());
    }

    /// Returns the most recently pushed value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.keys
            .iter()
            .rposition(|k| k == key)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterates `(key, value)` pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.keys
            .iter()
            .zip(&self.values)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.keys.clear();
        self.values.clear();
    }

    // Tree lookups push values while descending and only learn the keys once an
    // endpoint is reached, so the two halves are driven separately.

    pub(crate) fn push_value(&mut self, value: &str) {
        self.values.push(value.to_owned());
    }

    pub(crate) fn truncate_values(&mut self, len: usize) {
        self.values.truncate(len);
    }

    pub(crate) fn value_count(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn extend_keys(&mut self, keys: &[String]) {
        self.keys.extend_from_slice(keys);
    }

    fn append(&mut self, other: &RouteParams) {
        self.keys.extend_from_slice(&other.keys);
        self.values.extend_from_slice(&other.values);
    }
}

/// Per-request routing state.
///
/// One `RouteContext` follows a request through every router it passes:
/// each level appends the pattern it matched and pushes the params it
/// captured. Sub-routers match against [`route_path`](Self::route_path)
/// rather than the request path.
#[derive(Debug, Clone, Default)]
pub struct RouteContext {
    route_path: Option<String>,
    route_method: Option<Method>,
    route_patterns: Vec<String>,
    url_params: RouteParams,

    // State of the router level currently matching.
    route_pattern: String,
    route_params: RouteParams,

    method_not_allowed: bool,
}

impl RouteContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every field so the context can serve another request.
    ///
    /// Buffers keep their capacity.
    pub fn reset(&mut self) {
        self.route_path = None;
        self.route_method = None;
        self.route_patterns.clear();
        self.url_params.clear();
        self.route_pattern.clear();
        self.route_params.clear();
        self.method_not_allowed = false;
    }

    /// Returns the path the next router level matches against, when it differs
    /// from the request path.
    pub fn route_path(&self) -> Option<&str> {
        self.route_path.as_deref()
    }

    pub fn set_route_path(&mut self, path: impl Into<String>) {
        self.route_path = Some(path.into());
    }

    /// Returns the method routing is performed for, when it differs from the
    /// request method.
    pub fn route_method(&self) -> Option<&Method> {
        self.route_method.as_ref()
    }

    pub fn set_route_method(&mut self, method: Method) {
        self.route_method = Some(method);
    }

    /// The pattern matched at each router level, outermost first.
    pub fn route_patterns(&self) -> &[String] {
        &self.route_patterns
    }

    /// Every captured param, across all router levels.
    pub fn url_params(&self) -> &RouteParams {
        &self.url_params
    }

    /// Returns the innermost captured value of `key`.
    pub fn url_param(&self, key: &str) -> Option<&str> {
        self.url_params.get(key)
    }

    /// Adds a param by hand, e.g. from middleware.
    pub fn add_url_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.url_params.add(key, value);
    }

    /// Returns `true` when a path matched some route, but not for the method.
    pub fn method_not_allowed(&self) -> bool {
        self.method_not_allowed
    }

    /// Reconstructs the full route pattern of the matched request.
    ///
    /// ```
    /// use rmux::context::RouteContext;
    ///
    /// let mut rctx = RouteContext::new();
    /// rctx.push_route_pattern("/accounts/{accountID}/*");
    /// rctx.push_route_pattern("/hi");
    /// assert_eq!(rctx.route_pattern(), "/accounts/{accountID}/hi");
    /// ```
    pub fn route_pattern(&self) -> String {
        self.route_patterns.concat().replace("/*/", "/")
    }

    /// The pattern matched by the innermost router that resolved a route so
    /// far, e.g. `/{id}/*` for a mount inside `/articles`.
    pub fn level_pattern(&self) -> &str {
        &self.route_pattern
    }

    pub fn push_route_pattern(&mut self, pattern: impl Into<String>) {
        self.route_patterns.push(pattern.into());
    }

    // ── Tree and mount plumbing ──────────────────────────────────────────────

    pub(crate) fn take_route_path(&mut self) -> Option<String> {
        self.route_path.take()
    }

    pub(crate) fn restore_route_path(&mut self, path: Option<String>) {
        self.route_path = path;
    }

    pub(crate) fn route_method_or_insert(&mut self, method: &Method) -> Method {
        self.route_method
            .get_or_insert_with(|| method.clone())
            .clone()
    }

    /// Clears the per-level scratch state before a tree lookup.
    pub(crate) fn begin_lookup(&mut self) {
        self.route_pattern.clear();
        self.route_params.clear();
    }

    pub(crate) fn level_params(&mut self) -> &mut RouteParams {
        &mut self.route_params
    }

    pub(crate) fn flag_method_not_allowed(&mut self) {
        self.method_not_allowed = true;
    }

    /// Records the outcome of a successful lookup for this router level.
    pub(crate) fn commit_lookup(&mut self, pattern: &str) {
        self.url_params.append(&self.route_params);
        if !pattern.is_empty() {
            self.route_pattern.clear();
            self.route_pattern.push_str(pattern);
            self.route_patterns.push(pattern.to_owned());
        }
    }

    /// The path a mounted handler should see: `/` plus what this level's
    /// trailing wildcard captured.
    pub(crate) fn next_route_path(&self) -> String {
        let captured = match self.route_params.keys.last() {
            Some(key) if key == WILDCARD_KEY => self.route_params.values.last(),
            _ => None,
        };
        match captured {
            Some(rest) => format!("/{rest}"),
            None => "/".to_owned(),
        }
    }

    /// Blanks the trailing `*` capture so it does not leak into the sub-router.
    pub(crate) fn clear_wildcard_param(&mut self) {
        if self.url_params.keys.last().is_some_and(|k| k == WILDCARD_KEY) {
            if let Some(value) = self.url_params.values.last_mut() {
                value.clear();
            }
        }
    }
}
