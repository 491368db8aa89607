//! Prefix tree route index.
//!
//! Static text is stored radix-style: sibling static nodes never share a first
//! character, and a node's prefix is split when a new route diverges part-way
//! through it. Params, regex params and catch-alls hang off their parent in
//! their own child lists. Lookup tries children in the order
//! static, regexp, param, catch-all, and backtracks when a branch dead-ends.
//!
//! The tree is generic over what an endpoint stores (`H`) and what a mount
//! point delegates to (`S`), so the same structure serves route registration
//! and request dispatch.

use regex::Regex;

use super::pattern::{Pattern, Segment};
use crate::context::RouteContext;
use crate::http::Method;
use crate::middleware::MiddlewareHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Static,
    Regexp,
    Param,
    CatchAll,
}

impl NodeKind {
    /// Lookup priority.
    const ORDER: [NodeKind; 4] = [Self::Static, Self::Regexp, Self::Param, Self::CatchAll];

    fn index(self) -> usize {
        match self {
            Self::Static => 0,
            Self::Regexp => 1,
            Self::Param => 2,
            Self::CatchAll => 3,
        }
    }

    fn of(segment: &Segment) -> Self {
        match segment {
            Segment::Static(_) => Self::Static,
            Segment::Regexp { .. } => Self::Regexp,
            Segment::Param { .. } => Self::Param,
            Segment::CatchAll => Self::CatchAll,
        }
    }
}

/// Which requests an endpoint answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MethodSlot {
    All,
    Exact(Method),
}

/// A handler stored on a node, with what is needed to report the match.
pub(crate) struct Endpoint<H> {
    pub(crate) handler: H,
    pub(crate) pattern: String,
    pub(crate) param_keys: Vec<String>,
    /// Inline middleware already folded into `handler`.
    pub(crate) middlewares: Vec<MiddlewareHandler>,
    /// Registered only to route a mount's bare prefix.
    pub(crate) stub: bool,
}

impl<H> Endpoint<H> {
    pub(crate) fn new(handler: H, pattern: &Pattern) -> Self {
        Self {
            handler,
            pattern: pattern.as_str().to_owned(),
            param_keys: pattern.param_keys(),
            middlewares: Vec::new(),
            stub: false,
        }
    }

    fn map<H2>(self, f: &mut impl FnMut(H) -> H2) -> Endpoint<H2> {
        Endpoint {
            handler: f(self.handler),
            pattern: self.pattern,
            param_keys: self.param_keys,
            middlewares: self.middlewares,
            stub: self.stub,
        }
    }
}

pub(crate) struct Node<H, S> {
    kind: NodeKind,
    /// First character of `prefix` for static nodes; unused otherwise.
    label: char,
    /// Character that ends a param's capture.
    tail: char,
    /// Literal text of a static node, anchored source of a regexp node.
    prefix: String,
    regex: Option<Regex>,
    endpoints: Vec<(MethodSlot, Endpoint<H>)>,
    subroutes: Option<S>,
    children: [Vec<Node<H, S>>; 4],
}

impl<H, S> Default for Node<H, S> {
    fn default() -> Self {
        Self {
            kind: NodeKind::Static,
            label: '\0',
            tail: '/',
            prefix: String::new(),
            regex: None,
            endpoints: Vec::new(),
            subroutes: None,
            children: Default::default(),
        }
    }
}

impl<H, S> Node<H, S> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn new_static(text: &str) -> Self {
        Self {
            label: text.chars().next().unwrap_or('\0'),
            prefix: text.to_owned(),
            ..Self::default()
        }
    }

    fn new_wild(segment: &Segment) -> Self {
        let kind = NodeKind::of(segment);
        match segment {
            Segment::Param { tail, .. } => Self {
                kind,
                label: '{',
                tail: *tail,
                ..Self::default()
            },
            Segment::Regexp { regex, tail, .. } => Self {
                kind,
                label: '{',
                tail: *tail,
                prefix: regex.as_str().to_owned(),
                regex: Some(regex.clone()),
                ..Self::default()
            },
            Segment::CatchAll | Segment::Static(_) => Self {
                kind,
                label: '*',
                ..Self::default()
            },
        }
    }

    fn is_leaf(&self) -> bool {
        !self.endpoints.is_empty()
    }

    pub(crate) fn endpoints(&self) -> impl Iterator<Item = (&MethodSlot, &Endpoint<H>)> {
        self.endpoints.iter().map(|(slot, endpoint)| (slot, endpoint))
    }

    pub(crate) fn subroutes(&self) -> Option<&S> {
        self.subroutes.as_ref()
    }

    /// Returns the endpoint answering `method`: the exact one, else the
    /// all-methods one.
    pub(crate) fn endpoint(&self, method: &Method) -> Option<&Endpoint<H>> {
        let exact = self
            .endpoints
            .iter()
            .find(|(slot, _)| matches!(slot, MethodSlot::Exact(m) if m == method));
        exact
            .or_else(|| self.endpoints.iter().find(|(slot, _)| *slot == MethodSlot::All))
            .map(|(_, endpoint)| endpoint)
    }

    // ── Insertion ────────────────────────────────────────────────────────────

    /// Walks the tree along `segments`, creating and splitting nodes as
    /// needed, and returns the node the pattern ends on.
    pub(crate) fn insert(&mut self, segments: &[Segment]) -> &mut Self {
        let Some((segment, rest)) = segments.split_first() else {
            return self;
        };

        if let Segment::Static(text) = segment {
            return self.insert_static(text, rest);
        }

        let kind = NodeKind::of(segment);
        let existing = self.children[kind.index()]
            .iter()
            .position(|child| child.is_edge_for(segment));
        let idx = match existing {
            Some(idx) => idx,
            None => self.add_wild_child(segment),
        };
        self.children[kind.index()][idx].insert(rest)
    }

    fn insert_static(&mut self, text: &str, rest: &[Segment]) -> &mut Self {
        let Some(label) = text.chars().next() else {
            return self.insert(rest);
        };

        let statics = &mut self.children[NodeKind::Static.index()];
        let idx = match statics.binary_search_by_key(&label, |child| child.label) {
            Ok(idx) => idx,
            Err(idx) => {
                statics.insert(idx, Self::new_static(text));
                return statics[idx].insert(rest);
            }
        };

        let child = &mut statics[idx];
        let common = common_prefix_len(text, &child.prefix);
        if common < child.prefix.len() {
            let mut lower = std::mem::replace(child, Self::new_static(&text[..common]));
            lower.prefix.drain(..common);
            lower.label = lower.prefix.chars().next().unwrap_or(lower.label);
            child.children[NodeKind::Static.index()].push(lower);
        }

        let remaining = &text[common..];
        if remaining.is_empty() {
            child.insert(rest)
        } else {
            child.insert_static(remaining, rest)
        }
    }

    /// Adds a param, regexp or catch-all child and returns its index.
    ///
    /// Siblings keep registration order, except that params ending at `/` go
    /// after params ending at any other character.
    fn add_wild_child(&mut self, segment: &Segment) -> usize {
        let node = Self::new_wild(segment);
        let siblings = &mut self.children[node.kind.index()];
        let idx = if node.kind == NodeKind::CatchAll || node.tail == '/' {
            siblings.len()
        } else {
            siblings
                .iter()
                .position(|sibling| sibling.tail == '/')
                .unwrap_or(siblings.len())
        };
        siblings.insert(idx, node);
        idx
    }

    fn is_edge_for(&self, segment: &Segment) -> bool {
        match segment {
            Segment::Static(_) => false,
            Segment::Param { tail, .. } => self.kind == NodeKind::Param && self.tail == *tail,
            Segment::Regexp { regex, tail, .. } => {
                self.kind == NodeKind::Regexp && self.tail == *tail && self.prefix == regex.as_str()
            }
            Segment::CatchAll => self.kind == NodeKind::CatchAll,
        }
    }

    /// Stores `endpoint` under `slot`. An all-methods registration replaces
    /// every endpoint previously set on the node.
    pub(crate) fn set_endpoint(&mut self, slot: MethodSlot, endpoint: Endpoint<H>) {
        if slot == MethodSlot::All {
            self.endpoints.clear();
        } else {
            self.endpoints.retain(|(existing, _)| *existing != slot);
        }
        self.endpoints.push((slot, endpoint));
    }

    pub(crate) fn set_subroutes(&mut self, subroutes: S) {
        self.subroutes = Some(subroutes);
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Finds the endpoint for `method` and `path`.
    ///
    /// On success, the captured params are appended to the context's URL
    /// params and the endpoint's pattern to its pattern list. On failure the
    /// context's method-not-allowed flag tells whether some node matched the
    /// path for other methods.
    pub(crate) fn find(
        &self,
        rctx: &mut RouteContext,
        method: &Method,
        path: &str,
    ) -> Option<(&Self, &Endpoint<H>)> {
        rctx.begin_lookup();
        let node = self.find_route(rctx, method, path)?;
        let endpoint = node.endpoint(method)?;
        rctx.commit_lookup(&endpoint.pattern);
        Some((node, endpoint))
    }

    fn find_route(&self, rctx: &mut RouteContext, method: &Method, path: &str) -> Option<&Self> {
        for kind in NodeKind::ORDER {
            let nodes = &self.children[kind.index()];
            if nodes.is_empty() {
                continue;
            }

            match kind {
                NodeKind::Static => {
                    let Some(label) = path.chars().next() else {
                        continue;
                    };
                    let Ok(idx) = nodes.binary_search_by_key(&label, |child| child.label) else {
                        continue;
                    };
                    let node = &nodes[idx];
                    let Some(rest) = path.strip_prefix(node.prefix.as_str()) else {
                        continue;
                    };
                    if let Some(found) = node.descend(rctx, method, rest) {
                        return Some(found);
                    }
                }
                NodeKind::Regexp | NodeKind::Param => {
                    if path.is_empty() {
                        continue;
                    }
                    if let Some(found) = Self::find_param(nodes, rctx, method, path) {
                        return Some(found);
                    }
                }
                NodeKind::CatchAll => {
                    let mark = rctx.level_params().value_count();
                    rctx.level_params().push_value(path);
                    if let Some(found) = nodes[0].descend(rctx, method, "") {
                        return Some(found);
                    }
                    rctx.level_params().truncate_values(mark);
                }
            }
        }
        None
    }

    fn find_param<'n>(
        nodes: &'n [Self],
        rctx: &mut RouteContext,
        method: &Method,
        path: &str,
    ) -> Option<&'n Self> {
        for node in nodes {
            let end = match path.find(node.tail) {
                Some(end) => end,
                None if node.tail == '/' => path.len(),
                None => continue,
            };
            let value = &path[..end];
            if value.contains('/') {
                continue;
            }
            if let Some(regex) = &node.regex {
                if !regex.is_match(value) {
                    continue;
                }
            }

            let mark = rctx.level_params().value_count();
            rctx.level_params().push_value(value);
            if let Some(found) = node.descend(rctx, method, &path[end..]) {
                return Some(found);
            }
            rctx.level_params().truncate_values(mark);
        }
        None
    }

    /// Continues a lookup from `self` with `rest` left to match.
    fn descend(&self, rctx: &mut RouteContext, method: &Method, rest: &str) -> Option<&Self> {
        if rest.is_empty() && self.is_leaf() {
            if let Some(endpoint) = self.endpoint(method) {
                rctx.level_params().extend_keys(&endpoint.param_keys);
                return Some(self);
            }
            rctx.flag_method_not_allowed();
        }
        self.find_route(rctx, method, rest)
    }

    /// Returns `true` if inserting `segments` would end on an existing node.
    pub(crate) fn find_pattern(&self, segments: &[Segment]) -> bool {
        let Some((segment, rest)) = segments.split_first() else {
            return true;
        };
        match segment {
            Segment::Static(text) => self.find_static_pattern(text, rest),
            _ => self.children[NodeKind::of(segment).index()]
                .iter()
                .find(|child| child.is_edge_for(segment))
                .is_some_and(|child| child.find_pattern(rest)),
        }
    }

    fn find_static_pattern(&self, text: &str, rest: &[Segment]) -> bool {
        let Some(label) = text.chars().next() else {
            return self.find_pattern(rest);
        };
        let statics = &self.children[NodeKind::Static.index()];
        let Ok(idx) = statics.binary_search_by_key(&label, |child| child.label) else {
            return false;
        };
        let child = &statics[idx];
        match text.strip_prefix(child.prefix.as_str()) {
            Some(remaining) => child.find_static_pattern(remaining, rest),
            None => false,
        }
    }

    // ── Traversal ────────────────────────────────────────────────────────────

    /// Visits every node depth-first, parents before children.
    pub(crate) fn visit<'n>(&'n self, f: &mut dyn FnMut(&'n Self)) {
        f(self);
        for children in &self.children {
            for child in children {
                child.visit(f);
            }
        }
    }

    /// Rebuilds the tree with every endpoint handler and mount target
    /// converted.
    pub(crate) fn map<H2, S2, FH, FS>(self, on_handler: &mut FH, on_subroutes: &mut FS) -> Node<H2, S2>
    where
        FH: FnMut(H) -> H2,
        FS: FnMut(S) -> S2,
    {
        let endpoints = self
            .endpoints
            .into_iter()
            .map(|(slot, endpoint)| (slot, endpoint.map(&mut *on_handler)))
            .collect();
        let subroutes = self.subroutes.map(&mut *on_subroutes);
        let children = self.children.map(|nodes| {
            nodes
                .into_iter()
                .map(|child| child.map(&mut *on_handler, &mut *on_subroutes))
                .collect()
        });

        Node {
            kind: self.kind,
            label: self.label,
            tail: self.tail,
            prefix: self.prefix,
            regex: self.regex,
            endpoints,
            subroutes,
            children,
        }
    }
}

/// Length in bytes of the longest common prefix, on a character boundary.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((idx, _), _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    type Tree = Node<&'static str, ()>;

    fn add(tree: &mut Tree, slot: MethodSlot, pattern: &str, handler: &'static str) {
        let pattern = Pattern::parse(pattern).unwrap();
        tree.insert(pattern.segments())
            .set_endpoint(slot, Endpoint::new(handler, &pattern));
    }

    fn get(tree: &mut Tree, pattern: &str, handler: &'static str) {
        add(tree, MethodSlot::Exact(Method::Get), pattern, handler);
    }

    struct Found {
        handler: Option<&'static str>,
        keys: Vec<String>,
        values: Vec<String>,
        method_not_allowed: bool,
    }

    fn lookup(tree: &Tree, method: Method, path: &str) -> Found {
        let mut rctx = RouteContext::new();
        let handler = tree.find(&mut rctx, &method, path).map(|(_, ep)| ep.handler);
        Found {
            handler,
            keys: rctx.url_params().keys().to_vec(),
            values: rctx.url_params().values().to_vec(),
            method_not_allowed: rctx.method_not_allowed(),
        }
    }

    fn assert_route(tree: &Tree, path: &str, handler: Option<&str>, keys: &[&str], values: &[&str]) {
        let found = lookup(tree, Method::Get, path);
        assert_eq!(found.handler, handler, "handler for {path}");
        assert_eq!(found.keys, keys, "keys for {path}");
        assert_eq!(found.values, values, "values for {path}");
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    #[test]
    fn mixed_routes() {
        let mut tree = Tree::new();
        get(&mut tree, "/", "index");
        get(&mut tree, "/favicon.ico", "favicon");
        get(&mut tree, "/pages/*", "stub");
        get(&mut tree, "/article", "article_list");
        get(&mut tree, "/article/", "article_list");
        get(&mut tree, "/article/near", "article_near");
        get(&mut tree, "/article/{id}", "stub");
        get(&mut tree, "/article/{id}", "article_show");
        get(&mut tree, "/article/@{user}", "article_by_user");
        get(&mut tree, "/article/{sup}/{opts}", "stub");
        get(&mut tree, "/article/{id}/{opts}", "article_show_opts");
        get(&mut tree, "/article/{iffd}/edit", "article_edit");
        get(&mut tree, "/article/{id}//related", "article_related");
        get(&mut tree, "/article/slug/{month}/-/{day}/{year}", "article_slug");
        get(&mut tree, "/admin/user", "user_list");
        get(&mut tree, "/admin/user/", "stub");
        get(&mut tree, "/admin/user/", "user_list");
        get(&mut tree, "/admin/user//{id}", "user_show");
        get(&mut tree, "/admin/user/{id}", "user_show");
        get(&mut tree, "/admin/apps/{id}", "app_show");
        get(&mut tree, "/admin/apps/{id}/*", "app_show");
        get(&mut tree, "/admin/*", "stub");
        get(&mut tree, "/admin/*", "admin_catchall");
        get(&mut tree, "/users/{userID}/profile", "user_profile");
        get(&mut tree, "/users/super/*", "user_super");
        get(&mut tree, "/users/*", "user_all");
        get(&mut tree, "/hubs/{hubID}/view", "hub_view1");
        get(&mut tree, "/hubs/{hubID}/view/*", "hub_view2");
        get(&mut tree, "/hubs/{hubID}/users", "hub_view3");

        assert_route(&tree, "/", Some("index"), &[], &[]);
        assert_route(&tree, "/favicon.ico", Some("favicon"), &[], &[]);
        assert_route(&tree, "/pages", None, &[], &[]);
        assert_route(&tree, "/pages/", Some("stub"), &["*"], &[""]);
        assert_route(&tree, "/pages/yes", Some("stub"), &["*"], &["yes"]);
        assert_route(&tree, "/article", Some("article_list"), &[], &[]);
        assert_route(&tree, "/article/", Some("article_list"), &[], &[]);
        assert_route(&tree, "/article/near", Some("article_near"), &[], &[]);
        assert_route(&tree, "/article/neard", Some("article_show"), &["id"], &["neard"]);
        assert_route(&tree, "/article/123", Some("article_show"), &["id"], &["123"]);
        assert_route(
            &tree,
            "/article/123/456",
            Some("article_show_opts"),
            &["id", "opts"],
            &["123", "456"],
        );
        assert_route(&tree, "/article/@peter", Some("article_by_user"), &["user"], &["peter"]);
        assert_route(&tree, "/article/22//related", Some("article_related"), &["id"], &["22"]);
        assert_route(&tree, "/article/111/edit", Some("article_edit"), &["iffd"], &["111"]);
        assert_route(
            &tree,
            "/article/slug/sept/-/4/2015",
            Some("article_slug"),
            &["month", "day", "year"],
            &["sept", "4", "2015"],
        );
        assert_route(&tree, "/article/:id", Some("article_show"), &["id"], &[":id"]);
        assert_route(&tree, "/admin/user", Some("user_list"), &[], &[]);
        assert_route(&tree, "/admin/user/", Some("user_list"), &[], &[]);
        assert_route(&tree, "/admin/user/1", Some("user_show"), &["id"], &["1"]);
        assert_route(&tree, "/admin/user//1", Some("user_show"), &["id"], &["1"]);
        assert_route(&tree, "/admin/hi", Some("admin_catchall"), &["*"], &["hi"]);
        assert_route(
            &tree,
            "/admin/lots/of/:fun",
            Some("admin_catchall"),
            &["*"],
            &["lots/of/:fun"],
        );
        assert_route(&tree, "/admin/apps/333", Some("app_show"), &["id"], &["333"]);
        assert_route(
            &tree,
            "/admin/apps/333/woot",
            Some("app_show"),
            &["id", "*"],
            &["333", "woot"],
        );
        assert_route(&tree, "/hubs/123/view", Some("hub_view1"), &["hubID"], &["123"]);
        assert_route(
            &tree,
            "/hubs/123/view/index.html",
            Some("hub_view2"),
            &["hubID", "*"],
            &["123", "index.html"],
        );
        assert_route(&tree, "/hubs/123/users", Some("hub_view3"), &["hubID"], &["123"]);
        assert_route(&tree, "/users/123/profile", Some("user_profile"), &["userID"], &["123"]);
        assert_route(
            &tree,
            "/users/super/123/okay/yes",
            Some("user_super"),
            &["*"],
            &["123/okay/yes"],
        );
        assert_route(&tree, "/users/123/okay/yes", Some("user_all"), &["*"], &["123/okay/yes"]);
    }

    #[test]
    fn static_beats_params_in_any_order() {
        let orders: [&[(&str, &str)]; 2] = [
            &[("/u/{id}", "param"), ("/u/*", "wild"), ("/u/me", "static")],
            &[("/u/me", "static"), ("/u/*", "wild"), ("/u/{id}", "param")],
        ];
        for routes in orders {
            let mut tree = Tree::new();
            for (pattern, handler) in routes {
                get(&mut tree, pattern, handler);
            }
            assert_route(&tree, "/u/me", Some("static"), &[], &[]);
            assert_route(&tree, "/u/you", Some("param"), &["id"], &["you"]);
            assert_route(&tree, "/u/you/too", Some("wild"), &["*"], &["you/too"]);
        }
    }

    #[test]
    fn regexp_before_param() {
        let mut tree = Tree::new();
        get(&mut tree, "/{name}", "param");
        get(&mut tree, r"/{id:\d+}", "digits");

        assert_route(&tree, "/42", Some("digits"), &["id"], &["42"]);
        assert_route(&tree, "/abc", Some("param"), &["name"], &["abc"]);
    }

    #[test]
    fn regexp_siblings_in_registration_order() {
        let mut tree = Tree::new();
        get(&mut tree, "/{a:[a-z0-9]+}", "first");
        get(&mut tree, "/{b:[0-9]+}", "second");

        assert_route(&tree, "/123", Some("first"), &["a"], &["123"]);
    }

    #[test]
    fn user_id_regexp() {
        let mut tree = Tree::new();
        get(&mut tree, r"/user/{userId:\d+}", "user");

        assert_route(&tree, "/user/123", Some("user"), &["userId"], &["123"]);
        assert_route(&tree, "/user/abc", None, &[], &[]);
        assert_route(&tree, "/user/", None, &[], &[]);
    }

    #[test]
    fn params_with_tails_inside_a_segment() {
        let mut tree = Tree::new();
        get(&mut tree, "/files/{name}.{ext}", "file");
        get(&mut tree, "/range/{from}-{to}", "range");

        assert_route(&tree, "/files/report.pdf", Some("file"), &["name", "ext"], &["report", "pdf"]);
        assert_route(&tree, "/range/1-9", Some("range"), &["from", "to"], &["1", "9"]);
        assert_route(&tree, "/files/noext", None, &[], &[]);
    }

    #[test]
    fn empty_params() {
        let mut tree = Tree::new();
        get(&mut tree, "/users/{x}/{y}/{z}", "users");

        assert_route(&tree, "/users///c", Some("users"), &["x", "y", "z"], &["", "", "c"]);
    }

    #[test]
    fn regexp_accepting_empty_matches_empty_segment() {
        let mut tree = Tree::new();
        get(&mut tree, "/{param:[0-9]*}/test", "test");
        get(&mut tree, r"/{id:\d+}/strict", "strict");

        assert_route(&tree, "//test", Some("test"), &["param"], &[""]);
        assert_route(&tree, "/7/test", Some("test"), &["param"], &["7"]);
        assert_route(&tree, "//strict", None, &[], &[]);
    }

    #[test]
    fn backtracks_out_of_a_dead_end() {
        let mut tree = Tree::new();
        get(&mut tree, "/b/{c}/y", "deep");
        get(&mut tree, "/{a}/x", "shallow");

        assert_route(&tree, "/b/x", Some("shallow"), &["a"], &["b"]);
        assert_route(&tree, "/b/q/y", Some("deep"), &["c"], &["q"]);
    }

    #[test]
    fn unicode_prefixes_split_on_char_boundaries() {
        let mut tree = Tree::new();
        get(&mut tree, "/café", "cafe");
        get(&mut tree, "/cafè", "cafe_grave");

        assert_route(&tree, "/café", Some("cafe"), &[], &[]);
        assert_route(&tree, "/cafè", Some("cafe_grave"), &[], &[]);
    }

    // ── Methods ──────────────────────────────────────────────────────────────

    #[test]
    fn method_not_allowed_flag() {
        let mut tree = Tree::new();
        get(&mut tree, "/thing", "thing");

        let found = lookup(&tree, Method::Post, "/thing");
        assert!(found.handler.is_none());
        assert!(found.method_not_allowed);

        let found = lookup(&tree, Method::Post, "/other");
        assert!(found.handler.is_none());
        assert!(!found.method_not_allowed);
    }

    #[test]
    fn wrong_method_falls_through_to_catch_all() {
        let mut tree = Tree::new();
        get(&mut tree, "/api/ping", "ping");
        add(&mut tree, MethodSlot::All, "/api/*", "any");

        let found = lookup(&tree, Method::Post, "/api/ping");
        assert_eq!(found.handler, Some("any"));
        assert!(found.method_not_allowed);
    }

    #[test]
    fn all_methods_slot() {
        let mut tree = Tree::new();
        add(&mut tree, MethodSlot::All, "/x", "all");
        add(&mut tree, MethodSlot::Exact(Method::Put), "/x", "put");

        assert_eq!(lookup(&tree, Method::Put, "/x").handler, Some("put"));
        assert_eq!(lookup(&tree, Method::Delete, "/x").handler, Some("all"));
        assert_eq!(lookup(&tree, Method::Custom("LINK".into()), "/x").handler, Some("all"));

        // a later all-methods registration takes over every method
        add(&mut tree, MethodSlot::All, "/x", "again");
        assert_eq!(lookup(&tree, Method::Put, "/x").handler, Some("again"));
    }

    // ── find_pattern ─────────────────────────────────────────────────────────

    #[test]
    fn find_pattern_is_exact() {
        let mut tree = Tree::new();
        get(&mut tree, "/foobar/*", "foobar");
        get(&mut tree, "/users/{id}/*", "users");

        let has = |p: &str| tree.find_pattern(Pattern::parse(p).unwrap().segments());
        assert!(has("/foobar/*"));
        assert!(has("/users/{id}/*"));
        assert!(has("/users/{id}/"));
        assert!(!has("/foo/*"));
        assert!(!has("/foo*"));
        assert!(!has("/users/{id:[0-9]+}/*"));
    }

    #[test]
    fn map_converts_handlers() {
        let mut tree = Tree::new();
        get(&mut tree, "/a/{id}", "a");

        let mapped: Node<usize, ()> = tree.map(&mut |h: &str| h.len(), &mut |()| ());
        let mut rctx = RouteContext::new();
        let (_, endpoint) = mapped.find(&mut rctx, &Method::Get, "/a/1").unwrap();
        assert_eq!(endpoint.handler, 1);
        assert_eq!(rctx.route_patterns(), ["/a/{id}"]);
    }
}
