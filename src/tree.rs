//! Segment trie, one per HTTP method.
//!
//! Every node is one path segment. Literal children live in a map keyed by
//! their text; the single wildcard slot holds a `:param` or `*catchall`
//! child. Lookup tries the literal child first and only then the wildcard,
//! at every depth, without backtracking:
//!
//! ```text
//! GET /                       root ─┬─ "user" ─┬─ "me"            ← /user/me
//! GET /user/me                      │          └─ :name           ← /user/:name
//! GET /user/:name                   │               └─ :provider  ← /user/:name/:provider
//! GET /user/:name/:provider         └─ "static" ── *filepath      ← /static/*filepath
//! GET /static/*filepath
//! ```
//!
//! Registration validates the whole pattern against the tree before linking
//! anything, so a rejected route leaves the tree untouched.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::RouteError;
use crate::handler::HandlersChain;
use crate::method::Method;
use crate::params::Params;
use crate::path::{split_first, Segment, SegmentKind};

#[derive(Debug)]
pub(crate) struct Node {
    segment: Segment,
    /// Wildcard name, shared into every [`Params`] entry this node binds.
    key: Arc<str>,
    children: HashMap<String, Node>,
    wildcard: Option<Box<Node>>,
    handlers: Option<HandlersChain>,
    full_path: Option<Arc<str>>,
}

/// Result of a lookup. Borrowed from the tree; clone what must outlive the lock.
pub(crate) struct Value<'a> {
    pub handlers: Option<&'a HandlersChain>,
    pub full_path: Option<&'a Arc<str>>,
    pub tsr: bool,
}

impl Node {
    fn new(segment: Segment) -> Self {
        Self {
            key: Arc::from(segment.text()),
            segment,
            children: HashMap::new(),
            wildcard: None,
            handlers: None,
            full_path: None,
        }
    }

    pub(crate) fn root() -> Self {
        Self::new(Segment::root())
    }

    // ── Registration ─────────────────────────────────────────────────────────

    /// Attaches `handlers` at the node for `segments` (root segment included).
    pub(crate) fn add_route(
        &mut self,
        method: Method,
        path: &str,
        segments: &[Segment],
        handlers: HandlersChain,
    ) -> Result<(), RouteError> {
        let rest = segments.get(1..).unwrap_or_default();
        self.check(method, path, rest)?;

        let mut node = self;
        for seg in rest {
            node = if seg.is_wildcard() {
                &mut **node.wildcard.get_or_insert_with(|| Box::new(Node::new(seg.clone())))
            } else {
                node.children
                    .entry(seg.text().to_owned())
                    .or_insert_with(|| Node::new(seg.clone()))
            };
        }
        node.handlers = Some(handlers);
        node.full_path = Some(Arc::from(path));
        Ok(())
    }

    /// Would [`add_route`](Self::add_route) with the same arguments fail?
    pub(crate) fn check_route(&self, method: Method, path: &str, segments: &[Segment]) -> Result<(), RouteError> {
        self.check(method, path, segments.get(1..).unwrap_or_default())
    }

    /// Read-only pass: would inserting `segments` below `self` conflict?
    fn check(&self, method: Method, path: &str, segments: &[Segment]) -> Result<(), RouteError> {
        let Some((seg, rest)) = segments.split_first() else {
            return match self.handlers {
                Some(_) => Err(RouteError::DuplicateRoute {
                    method: method.to_string(),
                    path: path.to_owned(),
                }),
                None => Ok(()),
            };
        };

        let child = if seg.is_wildcard() {
            match self.wildcard.as_deref() {
                Some(existing) if existing.segment != *seg => {
                    return Err(RouteError::WildcardConflict {
                        path: path.to_owned(),
                        segment: seg.to_string(),
                        existing: existing.segment.to_string(),
                    });
                }
                existing => existing,
            }
        } else {
            self.children.get(seg.text())
        };

        match child {
            Some(child) => child.check(method, path, rest),
            None => Ok(()),
        }
    }

    // ── Lookup ───────────────────────────────────────────────────────────────

    /// Resolves a request path, appending bound parameters to `params`.
    ///
    /// On a miss, `params` is restored to its length on entry and `tsr`
    /// reports whether the same path with its trailing slash toggled has
    /// handlers.
    pub(crate) fn get_value(&self, path: &str, params: &mut Params, unescape: bool) -> Value<'_> {
        let start = params.len();
        if let Some(node) = self.walk(path, params, unescape) {
            if let Some(handlers) = &node.handlers {
                return Value {
                    handlers: Some(handlers),
                    full_path: node.full_path.as_ref(),
                    tsr: false,
                };
            }
        }
        params.truncate(start);

        let tsr = path != "/" && self.has_toggled_slash_route(path, params);
        params.truncate(start);
        Value { handlers: None, full_path: None, tsr }
    }

    fn has_toggled_slash_route(&self, path: &str, params: &mut Params) -> bool {
        let toggled: Cow<'_, str> = match path.strip_suffix('/') {
            Some(trimmed) => Cow::Borrowed(trimmed),
            None => Cow::Owned(format!("{path}/")),
        };
        self.walk(&toggled, params, false)
            .is_some_and(|node| node.handlers.is_some())
    }

    fn walk(&self, path: &str, params: &mut Params, unescape: bool) -> Option<&Node> {
        let rest = path.strip_prefix('/')?;
        let mut node = self;
        let mut remaining = (!rest.is_empty()).then_some(rest);

        while let Some(current) = remaining {
            let (seg, tail) = split_first(current);
            if let Some(child) = node.literal_child(seg) {
                node = child;
                remaining = tail;
                continue;
            }

            let wild = node.wildcard.as_deref()?;
            match wild.segment.kind() {
                SegmentKind::CatchAll => {
                    if current.is_empty() {
                        return None;
                    }
                    params.push(Arc::clone(&wild.key), decode(current, unescape));
                    return Some(wild);
                }
                _ => {
                    if seg.is_empty() {
                        return None;
                    }
                    params.push(Arc::clone(&wild.key), decode(seg, unescape));
                    node = wild;
                    remaining = tail;
                }
            }
        }
        Some(node)
    }

    /// The literal child for a request segment, tried verbatim and then
    /// percent-decoded, so `/caf%C3%A9` reaches a route registered as `/café`.
    fn literal_child(&self, seg: &str) -> Option<&Node> {
        if let Some(child) = self.children.get(seg) {
            return Some(child);
        }
        if !seg.contains('%') {
            return None;
        }
        let decoded = urlencoding::decode(seg).ok()?;
        self.children.get(decoded.as_ref())
    }

    /// Case-insensitive lookup of an already cleaned path. Returns the path
    /// as registered (request text kept for wildcard segments).
    ///
    /// With `fix_trailing_slash`, a path that only matches once its trailing
    /// slash is added or removed is also accepted.
    pub(crate) fn find_case_insensitive(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        let rest = path.strip_prefix('/')?;
        let mut out = String::with_capacity(path.len() + 1);
        let remaining = (!rest.is_empty()).then_some(rest);
        if !self.ci_walk(remaining, &mut out, fix_trailing_slash) {
            return None;
        }
        if out.is_empty() {
            out.push('/');
        }
        Some(out)
    }

    fn ci_walk(&self, remaining: Option<&str>, out: &mut String, fix_ts: bool) -> bool {
        let Some(current) = remaining else {
            if self.handlers.is_some() {
                return true;
            }
            let slash_route = self.children.get("").is_some_and(|c| c.handlers.is_some());
            if fix_ts && slash_route {
                out.push('/');
                return true;
            }
            return false;
        };

        let (seg, tail) = split_first(current);
        let mark = out.len();

        let exact = self.children.get_key_value(seg);
        let folded = self
            .children
            .iter()
            .filter(|(text, _)| text.as_str() != seg && text.eq_ignore_ascii_case(seg));
        for (text, child) in exact.into_iter().chain(folded) {
            out.push('/');
            out.push_str(text);
            if child.ci_walk(tail, out, fix_ts) {
                return true;
            }
            out.truncate(mark);
        }

        if let Some(wild) = self.wildcard.as_deref() {
            match wild.segment.kind() {
                SegmentKind::CatchAll if !current.is_empty() && wild.handlers.is_some() => {
                    out.push('/');
                    out.push_str(current);
                    return true;
                }
                SegmentKind::Param if !seg.is_empty() => {
                    out.push('/');
                    out.push_str(seg);
                    if wild.ci_walk(tail, out, fix_ts) {
                        return true;
                    }
                    out.truncate(mark);
                }
                _ => {}
            }
        }

        // "/foo/" where only "/foo" exists: drop the slash.
        fix_ts && seg.is_empty() && tail.is_none() && self.handlers.is_some()
    }

    // ── Introspection ────────────────────────────────────────────────────────

    /// Every (pattern, chain) registered at or below this node.
    pub(crate) fn collect_routes<'a>(&'a self, out: &mut Vec<(&'a str, &'a HandlersChain)>) {
        if let (Some(path), Some(handlers)) = (&self.full_path, &self.handlers) {
            out.push((&**path, handlers));
        }
        let mut literals: Vec<&Node> = self.children.values().collect();
        literals.sort_by(|a, b| a.segment.text().cmp(b.segment.text()));
        for child in literals.into_iter().chain(self.wildcard.as_deref()) {
            child.collect_routes(out);
        }
    }

    /// Indented dump of the subtree, one node per line.
    pub(crate) fn dump(&self, depth: usize, out: &mut String) {
        let _ = writeln!(
            out,
            "{:indent$}{} ({:?}, handlers: {})",
            "",
            self.segment,
            self.segment.kind(),
            self.handlers.as_ref().map_or(0, |h| h.len()),
            indent = depth * 2,
        );
        let mut literals: Vec<&Node> = self.children.values().collect();
        literals.sort_by(|a, b| a.segment.text().cmp(b.segment.text()));
        for child in literals.into_iter().chain(self.wildcard.as_deref()) {
            child.dump(depth + 1, out);
        }
    }
}

fn decode(raw: &str, unescape: bool) -> String {
    if unescape {
        if let Ok(decoded) = urlencoding::decode(raw) {
            return decoded.into_owned();
        }
    }
    raw.to_owned()
}

// ── Method table ──────────────────────────────────────────────────────────────

/// One lock-protected tree per supported method.
///
/// Lookups take the read lock of one method's tree; registration takes the
/// write lock of that tree only, for a single route insertion.
#[derive(Debug)]
pub(crate) struct MethodTable {
    trees: [RwLock<Node>; Method::ALL.len()],
}

impl MethodTable {
    pub(crate) fn new() -> Self {
        Self { trees: std::array::from_fn(|_| RwLock::new(Node::root())) }
    }

    pub(crate) fn get(&self, method: Method) -> &RwLock<Node> {
        &self.trees[method.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxedHandler;
    use crate::handlers;
    use crate::path::segment;

    fn chain() -> HandlersChain {
        let handlers: Vec<BoxedHandler> = handlers![|_ctx| {}];
        handlers.into()
    }

    fn tree(paths: &[&str]) -> Node {
        let mut root = Node::root();
        for path in paths {
            let segments = segment(path).unwrap();
            root.add_route(Method::Get, path, &segments, chain()).unwrap();
        }
        root
    }

    fn matched(root: &Node, path: &str) -> Option<(String, Vec<(String, String)>)> {
        let mut params = Params::default();
        let value = root.get_value(path, &mut params, true);
        value.handlers?;
        let bound = params
            .iter()
            .map(|p| (p.key.to_string(), p.value.clone()))
            .collect();
        Some((value.full_path?.to_string(), bound))
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn literal_beats_wildcard() {
        let root = tree(&["/user/me", "/user/:name", "/user/:name/:provider"]);

        assert_eq!(matched(&root, "/user/me"), Some(("/user/me".into(), vec![])));
        assert_eq!(
            matched(&root, "/user/alice"),
            Some(("/user/:name".into(), pairs(&[("name", "alice")])))
        );
        assert_eq!(
            matched(&root, "/user/alice/github"),
            Some((
                "/user/:name/:provider".into(),
                pairs(&[("name", "alice"), ("provider", "github")])
            ))
        );
    }

    #[test]
    fn catch_all_takes_the_remainder() {
        let root = tree(&["/static/*filepath"]);

        assert_eq!(
            matched(&root, "/static/css/app.css"),
            Some(("/static/*filepath".into(), pairs(&[("filepath", "css/app.css")])))
        );
        assert_eq!(
            matched(&root, "/static/dir/"),
            Some(("/static/*filepath".into(), pairs(&[("filepath", "dir/")])))
        );
        assert_eq!(matched(&root, "/static/"), None);
        assert_eq!(matched(&root, "/static"), None);
    }

    #[test]
    fn params_never_bind_empty_segments() {
        let root = tree(&["/user/:name"]);
        assert_eq!(matched(&root, "/user/"), None);
        assert_eq!(matched(&root, "/user//"), None);
    }

    #[test]
    fn miss_leaves_params_untouched() {
        let root = tree(&["/a/:x/b"]);
        let mut params = Params::default();
        let value = root.get_value("/a/1/c", &mut params, true);
        assert!(value.handlers.is_none());
        assert!(params.is_empty());
    }

    #[test]
    fn unescapes_param_values() {
        let root = tree(&["/files/:name"]);
        let mut params = Params::default();
        root.get_value("/files/hello%20world", &mut params, true);
        assert_eq!(params.get("name"), Some("hello world"));

        params.clear();
        root.get_value("/files/hello%20world", &mut params, false);
        assert_eq!(params.get("name"), Some("hello%20world"));
    }

    #[test]
    fn literals_match_percent_encoded_requests() {
        let root = tree(&["/café/menu", "/:other"]);
        assert_eq!(matched(&root, "/caf%C3%A9/menu"), Some(("/café/menu".into(), vec![])));
        assert_eq!(matched(&root, "/café/menu"), Some(("/café/menu".into(), vec![])));
        // Undecodable input falls through to the wildcard.
        assert_eq!(matched(&root, "/%FF"), Some(("/:other".into(), pairs(&[("other", "%FF")]))));
    }

    #[test]
    fn trailing_slash_signal() {
        let root = tree(&["/foo", "/bar/", "/user/:name"]);
        let mut params = Params::default();

        let v = root.get_value("/foo/", &mut params, true);
        assert!(v.handlers.is_none());
        assert!(v.tsr);

        let v = root.get_value("/bar", &mut params, true);
        assert!(v.handlers.is_none());
        assert!(v.tsr);

        let v = root.get_value("/user/alice/", &mut params, true);
        assert!(v.handlers.is_none());
        assert!(v.tsr);
        assert!(params.is_empty());

        let v = root.get_value("/nope/", &mut params, true);
        assert!(!v.tsr);
    }

    #[test]
    fn intermediate_node_without_handlers_is_a_miss() {
        let root = tree(&["/a/b/c"]);
        let mut params = Params::default();
        let v = root.get_value("/a/b", &mut params, true);
        assert!(v.handlers.is_none());
        assert!(!v.tsr);
    }

    #[test]
    fn root_route() {
        let root = tree(&["/"]);
        assert_eq!(matched(&root, "/"), Some(("/".into(), vec![])));
        assert!(root.children.is_empty());
    }

    #[test]
    fn rejects_conflicting_wildcards_without_side_effects() {
        let mut root = tree(&["/user/:name"]);
        let segments = segment("/user/:id/posts").unwrap();
        let err = root
            .add_route(Method::Get, "/user/:id/posts", &segments, chain())
            .unwrap_err();
        assert_eq!(
            err,
            RouteError::WildcardConflict {
                path: "/user/:id/posts".into(),
                segment: ":id".into(),
                existing: ":name".into(),
            }
        );

        let segments = segment("/user/*rest").unwrap();
        assert!(matches!(
            root.add_route(Method::Get, "/user/*rest", &segments, chain()),
            Err(RouteError::WildcardConflict { .. })
        ));
        assert_eq!(matched(&root, "/user/x/posts"), None);
    }

    #[test]
    fn same_wildcard_name_is_shared() {
        let root = tree(&["/user/:name", "/user/:name/posts"]);
        assert!(matched(&root, "/user/bob/posts").is_some());
    }

    #[test]
    fn rejects_duplicates() {
        let mut root = tree(&["/dup"]);
        let segments = segment("/dup").unwrap();
        assert_eq!(
            root.add_route(Method::Get, "/dup", &segments, chain()),
            Err(RouteError::DuplicateRoute { method: "GET".into(), path: "/dup".into() })
        );
    }

    #[test]
    fn case_insensitive_fix() {
        let root = tree(&["/Users/:id/Profile", "/docs/", "/static/*fp"]);

        assert_eq!(
            root.find_case_insensitive("/users/42/PROFILE", false).as_deref(),
            Some("/Users/42/Profile")
        );
        assert_eq!(root.find_case_insensitive("/DOCS", false), None);
        assert_eq!(root.find_case_insensitive("/DOCS", true).as_deref(), Some("/docs/"));
        assert_eq!(
            root.find_case_insensitive("/STATIC/A/b", false).as_deref(),
            Some("/static/A/b")
        );
        assert_eq!(
            root.find_case_insensitive("/users/42/profile/", true).as_deref(),
            Some("/Users/42/Profile")
        );
        assert_eq!(root.find_case_insensitive("/nothing", true), None);
    }

    #[test]
    fn lists_routes_in_stable_order() {
        let root = tree(&["/b", "/a/:x", "/a", "/"]);
        let mut routes = Vec::new();
        root.collect_routes(&mut routes);
        let paths: Vec<&str> = routes.iter().map(|(p, _)| *p).collect();
        assert_eq!(paths, ["/", "/a", "/a/:x", "/b"]);
    }
}
