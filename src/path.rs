//! Path segmentation and path string utilities.
//!
//! Route patterns are parsed into typed [`Segment`]s once, at registration.
//! Request paths are never parsed that way: at serve time the tree walks the
//! raw path with [`split_first`], borrowing each chunk, so `:` and `*` in a
//! request are ordinary characters and lookup allocates nothing.
//!
//! ```text
//! "/users/:id/files/*rest"
//!   → [Root "/"] [Literal "users"] [Param "id"] [Literal "files"] [CatchAll "rest"]
//!
//! "/foo/"
//!   → [Root "/"] [Literal "foo"] [Literal ""]      ← trailing slash is a segment
//! ```

use std::fmt;

use crate::error::RouteError;

/// What a pattern segment matches.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SegmentKind {
    /// The implicit leading `/`.
    Root,
    /// Matches its text verbatim.
    Literal,
    /// `:name`, matches exactly one non-empty segment.
    Param,
    /// `*name`, matches the whole non-empty remainder of the path.
    CatchAll,
}

/// One `/`-delimited component of a route pattern.
///
/// For wildcards, `text` is the declared name without its marker.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Segment {
    text: String,
    kind: SegmentKind,
}

impl Segment {
    pub(crate) fn root() -> Self {
        Self { text: "/".to_owned(), kind: SegmentKind::Root }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.kind, SegmentKind::Param | SegmentKind::CatchAll)
    }
}

/// Writes the segment back in pattern syntax (`users`, `:id`, `*rest`).
impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            SegmentKind::Root | SegmentKind::Literal => f.write_str(&self.text),
            SegmentKind::Param => write!(f, ":{}", self.text),
            SegmentKind::CatchAll => write!(f, "*{}", self.text),
        }
    }
}

/// Parses a route pattern into segments. The first is always [`SegmentKind::Root`].
///
/// Rejects, without side effects:
/// - a path not starting with `/`;
/// - a chunk holding two markers (`:a:b`, `:a*`), a marker past the first
///   byte (`a:b`), or a bare marker with no name (`:`);
/// - any segment after a catch-all.
pub fn segment(path: &str) -> Result<Vec<Segment>, RouteError> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(RouteError::MissingLeadingSlash(path.to_owned()));
    };

    let mut segments = vec![Segment::root()];
    if rest.is_empty() {
        return Ok(segments);
    }

    for chunk in rest.split('/') {
        if let Some(prev) = segments.last().filter(|s| s.kind == SegmentKind::CatchAll) {
            return Err(RouteError::CatchAllNotLast {
                path: path.to_owned(),
                segment: prev.to_string(),
            });
        }
        segments.push(parse_chunk(path, chunk)?);
    }
    Ok(segments)
}

fn parse_chunk(path: &str, chunk: &str) -> Result<Segment, RouteError> {
    let markers = chunk.bytes().filter(|b| matches!(b, b':' | b'*')).count();
    let kind = match chunk.as_bytes().first() {
        Some(b':') => SegmentKind::Param,
        Some(b'*') => SegmentKind::CatchAll,
        _ => SegmentKind::Literal,
    };

    match (kind, markers) {
        (SegmentKind::Literal, 0) => Ok(Segment { text: chunk.to_owned(), kind }),
        (SegmentKind::Param | SegmentKind::CatchAll, 1) if chunk.len() > 1 => {
            Ok(Segment { text: chunk[1..].to_owned(), kind })
        }
        _ => Err(RouteError::InvalidSegment {
            path: path.to_owned(),
            segment: chunk.to_owned(),
        }),
    }
}

/// Number of wildcard segments in a parsed pattern.
pub(crate) fn count_params(segments: &[Segment]) -> usize {
    segments.iter().filter(|s| s.is_wildcard()).count()
}

/// Splits the next request-path chunk off `rest` (a path with its leading `/`
/// already removed). Returns the chunk and what follows the next `/`, if any.
///
/// `"foo/"` yields `("foo", Some(""))` then `("", None)`, which is how a
/// trailing slash reaches the tree as an empty final segment.
pub(crate) fn split_first(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((head, tail)) => (head, Some(tail)),
        None => (rest, None),
    }
}

/// Joins a group base path with a relative route path.
///
/// Duplicate slashes and `.`/`..` elements are removed. A trailing slash on
/// `relative` survives the join; one on `absolute` alone does not.
pub fn join_paths(absolute: &str, relative: &str) -> String {
    if relative.is_empty() {
        return absolute.to_owned();
    }

    let mut joined = clean_path(&format!("{absolute}/{relative}"));
    let wants_slash = relative.ends_with('/');
    if wants_slash && !joined.ends_with('/') {
        joined.push('/');
    } else if !wants_slash && joined.len() > 1 && joined.ends_with('/') {
        joined.pop();
    }
    joined
}

/// Returns the canonical form of `p`.
///
/// - a missing leading `/` is added;
/// - runs of `/` collapse to one;
/// - `.` elements are dropped;
/// - `..` removes the element before it (never climbing above the root);
/// - a trailing `/` is kept.
///
/// `/..//a/./b/` cleans to `/a/b/`; the empty string cleans to `/`.
pub fn clean_path(p: &str) -> String {
    let trailing = p.len() > 1 && p.ends_with('/');

    let mut parts: Vec<&str> = Vec::new();
    for part in p.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }

    let mut out = String::with_capacity(p.len() + 1);
    for part in &parts {
        out.push('/');
        out.push_str(part);
    }
    if out.is_empty() || trailing {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(path: &str) -> Vec<(SegmentKind, String)> {
        segment(path)
            .unwrap()
            .into_iter()
            .map(|s| (s.kind, s.text))
            .collect()
    }

    #[test]
    fn root_alone() {
        assert_eq!(kinds("/"), vec![(SegmentKind::Root, "/".into())]);
    }

    #[test]
    fn typed_segments() {
        assert_eq!(
            kinds("/user/:name/files/*rest"),
            vec![
                (SegmentKind::Root, "/".into()),
                (SegmentKind::Literal, "user".into()),
                (SegmentKind::Param, "name".into()),
                (SegmentKind::Literal, "files".into()),
                (SegmentKind::CatchAll, "rest".into()),
            ]
        );
    }

    #[test]
    fn trailing_slash_is_its_own_segment() {
        assert_eq!(kinds("/foo").len(), 2);
        let with_slash = kinds("/foo/");
        assert_eq!(with_slash.len(), 3);
        assert_eq!(with_slash[2], (SegmentKind::Literal, String::new()));
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert_eq!(
            segment("foo"),
            Err(RouteError::MissingLeadingSlash("foo".into()))
        );
        for bad in ["/:a:b", "/:a*b", "/a:b", "/*", "/x/:"] {
            assert!(
                matches!(segment(bad), Err(RouteError::InvalidSegment { .. })),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            segment("/static/*path/more"),
            Err(RouteError::CatchAllNotLast { .. })
        ));
        assert!(matches!(
            segment("/static/*path/"),
            Err(RouteError::CatchAllNotLast { .. })
        ));
    }

    #[test]
    fn display_round_trips_pattern_syntax() {
        let rendered: Vec<String> = segment("/a/:b/*c")
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, ["/", "a", ":b", "*c"]);
    }

    #[test]
    fn split_first_walks_trailing_slash() {
        assert_eq!(split_first("foo/"), ("foo", Some("")));
        assert_eq!(split_first(""), ("", None));
        assert_eq!(split_first("a/b/c"), ("a", Some("b/c")));
    }

    #[test]
    fn join() {
        assert_eq!(join_paths("/", ""), "/");
        assert_eq!(join_paths("/", "/users"), "/users");
        assert_eq!(join_paths("/api", "users/"), "/api/users/");
        assert_eq!(join_paths("/api/", "users"), "/api/users");
        assert_eq!(join_paths("/api//v1", "//:id"), "/api/v1/:id");
        assert_eq!(join_paths("/api", "/"), "/api/");
    }

    #[test]
    fn clean() {
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path("//"), "/");
        assert_eq!(clean_path("abc"), "/abc");
        assert_eq!(clean_path("/..//a/./b/"), "/a/b/");
        assert_eq!(clean_path("/a/b/../c"), "/a/c");
        assert_eq!(clean_path("/a/.."), "/");
    }
}
