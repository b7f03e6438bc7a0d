//! Path parameters bound during lookup.

use std::sync::Arc;

/// One bound wildcard: the name declared in the pattern and the request text.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Param {
    pub key: Arc<str>,
    pub value: String,
}

/// Ordered path parameters.
///
/// Order is the left-to-right order of the wildcard segments in the matched
/// route. The backing storage belongs to a pooled [`Context`](crate::Context)
/// and is cleared, not freed, between requests; copy out what you need to
/// keep past the end of the request.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    /// Value of the first parameter named `key`.
    ///
    /// For a route `/users/:id`, `params.get("id")` on `/users/42` returns `Some("42")`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| &*p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.0.capacity()
    }

    pub(crate) fn push(&mut self, key: Arc<str>, value: String) {
        self.0.push(Param { key, value });
    }

    /// Grows the backing storage to hold at least `capacity` parameters.
    pub(crate) fn reserve_total(&mut self, capacity: usize) {
        if capacity > self.0.capacity() {
            self.0.reserve(capacity - self.0.len());
        }
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.0.truncate(len);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_first_match_in_order() {
        let mut params = Params::with_capacity(2);
        params.push("name".into(), "alice".into());
        params.push("provider".into(), "github".into());

        assert_eq!(params.get("name"), Some("alice"));
        assert_eq!(params.get("provider"), Some("github"));
        assert_eq!(params.get("missing"), None);

        let keys: Vec<&str> = params.iter().map(|p| &*p.key).collect();
        assert_eq!(keys, ["name", "provider"]);
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut params = Params::with_capacity(4);
        params.push("a".into(), "1".into());
        params.clear();
        assert!(params.is_empty());
        assert!(params.capacity() >= 4);
    }
}
