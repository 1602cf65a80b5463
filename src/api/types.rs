//! Request descriptors and cache key derivation.

use std::collections::BTreeMap;
use std::fmt;

/// Description of a single Jikan API call: endpoint path plus query
/// parameters.
///
/// Parameters are held in a `BTreeMap`, so two requests that differ only
/// in parameter insertion order produce identical cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    path: String,
    params: BTreeMap<String, String>,
}

impl ApiRequest {
    /// Create a request for the given endpoint path (e.g. `/anime/1`).
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a query parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Add a query parameter only if a value is present.
    ///
    /// An absent value leaves the request untouched, so a call with an
    /// omitted parameter and a call with an explicit `None` share a key.
    pub fn maybe_param(self, name: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    /// Endpoint path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters, sorted by name.
    pub fn params(&self) -> &BTreeMap<String, String> {
        &self.params
    }

    /// Deterministic identity for this call, used for caching and
    /// in-flight deduplication.
    ///
    /// A request without parameters keys to just the path.
    pub fn cache_key(&self) -> String {
        if self.params.is_empty() {
            return self.path.clone();
        }

        let query = self
            .params
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}?{}", self.path, query)
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_without_params_is_path() {
        let request = ApiRequest::new("/genres/anime");
        assert_eq!(request.cache_key(), "/genres/anime");
    }

    #[test]
    fn test_key_is_insertion_order_independent() {
        let a = ApiRequest::new("/anime").param("a", 1).param("b", 2);
        let b = ApiRequest::new("/anime").param("b", 2).param("a", 1);
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(a.cache_key(), "/anime?a=1&b=2");
    }

    #[test]
    fn test_absent_params_do_not_participate() {
        let explicit = ApiRequest::new("/top/anime")
            .param("page", 2)
            .maybe_param("filter", None::<String>);
        let omitted = ApiRequest::new("/top/anime").param("page", 2);
        assert_eq!(explicit.cache_key(), omitted.cache_key());
    }

    #[test]
    fn test_differing_params_produce_distinct_keys() {
        let page_one = ApiRequest::new("/top/anime").param("page", 1);
        let page_two = ApiRequest::new("/top/anime").param("page", 2);
        assert_ne!(page_one.cache_key(), page_two.cache_key());
    }
}
