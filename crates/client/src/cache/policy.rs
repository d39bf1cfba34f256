//! Which requests may be answered from the offline cache.

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request};
use url::Url;

/// Allow-list of cacheable paths.
///
/// A request is cacheable only when all of the following hold:
///
/// - the method is `GET`
/// - it carries no `Authorization` header
/// - it targets the configured API origin
/// - its path, relative to the API base, is on the allow-list
///
/// Allow-list entries match exactly, or by prefix when they end in `/*`.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    origin: url::Origin,
    base_path: String,
    rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Exact(String),
    Prefix(String),
}

impl Rule {
    fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        entry.strip_suffix('*').map_or_else(
            || Self::Exact(normalize(entry)),
            |prefix| Self::Prefix(normalize(prefix)),
        )
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Self::Exact(exact) => path == exact,
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

fn normalize(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

impl CachePolicy {
    /// Build a policy for requests under `api_url`.
    pub fn new<I, S>(api_url: &Url, allow: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            origin: api_url.origin(),
            base_path: api_url.path().trim_end_matches('/').to_string(),
            rules: allow
                .into_iter()
                .filter(|entry| !entry.as_ref().trim().is_empty())
                .map(|entry| Rule::parse(entry.as_ref()))
                .collect(),
        }
    }

    /// Whether `request` may be stored and replayed.
    #[must_use]
    pub fn is_cacheable(&self, request: &Request) -> bool {
        request.method() == Method::GET
            && !request.headers().contains_key(AUTHORIZATION)
            && self.allows(request.url())
    }

    /// Whether `url` is on the allow-list, ignoring method and headers.
    #[must_use]
    pub fn allows(&self, url: &Url) -> bool {
        if url.origin() != self.origin {
            return false;
        }
        let Some(relative) = url.path().strip_prefix(self.base_path.as_str()) else {
            return false;
        };
        let relative = if relative.is_empty() { "/" } else { relative };
        // "/api/healthz" must not match the base "/api/health".
        if !relative.starts_with('/') {
            return false;
        }
        self.rules.iter().any(|rule| rule.matches(relative))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn policy(allow: &[&str]) -> CachePolicy {
        CachePolicy::new(&Url::parse("http://localhost:8000/api").unwrap(), allow)
    }

    fn request(method: Method, url: &str) -> Request {
        Request::new(method, Url::parse(url).unwrap())
    }

    #[test]
    fn test_exact_and_prefix_rules() {
        let policy = policy(&["/health", "static/*"]);
        assert!(policy.allows(&Url::parse("http://localhost:8000/api/health").unwrap()));
        assert!(policy.allows(&Url::parse("http://localhost:8000/api/static/logo.png").unwrap()));
        assert!(!policy.allows(&Url::parse("http://localhost:8000/api/health/deep").unwrap()));
        assert!(!policy.allows(&Url::parse("http://localhost:8000/api/dashboard/today").unwrap()));
    }

    #[test]
    fn test_other_origin_or_base_is_not_cacheable() {
        let policy = policy(&["/health"]);
        assert!(!policy.allows(&Url::parse("http://example.com/api/health").unwrap()));
        assert!(!policy.allows(&Url::parse("http://localhost:8000/health").unwrap()));
        assert!(!policy.allows(&Url::parse("http://localhost:8000/apihealth").unwrap()));
    }

    #[test]
    fn test_only_anonymous_gets_are_cacheable() {
        let policy = policy(&["/health"]);
        let url = "http://localhost:8000/api/health";

        assert!(policy.is_cacheable(&request(Method::GET, url)));
        assert!(!policy.is_cacheable(&request(Method::POST, url)));
        assert!(!policy.is_cacheable(&request(Method::DELETE, url)));

        let mut authed = request(Method::GET, url);
        authed
            .headers_mut()
            .insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert!(!policy.is_cacheable(&authed));
    }

    #[test]
    fn test_empty_allow_list_caches_nothing() {
        let policy = policy(&[]);
        assert!(!policy.is_cacheable(&request(
            Method::GET,
            "http://localhost:8000/api/health"
        )));
    }
}
