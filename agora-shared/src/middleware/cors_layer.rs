use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Origins accepted by [`cors_layer`]. Entries starting with `*` match any
/// origin ending with the rest of the entry (`*.vercel.app`).
#[derive(Debug, Clone)]
pub struct OriginAllowList {
    exact: Vec<String>,
    suffixes: Vec<String>,
}

impl OriginAllowList {
    pub fn new<I, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut exact = Vec::new();
        let mut suffixes = Vec::new();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            match entry.strip_prefix('*') {
                Some(suffix) => suffixes.push(suffix.to_string()),
                None => exact.push(entry.trim_end_matches('/').to_string()),
            }
        }
        Self { exact, suffixes }
    }

    /// A bare `*` entry turns the list into a wildcard.
    pub fn is_wildcard(&self) -> bool {
        self.suffixes.iter().any(|s| s.is_empty())
    }

    pub fn allows(&self, origin: &str) -> bool {
        self.exact.iter().any(|o| o == origin)
            || self.suffixes.iter().any(|s| origin.ends_with(s.as_str()))
    }
}

pub fn cors_layer(allow_list: OriginAllowList) -> CorsLayer {
    if allow_list.is_wildcard() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin.to_str().map(|o| allow_list.allows(o)).unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            ACCEPT,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([CONTENT_DISPOSITION])
        .allow_credentials(true)
}
