//! URL pattern matching.
//!
//! One rule set, applied uniformly by every component that gates content by
//! page. Patterns and URLs are lower-cased and trailing-slash normalized
//! before any rule runs.
//!
//! | Pattern            | Meaning                                          |
//! |--------------------|--------------------------------------------------|
//! | `*`                | every URL                                        |
//! | `/teams/*`         | `/teams` and everything nested beneath it        |
//! | `/teams/*/edit`    | anchored wildcard, `*` spans any characters      |
//! | `/teams`           | exactly that path                                |
//! | `example.com/docs` | exact URL, scheme ignored when the pattern has none |
//! | `dashboard`        | legacy: substring containment either way         |

use regex::Regex;
use tracing::debug;
use url::Url;
use waymark_protocols::Guidance;

/// A parsed pattern.
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Any,
    /// `base` and any path nested beneath it.
    Prefix { base: String, path: bool },
    Wildcard { regex: Regex, path: bool },
    Exact { value: String, path: bool },
    /// Neither a path nor a URL; compared by containment.
    Legacy(String),
}

impl UrlPattern {
    /// Parse a declared pattern. Never fails: a wildcard that cannot be
    /// compiled degrades to containment.
    pub fn parse(pattern: &str) -> Self {
        let pattern = normalize(pattern.trim());
        if pattern == "*" {
            return UrlPattern::Any;
        }

        let path = pattern.starts_with('/');
        let url_like = path || pattern.contains("://") || looks_like_host(&pattern);

        if let Some(base) = pattern.strip_suffix("/*") {
            if !base.contains('*') {
                return UrlPattern::Prefix {
                    base: base.to_string(),
                    path,
                };
            }
        }

        if pattern.contains('*') {
            return match wildcard_regex(&pattern) {
                Ok(regex) => UrlPattern::Wildcard { regex, path },
                Err(e) => {
                    debug!("Wildcard pattern '{}' did not compile: {}", pattern, e);
                    UrlPattern::Legacy(pattern.replace('*', ""))
                }
            };
        }

        if url_like {
            UrlPattern::Exact {
                value: pattern,
                path,
            }
        } else {
            UrlPattern::Legacy(pattern)
        }
    }

    /// Whether `url` falls under this pattern.
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Any => true,
            UrlPattern::Prefix { base, path } => {
                let target = target_for(url, *path, base);
                base.is_empty() || base == "/" || target == *base || {
                    let nested = format!("{}/", base);
                    target.starts_with(&nested)
                }
            }
            UrlPattern::Wildcard { regex, path } => {
                let target = target_for(url, *path, regex.as_str());
                regex.is_match(&target)
            }
            UrlPattern::Exact { value, path } => target_for(url, *path, value) == *value,
            UrlPattern::Legacy(needle) => {
                let target = normalize(url);
                !needle.is_empty()
                    && !target.is_empty()
                    && (target.contains(needle.as_str()) || needle.contains(&target))
            }
        }
    }
}

/// Whether guidance declared for `pattern` should show on `url`.
pub fn matches(pattern: &str, url: &str) -> bool {
    UrlPattern::parse(pattern).matches(url)
}

/// Active definitions whose pattern matches `url`, in their original order.
pub fn filter_for_url<T: Guidance + Clone>(items: &[T], url: &str) -> Vec<T> {
    items
        .iter()
        .filter(|item| item.is_active() && matches(item.url_pattern(), url))
        .cloned()
        .collect()
}

fn normalize(value: &str) -> String {
    let lower = value.to_lowercase();
    let trimmed = lower.trim_end_matches('/');
    if trimmed.is_empty() && lower.starts_with('/') {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `host.tld/...` without a scheme.
fn looks_like_host(pattern: &str) -> bool {
    let host = pattern.split('/').next().unwrap_or_default();
    host.contains('.') && pattern.contains('/') && !host.contains(' ')
}

fn wildcard_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let (body, tail) = match pattern.strip_suffix("/*") {
        Some(body) => (body, "(/.*)?"),
        None => (pattern, ""),
    };
    let pieces: Vec<String> = body.split('*').map(regex::escape).collect();
    Regex::new(&format!("^{}{}$", pieces.join(".*"), tail))
}

/// The part of `url` a pattern is compared against.
///
/// Path patterns see only the path. URL patterns see the URL without query
/// and fragment, and without the scheme when the pattern carries none.
fn target_for(url: &str, path: bool, pattern: &str) -> String {
    if path {
        return normalize(&url_path(url));
    }

    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let normalized = normalize(without_query);
    if pattern.contains("://") {
        normalized
    } else {
        match normalized.split_once("://") {
            Some((_, rest)) => rest.to_string(),
            None => normalized,
        }
    }
}

fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    }
}
