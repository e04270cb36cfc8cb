//! Scheme/host/path match patterns deciding page applicability.

use regex::Regex;
use url::Url;

use pagebridge_core_types::BridgeError;

/// Sentinel admitting every http(s) URL.
pub const ALL_URLS: &str = "<all_urls>";

#[derive(Clone, Debug)]
enum SchemeRule {
    /// `*`, meaning http or https only.
    Wildcard,
    Exact(String),
}

/// One compiled match pattern.
#[derive(Clone, Debug)]
pub struct MatchPattern {
    rule: Rule,
}

#[derive(Clone, Debug)]
enum Rule {
    AllUrls,
    Parts {
        scheme: SchemeRule,
        host: Regex,
        path: Option<Regex>,
    },
}

impl MatchPattern {
    pub fn parse(pattern: &str) -> Result<Self, BridgeError> {
        if pattern == ALL_URLS {
            return Ok(Self {
                rule: Rule::AllUrls,
            });
        }

        let (scheme_text, rest) = pattern
            .split_once("://")
            .ok_or_else(|| BridgeError::parsing(format!("match pattern `{pattern}` has no scheme")))?;
        let scheme = match scheme_text {
            "*" => SchemeRule::Wildcard,
            "" => {
                return Err(BridgeError::parsing(format!(
                    "match pattern `{pattern}` has an empty scheme"
                )))
            }
            exact => SchemeRule::Exact(exact.to_string()),
        };

        let (host_text, path_text) = match rest.find('/') {
            Some(slash) => (&rest[..slash], Some(&rest[slash..])),
            None => (rest, None),
        };
        if host_text.is_empty() {
            return Err(BridgeError::parsing(format!(
                "match pattern `{pattern}` has an empty host"
            )));
        }

        let host = compile_host(host_text)
            .map_err(|detail| BridgeError::parsing(format!("match pattern `{pattern}`: {detail}")))?;
        let path = match path_text {
            Some(text) => Some(compile_glob(text)),
            None => None,
        };

        Ok(Self {
            rule: Rule::Parts { scheme, host, path },
        })
    }

    pub fn matches(&self, url: &Url) -> bool {
        match &self.rule {
            Rule::AllUrls => matches!(url.scheme(), "http" | "https"),
            Rule::Parts { scheme, host, path } => {
                let scheme_ok = match scheme {
                    SchemeRule::Wildcard => matches!(url.scheme(), "http" | "https"),
                    SchemeRule::Exact(exact) => url.scheme() == exact,
                };
                if !scheme_ok {
                    return false;
                }
                let host_ok = url
                    .host_str()
                    .map(|candidate| host.is_match(candidate))
                    .unwrap_or(false);
                if !host_ok {
                    return false;
                }
                match path {
                    Some(path) => path.is_match(url.path()),
                    None => true,
                }
            }
        }
    }
}

/// `*` alone matches any host; a leading `*.` matches the bare domain and
/// every subdomain; wildcards elsewhere in the host are rejected.
fn compile_host(host: &str) -> Result<Regex, String> {
    let pattern = if host == "*" {
        "^[^/]+$".to_string()
    } else if let Some(base) = host.strip_prefix("*.") {
        if base.contains('*') {
            return Err("host wildcard only allowed as a `*.` prefix".to_string());
        }
        format!("^([^/.]+\\.)*{}$", regex::escape(base))
    } else if host.contains('*') {
        return Err("host wildcard only allowed as a `*.` prefix".to_string());
    } else {
        format!("^{}$", regex::escape(host))
    };
    Regex::new(&pattern).map_err(|err| err.to_string())
}

/// Translate a path glob into an anchored regex (`*` spans any run of
/// characters).
fn compile_glob(glob: &str) -> Regex {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        if ch == '*' {
            pattern.push_str(".*");
        } else {
            pattern.push_str(&regex::escape(&ch.to_string()));
        }
    }
    pattern.push('$');
    // escape() output is always a valid pattern
    Regex::new(&pattern).expect("glob translation produced invalid regex")
}

/// A URL is admitted iff at least one match pattern admits it and no exclude
/// pattern admits it. Unparseable URLs and patterns admit nothing.
pub fn url_admitted(url: &str, match_patterns: &[String], exclude_patterns: &[String]) -> bool {
    let url = match Url::parse(url) {
        Ok(url) => url,
        Err(_) => return false,
    };
    let admits = |patterns: &[String]| {
        patterns.iter().any(|text| {
            MatchPattern::parse(text)
                .map(|pattern| pattern.matches(&url))
                .unwrap_or(false)
        })
    };
    admits(match_patterns) && !admits(exclude_patterns)
}
