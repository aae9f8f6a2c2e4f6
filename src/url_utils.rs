//! URL helpers shared by the rewriting stages

use crate::error::{Result, TransformError};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use regex::Regex;
use url::{Url, form_urlencoded};

/// `/t/<optional-slug>/<digits>`; the id is capture group 1
pub static TOPIC_PATH_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r#"/t/(?:[^/\s?#"'<>]+/)?(\d+)"#).unwrap());

/// A block that is nothing but a possible URL followed by `/t/...`, as
/// rendered for each topic in the text part
pub static TOPIC_URL_REGEX: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^(?:https?://\S+?)?/t/\S+$").unwrap());

/// Absolute http(s) URLs in running text
pub static TEXT_URL_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r#"(?i)\bhttps?://[^\s<>"'()\[\]{}|\\^`]+"#).unwrap()
});

/// `<a ... href="...">` in raw markup; the value is group 2 (double quotes) or 3 (single)
pub static ANCHOR_HREF_REGEX: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
    Regex::new(r#"(?is)(<a\b[^>]*?\bhref\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap()
});

/// Extract a numeric topic id from a topic path
#[must_use]
pub fn topic_id(href: &str) -> Option<u64> {
    TOPIC_PATH_REGEX
        .captures_iter(href)
        .find_map(|cap| cap.get(1)?.as_str().parse().ok())
}

/// Every topic id appearing in a piece of text
pub fn topic_ids(text: &str) -> impl Iterator<Item = u64> + '_ {
    TOPIC_PATH_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1)?.as_str().parse().ok())
}

/// Unpadded base64url encoding
#[must_use]
pub fn encode_token(value: &str) -> String {
    URL_SAFE_NO_PAD.encode(value.as_bytes())
}

/// Reverse of [`encode_token`]
pub fn decode_token(token: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim_end_matches('='))
        .map_err(|e| TransformError::invalid_url(token, e))?;
    String::from_utf8(bytes).map_err(|e| TransformError::invalid_url(token, e))
}

/// Base URL that relative links in the digest resolve against
pub fn origin_base(origin: &str) -> Result<Url> {
    let raw = format!("https://{origin}/");
    Url::parse(&raw).map_err(|e| TransformError::invalid_url(&raw, e))
}

/// Resolve an href to an absolute URL
pub fn resolve(href: &str, base: &Url) -> Result<Url> {
    base.join(href.trim())
        .map_err(|e| TransformError::invalid_url(href, e))
}

/// Host equals the origin or is one of its subdomains
#[must_use]
pub fn host_matches(host: &str, origin: &str) -> bool {
    let host = host.trim_end_matches('.');
    if host.eq_ignore_ascii_case(origin) {
        return true;
    }
    host.len() > origin.len() + 1
        && host.is_char_boundary(host.len() - origin.len() - 1)
        && host[host.len() - origin.len() - 1..]
            .to_ascii_lowercase()
            .strip_prefix('.')
            .is_some_and(|suffix| suffix == origin)
}

/// Replace the origin suffix of `host` with `target`, keeping any subdomain prefix
#[must_use]
pub fn swap_host(host: &str, origin: &str, target: &str) -> Option<String> {
    let bare = host.trim_end_matches('.');
    if !host_matches(bare, origin) {
        return None;
    }
    let prefix = &bare[..bare.len() - origin.len()];
    Some(format!("{prefix}{target}{}", &host[bare.len()..]))
}

/// Swap the host of an absolute or protocol-relative http(s) URL.
///
/// Only the host bytes change; the rest of the string is kept verbatim.
#[must_use]
pub fn swap_url_host(raw: &str, origin: &str, target: &str) -> Option<String> {
    let lower = raw.to_ascii_lowercase();
    let authority_start = if lower.starts_with("https://") {
        8
    } else if lower.starts_with("http://") {
        7
    } else if raw.starts_with("//") {
        2
    } else {
        return None;
    };

    let absolute = if authority_start == 2 {
        format!("https:{raw}")
    } else {
        raw.to_string()
    };
    let parsed = Url::parse(&absolute).ok()?;
    parsed.host_str()?;

    let authority_end = raw[authority_start..]
        .find(['/', '?', '#'])
        .map_or(raw.len(), |i| authority_start + i);
    let authority = &raw[authority_start..authority_end];
    let host_start = authority.rfind('@').map_or(0, |i| i + 1);
    let host_part = &authority[host_start..];
    if host_part.starts_with('[') {
        return None;
    }
    let host_end = host_part.find(':').unwrap_or(host_part.len());
    let host = &host_part[..host_end];

    let swapped = swap_host(host, origin, target)?;
    let start = authority_start + host_start;
    let end = start + host_end;
    Some(format!("{}{swapped}{}", &raw[..start], &raw[end..]))
}

/// `/path` but not `//host/path`
#[must_use]
pub fn is_root_relative(href: &str) -> bool {
    href.starts_with('/') && !href.starts_with("//")
}

/// Links that never navigate to a web page
#[must_use]
pub fn is_non_navigational(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("sms:")
}

/// Root-relative or pointing at the origin (or one of its subdomains)
#[must_use]
pub fn is_internal(href: &str, origin: &str) -> bool {
    let href = href.trim();
    if is_root_relative(href) {
        return true;
    }
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    Url::parse(&absolute)
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .and_then(|url| url.host_str().map(|host| host_matches(host, origin)))
        .unwrap_or(false)
}

/// Split an href into the part before the query, the query, and the fragment
#[must_use]
pub fn split_href(href: &str) -> (&str, Option<&str>, Option<&str>) {
    let (rest, fragment) = match href.find('#') {
        Some(i) => (&href[..i], Some(&href[i + 1..])),
        None => (href, None),
    };
    match rest.find('?') {
        Some(i) => (&rest[..i], Some(&rest[i + 1..]), fragment),
        None => (rest, None, fragment),
    }
}

/// Whether a raw query string already carries `key`
#[must_use]
pub fn query_has_key(query: &str, key: &str) -> bool {
    form_urlencoded::parse(query.as_bytes()).any(|(k, _)| k == key)
}

/// Append the pairs whose keys are absent, keeping existing query bytes as-is.
///
/// Returns `None` when every key was already present.
#[must_use]
pub fn append_query_pairs(href: &str, pairs: &[(&str, &str)]) -> Option<String> {
    let (base, query, fragment) = split_href(href);
    let existing = query.unwrap_or("");

    let mut added: Vec<String> = Vec::new();
    for (key, value) in pairs {
        let already = query_has_key(existing, key)
            || added.iter().any(|pair| pair.split('=').next() == Some(*key));
        if !already {
            added.push(format!("{key}={}", encode_component(value)));
        }
    }
    if added.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(href.len() + 64);
    out.push_str(base);
    out.push('?');
    let trimmed = existing.trim_end_matches('&');
    if !trimmed.is_empty() {
        out.push_str(trimmed);
        out.push('&');
    }
    out.push_str(&added.join("&"));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    Some(out)
}

fn encode_component(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
