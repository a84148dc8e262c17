//! Cookie parsing and `Set-Cookie` serialization
//!
//! `CookieJar` is a `Vec<(String, String)>`-backed multimap in the same
//! style as `Headers`: insertion order preserved, name lookups
//! case-sensitive per RFC 6265 (unlike header names, cookie names are
//! case-sensitive on the wire).

use super::date::format_http_date;
use std::time::{Duration, SystemTime};

/// A single cookie pulled from a request's `Cookie` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

/// Request-side cookie multimap, parsed once from the `Cookie` header.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Vec<(String, String)>,
}

impl CookieJar {
    pub fn new() -> Self {
        CookieJar { cookies: Vec::new() }
    }

    /// Parse a `Cookie: a=1; b=2; b=3` header value. Malformed pairs
    /// (missing `=`) are skipped rather than failing the whole header,
    /// matching how most cookie parsers degrade on bad client input.
    pub fn parse(header_value: &str) -> Self {
        let mut jar = CookieJar::new();
        for pair in header_value.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some(eq_pos) = pair.find('=') {
                let name = pair[..eq_pos].trim().to_string();
                let value = pair[eq_pos + 1..].trim().to_string();
                if !name.is_empty() {
                    jar.cookies.push((name, value));
                }
            }
        }
        jar
    }

    /// First value for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }
}

/// `SameSite` attribute for a `Set-Cookie` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// A response-side cookie to be serialized into a `Set-Cookie` header.
#[derive(Debug, Clone)]
pub struct SetCookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<Duration>,
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl SetCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        SetCookie {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            expires: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// A cookie that instructs the client to delete the named cookie
    /// immediately: empty value, `Max-Age=0`, and an `Expires` in the past
    /// (sent alongside `Max-Age` for HTTP/1.0 clients that ignore it).
    pub fn delete(name: impl Into<String>) -> Self {
        SetCookie {
            name: name.into(),
            value: String::new(),
            path: None,
            domain: None,
            max_age: Some(Duration::from_secs(0)),
            expires: Some(SystemTime::UNIX_EPOCH),
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Render as the value of a single `Set-Cookie` header.
    pub fn to_header_value(&self) -> String {
        let mut out = format!("{}={}", self.name, self.value);

        if let Some(path) = &self.path {
            out.push_str(&format!("; Path={}", path));
        }
        if let Some(domain) = &self.domain {
            out.push_str(&format!("; Domain={}", domain));
        }
        if let Some(max_age) = self.max_age {
            out.push_str(&format!("; Max-Age={}", max_age.as_secs()));
        }
        if let Some(expires) = self.expires {
            out.push_str(&format!("; Expires={}", format_http_date(expires)));
        }
        if self.secure {
            out.push_str("; Secure");
        }
        if self.http_only {
            out.push_str("; HttpOnly");
        }
        if let Some(same_site) = self.same_site {
            out.push_str(&format!("; SameSite={}", same_site.as_str()));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_cookie_header() {
        let jar = CookieJar::parse("a=1; b=2; c=3");
        assert_eq!(jar.get("a"), Some("1"));
        assert_eq!(jar.get("b"), Some("2"));
        assert_eq!(jar.get("c"), Some("3"));
        assert_eq!(jar.len(), 3);
    }

    #[test]
    fn skips_malformed_pairs() {
        let jar = CookieJar::parse("a=1; garbage; b=2");
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.get("a"), Some("1"));
        assert_eq!(jar.get("b"), Some("2"));
    }

    #[test]
    fn renders_full_attribute_set() {
        let cookie = SetCookie::new("session", "abc123")
            .path("/")
            .domain("example.com")
            .max_age(Duration::from_secs(3600))
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Lax);

        let rendered = cookie.to_header_value();
        assert!(rendered.starts_with("session=abc123"));
        assert!(rendered.contains("; Path=/"));
        assert!(rendered.contains("; Domain=example.com"));
        assert!(rendered.contains("; Max-Age=3600"));
        assert!(rendered.contains("; Secure"));
        assert!(rendered.contains("; HttpOnly"));
        assert!(rendered.contains("; SameSite=Lax"));
    }

    #[test]
    fn delete_cookie_expires_in_the_past() {
        let cookie = SetCookie::delete("session");
        let rendered = cookie.to_header_value();
        assert!(rendered.starts_with("session="));
        assert!(rendered.contains("; Max-Age=0"));
        assert!(rendered.contains("Expires=Thu, 01 Jan 1970 00:00:00 GMT"));
    }
}
