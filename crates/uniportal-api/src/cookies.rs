// Session cookie jar
//
// Controllers hand out their session through `Set-Cookie` headers and
// expect it back as a single `Cookie` header. The jar keeps insertion
// order so the rendered header is stable across requests.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Error;

/// Name of the UniFi OS session cookie that embeds the CSRF token.
pub const TOKEN_COOKIE: &str = "TOKEN";

/// `Set-Cookie` attribute names; these fragments are not cookies.
const COOKIE_ATTRIBUTES: &[&str] = &[
    "path",
    "domain",
    "expires",
    "max-age",
    "samesite",
    "secure",
    "httponly",
    "partitioned",
    "priority",
];

/// Name -> value map of session cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: IndexMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cookies.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge raw `Set-Cookie` header values into a new jar.
    ///
    /// Every `name=value` fragment is taken; a later value for the same
    /// name overwrites an earlier one. Attribute fragments are skipped.
    #[must_use]
    pub fn ingest_set_cookie_headers<'a, I>(&self, headers: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut cookies = self.cookies.clone();
        for header in headers {
            for fragment in header.split(';') {
                let Some((name, value)) = fragment.split_once('=') else {
                    continue;
                };
                let name = name.trim();
                if name.is_empty() || is_attribute(name) {
                    continue;
                }
                cookies.insert(name.to_owned(), value.trim().to_owned());
            }
        }
        Self { cookies }
    }

    /// Render the jar as a `Cookie` header value (`a=1; b=2`).
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        let rendered = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ");
        Some(rendered)
    }

    /// Extract the CSRF token embedded in the `TOKEN` cookie.
    ///
    /// The cookie is a JWT-like `header.payload.signature` string whose
    /// payload is base64 JSON carrying a `csrfToken` field. A missing or
    /// empty cookie yields `Ok(None)`; a cookie that cannot be decoded is
    /// an [`Error::InvalidResponse`].
    pub fn csrf_token(&self) -> Result<Option<String>, Error> {
        let Some(token) = self.get(TOKEN_COOKIE).filter(|t| !t.is_empty()) else {
            return Ok(None);
        };

        let payload = token
            .split('.')
            .nth(1)
            .filter(|segment| !segment.is_empty())
            .ok_or_else(|| Error::malformed("TOKEN cookie has no payload segment", token))?;

        let bytes = decode_segment(payload)
            .ok_or_else(|| Error::malformed("TOKEN payload is not valid base64", token))?;

        let claims: TokenClaims = serde_json::from_slice(&bytes)
            .map_err(|e| Error::malformed(format!("TOKEN payload is not JSON: {e}"), token))?;

        Ok(claims.csrf_token.filter(|t| !t.is_empty()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenClaims {
    csrf_token: Option<String>,
}

fn is_attribute(name: &str) -> bool {
    COOKIE_ATTRIBUTES
        .iter()
        .any(|attr| attr.eq_ignore_ascii_case(name))
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .ok()
}
