//! A validated endpoint URL.
//!
//! [`EndpointUrl`] is a newtype over [`Uri`] that guarantees the URL has been
//! validated and is absolute. It can be constructed from common string and
//! URL types via [`IntoEndpointUrl`], and joined with request paths relative
//! to a session's base path.

use std::convert::Infallible;

use http::{Uri, uri::InvalidUri};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use url::Url;

/// A validated, absolute endpoint URL.
///
/// Once constructed, it can be freely cloned and shared between requests
/// without re-validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl(Uri);

impl Serialize for EndpointUrl {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for EndpointUrl {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.into_endpoint_url().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl EndpointUrl {
    /// Returns the inner [`Uri`].
    #[must_use]
    pub fn as_uri(&self) -> &Uri {
        &self.0
    }

    /// Consumes the [`EndpointUrl`] and returns the inner [`Uri`].
    #[must_use]
    pub fn into_uri(self) -> Uri {
        self.0
    }

    /// Joins `path` onto this URL, treating it as a base path.
    ///
    /// Exactly one `/` separates the base from the path, regardless of
    /// whether the base ends with or the path starts with a slash. An empty
    /// path returns the base unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the joined string is not a valid URI.
    pub fn join(&self, path: &str) -> Result<EndpointUrl, EndpointUrlError> {
        if path.is_empty() {
            return Ok(self.clone());
        }

        let base = self.0.to_string();
        let joined = format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        joined.into_endpoint_url()
    }

    /// Resolves a request path against an optional base path.
    ///
    /// Paths carrying their own scheme are used as-is. Anything else is
    /// joined onto `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is relative and no base was given, or if
    /// the resulting URL is invalid.
    pub fn resolve(
        base: Option<&EndpointUrl>,
        path: &str,
    ) -> Result<EndpointUrl, EndpointUrlError> {
        if has_scheme(path) {
            return path.into_endpoint_url();
        }

        match base {
            Some(base) => base.join(path),
            None => RelativeWithoutBaseSnafu { path }.fail(),
        }
    }

    /// Returns a copy of this URL with `encoded` appended to its query.
    ///
    /// `encoded` must already be form-url-encoded. An existing query is
    /// extended with `&`; an empty `encoded` returns the URL unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting URL is invalid.
    pub fn with_query(&self, encoded: &str) -> Result<EndpointUrl, EndpointUrlError> {
        if encoded.is_empty() {
            return Ok(self.clone());
        }

        let separator = match self.0.query() {
            Some(query) if !query.is_empty() => '&',
            Some(_) => return format!("{}{encoded}", self.0).into_endpoint_url(),
            None => '?',
        };
        format!("{}{separator}{encoded}", self.0).into_endpoint_url()
    }
}

fn has_scheme(path: &str) -> bool {
    path.split_once("://").is_some_and(|(scheme, _)| {
        !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    })
}

/// Errors when building an [`EndpointUrl`].
#[derive(Debug, Snafu)]
pub enum EndpointUrlError {
    /// The string could not be parsed as a URI.
    #[snafu(display("Invalid URL: {url}"))]
    Invalid {
        /// The rejected input.
        url: String,
        /// The underlying parse error.
        source: InvalidUri,
    },
    /// The URI parsed, but has no scheme or authority.
    #[snafu(display("URL is not absolute: {url}"))]
    NotAbsolute {
        /// The rejected input.
        url: String,
    },
    /// A relative path was given, but there is no base path to resolve it against.
    #[snafu(display("Relative path {path:?} requires a base path"))]
    RelativeWithoutBase {
        /// The relative path.
        path: String,
    },
}

/// Conversion trait for types that can be turned into an [`EndpointUrl`].
pub trait IntoEndpointUrl {
    /// The error type returned if the conversion fails.
    type Error;

    /// Attempts to convert this value into an [`EndpointUrl`].
    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error>;
}

impl IntoEndpointUrl for EndpointUrl {
    type Error = Infallible;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        Ok(self)
    }
}

impl IntoEndpointUrl for Uri {
    type Error = EndpointUrlError;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        ensure!(
            self.scheme().is_some() && self.authority().is_some(),
            NotAbsoluteSnafu {
                url: self.to_string()
            }
        );
        Ok(EndpointUrl(self))
    }
}

impl IntoEndpointUrl for Url {
    type Error = EndpointUrlError;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        self.as_str().into_endpoint_url()
    }
}

impl IntoEndpointUrl for &str {
    type Error = EndpointUrlError;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        self.parse::<Uri>()
            .context(InvalidSnafu { url: self })?
            .into_endpoint_url()
    }
}

impl IntoEndpointUrl for String {
    type Error = EndpointUrlError;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        self.as_str().into_endpoint_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> EndpointUrl {
        "https://example.test".into_endpoint_url().unwrap()
    }

    #[test]
    fn test_join_normalizes_slashes() {
        assert_eq!(base().join("/get").unwrap().to_string(), "https://example.test/get");
        assert_eq!(
            base().join("user-agent").unwrap().to_string(),
            "https://example.test/user-agent"
        );

        let with_path = "https://example.test/api/".into_endpoint_url().unwrap();
        assert_eq!(
            with_path.join("/v1/items").unwrap().to_string(),
            "https://example.test/api/v1/items"
        );
    }

    #[test]
    fn test_join_empty_path_is_base() {
        assert_eq!(base().join("").unwrap(), base());
    }

    #[test]
    fn test_resolve_absolute_path_ignores_base() {
        let url = EndpointUrl::resolve(Some(&base()), "http://other.test/bytes/5").unwrap();
        assert_eq!(url.to_string(), "http://other.test/bytes/5");
    }

    #[test]
    fn test_resolve_relative_without_base_fails() {
        let err = EndpointUrl::resolve(None, "/get").unwrap_err();
        assert!(matches!(err, EndpointUrlError::RelativeWithoutBase { path } if path == "/get"));
    }

    #[test]
    fn test_with_query_appends() {
        let url = base().join("/get").unwrap().with_query("a=1").unwrap();
        assert_eq!(url.to_string(), "https://example.test/get?a=1");
        let url = url.with_query("b=two").unwrap();
        assert_eq!(url.to_string(), "https://example.test/get?a=1&b=two");
        assert_eq!(url.with_query("").unwrap(), url);
    }

    #[test]
    fn test_not_absolute_rejected() {
        let err = "/relative".into_endpoint_url().unwrap_err();
        assert!(matches!(err, EndpointUrlError::NotAbsolute { .. }));
    }

    #[test]
    fn test_from_url() {
        let url = Url::parse("https://example.test/api/items?page=2")
            .unwrap()
            .into_endpoint_url()
            .unwrap();
        assert_eq!(url.to_string(), "https://example.test/api/items?page=2");
        assert_eq!(url.as_uri().query(), Some("page=2"));

        let err = Url::parse("mailto:someone@example.test")
            .unwrap()
            .into_endpoint_url()
            .unwrap_err();
        assert!(matches!(
            err,
            EndpointUrlError::NotAbsolute { .. } | EndpointUrlError::Invalid { .. }
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let url: EndpointUrl = serde_json::from_str("\"https://example.test/x\"").unwrap();
        assert_eq!(url.as_uri().path(), "/x");
        assert!(serde_json::from_str::<EndpointUrl>("\"not a url\"").is_err());
    }
}
