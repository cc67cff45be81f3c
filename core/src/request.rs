use std::mem;
use std::str::FromStr;

use http::uri::Authority;
use http::uri::PathAndQuery;
use http::uri::Scheme;
use http::HeaderMap;
use http::Method;
use http::Uri;

use crate::utils::percent_encode;
use crate::{Error, Result};

/// Signing context for request.
///
/// `path` is kept exactly as it travels on the wire, while `query` holds the
/// decoded pairs so that they can be encoded once, the OAuth way.
#[derive(Debug)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// HTTP scheme.
    pub scheme: Scheme,
    /// HTTP authority.
    pub authority: Authority,
    /// HTTP path.
    pub path: String,
    /// HTTP query parameters.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing context from http::request::Parts.
    pub fn build(parts: &mut http::request::Parts) -> Result<Self> {
        let uri = mem::take(&mut parts.uri).into_parts();
        let paq = uri
            .path_and_query
            .unwrap_or_else(|| PathAndQuery::from_static("/"));

        Ok(SigningRequest {
            method: parts.method.clone(),
            scheme: uri.scheme.unwrap_or(Scheme::HTTPS),
            authority: uri.authority.ok_or_else(|| {
                Error::unexpected("request without authority is invalid for signing")
            })?,
            path: paq.path().to_string(),
            query: paq
                .query()
                .map(|v| {
                    form_urlencoded::parse(v.as_bytes())
                        .map(|(k, v)| (k.into_owned(), v.into_owned()))
                        .collect()
                })
                .unwrap_or_default(),

            // Take the headers out of the request to avoid copy.
            // We will return it back when apply the context.
            headers: mem::take(&mut parts.headers),
        })
    }

    /// Apply the signing context back to http::request::Parts.
    ///
    /// Every query pair is percent encoded with the RFC 3986 unreserved set.
    pub fn apply(mut self, parts: &mut http::request::Parts) -> Result<()> {
        // Return headers back.
        mem::swap(&mut parts.headers, &mut self.headers);
        parts.method = self.method;
        parts.uri = {
            let mut uri_parts = mem::take(&mut parts.uri).into_parts();
            uri_parts.scheme = Some(self.scheme);
            uri_parts.authority = Some(self.authority);
            uri_parts.path_and_query = {
                let paq = if self.query.is_empty() {
                    self.path
                } else {
                    let mut s = self.path;
                    s.push('?');
                    s.push_str(&Self::query_to_encoded_string(&self.query));
                    s
                };

                Some(PathAndQuery::from_str(&paq)?)
            };
            Uri::from_parts(uri_parts)?
        };

        Ok(())
    }

    /// The base string URI: scheme and host in lower case, default ports
    /// dropped, no query and no fragment.
    ///
    /// ## Reference
    ///
    /// - [RFC 5849 3.4.1.2](https://www.rfc-editor.org/rfc/rfc5849#section-3.4.1.2)
    pub fn base_url(&self) -> String {
        let scheme = self.scheme.as_str().to_ascii_lowercase();
        let host = self.authority.host().to_ascii_lowercase();
        let port = match (scheme.as_str(), self.authority.port_u16()) {
            ("http", Some(80)) | ("https", Some(443)) | (_, None) => String::new(),
            (_, Some(port)) => format!(":{port}"),
        };
        let path = if self.path.is_empty() { "/" } else { &self.path };

        format!("{scheme}://{host}{port}{path}")
    }

    /// Push a new query pair into query list.
    #[inline]
    pub fn query_push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.push((key.into(), value.into()));
    }

    /// Get the first query value for `key`.
    pub fn query_get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Drop every query pair for which `filter` returns `false`.
    pub fn query_retain(&mut self, filter: impl Fn(&str) -> bool) {
        self.query.retain(|(k, _)| filter(k));
    }

    /// Get query value by filter.
    pub fn query_to_vec_with_filter(&self, filter: impl Fn(&str) -> bool) -> Vec<(String, String)> {
        self.query
            .iter()
            // Filter all queries
            .filter(|(k, _)| filter(k))
            // Clone all queries
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Convert query to an encoded string, keeping insertion order.
    ///
    /// ```shell
    /// [(a, b c), (d, e)] => "a=b%20c&d=e"
    /// ```
    pub fn query_to_encoded_string(query: &[(String, String)]) -> String {
        let mut s = String::with_capacity(16);

        for (idx, (k, v)) in query.iter().enumerate() {
            if idx != 0 {
                s.push('&');
            }

            s.push_str(&percent_encode(k));
            s.push('=');
            s.push_str(&percent_encode(v));
        }

        s
    }

    /// Convert query to percent encoded string, sorted by encoded key then
    /// encoded value.
    ///
    /// ```shell
    /// [(c, d), (a, b)] => "a=b&c=d"
    /// ```
    pub fn query_to_percent_encoded_string(
        query: Vec<(String, String)>,
        sep: &str,
        join: &str,
    ) -> String {
        let mut query: Vec<(String, String)> = query
            .into_iter()
            .map(|(k, v)| (percent_encode(&k), percent_encode(&v)))
            .collect();
        // Sort via encoded name, then encoded value.
        query.sort();

        let mut s = String::with_capacity(16);
        for (idx, (k, v)) in query.into_iter().enumerate() {
            if idx != 0 {
                s.push_str(join);
            }

            s.push_str(&k);
            s.push_str(sep);
            s.push_str(&v);
        }

        s
    }
}
