use http::header::HeaderName;
use http::HeaderMap;
use http::Method;
use http::Uri;

use crate::Result;

/// The transient view of a request that signers work on.
///
/// It is built fresh for every call and never outlives the signing of that request.
#[derive(Debug, Clone)]
pub struct SigningRequest {
    /// HTTP method.
    pub method: Method,
    /// Full request uri, path still percent-encoded.
    pub uri: Uri,
    /// HTTP headers in insertion order.
    pub headers: HeaderMap,
}

impl SigningRequest {
    /// Build a signing request from `http::request::Parts`.
    pub fn build(parts: &http::request::Parts) -> Self {
        SigningRequest {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
        }
    }

    /// Get the uri path, `/` if empty.
    pub fn path(&self) -> &str {
        match self.uri.path() {
            "" => "/",
            v => v,
        }
    }

    /// Get the uri path percent decoded.
    pub fn path_percent_decoded(&self) -> String {
        percent_encoding::percent_decode_str(self.path())
            .decode_utf8_lossy()
            .into_owned()
    }

    /// Get query pairs with keys and values form-decoded, in uri order.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.uri
            .query()
            .map(|v| {
                form_urlencoded::parse(v.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get header value by name.
    ///
    /// Returns empty string if header not found.
    #[inline]
    pub fn header_get_or_default(&self, key: &HeaderName) -> Result<&str> {
        match self.headers.get(key) {
            Some(v) => Ok(v.to_str()?),
            None => Ok(""),
        }
    }

    /// Get headers whose lowercased name starts with `prefix`.
    ///
    /// Repeated headers are folded into one comma separated value.
    pub fn header_to_vec_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        let mut out: Vec<(String, String)> = Vec::new();
        for key in self.headers.keys() {
            // HeaderName is always lowercase.
            let name = key.as_str();
            if !name.starts_with(prefix) {
                continue;
            }

            let mut values = Vec::new();
            for v in self.headers.get_all(key) {
                values.push(v.to_str()?);
            }
            out.push((name.to_string(), values.join(",")));
        }

        Ok(out)
    }

    /// Convert sorted headers to string.
    ///
    /// ```shell
    /// [(a, b), (c, d)] => "a:b\nc:d"
    /// ```
    pub fn header_to_string(mut headers: Vec<(String, String)>, sep: &str, join: &str) -> String {
        let mut s = String::with_capacity(16);

        // Sort via header name.
        headers.sort();

        for (idx, (k, v)) in headers.into_iter().enumerate() {
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
