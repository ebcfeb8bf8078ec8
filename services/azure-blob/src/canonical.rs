//! Deterministic strings used as HMAC input.
//!
//! ## Reference
//!
//! - [Constructing the canonicalized headers string](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#constructing-the-canonicalized-headers-string)
//! - [Constructing the canonicalized resource string](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key#constructing-the-canonicalized-resource-string)

use std::collections::BTreeMap;

use azblob_core::{Result, SigningRequest};

/// Lowercased `x-ms-*` headers sorted by name, one `name:value` per line.
pub fn canonicalize_headers(req: &SigningRequest) -> Result<String> {
    Ok(SigningRequest::header_to_string(
        req.header_to_vec_with_prefix("x-ms-")?,
        ":",
        "\n",
    ))
}

/// `/{service}/{account}{path}` followed by one line per query parameter.
///
/// `url_safe` keeps the path as sent on the wire, which header signing expects.
/// SAS signing wants the decoded path instead. Query names are lowercased and
/// multi-values are trimmed, sorted and joined with `,`.
pub fn canonicalize_resource(
    req: &SigningRequest,
    account_name: &str,
    service_name: Option<&str>,
    url_safe: bool,
) -> String {
    let path = if url_safe {
        req.path().to_string()
    } else {
        req.path_percent_decoded()
    };

    let mut s = String::with_capacity(64);
    if let Some(service) = service_name {
        s.push('/');
        s.push_str(service);
    }
    s.push('/');
    s.push_str(account_name);
    s.push_str(&path);

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (k, v) in req.query_pairs() {
        params
            .entry(k.to_lowercase())
            .or_default()
            .push(v.trim().to_string());
    }

    for (k, mut values) in params {
        values.sort();
        s.push('\n');
        s.push_str(&k);
        s.push(':');
        s.push_str(&values.join(","));
    }

    s
}
