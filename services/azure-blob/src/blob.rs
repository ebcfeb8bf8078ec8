use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use azblob_core::{Error, Result};
use bytes::{Buf, Bytes};
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};
use quick_xml::de;
use serde::Deserialize;

use crate::constants::*;

/// Properties of a blob, read from the headers of a HEAD or GET response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobProperties {
    /// `Content-Type`
    pub content_type: Option<String>,
    /// `Content-Disposition`
    pub content_disposition: Option<String>,
    /// Base64 encoded `Content-MD5`.
    pub checksum: Option<String>,
    /// `Content-Length`
    pub size: Option<u64>,
    /// Custom metadata with the `x-ms-meta-` prefix stripped.
    pub metadata: BTreeMap<String, String>,
}

impl BlobProperties {
    pub(crate) fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            content_type: header_string(headers, CONTENT_TYPE.as_str()),
            content_disposition: header_string(headers, CONTENT_DISPOSITION.as_str()),
            checksum: header_string(headers, CONTENT_MD5),
            size: header_string(headers, CONTENT_LENGTH.as_str()).and_then(|v| v.parse().ok()),
            metadata: parse_metadata(headers),
        }
    }
}

/// Properties of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerProperties {
    /// Whether the service answered 200.
    pub present: bool,
    /// Custom metadata with the `x-ms-meta-` prefix stripped.
    pub metadata: BTreeMap<String, String>,
}

impl ContainerProperties {
    pub(crate) fn from_response(status: StatusCode, headers: &HeaderMap) -> Self {
        Self {
            present: status == StatusCode::OK,
            metadata: parse_metadata(headers),
        }
    }
}

/// Anonymous read access of a new container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicAccess {
    /// Blobs can be read anonymously, the container can not be listed.
    Blob,
    /// Blobs can be read and listed anonymously.
    Container,
}

impl Display for PublicAccess {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PublicAccess::Blob => f.write_str("blob"),
            PublicAccess::Container => f.write_str("container"),
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn parse_metadata(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| {
            let key = k.as_str().strip_prefix(X_MS_META_PREFIX)?;
            let value = v.to_str().ok()?;
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Tags {
    tag_set: TagSet,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct TagSet {
    tag: Vec<Tag>,
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Tag {
    key: String,
    value: String,
}

/// Parse the body of Get Blob Tags.
pub(crate) fn parse_tags(body: Bytes) -> Result<BTreeMap<String, String>> {
    let tags: Tags = de::from_reader(body.reader())
        .map_err(|e| Error::protocol("failed to parse blob tags response").with_source(e))?;

    Ok(tags
        .tag_set
        .tag
        .into_iter()
        .map(|v| (v.key, v.value))
        .collect())
}
