// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

use azblob_core::time::{format_http_date, now};
use azblob_core::{Context, Error, Result, SigningRequest};
use bytes::{Buf, Bytes};
use http::header::{HeaderName, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, Method, Request, Response, StatusCode, Uri};
use log::debug;
use quick_xml::de;
use serde::Deserialize;

use crate::constants::*;
use crate::sign_request::Signer;

/// Classification of a non-2xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// 404
    NotFound,
    /// 403
    Forbidden,
    /// The service reported `Md5Mismatch`.
    Integrity,
    /// Everything else.
    Other,
}

/// ApiError is a non-2xx response from the storage service or an identity endpoint.
///
/// It is attached as the source of the returned [`Error`], use
/// `Error::source_as::<ApiError>()` to get the raw body back.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Classified kind.
    pub kind: ApiErrorKind,
    /// Response status.
    pub status: StatusCode,
    /// Service error code from the body or the `x-ms-error-code` header.
    pub code: Option<String>,
    /// Raw response body.
    pub body: Bytes,
}

impl Display for ApiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(code) = &self.code {
            write!(f, ", code {code}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

/// Error body returned by the storage service.
#[derive(Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct AzblobError {
    code: String,
    message: String,
}

impl Debug for AzblobError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzblobError")
            .field("code", &self.code)
            // replace `\n` to ` ` for better reading.
            .field("message", &self.message.replace('\n', " "))
            .finish()
    }
}

/// Parse a non-2xx response into an [`Error`].
pub fn parse_error(resp: Response<Bytes>) -> Error {
    let (parts, body) = resp.into_parts();

    let parsed = de::from_reader::<_, AzblobError>(body.clone().reader()).ok();
    let code = parsed
        .as_ref()
        .map(|v| v.code.clone())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            parts
                .headers
                .get(X_MS_ERROR_CODE)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string())
        });

    let kind = match (parts.status, code.as_deref()) {
        (_, Some("Md5Mismatch")) => ApiErrorKind::Integrity,
        (StatusCode::NOT_FOUND, _) => ApiErrorKind::NotFound,
        (StatusCode::FORBIDDEN, _) => ApiErrorKind::Forbidden,
        _ => ApiErrorKind::Other,
    };

    let message = match &parsed {
        Some(v) if !v.code.is_empty() => format!("{v:?}"),
        _ => String::from_utf8_lossy(&body).into_owned(),
    };
    let message = if message.is_empty() {
        format!("request failed with status {}", parts.status)
    } else {
        message
    };

    let err = match kind {
        ApiErrorKind::NotFound => Error::not_found(message),
        ApiErrorKind::Forbidden => Error::forbidden(message),
        ApiErrorKind::Integrity => Error::integrity(message),
        ApiErrorKind::Other => Error::unexpected(message),
    };

    err.with_status(parts.status).with_source(ApiError {
        kind,
        status: parts.status,
        code,
        body,
    })
}

/// A request before protocol headers and authorization are applied.
#[derive(Debug, Clone)]
pub struct BlobRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    metadata: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
    body: Bytes,
}

impl BlobRequest {
    /// Create a request without body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            metadata: BTreeMap::new(),
            tags: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set a header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers
            .insert(HeaderName::try_from(name)?, HeaderValue::try_from(value)?);
        Ok(self)
    }

    /// Set a header if `value` is present.
    pub fn header_opt(self, name: &str, value: Option<&str>) -> Result<Self> {
        match value {
            Some(v) => self.header(name, v),
            None => Ok(self),
        }
    }

    /// Merge extra headers, names are given without the `x-ms-` prefix.
    pub fn extra_headers(mut self, headers: &BTreeMap<String, String>) -> Result<Self> {
        for (k, v) in headers {
            self = self.header(&format!("x-ms-{k}"), v)?;
        }
        Ok(self)
    }

    /// Custom metadata sent as `x-ms-meta-*` headers.
    pub fn metadata(mut self, metadata: &BTreeMap<String, String>) -> Self {
        self.metadata.extend(metadata.clone());
        self
    }

    /// Blob index tags sent as the `x-ms-tags` header.
    pub fn tags(mut self, tags: &BTreeMap<String, String>) -> Self {
        self.tags.extend(tags.clone());
        self
    }

    /// Set the body.
    pub fn body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// Transport applies protocol headers, signs and sends requests.
#[derive(Clone)]
pub struct Transport {
    ctx: Context,
    signer: Arc<dyn Signer>,
}

impl Debug for Transport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("signer", &self.signer)
            .finish_non_exhaustive()
    }
}

impl Transport {
    /// Create a new transport.
    pub fn new(ctx: Context, signer: Arc<dyn Signer>) -> Self {
        Self { ctx, signer }
    }

    /// The context requests are sent through.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// The signer authorizing requests.
    pub fn signer(&self) -> &Arc<dyn Signer> {
        &self.signer
    }

    /// Send the request, any non-2xx response becomes an error.
    pub async fn send(&self, req: BlobRequest) -> Result<Response<Bytes>> {
        let resp = self.send_unchecked(req).await?;
        if resp.status().is_success() {
            Ok(resp)
        } else {
            Err(parse_error(resp))
        }
    }

    /// Send the request and hand back whatever the service returned.
    pub async fn send_unchecked(&self, req: BlobRequest) -> Result<Response<Bytes>> {
        let req = self.prepare(req).await?;
        debug!("sending {} {}", req.method(), req.uri());

        let resp = self.ctx.http_send(req).await?;
        debug!("got response status {}", resp.status());
        Ok(resp)
    }

    async fn prepare(&self, req: BlobRequest) -> Result<Request<Bytes>> {
        let BlobRequest {
            method,
            uri,
            mut headers,
            metadata,
            tags,
            body,
        } = req;

        for (k, v) in &metadata {
            headers.insert(
                HeaderName::try_from(format!("{X_MS_META_PREFIX}{k}"))?,
                HeaderValue::try_from(v.as_str())?,
            );
        }
        if !tags.is_empty() {
            let encoded = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(tags.iter())
                .finish();
            headers.insert(X_MS_TAGS, HeaderValue::try_from(encoded)?);
        }

        headers.insert(X_MS_VERSION, HeaderValue::from_static(API_VERSION));
        headers.insert(X_MS_DATE, HeaderValue::try_from(format_http_date(now()))?);
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(""));
        }
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        if headers
            .get(CONTENT_MD5)
            .is_some_and(|v| v.as_bytes().is_empty())
        {
            headers.remove(CONTENT_MD5);
        }

        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(h) = builder.headers_mut() {
            *h = headers;
        }
        let (mut parts, body) = builder.body(body)?.into_parts();

        let authorization = self
            .signer
            .authorization(&self.ctx, &SigningRequest::build(&parts))
            .await?;
        let mut value = HeaderValue::try_from(authorization)?;
        value.set_sensitive(true);
        parts.headers.insert(AUTHORIZATION, value);

        Ok(Request::from_parts(parts, body))
    }
}
