use std::fmt::{Debug, Formatter};
use std::sync::{Arc, RwLock};

use azblob_core::hash::base64_decode;
use azblob_core::time::{format_http_date, format_iso8601, now, parse_rfc3339, DateTime};
use azblob_core::utils::RedactBytes;
use azblob_core::{Context, Error, Result};
use bytes::{Buf, Bytes};
use http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Method, Request};
use log::debug;
use quick_xml::de;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::constants::*;
use crate::token::TokenSource;
use crate::transport::parse_error;

/// A user delegation key, used to sign SAS tokens without an account key.
///
/// The value is replaced as a whole on refresh.
#[derive(Clone)]
pub struct DelegationKey {
    /// `skoid`
    pub signed_oid: String,
    /// `sktid`
    pub signed_tid: String,
    /// `skt`
    pub signed_start: String,
    /// `ske`
    pub signed_expiry: String,
    /// `sks`
    pub signed_service: String,
    /// `skv`
    pub signed_version: String,
    /// Decoded key material.
    pub key: Vec<u8>,
    /// Parsed `signed_expiry`.
    pub expires_at: DateTime,
}

impl Debug for DelegationKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationKey")
            .field("signed_oid", &self.signed_oid)
            .field("signed_tid", &self.signed_tid)
            .field("signed_start", &self.signed_start)
            .field("signed_expiry", &self.signed_expiry)
            .field("signed_service", &self.signed_service)
            .field("signed_version", &self.signed_version)
            .field("key", &RedactBytes(&self.key))
            .finish()
    }
}

impl DelegationKey {
    /// Usable until `signed_expiry` minus the expiration buffer.
    pub fn is_fresh(&self, now: DateTime) -> bool {
        now < self.expires_at - chrono::TimeDelta::seconds(DELEGATION_KEY_EXPIRATION_BUFFER)
    }
}

#[derive(Default, Debug, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct UserDelegationKeyOutput {
    signed_oid: Option<String>,
    signed_tid: Option<String>,
    signed_start: Option<String>,
    signed_expiry: Option<String>,
    signed_service: Option<String>,
    signed_version: Option<String>,
    value: Option<String>,
}

/// Request body of Get User Delegation Key.
#[derive(Debug, serde::Serialize)]
#[serde(rename = "KeyInfo", rename_all = "PascalCase")]
struct KeyInfo {
    start: String,
    expiry: String,
}

/// DelegationKeyCache fetches user delegation keys and caches them until they near expiry.
///
/// ## Reference
///
/// - [Get User Delegation Key](https://learn.microsoft.com/en-us/rest/api/storageservices/get-user-delegation-key)
pub struct DelegationKeyCache {
    host: String,
    key: RwLock<Option<Arc<DelegationKey>>>,
    refresh_lock: Mutex<()>,
}

impl Debug for DelegationKeyCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationKeyCache")
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl DelegationKeyCache {
    /// Create an empty cache for the account at `host`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            key: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return the cached key, fetching a new one first if it is missing or about to expire.
    pub async fn get_key(&self, ctx: &Context, tokens: &TokenSource) -> Result<Arc<DelegationKey>> {
        if let Some(key) = self.cached() {
            return Ok(key);
        }

        let _guard = self.refresh_lock.lock().await;
        if let Some(key) = self.cached() {
            return Ok(key);
        }

        let key = Arc::new(self.refresh(ctx, tokens).await?);
        debug!("user delegation key refreshed, expires at {}", key.expires_at);
        *self.key.write().expect("lock poisoned") = Some(key.clone());
        Ok(key)
    }

    fn cached(&self) -> Option<Arc<DelegationKey>> {
        let key = self.key.read().expect("lock poisoned");
        key.as_ref().filter(|v| v.is_fresh(now())).cloned()
    }

    async fn refresh(&self, ctx: &Context, tokens: &TokenSource) -> Result<DelegationKey> {
        let token = tokens.get_token(ctx).await?;

        let start = now();
        let content = quick_xml::se::to_string(&KeyInfo {
            start: format_iso8601(start),
            expiry: format_iso8601(
                start + chrono::TimeDelta::seconds(DELEGATION_KEY_EXPIRATION),
            ),
        })
        .map_err(|e| Error::unexpected("failed to serialize key info").with_source(e))?;
        let content = format!(r#"<?xml version="1.0" encoding="utf-8"?>{content}"#);

        let mut authorization = HeaderValue::try_from(format!("Bearer {token}"))?;
        authorization.set_sensitive(true);

        let req = Request::builder()
            .method(Method::POST)
            .uri(format!(
                "{}/?restype=service&comp=userdelegationkey",
                self.host
            ))
            .header(X_MS_VERSION, API_VERSION)
            .header(X_MS_DATE, format_http_date(start))
            .header(CONTENT_TYPE, "")
            .header(CONTENT_LENGTH, content.len())
            .header(AUTHORIZATION, authorization)
            .body(Bytes::from(content))?;

        let resp = ctx.http_send(req).await?;
        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }

        parse_delegation_key(resp.into_body())
    }
}

fn parse_delegation_key(body: Bytes) -> Result<DelegationKey> {
    let output: UserDelegationKeyOutput = de::from_reader(body.reader()).map_err(|e| {
        Error::protocol("failed to parse user delegation key response").with_source(e)
    })?;

    let required = |name: &str, v: Option<String>| {
        v.filter(|v| !v.is_empty()).ok_or_else(|| {
            Error::protocol(format!("user delegation key response misses {name}"))
        })
    };

    let signed_expiry = required("SignedExpiry", output.signed_expiry)?;
    let value = required("Value", output.value)?;

    Ok(DelegationKey {
        signed_oid: required("SignedOid", output.signed_oid)?,
        signed_tid: required("SignedTid", output.signed_tid)?,
        signed_start: required("SignedStart", output.signed_start)?,
        signed_service: required("SignedService", output.signed_service)?,
        signed_version: required("SignedVersion", output.signed_version)?,
        key: base64_decode(&value)
            .map_err(|e| Error::protocol("user delegation key is not base64").with_source(e))?,
        expires_at: parse_rfc3339(&signed_expiry)?,
        signed_expiry,
    })
}
