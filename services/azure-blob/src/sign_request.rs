use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use azblob_core::hash::base64_hmac_sha256;
use azblob_core::time::{format_iso8601, DateTime};
use azblob_core::utils::RedactBytes;
use azblob_core::{Context, Result, SigningRequest};
use http::header;
use http::{HeaderMap, Method, Uri};
use log::debug;

use crate::canonical::{canonicalize_headers, canonicalize_resource};
use crate::constants::*;
use crate::delegation_key::{DelegationKey, DelegationKeyCache};
use crate::token::TokenSource;

/// Signer produces authorization values for requests and SAS query strings for urls.
#[async_trait]
pub trait Signer: Debug + Send + Sync + 'static {
    /// Value of the `Authorization` header for `req`.
    async fn authorization(&self, ctx: &Context, req: &SigningRequest) -> Result<String>;

    /// SAS query string granting `opts` on the blob at `uri`.
    async fn sas_token(&self, ctx: &Context, uri: &Uri, opts: &SasOptions) -> Result<String>;
}

/// Options of a service SAS on a single blob.
#[derive(Debug, Clone, Default)]
pub struct SasOptions {
    /// `sp`, such as `r` or `rw`.
    pub permissions: String,
    /// `st`
    pub start: Option<DateTime>,
    /// `se`
    pub expiry: DateTime,
    /// `si`, a stored access policy. Ignored by user delegation SAS.
    pub identifier: Option<String>,
    /// `sip`
    pub ip: Option<String>,
    /// `spr`
    pub protocol: Option<String>,
    /// `rscd`
    pub content_disposition: Option<String>,
    /// `rsct`
    pub content_type: Option<String>,
}

impl SasOptions {
    /// Grant `permissions` until `expiry`.
    pub fn new(permissions: impl Into<String>, expiry: DateTime) -> Self {
        Self {
            permissions: permissions.into(),
            expiry,
            ..Default::default()
        }
    }

    /// Set the start time.
    pub fn with_start(mut self, start: DateTime) -> Self {
        self.start = Some(start);
        self
    }

    /// Override `Content-Disposition` of the response.
    pub fn with_content_disposition(mut self, v: impl Into<String>) -> Self {
        self.content_disposition = Some(v.into());
        self
    }

    /// Override `Content-Type` of the response.
    pub fn with_content_type(mut self, v: impl Into<String>) -> Self {
        self.content_type = Some(v.into());
        self
    }
}

fn sas_resource(uri: &Uri, account_name: &str) -> String {
    let req = SigningRequest {
        method: Method::GET,
        // The query of the target url never takes part in a SAS resource.
        uri: match uri.path_and_query() {
            Some(pq) => Uri::builder()
                .path_and_query(pq.path())
                .build()
                .unwrap_or_else(|_| uri.clone()),
            None => uri.clone(),
        },
        headers: HeaderMap::new(),
    };
    canonicalize_resource(&req, account_name, Some(SAS_SERVICE_BLOB), false)
}

/// Signs with the account key.
///
/// ## Reference
///
/// - [Authorize with Shared Key](https://docs.microsoft.com/en-us/rest/api/storageservices/authorize-with-shared-key)
/// - [Create a service SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-service-sas)
#[derive(Clone)]
pub struct SharedKeySigner {
    account_name: String,
    account_key: Vec<u8>,
}

impl Debug for SharedKeySigner {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account_name", &self.account_name)
            .field("account_key", &RedactBytes(&self.account_key))
            .finish()
    }
}

impl SharedKeySigner {
    /// Create a signer with the decoded account key.
    pub fn new(account_name: impl Into<String>, account_key: Vec<u8>) -> Self {
        Self {
            account_name: account_name.into(),
            account_key,
        }
    }

    /// `SharedKey {account}:{signature}` for `req`.
    ///
    /// Pure function of the request, the date is taken from its headers.
    pub fn authorization_header(&self, req: &SigningRequest) -> Result<String> {
        let string_to_sign = self.string_to_sign(req)?;
        debug!("string to sign: {}", &string_to_sign);

        let signature = base64_hmac_sha256(&self.account_key, string_to_sign.as_bytes());
        Ok(format!("SharedKey {}:{signature}", self.account_name))
    }

    /// Construct string to sign
    ///
    /// ## Format
    ///
    /// ```text
    /// VERB + "\n" +
    /// Content-Encoding + "\n" +
    /// Content-Language + "\n" +
    /// Content-Length + "\n" +
    /// Content-MD5 + "\n" +
    /// Content-Type + "\n" +
    /// Date + "\n" +
    /// If-Modified-Since + "\n" +
    /// If-Match + "\n" +
    /// If-None-Match + "\n" +
    /// If-Unmodified-Since + "\n" +
    /// Range + "\n" +
    /// CanonicalizedHeaders + "\n" +
    /// CanonicalizedResource;
    /// ```
    fn string_to_sign(&self, req: &SigningRequest) -> Result<String> {
        let content_length = match req.header_get_or_default(&header::CONTENT_LENGTH)? {
            "0" => "",
            v => v,
        };
        let content_md5 =
            req.header_get_or_default(&header::HeaderName::from_static(CONTENT_MD5))?;

        let fields = [
            req.method.as_str(),
            req.header_get_or_default(&header::CONTENT_ENCODING)?,
            req.header_get_or_default(&header::CONTENT_LANGUAGE)?,
            content_length,
            content_md5,
            req.header_get_or_default(&header::CONTENT_TYPE)?,
            req.header_get_or_default(&header::DATE)?,
            req.header_get_or_default(&header::IF_MODIFIED_SINCE)?,
            req.header_get_or_default(&header::IF_MATCH)?,
            req.header_get_or_default(&header::IF_NONE_MATCH)?,
            req.header_get_or_default(&header::IF_UNMODIFIED_SINCE)?,
            req.header_get_or_default(&header::RANGE)?,
        ];

        let mut s = fields.join("\n");
        s.push('\n');
        s.push_str(&canonicalize_headers(req)?);
        s.push('\n');
        s.push_str(&canonicalize_resource(req, &self.account_name, None, true));
        Ok(s)
    }

    /// Query string of a service SAS signed with the account key.
    pub fn sas_query(&self, uri: &Uri, opts: &SasOptions) -> String {
        let start = opts.start.map(format_iso8601).unwrap_or_default();
        let expiry = format_iso8601(opts.expiry);
        let resource = sas_resource(uri, &self.account_name);

        let string_to_sign = [
            opts.permissions.as_str(),
            start.as_str(),
            expiry.as_str(),
            resource.as_str(),
            opts.identifier.as_deref().unwrap_or_default(),
            opts.ip.as_deref().unwrap_or_default(),
            opts.protocol.as_deref().unwrap_or_default(),
            API_VERSION,
            SAS_RESOURCE_BLOB,
            // snapshot time
            "",
            // encryption scope
            "",
            // rscc
            "",
            opts.content_disposition.as_deref().unwrap_or_default(),
            // rsce
            "",
            // rscl
            "",
            opts.content_type.as_deref().unwrap_or_default(),
        ]
        .join("\n");
        debug!("sas string to sign: {}", &string_to_sign);

        let signature = base64_hmac_sha256(&self.account_key, string_to_sign.as_bytes());

        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("sp", &opts.permissions)
            .append_pair("sv", API_VERSION);
        if let Some(start) = opts.start {
            query.append_pair("st", &format_iso8601(start));
        }
        query
            .append_pair("se", &expiry)
            .append_pair("sr", SAS_RESOURCE_BLOB);
        append_optional(&mut query, "si", &opts.identifier);
        append_optional(&mut query, "sip", &opts.ip);
        append_optional(&mut query, "spr", &opts.protocol);
        append_optional(&mut query, "rscd", &opts.content_disposition);
        append_optional(&mut query, "rsct", &opts.content_type);
        query.append_pair("sig", &signature);
        query.finish()
    }
}

fn append_optional(
    query: &mut form_urlencoded::Serializer<'_, String>,
    key: &str,
    value: &Option<String>,
) {
    if let Some(v) = value {
        query.append_pair(key, v);
    }
}

#[async_trait]
impl Signer for SharedKeySigner {
    async fn authorization(&self, _: &Context, req: &SigningRequest) -> Result<String> {
        self.authorization_header(req)
    }

    async fn sas_token(&self, _: &Context, uri: &Uri, opts: &SasOptions) -> Result<String> {
        Ok(self.sas_query(uri, opts))
    }
}

/// Signs with Entra ID bearer tokens, SAS tokens use a user delegation key.
///
/// ## Reference
///
/// - [Create a user delegation SAS](https://learn.microsoft.com/en-us/rest/api/storageservices/create-user-delegation-sas)
#[derive(Debug)]
pub struct BearerSigner {
    account_name: String,
    tokens: TokenSource,
    delegation_keys: DelegationKeyCache,
}

impl BearerSigner {
    /// Create a signer for `account_name`, fetching delegation keys from `host`.
    pub fn new(account_name: impl Into<String>, host: &str, tokens: TokenSource) -> Self {
        Self {
            account_name: account_name.into(),
            tokens,
            delegation_keys: DelegationKeyCache::new(host),
        }
    }

    /// Query string of a user delegation SAS signed with `key`.
    pub fn sas_query(&self, uri: &Uri, opts: &SasOptions, key: &DelegationKey) -> String {
        let start = opts.start.map(format_iso8601).unwrap_or_default();
        let expiry = format_iso8601(opts.expiry);
        let resource = sas_resource(uri, &self.account_name);

        let string_to_sign = [
            opts.permissions.as_str(),
            start.as_str(),
            expiry.as_str(),
            resource.as_str(),
            key.signed_oid.as_str(),
            key.signed_tid.as_str(),
            key.signed_start.as_str(),
            key.signed_expiry.as_str(),
            key.signed_service.as_str(),
            key.signed_version.as_str(),
            // saoid
            "",
            // suoid
            "",
            // scid
            "",
            opts.ip.as_deref().unwrap_or_default(),
            opts.protocol.as_deref().unwrap_or_default(),
            API_VERSION,
            SAS_RESOURCE_BLOB,
            // snapshot time
            "",
            // encryption scope
            "",
            // rscc
            "",
            opts.content_disposition.as_deref().unwrap_or_default(),
            // rsce
            "",
            // rscl
            "",
            opts.content_type.as_deref().unwrap_or_default(),
        ]
        .join("\n");
        debug!("sas string to sign: {}", &string_to_sign);

        let signature = base64_hmac_sha256(&key.key, string_to_sign.as_bytes());

        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("sp", &opts.permissions)
            .append_pair("sv", API_VERSION);
        if let Some(start) = opts.start {
            query.append_pair("st", &format_iso8601(start));
        }
        query
            .append_pair("se", &expiry)
            .append_pair("sr", SAS_RESOURCE_BLOB)
            .append_pair("skoid", &key.signed_oid)
            .append_pair("sktid", &key.signed_tid)
            .append_pair("skt", &key.signed_start)
            .append_pair("ske", &key.signed_expiry)
            .append_pair("sks", &key.signed_service)
            .append_pair("skv", &key.signed_version);
        append_optional(&mut query, "sip", &opts.ip);
        append_optional(&mut query, "spr", &opts.protocol);
        append_optional(&mut query, "rscd", &opts.content_disposition);
        append_optional(&mut query, "rsct", &opts.content_type);
        query.append_pair("sig", &signature);
        query.finish()
    }
}

#[async_trait]
impl Signer for BearerSigner {
    async fn authorization(&self, ctx: &Context, _: &SigningRequest) -> Result<String> {
        let token = self.tokens.get_token(ctx).await?;
        Ok(format!("Bearer {token}"))
    }

    async fn sas_token(&self, ctx: &Context, uri: &Uri, opts: &SasOptions) -> Result<String> {
        let key = self.delegation_keys.get_key(ctx, &self.tokens).await?;
        Ok(self.sas_query(uri, opts, &key))
    }
}
