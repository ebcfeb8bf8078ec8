use std::fmt::{Debug, Formatter};
use std::sync::RwLock;
use std::time::Duration;

use azblob_core::time::{from_timestamp, now, parse_rfc3339, DateTime};
use azblob_core::utils::Redact;
use azblob_core::{Context, Error, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{Method, Request, StatusCode};
use log::{debug, warn};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::constants::*;
use crate::transport::parse_error;
use crate::Credential;

/// A bearer token and the instant it stops being accepted.
#[derive(Clone)]
pub struct BearerToken {
    /// Token value sent as `Authorization: Bearer {value}`.
    pub value: String,
    /// Expiry asserted by the identity endpoint.
    pub expires_at: DateTime,
}

impl Debug for BearerToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("value", &Redact::from(&self.value))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl BearerToken {
    /// Usable until `expires_at` minus the expiration buffer.
    pub fn is_fresh(&self, now: DateTime) -> bool {
        now < self.expires_at - chrono::TimeDelta::seconds(TOKEN_EXPIRATION_BUFFER)
    }
}

/// Where tokens come from.
#[derive(Clone)]
enum TokenEndpoint {
    /// Instance metadata service or a custom identity endpoint.
    Imds {
        url: String,
        identity_header: Option<String>,
    },
    /// OAuth client credentials with a federated assertion.
    WorkloadIdentity {
        url: String,
        client_id: String,
        federated_token_file: String,
    },
}

impl Debug for TokenEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenEndpoint::Imds {
                url,
                identity_header,
            } => f
                .debug_struct("Imds")
                .field("url", url)
                .field("identity_header", &Redact::from(identity_header))
                .finish(),
            TokenEndpoint::WorkloadIdentity {
                url,
                client_id,
                federated_token_file,
            } => f
                .debug_struct("WorkloadIdentity")
                .field("url", url)
                .field("client_id", client_id)
                .field("federated_token_file", federated_token_file)
                .finish(),
        }
    }
}

/// TokenSource acquires bearer tokens and caches them until they near expiry.
///
/// Reads of a fresh token only take a read lock. Refreshes are serialized so at
/// most one request is in flight, and a failed refresh keeps the previous token.
pub struct TokenSource {
    endpoint: TokenEndpoint,
    token: RwLock<Option<BearerToken>>,
    refresh_lock: Mutex<()>,
}

impl Debug for TokenSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    /// Build a token source for a managed or workload identity credential.
    pub fn new(cred: &Credential) -> Result<Self> {
        let endpoint = match cred {
            Credential::ManagedIdentity {
                principal_id,
                identity_endpoint,
                identity_header,
            } => {
                let (base, api_version) = match identity_endpoint {
                    Some(v) => (v.as_str(), IDENTITY_ENDPOINT_API_VERSION),
                    None => (IMDS_ENDPOINT, IMDS_API_VERSION),
                };
                let mut query = form_urlencoded::Serializer::new(String::new());
                query
                    .append_pair("api-version", api_version)
                    .append_pair("resource", STORAGE_RESOURCE);
                if let Some(id) = principal_id {
                    query.append_pair("principal_id", id);
                }

                TokenEndpoint::Imds {
                    url: format!("{base}?{}", query.finish()),
                    identity_header: identity_header.clone(),
                }
            }
            Credential::WorkloadIdentity {
                client_id,
                tenant_id,
                federated_token_file,
                authority_host,
            } => TokenEndpoint::WorkloadIdentity {
                url: format!("{authority_host}/{tenant_id}/oauth2/v2.0/token"),
                client_id: client_id.clone(),
                federated_token_file: federated_token_file.clone(),
            },
            Credential::SharedKey { .. } => {
                return Err(Error::config_invalid(
                    "shared key credential has no token endpoint",
                ))
            }
        };

        Ok(Self {
            endpoint,
            token: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Return the cached token, refreshing it first if it is missing or about to expire.
    pub async fn get_token(&self, ctx: &Context) -> Result<String> {
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(token) = self.cached() {
            return Ok(token);
        }

        let token = self.refresh(ctx).await?;
        debug!("bearer token refreshed, expires at {}", token.expires_at);
        let value = token.value.clone();
        *self.token.write().expect("lock poisoned") = Some(token);
        Ok(value)
    }

    fn cached(&self) -> Option<String> {
        let token = self.token.read().expect("lock poisoned");
        token
            .as_ref()
            .filter(|v| v.is_fresh(now()))
            .map(|v| v.value.clone())
    }

    /// Request a new token, retrying the statuses the identity endpoints ask clients to retry.
    ///
    /// ## Reference
    ///
    /// - [Error handling](https://learn.microsoft.com/en-us/entra/identity/managed-identities-azure-resources/how-to-use-vm-token#error-handling)
    async fn refresh(&self, ctx: &Context) -> Result<BearerToken> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self.request(ctx).await {
                Ok(token) => return Ok(token),
                Err(err) => err,
            };

            let Some(status) = err.status() else {
                return Err(err);
            };
            if !is_retryable(status) {
                return Err(err);
            }
            if attempt >= MAX_TOKEN_ATTEMPTS {
                return Err(Error::token_acquisition(format!(
                    "identity endpoint still failing after {attempt} attempts"
                ))
                .with_status(status)
                .with_source(err));
            }

            // A revoked token restarts the schedule.
            if status == StatusCode::GONE {
                attempt = 1;
            }
            let delay = BACKOFF_SCHEDULE.get(attempt - 1).ok_or_else(|| {
                Error::token_acquisition(format!("backoff out of bounds at attempt {attempt}"))
            })?;

            warn!("identity endpoint returned {status}, retrying in {delay}s");
            ctx.sleep(Duration::from_secs(*delay)).await;
        }
    }

    async fn request(&self, ctx: &Context) -> Result<BearerToken> {
        let req = match &self.endpoint {
            TokenEndpoint::Imds {
                url,
                identity_header,
            } => {
                let mut req = Request::builder()
                    .method(Method::GET)
                    .uri(url)
                    .header("Metadata", "true");
                if let Some(v) = identity_header {
                    req = req.header(X_IDENTITY_HEADER, v);
                }
                req.body(Bytes::new())?
            }
            TokenEndpoint::WorkloadIdentity {
                url,
                client_id,
                federated_token_file,
            } => {
                let assertion = ctx.file_read_as_string(federated_token_file).await?;
                let body = form_urlencoded::Serializer::new(String::new())
                    .append_pair("client_id", client_id)
                    .append_pair("scope", STORAGE_SCOPE)
                    .append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE)
                    .append_pair("client_assertion", assertion.trim())
                    .append_pair("grant_type", "client_credentials")
                    .finish();

                Request::builder()
                    .method(Method::POST)
                    .uri(url)
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Bytes::from(body))?
            }
        };

        let resp = ctx.http_send(req).await?;
        if !resp.status().is_success() {
            return Err(parse_error(resp));
        }

        parse_token_response(resp.body(), now())
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error()
        || matches!(
            status,
            StatusCode::NOT_FOUND
                | StatusCode::REQUEST_TIMEOUT
                | StatusCode::GONE
                | StatusCode::TOO_MANY_REQUESTS
        )
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
}

/// Seconds given either as a JSON number or a numeric string.
fn as_seconds(v: &serde_json::Value) -> Option<i64> {
    match v {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Parse `access_token` plus `expires_on` (absolute epoch) or `expires_in` (relative).
fn parse_token_response(body: &[u8], now: DateTime) -> Result<BearerToken> {
    let resp: TokenResponse = serde_json::from_slice(body)
        .map_err(|e| Error::protocol("failed to parse token response").with_source(e))?;

    let expires_at = match (&resp.expires_on, &resp.expires_in) {
        (Some(on), _) => match (as_seconds(on), on.as_str()) {
            (Some(secs), _) => from_timestamp(secs)?,
            (None, Some(s)) => parse_rfc3339(s)?,
            (None, None) => return Err(Error::protocol("invalid expires_on in token response")),
        },
        (None, Some(inv)) => {
            let delta = as_seconds(inv)
                .and_then(chrono::TimeDelta::try_seconds)
                .ok_or_else(|| Error::protocol("invalid expires_in in token response"))?;
            now + delta
        }
        (None, None) => return Err(Error::protocol("token response has no expiry")),
    };

    Ok(BearerToken {
        value: resp.access_token,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use azblob_core::ErrorKind;
    use chrono::TimeZone;

    #[test]
    fn test_parse_token_response() {
        let now = chrono::Utc.with_ymd_and_hms(2022, 3, 1, 8, 0, 0).unwrap();

        let token =
            parse_token_response(br#"{"access_token":"a","expires_on":"1646122354"}"#, now)
                .unwrap();
        assert_eq!(token.value, "a");
        assert_eq!(token.expires_at.timestamp(), 1646122354);

        let token =
            parse_token_response(br#"{"access_token":"b","expires_on":1646122354}"#, now).unwrap();
        assert_eq!(token.expires_at.timestamp(), 1646122354);

        let token =
            parse_token_response(br#"{"access_token":"c","expires_in":3599}"#, now).unwrap();
        assert_eq!(token.expires_at, now + chrono::TimeDelta::seconds(3599));

        let token = parse_token_response(
            br#"{"access_token":"d","expires_on":"2022-03-01T08:12:34Z"}"#,
            now,
        )
        .unwrap();
        assert_eq!(token.expires_at.timestamp(), 1646122354);
    }

    #[test]
    fn test_parse_token_response_missing_fields() {
        let now = now();
        let err = parse_token_response(br#"{"expires_in":3599}"#, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err = parse_token_response(br#"{"access_token":"a"}"#, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_token_freshness() {
        let now = now();
        let token = BearerToken {
            value: "t".to_string(),
            expires_at: now + chrono::TimeDelta::seconds(TOKEN_EXPIRATION_BUFFER + 1),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + chrono::TimeDelta::seconds(1)));
    }

    #[test]
    fn test_retryable_statuses() {
        for status in [404, 408, 410, 429, 500, 503] {
            assert!(is_retryable(StatusCode::from_u16(status).unwrap()), "{status}");
        }
        for status in [400, 401, 403, 409] {
            assert!(!is_retryable(StatusCode::from_u16(status).unwrap()), "{status}");
        }
    }

    #[test]
    fn test_imds_url() {
        let source = TokenSource::new(&Credential::ManagedIdentity {
            principal_id: Some("oid".to_string()),
            identity_endpoint: None,
            identity_header: None,
        })
        .unwrap();

        match source.endpoint {
            TokenEndpoint::Imds { url, .. } => assert_eq!(
                url,
                "http://169.254.169.254/metadata/identity/oauth2/token?api-version=2018-02-01&resource=https%3A%2F%2Fstorage.azure.com%2F&principal_id=oid"
            ),
            v => panic!("unexpected endpoint: {v:?}"),
        }
    }
}
