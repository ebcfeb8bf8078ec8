use std::fmt::{Debug, Formatter};
use std::str::FromStr;

use azblob_core::hash::base64_decode;
use azblob_core::utils::Redact;
use azblob_core::{Context, Error, Result};

use crate::constants::*;
use crate::Credential;

pub const AZBLOB_ACCOUNT_NAME: &str = "AZBLOB_ACCOUNT_NAME";
pub const AZBLOB_ACCOUNT_KEY: &str = "AZBLOB_ACCOUNT_KEY";
pub const AZBLOB_CONTAINER: &str = "AZBLOB_CONTAINER";
pub const AZBLOB_ENDPOINT: &str = "AZBLOB_ENDPOINT";
pub const IDENTITY_ENDPOINT: &str = "IDENTITY_ENDPOINT";
pub const IDENTITY_HEADER: &str = "IDENTITY_HEADER";
pub const AZURE_PRINCIPAL_ID: &str = "AZURE_PRINCIPAL_ID";
pub const AZURE_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const AZURE_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";
pub const AZURE_AUTHORITY_HOST: &str = "AZURE_AUTHORITY_HOST";

/// Azure cloud the account lives in, selects the endpoint suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CloudRegion {
    /// `core.windows.net`
    #[default]
    Global,
    /// `core.chinacloudapi.cn`
    China,
    /// `core.usgovcloudapi.net`
    UsGovernment,
}

impl CloudRegion {
    /// Endpoint suffix of the blob service in this cloud.
    pub fn suffix(&self) -> &'static str {
        match self {
            CloudRegion::Global => "core.windows.net",
            CloudRegion::China => "core.chinacloudapi.cn",
            CloudRegion::UsGovernment => "core.usgovcloudapi.net",
        }
    }
}

impl FromStr for CloudRegion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "global" => Ok(CloudRegion::Global),
            "china" => Ok(CloudRegion::China),
            "usgovernment" | "us_government" => Ok(CloudRegion::UsGovernment),
            v => Err(Error::config_invalid(format!("unknown cloud region: {v}"))),
        }
    }
}

/// Config carries everything needed to build a [`Client`](crate::Client).
///
/// Nothing here reads the process environment on its own. Call [`Config::from_env`]
/// at the edge of the program to fill unset fields from the environment.
#[derive(Clone, Default)]
pub struct Config {
    /// Storage account name.
    pub account_name: Option<String>,
    /// Container every blob operation is scoped to.
    pub container: Option<String>,
    /// Base64 encoded account key.
    ///
    /// - env value: [`AZBLOB_ACCOUNT_KEY`]
    pub access_key: Option<String>,
    /// Object id of a user assigned managed identity.
    ///
    /// Setting it switches the client to managed identity when no access key is set.
    pub principal_id: Option<String>,
    /// Force managed identities even when an access key is present.
    pub use_managed_identities: bool,
    /// Explicit service endpoint such as `http://127.0.0.1:10000/devstoreaccount1`.
    ///
    /// Overrides the endpoint derived from `account_name` and `cloud`.
    pub host: Option<String>,
    /// Azure cloud used to derive the endpoint.
    pub cloud: CloudRegion,
    /// Identity endpoint replacing the instance metadata service.
    pub identity_endpoint: Option<String>,
    /// Value sent in `X-IDENTITY-HEADER` to the identity endpoint.
    pub identity_header: Option<String>,
    /// Tenant used by workload identity.
    pub tenant_id: Option<String>,
    /// Application id used by workload identity.
    pub client_id: Option<String>,
    /// Path of the federated token file used by workload identity.
    pub federated_token_file: Option<String>,
    /// OAuth authority, defaults to `https://login.microsoftonline.com`.
    pub authority_host: Option<String>,
    /// Bytes per block, uploads larger than this are split.
    pub block_size: Option<usize>,
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("account_name", &self.account_name)
            .field("container", &self.container)
            .field("access_key", &Redact::from(&self.access_key))
            .field("principal_id", &self.principal_id)
            .field("use_managed_identities", &self.use_managed_identities)
            .field("host", &self.host)
            .field("cloud", &self.cloud)
            .field("identity_endpoint", &self.identity_endpoint)
            .field("identity_header", &Redact::from(&self.identity_header))
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("federated_token_file", &self.federated_token_file)
            .field("authority_host", &self.authority_host)
            .field("block_size", &self.block_size)
            .finish()
    }
}

impl Config {
    /// Fill unset fields from the environment exposed by `ctx`.
    pub fn from_env(mut self, ctx: &Context) -> Self {
        let fill = |field: &mut Option<String>, key: &str| {
            if field.is_none() {
                *field = ctx.env_var(key).filter(|v| !v.is_empty());
            }
        };

        fill(&mut self.account_name, AZBLOB_ACCOUNT_NAME);
        fill(&mut self.access_key, AZBLOB_ACCOUNT_KEY);
        fill(&mut self.container, AZBLOB_CONTAINER);
        fill(&mut self.host, AZBLOB_ENDPOINT);
        fill(&mut self.identity_endpoint, IDENTITY_ENDPOINT);
        fill(&mut self.identity_header, IDENTITY_HEADER);
        fill(&mut self.principal_id, AZURE_PRINCIPAL_ID);
        fill(&mut self.tenant_id, AZURE_TENANT_ID);
        fill(&mut self.client_id, AZURE_CLIENT_ID);
        fill(&mut self.federated_token_file, AZURE_FEDERATED_TOKEN_FILE);
        fill(&mut self.authority_host, AZURE_AUTHORITY_HOST);

        self
    }

    /// Account name, required for every credential kind.
    pub fn account_name(&self) -> Result<&str> {
        self.account_name
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config_invalid("`account_name` is required"))
    }

    /// Container name, required by the client.
    pub fn container(&self) -> Result<&str> {
        self.container
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::config_invalid("`container` is required"))
    }

    /// Service endpoint without trailing slash.
    pub fn host(&self) -> Result<String> {
        if let Some(host) = self.host.as_deref().filter(|v| !v.is_empty()) {
            return Ok(host.trim_end_matches('/').to_string());
        }

        Ok(format!(
            "https://{}.blob.{}",
            self.account_name()?,
            self.cloud.suffix()
        ))
    }

    /// Bytes per block for uploads.
    pub fn block_size(&self) -> Result<usize> {
        self.block_size
            .map_or(Ok(DEFAULT_BLOCK_SIZE), check_block_size)
    }

    /// Resolve the single credential this config describes.
    ///
    /// - A non-empty `access_key` selects shared key, unless managed identities are forced.
    /// - A federated token file selects workload identity; tenant and client ids are then required.
    /// - `principal_id` or `use_managed_identities` selects the instance metadata service.
    pub fn credential(&self) -> Result<Credential> {
        let account_name = self.account_name()?;

        let access_key = self.access_key.as_deref().filter(|v| !v.is_empty());
        if let (Some(key), false) = (access_key, self.use_managed_identities) {
            let account_key = base64_decode(key).map_err(|e| {
                Error::config_invalid("`access_key` is not valid base64").with_source(e)
            })?;
            return Ok(Credential::SharedKey {
                account_name: account_name.to_string(),
                account_key,
            });
        }

        if let Some(file) = self
            .federated_token_file
            .as_deref()
            .filter(|v| !v.is_empty())
        {
            let tenant_id = self
                .tenant_id
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::config_invalid("workload identity requires `tenant_id`")
                })?;
            let client_id = self
                .client_id
                .as_deref()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    Error::config_invalid("workload identity requires `client_id`")
                })?;

            return Ok(Credential::WorkloadIdentity {
                client_id: client_id.to_string(),
                tenant_id: tenant_id.to_string(),
                federated_token_file: file.to_string(),
                authority_host: self
                    .authority_host
                    .as_deref()
                    .filter(|v| !v.is_empty())
                    .unwrap_or(DEFAULT_AUTHORITY_HOST)
                    .trim_end_matches('/')
                    .to_string(),
            });
        }

        let principal_id = self.principal_id.clone().filter(|v| !v.is_empty());
        if principal_id.is_some() || self.use_managed_identities {
            return Ok(Credential::ManagedIdentity {
                principal_id,
                identity_endpoint: self.identity_endpoint.clone().filter(|v| !v.is_empty()),
                identity_header: self.identity_header.clone().filter(|v| !v.is_empty()),
            });
        }

        Err(Error::config_invalid(
            "`access_key` cannot be empty. To use managed identities instead, set `principal_id` or `use_managed_identities`",
        ))
    }
}

/// Reject block sizes the service can not take.
pub(crate) fn check_block_size(v: usize) -> Result<usize> {
    match v {
        0 => Err(Error::config_invalid("`block_size` must be positive")),
        v if v > MAX_UPLOAD_SIZE => Err(Error::config_invalid(format!(
            "`block_size` {v} exceeds the max upload size {MAX_UPLOAD_SIZE}"
        ))),
        v => Ok(v),
    }
}
