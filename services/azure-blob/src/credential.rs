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

use azblob_core::utils::{Redact, RedactBytes};
use std::fmt::{Debug, Formatter};

/// Credential enum for the authentication methods a client can run with.
///
/// Exactly one variant is resolved by [`Config::credential`](crate::Config::credential)
/// and it never changes for the life of the client.
#[derive(Clone)]
pub enum Credential {
    /// Shared Key authentication with account name and key.
    SharedKey {
        /// Azure storage account name.
        account_name: String,
        /// Decoded account key.
        account_key: Vec<u8>,
    },
    /// Bearer tokens from the instance metadata service or a custom identity endpoint.
    ManagedIdentity {
        /// Object id of a user assigned identity.
        principal_id: Option<String>,
        /// Replaces the instance metadata service endpoint.
        identity_endpoint: Option<String>,
        /// Sent as `X-IDENTITY-HEADER`.
        identity_header: Option<String>,
    },
    /// Bearer tokens exchanged for a federated token file.
    WorkloadIdentity {
        /// Application id.
        client_id: String,
        /// Tenant id.
        tenant_id: String,
        /// Path to the federated token, read on every refresh.
        federated_token_file: String,
        /// OAuth authority without trailing slash.
        authority_host: String,
    },
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SharedKey {
                account_name,
                account_key,
            } => f
                .debug_struct("Credential::SharedKey")
                .field("account_name", account_name)
                .field("account_key", &RedactBytes(account_key))
                .finish(),
            Credential::ManagedIdentity {
                principal_id,
                identity_endpoint,
                identity_header,
            } => f
                .debug_struct("Credential::ManagedIdentity")
                .field("principal_id", principal_id)
                .field("identity_endpoint", identity_endpoint)
                .field("identity_header", &Redact::from(identity_header))
                .finish(),
            Credential::WorkloadIdentity {
                client_id,
                tenant_id,
                federated_token_file,
                authority_host,
            } => f
                .debug_struct("Credential::WorkloadIdentity")
                .field("client_id", client_id)
                .field("tenant_id", tenant_id)
                .field("federated_token_file", federated_token_file)
                .field("authority_host", authority_host)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_hides_secrets() {
        let cred = Credential::SharedKey {
            account_name: "acct".to_string(),
            account_key: b"super-secret-key".to_vec(),
        };
        let out = format!("{cred:?}");
        assert!(out.contains("<16 bytes>"));
        assert!(!out.contains("super-secret-key"));

        let cred = Credential::ManagedIdentity {
            principal_id: None,
            identity_endpoint: None,
            identity_header: Some("identity-header-value".to_string()),
        };
        assert!(!format!("{cred:?}").contains("identity-header-value"));
    }
}
