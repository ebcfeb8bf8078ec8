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

use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};

use crate::{Error, Result};

/// Context carries everything the client needs from the outside world.
///
/// Storage requests, identity endpoint calls, the federated token file, environment
/// lookups and retry delays all go through it, so tests can swap any of them.
///
/// Nothing is wired by default: an unset capability fails when used (http, files),
/// reads as empty (env) or returns immediately (sleep).
///
/// ## Example
///
/// ```
/// use azblob_core::{Context, OsEnv};
///
/// let ctx = Context::new().with_env(OsEnv);
/// assert!(ctx.env_var("AZBLOB_SURELY_UNSET_VARIABLE").is_none());
/// ```
#[derive(Clone)]
pub struct Context {
    http: Arc<dyn HttpSend>,
    files: Arc<dyn FileRead>,
    env: Arc<dyn Env>,
    sleeper: Arc<dyn Sleep>,
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("http", &self.http)
            .field("files", &self.files)
            .field("env", &self.env)
            .field("sleeper", &self.sleeper)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context where every capability is unset.
    pub fn new() -> Self {
        Self {
            http: Arc::new(NoopHttpSend),
            files: Arc::new(NoopFileRead),
            env: Arc::new(NoopEnv),
            sleeper: Arc::new(NoopSleep),
        }
    }

    /// Send requests through `http`.
    pub fn with_http_send(mut self, http: impl HttpSend) -> Self {
        self.http = Arc::new(http);
        self
    }

    /// Read files through `files`.
    pub fn with_file_read(mut self, files: impl FileRead) -> Self {
        self.files = Arc::new(files);
        self
    }

    /// Look up variables in `env`.
    pub fn with_env(mut self, env: impl Env) -> Self {
        self.env = Arc::new(env);
        self
    }

    /// Wait between retries with `sleeper`.
    pub fn with_sleep(mut self, sleeper: impl Sleep) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Send `req`, any status counts as a response.
    #[inline]
    pub async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        self.http.http_send(req).await
    }

    /// Read the whole file at `path`.
    #[inline]
    pub async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        self.files.file_read(path).await
    }

    /// Read the whole file at `path` as utf-8 text.
    pub async fn file_read_as_string(&self, path: &str) -> Result<String> {
        let content = self.file_read(path).await?;
        String::from_utf8(content).map_err(|e| {
            Error::config_invalid(format!("file {path} is not valid utf-8")).with_source(e)
        })
    }

    /// Value of the variable `key`, `None` when unset or not utf-8.
    #[inline]
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env.var(key)
    }

    /// Wait for `dur`.
    #[inline]
    pub async fn sleep(&self, dur: Duration) {
        self.sleeper.sleep(dur).await
    }
}

/// HttpSend performs one HTTP exchange.
///
/// Non-2xx responses are returned as `Ok`, callers classify them. Only failures to
/// get a response at all are errors.
#[async_trait]
pub trait HttpSend: Debug + Send + Sync + 'static {
    /// Send `req` and collect the whole response body.
    async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>>;
}

/// FileRead loads files, such as the federated token of a workload identity.
#[async_trait]
pub trait FileRead: Debug + Send + Sync + 'static {
    /// Read the whole file at `path`.
    async fn file_read(&self, path: &str) -> Result<Vec<u8>>;
}

/// Env looks up configuration variables.
pub trait Env: Debug + Send + Sync + 'static {
    /// Value of the variable `key`, `None` when unset or not utf-8.
    fn var(&self, key: &str) -> Option<String>;
}

/// Sleep waits between identity endpoint retries.
#[async_trait]
pub trait Sleep: Debug + Send + Sync + 'static {
    /// Wait for `dur`.
    async fn sleep(&self, dur: Duration);
}

/// The variables of the current process.
#[derive(Debug, Copy, Clone)]
pub struct OsEnv;

impl Env for OsEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var_os(key)?.into_string().ok()
    }
}

/// A fixed set of variables.
#[derive(Debug, Clone, Default)]
pub struct StaticEnv {
    /// Variables by name.
    pub envs: HashMap<String, String>,
}

impl Env for StaticEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.envs.get(key).cloned()
    }
}

/// Fails every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHttpSend;

#[async_trait]
impl HttpSend for NoopHttpSend {
    async fn http_send(&self, req: Request<Bytes>) -> Result<Response<Bytes>> {
        Err(Error::unexpected(format!(
            "no http client configured to send {} {}",
            req.method(),
            req.uri()
        )))
    }
}

/// Fails every read.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFileRead;

#[async_trait]
impl FileRead for NoopFileRead {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        Err(Error::unexpected(format!(
            "no file reader configured to read {path}"
        )))
    }
}

/// Has no variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEnv;

impl Env for NoopEnv {
    fn var(&self, _: &str) -> Option<String> {
        None
    }
}

/// Returns at once, retries still happen but back to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSleep;

#[async_trait]
impl Sleep for NoopSleep {
    async fn sleep(&self, _: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_unset_capabilities() {
        let ctx = Context::new();

        let err = ctx
            .http_send(Request::new(Bytes::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert!(ctx.file_read("/var/run/token").await.is_err());
        assert_eq!(ctx.env_var("AZURE_CLIENT_ID"), None);
        ctx.sleep(Duration::from_secs(3600)).await;
    }

    #[test]
    fn test_static_env() {
        let ctx = Context::new().with_env(StaticEnv {
            envs: HashMap::from([("AZURE_TENANT_ID".to_string(), "tenant".to_string())]),
        });

        assert_eq!(ctx.env_var("AZURE_TENANT_ID").as_deref(), Some("tenant"));
        assert_eq!(ctx.env_var("AZURE_CLIENT_ID"), None);
    }
}
