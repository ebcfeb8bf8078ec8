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

//! Tokio-based file reading for azblob.
//!
//! The workload identity flow reads its federated token file on every token refresh,
//! so the file is read through `Context` rather than once at startup.
//!
//! ```no_run
//! use azblob_core::{Context, OsEnv};
//! use azblob_file_read_tokio::TokioFileRead;
//!
//! # async fn example() -> azblob_core::Result<()> {
//! let ctx = Context::new()
//!     .with_file_read(TokioFileRead)
//!     .with_env(OsEnv);
//!
//! let token = ctx
//!     .file_read_as_string("/var/run/secrets/azure/tokens/azure-identity-token")
//!     .await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use azblob_core::{Error, FileRead, Result};

/// Tokio-based implementation of the `FileRead` trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileRead;

#[async_trait]
impl FileRead for TokioFileRead {
    async fn file_read(&self, path: &str) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(|e| Error::unexpected(format!("failed to read file {path}")).with_source(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azblob_core::Context;
    use std::io::Write;

    #[tokio::test]
    async fn test_read_token_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "  header.payload.signature  ").unwrap();
        let path = f.path().to_string_lossy().to_string();

        let ctx = Context::new().with_file_read(TokioFileRead);
        let content = ctx.file_read_as_string(&path).await.unwrap();
        assert_eq!(content.trim(), "header.payload.signature");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let err = TokioFileRead
            .file_read("/definitely/not/here/token")
            .await
            .unwrap_err();
        assert!(err.message().contains("/definitely/not/here/token"));
    }
}
