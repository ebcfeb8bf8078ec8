//! Azure Blob Storage client
//!
//! This crate talks to one container of a storage account:
//! - Shared Key and bearer token (managed identity, workload identity) authentication
//! - SAS urls signed with the account key or a user delegation key
//! - Block uploads split into put block + put block list
//! - Lazy blob listing
//!
//! # Example
//!
//! ```rust,no_run
//! use anyhow::Result;
//! use azblob::{Client, Config, PutOptions, SasOptions};
//! use azblob_core::{Context, OsEnv};
//! use azblob_file_read_tokio::TokioFileRead;
//! use azblob_http_send_reqwest::ReqwestHttpSend;
//! use azblob_sleep_tokio::TokioSleep;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let ctx = Context::new()
//!         .with_file_read(TokioFileRead)
//!         .with_http_send(ReqwestHttpSend::default())
//!         .with_sleep(TokioSleep)
//!         .with_env(OsEnv);
//!
//!     // Reads AZBLOB_ACCOUNT_NAME, AZBLOB_ACCOUNT_KEY, AZBLOB_CONTAINER and friends.
//!     let config = Config::default().from_env(&ctx);
//!     let client = Client::new(ctx, &config)?;
//!
//!     client
//!         .create_block_blob("hello.txt", "hello world!".into(), &PutOptions::default())
//!         .await?;
//!
//!     let expiry = chrono::Utc::now() + chrono::TimeDelta::seconds(300);
//!     let url = client
//!         .signed_uri("hello.txt", &SasOptions::new("r", expiry))
//!         .await?;
//!     println!("share: {url}");
//!
//!     Ok(())
//! }
//! ```

mod canonical;
mod constants;

mod blob;
pub use blob::{BlobProperties, ContainerProperties, PublicAccess};

mod block;
pub use block::{BlockId, BlockPlan};

mod client;
pub use client::{BlockOptions, Client, DeleteOptions, GetOptions, ListOptions, PutOptions};

mod config;
pub use config::*;

mod credential;
pub use credential::Credential;

mod delegation_key;
pub use delegation_key::{DelegationKey, DelegationKeyCache};

mod pager;
pub use pager::BlobPager;

mod sign_request;
pub use sign_request::{BearerSigner, SasOptions, SharedKeySigner, Signer};

mod transport;
pub use transport::{ApiError, ApiErrorKind};

mod token;
pub use token::{BearerToken, TokenSource};
