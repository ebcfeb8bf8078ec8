//! Core components shared by the azblob crates.
//!
//! This crate carries the runtime-agnostic pieces of the client:
//!
//! - **Context**: a bundle of capabilities (HTTP sending, file reading, environment
//!   access and sleeping) that the service crate calls through instead of talking to
//!   the operating system directly.
//! - **Error**: the error taxonomy shared by signing, token acquisition and transport.
//! - **SigningRequest**: the transient view of a request used to compute signatures.
//!
//! ## Example
//!
//! ```no_run
//! use azblob_core::{Context, StaticEnv};
//! use std::collections::HashMap;
//!
//! let ctx = Context::new().with_env(StaticEnv {
//!     envs: HashMap::from([("AZBLOB_ACCOUNT_NAME".to_string(), "acct".to_string())]),
//! });
//! assert_eq!(ctx.env_var("AZBLOB_ACCOUNT_NAME").as_deref(), Some("acct"));
//! ```
//!
//! ## Utilities
//!
//! - [`hash`]: base64, HMAC and digest helpers
//! - [`time`]: date formatting and parsing
//! - [`utils`]: data redaction for `Debug` output

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::{
    Context, Env, FileRead, HttpSend, NoopEnv, NoopFileRead, NoopHttpSend, NoopSleep, OsEnv,
    Sleep, StaticEnv,
};

mod error;
pub use error::{Error, ErrorKind, Result};

mod request;
pub use request::SigningRequest;
