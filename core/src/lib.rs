//! Core components for signing and correlating OAuth 1.0a requests.
//!
//! This crate provides the foundational types shared by the dropsign crates.
//!
//! ## Overview
//!
//! - **Context**: A container that holds implementations for HTTP sending and environment access
//! - **Error**: One error type whose [`ErrorKind`] covers protocol, API, remote and transport failures
//! - **SigningRequest**: A decomposed request whose query can be normalized for signing
//! - **Traits**: [`ProvideCredential`] for loading credentials and [`SigningCredential`] for validating them
//!
//! ## Utilities
//!
//! - [`hash`]: HMAC-SHA1 and base64 helpers
//! - [`time`]: Time helpers
//! - [`utils`]: Percent encoding and data redaction

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;
pub mod time;
pub mod utils;

mod context;
pub use context::{Context, Env, HttpSend, NoopEnv, NoopHttpSend, OsEnv, StaticEnv};

mod error;
pub use error::{Error, ErrorKind, Result};

mod api;
pub use api::{ProvideCredential, SigningCredential};
mod request;
pub use request::SigningRequest;
