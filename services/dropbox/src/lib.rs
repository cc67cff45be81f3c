//! OAuth 1.0a client for the Dropbox v1 API.
//!
//! ## Overview
//!
//! - [`RequestSigner`]: adds the OAuth protocol parameters and a PLAINTEXT or
//!   HMAC-SHA1 signature to a request
//! - [`Registry`]: pending requests, redirect links and delay chains
//! - [`Client`]: the OAuth dance, account info and file content requests,
//!   resolving every completion delivered by its [`Transport`]
//! - [`DropboxFile`]: a buffered file handle on top of the client
//!
//! ## Example
//!
//! ```no_run
//! use dropsign_core::{Context, OsEnv, Result};
//! use dropsign_dropbox::{Client, Config, EnvCredentialProvider};
//! use dropsign_http_send_reqwest::ReqwestHttpSend;
//!
//! # async fn example() -> Result<()> {
//! let ctx = Context::new()
//!     .with_http_send(ReqwestHttpSend::default())
//!     .with_env(OsEnv);
//! let config = Config::new().from_env(&ctx);
//! let mut client = Client::from_provider(ctx, &config, &EnvCredentialProvider::new()).await?;
//!
//! let ticket = client.request_token()?;
//! client.wait(ticket).await?;
//! println!("authorize at {}", client.authorize_link());
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

mod config;
pub use config::Config;

mod constants;

mod credential;
pub use credential::{parse_token_response, Credential};

mod provide_credential;
pub use provide_credential::{EnvCredentialProvider, StaticCredentialProvider};

mod sign_request;
pub use sign_request::{
    generate_nonce, sign, string_to_sign, RequestSigner, SignatureContext, SignatureMethod,
};

mod registry;
pub use registry::{OperationKind, PendingRequest, Registry};

mod transport;
pub use transport::{Completion, HttpTransport, Transport};

mod client;
pub use client::{Client, ErrorState, Event, Ticket};

mod dispatch;

mod file;
pub use file::{DropboxFile, OpenMode};
