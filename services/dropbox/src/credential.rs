use std::fmt::{Debug, Formatter};

use dropsign_core::utils::Redact;
use dropsign_core::{Error, Result, SigningCredential};

use crate::constants::*;

/// Credential holds the consumer (application) pair and the current
/// token pair of the OAuth dance.
///
/// An empty `token` means no request or access token has been obtained yet.
#[derive(Clone, Default)]
pub struct Credential {
    /// Consumer key identifying the application.
    pub consumer_key: String,
    /// Consumer secret of the application.
    pub consumer_secret: String,
    /// Current request or access token.
    pub token: String,
    /// Secret of the current token.
    pub token_secret: String,
}

impl Credential {
    /// Create a new credential with only the consumer pair.
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            ..Default::default()
        }
    }

    /// Set the token pair.
    pub fn with_token(mut self, token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        self.set_token(token, token_secret);
        self
    }

    /// Replace the token pair.
    pub fn set_token(&mut self, token: impl Into<String>, token_secret: impl Into<String>) {
        self.token = token.into();
        self.token_secret = token_secret.into();
    }

    /// Check if a token has been obtained.
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Same consumer pair, without any token.
    ///
    /// Used to ask for a fresh request token.
    pub fn consumer_only(&self) -> Self {
        Self::new(&self.consumer_key, &self.consumer_secret)
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("consumer_key", &Redact::from(&self.consumer_key))
            .field("consumer_secret", &Redact::from(&self.consumer_secret))
            .field("token", &Redact::from(&self.token))
            .field("token_secret", &Redact::from(&self.token_secret))
            .finish()
    }
}

impl SigningCredential for Credential {
    fn is_valid(&self) -> bool {
        !self.consumer_key.is_empty() && !self.consumer_secret.is_empty()
    }
}

/// Parse a token response body into `(token, token_secret)`.
///
/// ## Format
///
/// ```text
/// oauth_token_secret=<secret>&oauth_token=<token>
/// ```
///
/// Field order is fixed. Trailing fields (like `uid=` on access token
/// responses) are ignored.
pub fn parse_token_response(body: &str) -> Result<(String, String)> {
    let fields: Vec<&str> = body.trim().split('&').collect();
    if fields.len() < 2 {
        return Err(Error::api_error(format!(
            "token response must carry at least 2 fields, got {}",
            fields.len()
        )));
    }

    let secret = field_value(fields[0], OAUTH_TOKEN_SECRET)?;
    let token = field_value(fields[1], OAUTH_TOKEN)?;
    Ok((token.to_string(), secret.to_string()))
}

fn field_value<'a>(field: &'a str, key: &str) -> Result<&'a str> {
    match field.split_once('=') {
        Some((k, v)) if k == key => Ok(v),
        _ => Err(Error::api_error(format!(
            "token response field {field:?} is not {key}"
        ))),
    }
}
