use async_trait::async_trait;
use dropsign_core::{Context, ProvideCredential, Result};

use crate::{constants::*, Credential};

/// EnvCredentialProvider loads dropbox credentials from environment variables.
///
/// This provider looks for the following environment variables:
/// - `DROPBOX_CONSUMER_KEY`: The application's consumer key
/// - `DROPBOX_CONSUMER_SECRET`: The application's consumer secret
/// - `DROPBOX_TOKEN`, `DROPBOX_TOKEN_SECRET`: A stored access token pair (optional, both or none)
#[derive(Debug, Default)]
pub struct EnvCredentialProvider;

impl EnvCredentialProvider {
    /// Create a new EnvCredentialProvider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProvideCredential for EnvCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let envs = ctx.env_vars();

        let (Some(key), Some(secret)) = (
            envs.get(DROPBOX_CONSUMER_KEY),
            envs.get(DROPBOX_CONSUMER_SECRET),
        ) else {
            return Ok(None);
        };

        let mut cred = Credential::new(key, secret);
        if let (Some(token), Some(token_secret)) =
            (envs.get(DROPBOX_TOKEN), envs.get(DROPBOX_TOKEN_SECRET))
        {
            cred.set_token(token, token_secret);
        }

        Ok(Some(cred))
    }
}
