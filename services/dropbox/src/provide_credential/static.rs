use async_trait::async_trait;
use dropsign_core::{Context, ProvideCredential, Result};

use crate::Credential;

/// StaticCredentialProvider provides a fixed credential.
///
/// Use it when the consumer pair, and optionally an access token from an
/// earlier dance, are already known.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: Credential,
}

impl StaticCredentialProvider {
    /// Create a provider with the consumer pair only.
    pub fn new(consumer_key: &str, consumer_secret: &str) -> Self {
        Self {
            credential: Credential::new(consumer_key, consumer_secret),
        }
    }

    /// Add a previously obtained token pair.
    pub fn with_token(mut self, token: &str, token_secret: &str) -> Self {
        self.credential.set_token(token, token_secret);
        self
    }
}

#[async_trait]
impl ProvideCredential for StaticCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
        Ok(Some(self.credential.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credential_provider() -> Result<()> {
        let ctx = Context::new();
        let provider = StaticCredentialProvider::new("key", "secret").with_token("t", "ts");

        let cred = provider.provide_credential(&ctx).await?.unwrap();
        assert_eq!(cred.consumer_key, "key");
        assert_eq!(cred.consumer_secret, "secret");
        assert_eq!(cred.token, "t");
        assert_eq!(cred.token_secret, "ts");
        Ok(())
    }
}
