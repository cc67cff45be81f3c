use std::time::Duration;

// Env values used by the dropbox client.
pub const DROPBOX_CONSUMER_KEY: &str = "DROPBOX_CONSUMER_KEY";
pub const DROPBOX_CONSUMER_SECRET: &str = "DROPBOX_CONSUMER_SECRET";
pub const DROPBOX_TOKEN: &str = "DROPBOX_TOKEN";
pub const DROPBOX_TOKEN_SECRET: &str = "DROPBOX_TOKEN_SECRET";
pub const DROPBOX_SIGNATURE_METHOD: &str = "DROPBOX_SIGNATURE_METHOD";
pub const DROPBOX_API_HOST: &str = "DROPBOX_API_HOST";
pub const DROPBOX_CONTENT_HOST: &str = "DROPBOX_CONTENT_HOST";

// Hosts and versions.
pub const DEFAULT_API_HOST: &str = "api.dropbox.com";
pub const DEFAULT_CONTENT_HOST: &str = "api-content.dropbox.com";
pub const DEFAULT_WEB_HOST: &str = "www.dropbox.com";
pub const DEFAULT_API_VERSION: &str = "1.0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// OAuth protocol parameters.
pub const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
pub const OAUTH_NONCE: &str = "oauth_nonce";
pub const OAUTH_SIGNATURE: &str = "oauth_signature";
pub const OAUTH_SIGNATURE_METHOD: &str = "oauth_signature_method";
pub const OAUTH_TIMESTAMP: &str = "oauth_timestamp";
pub const OAUTH_TOKEN: &str = "oauth_token";
pub const OAUTH_TOKEN_SECRET: &str = "oauth_token_secret";
pub const OAUTH_VERSION: &str = "oauth_version";

// Content types.
pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
pub const OCTET_STREAM: &str = "application/octet-stream";
