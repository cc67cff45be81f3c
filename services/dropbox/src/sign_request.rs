//! OAuth 1.0a request signing.
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use log::debug;
use rand::RngCore;

use dropsign_core::hash::base64_hmac_sha1;
use dropsign_core::time::{now, unix_timestamp, DateTime};
use dropsign_core::utils::percent_encode;
use dropsign_core::{Error, Result, SigningRequest};

use crate::constants::*;
use crate::credential::Credential;

/// SignatureMethod is the `oauth_signature_method` used for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureMethod {
    /// Secrets are sent as is. Only safe over TLS.
    #[default]
    Plaintext,
    /// HMAC-SHA1 over the signature base string.
    HmacSha1,
}

impl SignatureMethod {
    /// The value carried in `oauth_signature_method`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMethod::Plaintext => "PLAINTEXT",
            SignatureMethod::HmacSha1 => "HMAC-SHA1",
        }
    }
}

impl Display for SignatureMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignatureMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("PLAINTEXT") {
            Ok(SignatureMethod::Plaintext)
        } else if s.eq_ignore_ascii_case("HMAC-SHA1") {
            Ok(SignatureMethod::HmacSha1)
        } else {
            Err(Error::unknown_auth_method(format!(
                "authentication method {s} is unknown"
            )))
        }
    }
}

/// SignatureContext carries the per request values that make a signature unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureContext {
    /// Single use random value.
    pub nonce: String,
    /// Unix seconds.
    pub timestamp: i64,
}

impl SignatureContext {
    /// Create a context with a fresh nonce and the current time.
    pub fn new() -> Self {
        Self::at(now())
    }

    /// Create a context with a fresh nonce at the given time.
    pub fn at(time: DateTime) -> Self {
        Self {
            nonce: generate_nonce(),
            timestamp: unix_timestamp(time),
        }
    }
}

impl Default for SignatureContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a 128 bit nonce from the thread local CSPRNG, hex encoded.
pub fn generate_nonce() -> String {
    let mut bs = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bs);
    hex::encode(bs)
}

/// RequestSigner adds the OAuth protocol parameters and the signature to a request.
///
/// - [RFC 5849: The OAuth 1.0 Protocol](https://www.rfc-editor.org/rfc/rfc5849)
#[derive(Debug, Clone)]
pub struct RequestSigner {
    method: SignatureMethod,
    version: String,
    time: Option<DateTime>,
    nonce: Option<String>,
}

impl RequestSigner {
    /// Create a signer.
    pub fn new(method: SignatureMethod, version: impl Into<String>) -> Self {
        Self {
            method,
            version: version.into(),
            time: None,
            nonce: None,
        }
    }

    /// The signature method in use.
    pub fn method(&self) -> SignatureMethod {
        self.method
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime) -> Self {
        self.time = Some(time);
        self
    }

    /// Specify the nonce. Only use this function for testing.
    #[cfg(test)]
    pub fn with_nonce(mut self, nonce: &str) -> Self {
        self.nonce = Some(nonce.to_string());
        self
    }

    fn context(&self) -> SignatureContext {
        let mut ctx = SignatureContext::at(self.time.unwrap_or_else(now));
        if let Some(nonce) = &self.nonce {
            ctx.nonce = nonce.clone();
        }
        ctx
    }

    /// Sign the request in place.
    ///
    /// Any `oauth_*` parameter already present in the query is replaced, so a
    /// redirect target can be signed again as is.
    pub fn sign_request(
        &self,
        parts: &mut http::request::Parts,
        credential: &Credential,
    ) -> Result<()> {
        let mut req = SigningRequest::build(parts)?;
        req.query_retain(|k| !k.starts_with("oauth_"));

        let ctx = self.context();
        req.query_push(OAUTH_CONSUMER_KEY, &credential.consumer_key);
        req.query_push(OAUTH_NONCE, ctx.nonce);
        req.query_push(OAUTH_SIGNATURE_METHOD, self.method.as_str());
        req.query_push(OAUTH_TIMESTAMP, ctx.timestamp.to_string());
        if credential.has_token() {
            req.query_push(OAUTH_TOKEN, &credential.token);
        }
        req.query_push(OAUTH_VERSION, &self.version);

        let signature = sign(&req, credential, self.method);
        req.query_push(OAUTH_SIGNATURE, signature);

        req.apply(parts)
    }
}

/// Compute the signature of a request.
///
/// The returned value is not percent encoded yet: [`SigningRequest::apply`]
/// encodes it once when it is placed into the URL.
pub fn sign(req: &SigningRequest, credential: &Credential, method: SignatureMethod) -> String {
    match method {
        SignatureMethod::Plaintext => {
            format!("{}&{}", credential.consumer_secret, credential.token_secret)
        }
        SignatureMethod::HmacSha1 => {
            let key = format!(
                "{}&{}",
                percent_encode(&credential.consumer_secret),
                percent_encode(&credential.token_secret)
            );
            base64_hmac_sha1(key.as_bytes(), string_to_sign(req).as_bytes())
        }
    }
}

/// Construct the signature base string.
///
/// ## Format
///
/// ```text
/// METHOD + "&" +
/// percent_encode(base URL) + "&" +
/// percent_encode(sorted, encoded parameters)
/// ```
///
/// `oauth_signature` never takes part in its own base string.
///
/// ## Reference
///
/// - [RFC 5849 3.4.1](https://www.rfc-editor.org/rfc/rfc5849#section-3.4.1)
pub fn string_to_sign(req: &SigningRequest) -> String {
    let params = req.query_to_vec_with_filter(|k| k != OAUTH_SIGNATURE);
    let params = SigningRequest::query_to_percent_encoded_string(params, "=", "&");

    let s = format!(
        "{}&{}&{}",
        req.method.as_str().to_ascii_uppercase(),
        percent_encode(&req.base_url()),
        percent_encode(&params)
    );
    debug!("string to sign: {}", &s);
    s
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use dropsign_core::ErrorKind;
    use http::Method;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn photos_credential() -> Credential {
        Credential::new("dpf43f3p2l4k3l03", "kd94hf93k423kf44")
            .with_token("nnch734d00sl2jdk", "pfkkdhi9sl3r4s00")
    }

    fn photos_signer(method: SignatureMethod) -> RequestSigner {
        RequestSigner::new(method, "1.0")
            .with_nonce("kllo9940pd9333jh")
            .with_time(chrono::DateTime::from_timestamp(1191242096, 0).unwrap())
    }

    fn parts(method: Method, uri: &str) -> http::request::Parts {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    fn query_value(signed: &http::request::Parts, key: &str) -> Result<String> {
        let mut p = parts(Method::GET, &signed.uri.to_string());
        let req = SigningRequest::build(&mut p)?;
        Ok(req.query_get(key).unwrap_or_default().to_string())
    }

    #[test_case("PLAINTEXT", SignatureMethod::Plaintext)]
    #[test_case("plaintext", SignatureMethod::Plaintext)]
    #[test_case("HMAC-SHA1", SignatureMethod::HmacSha1)]
    fn test_signature_method_from_str(input: &str, expected: SignatureMethod) {
        assert_eq!(input.parse::<SignatureMethod>().unwrap(), expected);
        assert_eq!(expected.to_string().parse::<SignatureMethod>().unwrap(), expected);
    }

    #[test_case("RSA-SHA1")]
    #[test_case("HMAC-SHA256")]
    #[test_case("")]
    fn test_signature_method_unknown(input: &str) {
        let err = input.parse::<SignatureMethod>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownAuthMethod);
    }

    /// Vector from OAuth Core 1.0 Appendix A.5.
    #[test]
    fn test_hmac_sha1_known_vector() -> Result<()> {
        let mut p = parts(
            Method::GET,
            "http://photos.example.net/photos?file=vacation.jpg&size=original",
        );
        photos_signer(SignatureMethod::HmacSha1).sign_request(&mut p, &photos_credential())?;

        assert_eq!(query_value(&p, OAUTH_SIGNATURE)?, "tR3+Ty81lMeYAr/Fid0kMTYa/WM=");
        assert_eq!(
            p.uri.to_string(),
            "http://photos.example.net/photos?file=vacation.jpg&size=original\
             &oauth_consumer_key=dpf43f3p2l4k3l03&oauth_nonce=kllo9940pd9333jh\
             &oauth_signature_method=HMAC-SHA1&oauth_timestamp=1191242096\
             &oauth_token=nnch734d00sl2jdk&oauth_version=1.0\
             &oauth_signature=tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D"
        );
        Ok(())
    }

    #[test]
    fn test_string_to_sign_known_vector() -> Result<()> {
        let mut p = parts(
            Method::GET,
            "http://photos.example.net/photos?size=original&oauth_version=1.0\
             &oauth_token=nnch734d00sl2jdk&oauth_timestamp=1191242096\
             &oauth_signature_method=HMAC-SHA1&oauth_nonce=kllo9940pd9333jh\
             &oauth_consumer_key=dpf43f3p2l4k3l03&file=vacation.jpg&oauth_signature=ignored",
        );
        let req = SigningRequest::build(&mut p)?;

        assert_eq!(
            string_to_sign(&req),
            "GET&http%3A%2F%2Fphotos.example.net%2Fphotos&file%3Dvacation.jpg\
             %26oauth_consumer_key%3Ddpf43f3p2l4k3l03%26oauth_nonce%3Dkllo9940pd9333jh\
             %26oauth_signature_method%3DHMAC-SHA1%26oauth_timestamp%3D1191242096\
             %26oauth_token%3Dnnch734d00sl2jdk%26oauth_version%3D1.0%26size%3Doriginal"
        );
        Ok(())
    }

    #[test]
    fn test_insertion_order_does_not_matter() -> Result<()> {
        let signer = photos_signer(SignatureMethod::HmacSha1);

        let mut a = parts(Method::GET, "https://api.dropbox.com/1/metadata?b=2&a=1&a=0");
        let mut b = parts(Method::GET, "https://api.dropbox.com/1/metadata?a=0&a=1&b=2");
        signer.sign_request(&mut a, &photos_credential())?;
        signer.sign_request(&mut b, &photos_credential())?;

        assert_eq!(
            query_value(&a, OAUTH_SIGNATURE)?,
            query_value(&b, OAUTH_SIGNATURE)?
        );
        Ok(())
    }

    #[test]
    fn test_hmac_sha1_is_deterministic() -> Result<()> {
        let signer = photos_signer(SignatureMethod::HmacSha1);
        let mut a = parts(Method::POST, "https://api.dropbox.com/1/oauth/access_token");
        let mut b = parts(Method::POST, "https://api.dropbox.com/1/oauth/access_token");
        signer.sign_request(&mut a, &photos_credential())?;
        signer.sign_request(&mut b, &photos_credential())?;
        assert_eq!(a.uri, b.uri);

        // Method takes part in the base string.
        let mut c = parts(Method::GET, "https://api.dropbox.com/1/oauth/access_token");
        signer.sign_request(&mut c, &photos_credential())?;
        assert_ne!(
            query_value(&a, OAUTH_SIGNATURE)?,
            query_value(&c, OAUTH_SIGNATURE)?
        );
        Ok(())
    }

    #[test_case(Method::GET, "https://api.dropbox.com/1/account/info")]
    #[test_case(Method::POST, "https://api.dropbox.com/1/oauth/access_token?x=y")]
    #[test_case(Method::PUT, "https://api-content.dropbox.com/1/files_put/dropbox/a.txt")]
    fn test_plaintext_ignores_request(method: Method, uri: &str) -> Result<()> {
        let mut p = parts(method, uri);
        photos_signer(SignatureMethod::Plaintext).sign_request(&mut p, &photos_credential())?;

        assert_eq!(
            query_value(&p, OAUTH_SIGNATURE)?,
            "kd94hf93k423kf44&pfkkdhi9sl3r4s00"
        );
        assert!(p
            .uri
            .to_string()
            .ends_with("oauth_signature=kd94hf93k423kf44%26pfkkdhi9sl3r4s00"));
        Ok(())
    }

    #[test]
    fn test_no_token_before_request_token() -> Result<()> {
        let cred = Credential::new("key", "secret");
        let mut p = parts(Method::GET, "https://api.dropbox.com/1/oauth/request_token");
        photos_signer(SignatureMethod::Plaintext).sign_request(&mut p, &cred)?;

        assert_eq!(query_value(&p, OAUTH_TOKEN)?, "");
        assert!(!p.uri.to_string().contains("oauth_token="));
        assert_eq!(query_value(&p, OAUTH_SIGNATURE)?, "secret&");
        Ok(())
    }

    #[test]
    fn test_resign_replaces_protocol_parameters() -> Result<()> {
        let signer = RequestSigner::new(SignatureMethod::HmacSha1, "1.0");
        let mut p = parts(
            Method::GET,
            "https://dl.dropbox.com/1/files/a.txt?oauth_nonce=old&oauth_signature=old&rev=3",
        );
        signer.sign_request(&mut p, &photos_credential())?;

        let uri = p.uri.to_string();
        assert_eq!(uri.matches("oauth_nonce=").count(), 1);
        assert_eq!(uri.matches("oauth_signature=").count(), 1);
        assert!(!uri.contains("oauth_nonce=old"));
        assert_eq!(query_value(&p, "rev")?, "3");
        Ok(())
    }

    #[test]
    fn test_generate_nonce() {
        let a = generate_nonce();
        let b = generate_nonce();

        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_signature_context_at() {
        let time = Utc::now();
        let ctx = SignatureContext::at(time);
        assert_eq!(ctx.timestamp, time.timestamp());
        assert_eq!(ctx.nonce.len(), 32);
    }
}
