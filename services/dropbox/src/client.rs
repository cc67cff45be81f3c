use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::uri::PathAndQuery;
use http::{Method, Uri};
use log::debug;
use tokio::sync::{mpsc, oneshot};

use dropsign_core::utils::{percent_encode, percent_encode_path};
use dropsign_core::{Context, Error, ErrorKind, ProvideCredential, Result, SigningCredential};

use crate::config::{check_api_version, Config, Settings};
use crate::constants::*;
use crate::credential::Credential;
use crate::registry::{OperationKind, Registry};
use crate::sign_request::{RequestSigner, SignatureMethod};
use crate::transport::{Completion, HttpTransport, Transport};

/// Notifications emitted while completions are dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The token pair changed.
    TokenChanged {
        /// New token.
        token: String,
        /// New token secret.
        token_secret: String,
    },
    /// A request token has been obtained.
    RequestTokenFinished {
        /// The request token.
        token: String,
        /// The request token secret.
        token_secret: String,
    },
    /// An access token has been obtained.
    AccessTokenFinished {
        /// The access token.
        token: String,
        /// The access token secret.
        token_secret: String,
    },
    /// Account information has been received.
    AccountInfo(serde_json::Value),
    /// The remote side reported the token as expired or revoked.
    TokenExpired,
    /// The operation with this id resolved successfully.
    OperationFinished(u64),
    /// The operation with this id failed.
    ErrorOccurred {
        /// Id of the failed operation.
        id: u64,
        /// What went wrong.
        kind: ErrorKind,
    },
}

/// The last error seen by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorState {
    /// Kind of the error.
    pub kind: ErrorKind,
    /// Human readable description.
    pub message: String,
}

impl From<&Error> for ErrorState {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.message().to_string(),
        }
    }
}

/// Ticket is handed out for every issued operation.
///
/// Pass it to [`Client::wait`] to get the operation's payload.
#[derive(Debug)]
pub struct Ticket {
    id: u64,
    rx: oneshot::Receiver<Result<Bytes>>,
}

impl Ticket {
    /// Id of the operation.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// Client drives the OAuth dance and the API calls of one account.
///
/// The client owns every piece of mutable state: credentials, pending
/// requests, delay chains and the last error. Completions are only processed
/// while the client is driven through [`Client::wait`],
/// [`Client::drive_once`] or [`Client::try_drive`].
#[derive(Debug)]
pub struct Client {
    pub(crate) settings: Settings,
    pub(crate) signer: RequestSigner,
    pub(crate) credential: Credential,
    pub(crate) registry: Registry,
    pub(crate) error: Option<ErrorState>,

    pub(crate) transport: Arc<dyn Transport>,
    completions: mpsc::UnboundedReceiver<Completion>,
    subscribers: Vec<mpsc::UnboundedSender<Event>>,
    pub(crate) waiters: HashMap<u64, oneshot::Sender<Result<Bytes>>>,
    /// Payloads of resolved requests that still wait on another request.
    pub(crate) held: HashMap<u64, Bytes>,
    /// Ids given up on, their late completions are dropped.
    pub(crate) expired: HashSet<u64>,
}

impl Client {
    /// Create a client sending requests through the context's http client.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(ctx: Context, config: &Config, credential: Credential) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Self::with_transport(config, credential, HttpTransport::new(ctx, tx), rx)
    }

    /// Create a client whose credential comes from a provider.
    pub async fn from_provider<P>(ctx: Context, config: &Config, provider: &P) -> Result<Self>
    where
        P: ProvideCredential<Credential = Credential>,
    {
        let credential = provider
            .provide_credential(&ctx)
            .await?
            .ok_or_else(|| Error::config_invalid("no dropbox credential found"))?;
        Self::new(ctx, config, credential)
    }

    /// Create a client on top of a custom transport.
    ///
    /// `completions` must receive the completions of every request issued
    /// through `transport`.
    pub fn with_transport(
        config: &Config,
        credential: Credential,
        transport: impl Transport,
        completions: mpsc::UnboundedReceiver<Completion>,
    ) -> Result<Self> {
        if !credential.is_valid() {
            return Err(Error::config_invalid(
                "consumer key and consumer secret must not be empty",
            ));
        }
        let settings = config.resolve()?;

        Ok(Self {
            signer: RequestSigner::new(settings.signature_method, &settings.api_version),
            settings,
            credential,
            registry: Registry::new(),
            error: None,
            transport: Arc::new(transport),
            completions,
            subscribers: Vec::new(),
            waiters: HashMap::new(),
            held: HashMap::new(),
            expired: HashSet::new(),
        })
    }

    /// Subscribe to the events emitted from now on.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Current credential.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Current token, empty before the dance started.
    pub fn token(&self) -> &str {
        &self.credential.token
    }

    /// Current token secret.
    pub fn token_secret(&self) -> &str {
        &self.credential.token_secret
    }

    /// Replace the token pair, for example with a stored access token.
    pub fn set_token(&mut self, token: impl Into<String>, token_secret: impl Into<String>) {
        self.credential.set_token(token, token_secret);
    }

    /// The last error, if any operation failed so far.
    pub fn error(&self) -> Option<&ErrorState> {
        self.error.as_ref()
    }

    /// Pending requests.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// API version in use.
    pub fn api_version(&self) -> &str {
        &self.settings.api_version
    }

    /// Change the API version. Only `1.0` is supported.
    pub fn set_api_version(&mut self, version: &str) -> Result<()> {
        if let Err(err) = check_api_version(version) {
            self.error = Some(ErrorState::from(&err));
            return Err(err);
        }
        self.settings.api_version = version.to_string();
        self.signer = RequestSigner::new(self.settings.signature_method, version);
        Ok(())
    }

    /// Signature method in use.
    pub fn signature_method(&self) -> SignatureMethod {
        self.signer.method()
    }

    /// Ask for a request token, the first step of the dance.
    pub fn request_token(&mut self) -> Result<Ticket> {
        let path = format!("/{}/oauth/request_token", self.settings.path_version());
        let host = self.settings.api_host.clone();
        self.submit(OperationKind::RequestToken, Method::GET, &host, &path, Bytes::new())
    }

    /// The page the user must visit to authorize the current request token.
    pub fn authorize_link(&self) -> String {
        format!(
            "https://{}/{}/oauth/authorize?{}={}",
            self.settings.web_host,
            self.settings.path_version(),
            OAUTH_TOKEN,
            percent_encode(&self.credential.token)
        )
    }

    /// Fetch the authorization page.
    ///
    /// The login itself happens in a browser through [`Client::authorize_link`],
    /// the page content is only handed back as payload.
    pub fn authorize(&mut self) -> Result<Ticket> {
        let path = format!(
            "/{}/oauth/authorize?{}={}",
            self.settings.path_version(),
            OAUTH_TOKEN,
            percent_encode(&self.credential.token)
        );
        let host = self.settings.web_host.clone();
        self.submit(OperationKind::Authorize, Method::GET, &host, &path, Bytes::new())
    }

    /// Exchange the authorized request token for an access token.
    pub fn request_access_token(&mut self) -> Result<Ticket> {
        let path = format!("/{}/oauth/access_token", self.settings.path_version());
        let host = self.settings.api_host.clone();
        self.submit(OperationKind::AccessToken, Method::POST, &host, &path, Bytes::new())
    }

    /// Ask for the account information.
    pub fn request_account_info(&mut self) -> Result<Ticket> {
        let path = format!("/{}/account/info", self.settings.path_version());
        let host = self.settings.api_host.clone();
        self.submit(OperationKind::AccountInfo, Method::GET, &host, &path, Bytes::new())
    }

    /// Download the content of a file, `path` includes the root like `dropbox/a.txt`.
    pub fn request_file(&mut self, path: &str) -> Result<Ticket> {
        let path = format!(
            "/{}/files/{}",
            self.settings.path_version(),
            percent_encode_path(path.trim_start_matches('/'))
        );
        let host = self.settings.content_host.clone();
        self.submit(OperationKind::FileRead, Method::GET, &host, &path, Bytes::new())
    }

    /// Upload the content of a file, overwriting it.
    pub fn upload_file(&mut self, path: &str, content: Bytes) -> Result<Ticket> {
        let path = format!(
            "/{}/files_put/{}",
            self.settings.path_version(),
            percent_encode_path(path.trim_start_matches('/'))
        );
        let host = self.settings.content_host.clone();
        self.submit(OperationKind::FileWrite, Method::PUT, &host, &path, content)
    }

    /// Open a connection to the api host. Nobody waits on it.
    pub fn connect(&mut self) -> Result<u64> {
        let host = self.settings.api_host.clone();
        self.issue(OperationKind::Connect, Method::GET, &host, "/", Bytes::new())
    }

    /// Hold back the resolution of `deferred` until `waiting_on` resolved.
    ///
    /// Both requests must be pending.
    pub fn defer(&mut self, deferred: u64, waiting_on: u64) -> Result<()> {
        let result = match [deferred, waiting_on]
            .into_iter()
            .find(|id| !self.registry.contains(*id))
        {
            Some(id) => Err(Error::unexpected(format!("request {id} is not pending"))),
            None => self.registry.defer(deferred, waiting_on),
        };
        if let Err(err) = &result {
            self.error = Some(ErrorState::from(err));
        }
        result
    }

    /// Wait for the payload of the ticket's operation.
    ///
    /// Completions of other requests arriving meanwhile are dispatched as
    /// usual. Fails with [`ErrorKind::Timeout`] once the configured timeout
    /// elapsed, the operation is dropped then.
    pub async fn wait(&mut self, ticket: Ticket) -> Result<Bytes> {
        let Ticket { id, mut rx } = ticket;
        let deadline = tokio::time::Instant::now() + self.settings.timeout;

        loop {
            match rx.try_recv() {
                Ok(result) => return result,
                Err(oneshot::error::TryRecvError::Closed) => {
                    return Err(Error::unexpected(format!(
                        "request {id} was dropped without resolution"
                    )))
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }

            match tokio::time::timeout_at(deadline, self.completions.recv()).await {
                Ok(Some(completion)) => self.dispatch(completion),
                Ok(None) => {
                    return Err(Error::communication(
                        "transport stopped delivering completions",
                    ))
                }
                Err(_) => return Err(self.expire(id)),
            }
        }
    }

    /// Wait for the next completion and dispatch it.
    ///
    /// Returns `false` once the transport is gone.
    pub async fn drive_once(&mut self) -> bool {
        match self.completions.recv().await {
            Some(completion) => {
                self.dispatch(completion);
                true
            }
            None => false,
        }
    }

    /// Dispatch every completion already delivered, without waiting.
    pub fn try_drive(&mut self) -> usize {
        let mut n = 0;
        while let Ok(completion) = self.completions.try_recv() {
            self.dispatch(completion);
            n += 1;
        }
        n
    }

    /// Give up on a request: drop it together with its redirects.
    fn expire(&mut self, id: u64) -> Error {
        let message = format!(
            "request {id} got no response within {:?}",
            self.settings.timeout
        );

        let redirects = self.registry.redirects_of(id);
        // Only exchanges still out on the transport can complete late.
        if redirects.is_empty() && !self.held.contains_key(&id) {
            self.expired.insert(id);
        }
        for redirect in redirects {
            self.registry.remove(redirect);
            self.expired.insert(redirect);
        }
        // The caller gets the error directly.
        self.waiters.remove(&id);
        self.finish(id, Err(Error::timeout(&message)));

        Error::timeout(message)
    }

    pub(crate) fn emit(&mut self, event: Event) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Register and issue a request whose payload someone will wait for.
    fn submit(
        &mut self,
        kind: OperationKind,
        method: Method,
        host: &str,
        path: &str,
        body: Bytes,
    ) -> Result<Ticket> {
        let id = self.issue(kind, method, host, path, body)?;
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(id, tx);
        Ok(Ticket { id, rx })
    }

    fn issue(
        &mut self,
        kind: OperationKind,
        method: Method,
        host: &str,
        path: &str,
        body: Bytes,
    ) -> Result<u64> {
        let uri = format!("https://{host}{path}");
        let req = match self.prepare(kind, method.clone(), &uri, body.clone()) {
            Ok(req) => req,
            Err(err) => {
                self.error = Some(ErrorState::from(&err));
                return Err(err);
            }
        };

        let id = self.registry.next_id();
        debug!("issue request {id} ({kind}): {} {}", req.method(), req.uri().path());
        self.registry.register_with_body(id, kind, method, host, body);
        self.transport.issue(id, req);
        Ok(id)
    }

    /// Build the request for `kind`, signed the way the operation needs.
    pub(crate) fn prepare(
        &self,
        kind: OperationKind,
        method: Method,
        uri: &str,
        body: Bytes,
    ) -> Result<http::Request<Bytes>> {
        check_method(&method)?;

        let (mut parts, _) = http::Request::builder()
            .method(method)
            .uri(uri)
            .body(())?
            .into_parts();

        match kind {
            OperationKind::Connect | OperationKind::Authorize => {}
            OperationKind::RequestToken => self
                .signer
                .sign_request(&mut parts, &self.credential.consumer_only())?,
            _ => self.signer.sign_request(&mut parts, &self.credential)?,
        }

        let body = match kind {
            // Access token parameters travel in the body.
            OperationKind::AccessToken => {
                let form = parts.uri.query().unwrap_or_default().to_string();
                parts.uri = strip_query(&parts.uri)?;
                parts
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_URLENCODED));
                Bytes::from(form)
            }
            OperationKind::FileWrite => {
                parts
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
                body
            }
            _ => body,
        };

        Ok(http::Request::from_parts(parts, body))
    }
}

fn check_method(method: &Method) -> Result<()> {
    if *method == Method::GET || *method == Method::POST || *method == Method::PUT {
        Ok(())
    } else {
        Err(Error::unknown_query_method(format!(
            "http method {method} is not supported"
        )))
    }
}

fn strip_query(uri: &Uri) -> Result<Uri> {
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(PathAndQuery::from_str(uri.path())?);
    Ok(Uri::from_parts(parts)?)
}
