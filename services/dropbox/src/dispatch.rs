//! Resolution of completions against the pending requests.
use bytes::Bytes;
use http::header::LOCATION;
use log::{debug, warn};

use dropsign_core::{Error, ErrorKind, Result};

use crate::client::{Client, ErrorState, Event};
use crate::credential::parse_token_response;
use crate::registry::{OperationKind, PendingRequest};
use crate::transport::Completion;

impl Client {
    /// Dispatch one completion.
    ///
    /// Every pending operation is resolved exactly once: its waiter receives
    /// the payload or the error, and [`Event::OperationFinished`] or
    /// [`Event::ErrorOccurred`] is emitted.
    pub fn dispatch(&mut self, completion: Completion) {
        let Completion { id, result } = completion;

        let Some(req) = self.registry.lookup(id).cloned() else {
            if self.expired.remove(&id) {
                debug!("drop late completion of expired request {id}");
                return;
            }
            warn!("completion {id} matches no pending request");
            self.record_error(
                id,
                &Error::response_to_unknown_request(format!("no pending request with id {id}")),
            );
            return;
        };
        let origin = match req.kind {
            OperationKind::Redirect => req.linked.unwrap_or(id),
            _ => id,
        };

        let resp = match result {
            Ok(resp) => resp,
            Err(err) => {
                let message = format!("request {id} failed: {}", err.message());
                return self.fail_exchange(id, origin, Error::communication(message).with_source(err));
            }
        };

        let status = resp.status().as_u16();
        if let Some(kind) = ErrorKind::from_status(status) {
            let message = error_message(resp.body()).unwrap_or_else(|| format!("HTTP {status}"));
            if kind == ErrorKind::ExpiredToken {
                self.emit(Event::TokenExpired);
            }
            return self.fail_exchange(id, origin, Error::new(kind, message));
        }

        if req.kind == OperationKind::Connect {
            debug!("connection request {id} done with HTTP {status}");
            self.registry.remove(id);
            return;
        }

        if status == 302 {
            return self.follow_redirect(id, origin, &req, resp.headers().get(LOCATION));
        }

        if !resp.status().is_success() {
            return self.fail_exchange(
                id,
                origin,
                Error::communication(format!("unexpected HTTP status {status}")),
            );
        }

        // A redirect answers for the request it replaced.
        let (n, kind) = if req.kind == OperationKind::Redirect {
            self.registry.remove(id);
            match self.registry.lookup(origin) {
                Some(original) => (origin, original.kind),
                None => {
                    warn!("redirect {id} points at unknown request {origin}");
                    self.record_error(
                        id,
                        &Error::response_to_unknown_request(format!(
                            "redirect {id} points at unknown request {origin}"
                        )),
                    );
                    return;
                }
            }
        } else {
            (id, req.kind)
        };

        let body = resp.into_body();
        let outcome = match kind {
            OperationKind::RequestToken | OperationKind::AccessToken => {
                self.handle_token(kind, body)
            }
            OperationKind::Authorize => {
                debug!("authorization page received, login happens in the browser");
                Ok(body)
            }
            OperationKind::AccountInfo => self.handle_account_info(body),
            OperationKind::FileRead | OperationKind::FileWrite => Ok(body),
            OperationKind::Connect | OperationKind::Redirect => Err(
                Error::response_to_unknown_request(format!("request {n} has no handler for {kind}")),
            ),
        };

        match outcome {
            Ok(payload) => match self.registry.waiting_on(n) {
                Some(w) if self.registry.contains(w) => {
                    debug!("request {n} completed, held until {w} resolves");
                    self.held.insert(n, payload);
                }
                _ => self.finish(n, Ok(payload)),
            },
            Err(err) => self.finish(n, Err(err)),
        }
    }

    /// Resolve `id`, then everything held waiting on it, in chain order.
    pub(crate) fn finish(&mut self, id: u64, outcome: Result<Bytes>) {
        self.registry.remove(id);
        self.held.remove(&id);

        let (kind, message) = match &outcome {
            Ok(_) => (None, String::new()),
            Err(err) => (Some(err.kind()), err.message().to_string()),
        };
        self.notify(id, outcome);

        let held = &self.held;
        let chain = self.registry.take_chain(id, |w| held.contains_key(&w));
        for w in chain {
            self.registry.remove(w);
            let payload = self.held.remove(&w).unwrap_or_default();
            match kind {
                None => self.notify(w, Ok(payload)),
                Some(kind) => self.notify(
                    w,
                    Err(Error::new(
                        kind,
                        format!("request {id} it waited on failed: {message}"),
                    )),
                ),
            }
        }
    }

    fn notify(&mut self, id: u64, outcome: Result<Bytes>) {
        match &outcome {
            Ok(_) => {
                debug!("request {id} finished");
                self.emit(Event::OperationFinished(id));
            }
            Err(err) => self.record_error(id, err),
        }
        if let Some(tx) = self.waiters.remove(&id) {
            // The ticket may have been dropped already.
            let _ = tx.send(outcome);
        }
    }

    fn record_error(&mut self, id: u64, err: &Error) {
        warn!("request {id} failed: {err}");
        self.error = Some(ErrorState::from(err));
        self.emit(Event::ErrorOccurred {
            id,
            kind: err.kind(),
        });
    }

    /// Fail the operation behind exchange `id`, dropping the redirect if any.
    fn fail_exchange(&mut self, id: u64, origin: u64, err: Error) {
        if id != origin {
            self.registry.remove(id);
        }
        self.finish(origin, Err(err));
    }

    fn follow_redirect(
        &mut self,
        id: u64,
        origin: u64,
        req: &PendingRequest,
        location: Option<&http::HeaderValue>,
    ) {
        let Some(location) = location.and_then(|v| v.to_str().ok()) else {
            return self.fail_exchange(
                id,
                origin,
                Error::api_error(format!("redirect of request {id} carries no location")),
            );
        };
        let target = if location.starts_with('/') {
            format!("https://{}{location}", req.host)
        } else {
            location.to_string()
        };
        // Signatures carry the secrets, they never leave over plain http.
        if !target
            .get(..8)
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("https://"))
        {
            return self.fail_exchange(
                id,
                origin,
                Error::api_error(format!(
                    "redirect of request {id} to {target} does not use https"
                )),
            );
        }
        let kind = match self.registry.lookup(origin) {
            Some(original) => original.kind,
            None => req.kind,
        };

        let prepared = match self.prepare(kind, req.method.clone(), &target, req.body.clone()) {
            Ok(prepared) => prepared,
            Err(err) => return self.fail_exchange(id, origin, err),
        };
        let host = prepared
            .uri()
            .host()
            .unwrap_or(req.host.as_str())
            .to_string();

        let new_id = self.registry.next_id();
        self.registry
            .register_with_body(new_id, kind, req.method.clone(), &host, req.body.clone());
        if let Err(err) = self.registry.link_redirect(origin, new_id) {
            self.registry.remove(new_id);
            return self.fail_exchange(id, origin, err);
        }
        // A redirect of a redirect replaces it.
        if id != origin {
            self.registry.remove(id);
        }

        debug!("request {origin} redirected to {target} as request {new_id}");
        self.transport.issue(new_id, prepared);
    }

    fn handle_token(&mut self, kind: OperationKind, body: Bytes) -> Result<Bytes> {
        let (token, token_secret) = parse_token_response(&String::from_utf8_lossy(&body))?;
        self.credential.set_token(&token, &token_secret);

        self.emit(Event::TokenChanged {
            token: token.clone(),
            token_secret: token_secret.clone(),
        });
        self.emit(match kind {
            OperationKind::RequestToken => Event::RequestTokenFinished {
                token,
                token_secret,
            },
            _ => Event::AccessTokenFinished {
                token,
                token_secret,
            },
        });
        Ok(body)
    }

    fn handle_account_info(&mut self, body: Bytes) -> Result<Bytes> {
        let value: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| Error::api_error(format!("account info is not valid json: {e}")))?;
        if !value.is_object() {
            return Err(Error::api_error("account info must be a json object"));
        }

        self.emit(Event::AccountInfo(value));
        Ok(body)
    }
}

/// The `error` field of a json error body.
fn error_message(body: &Bytes) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    match value.get("error")? {
        serde_json::Value::String(s) => Some(s.clone()),
        v => Some(v.to_string()),
    }
}
