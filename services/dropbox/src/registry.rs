//! Outstanding requests and the delay chains between them.
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use bytes::Bytes;
use http::Method;

use dropsign_core::{Error, Result};

/// What a request means to the client, beyond its HTTP exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Connection warm up, nobody waits on it.
    Connect,
    /// Step one of the dance.
    RequestToken,
    /// The authorization page.
    Authorize,
    /// Step three of the dance.
    AccessToken,
    /// `/account/info`.
    AccountInfo,
    /// A re-signed request following a 302 of another request.
    Redirect,
    /// Download of a file's content.
    FileRead,
    /// Upload of a file's content.
    FileWrite,
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Connect => "connect",
            OperationKind::RequestToken => "request_token",
            OperationKind::Authorize => "authorize",
            OperationKind::AccessToken => "access_token",
            OperationKind::AccountInfo => "account_info",
            OperationKind::Redirect => "redirect",
            OperationKind::FileRead => "file_read",
            OperationKind::FileWrite => "file_write",
        };
        f.write_str(s)
    }
}

/// A request that has been issued and not resolved yet.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Id assigned when issued.
    pub id: u64,
    /// Semantic operation.
    pub kind: OperationKind,
    /// HTTP method used on the wire.
    pub method: Method,
    /// Host the request was sent to.
    pub host: String,
    /// Body sent with the request, kept to re-issue it on redirect.
    pub body: Bytes,
    /// For [`OperationKind::Redirect`]: the request this one replaced.
    ///
    /// Lookup only, the linked entry is owned by the registry.
    pub linked: Option<u64>,
}

/// Registry maps request ids onto their pending operation.
///
/// Delay edges are kept as `deferred -> waiting_on`. Every id is waited on by
/// at most one other id, so edges always form simple chains.
#[derive(Debug, Default)]
pub struct Registry {
    last_id: u64,
    pending: HashMap<u64, PendingRequest>,
    delays: HashMap<u64, u64>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next request id. Ids start at 1 and are never reused.
    pub fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    /// Record a newly issued request.
    pub fn register(&mut self, id: u64, kind: OperationKind, method: Method, host: &str) {
        self.register_with_body(id, kind, method, host, Bytes::new());
    }

    /// Record a newly issued request together with the body it carried.
    pub fn register_with_body(
        &mut self,
        id: u64,
        kind: OperationKind,
        method: Method,
        host: &str,
        body: Bytes,
    ) {
        self.pending.insert(
            id,
            PendingRequest {
                id,
                kind,
                method,
                host: host.to_string(),
                body,
                linked: None,
            },
        );
    }

    /// Look up a pending request.
    pub fn lookup(&self, id: u64) -> Option<&PendingRequest> {
        self.pending.get(&id)
    }

    /// Check if `id` is still pending.
    pub fn contains(&self, id: u64) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Mark `new` as the redirect that replaced `old`.
    pub fn link_redirect(&mut self, old: u64, new: u64) -> Result<()> {
        if !self.pending.contains_key(&old) {
            return Err(Error::unexpected(format!(
                "request {old} is not pending, cannot link redirect {new}"
            )));
        }
        let Some(req) = self.pending.get_mut(&new) else {
            return Err(Error::unexpected(format!("redirect {new} is not registered")));
        };

        req.kind = OperationKind::Redirect;
        req.linked = Some(old);
        Ok(())
    }

    /// Remove a pending request.
    ///
    /// The delay edge the request itself declared goes with it; edges of ids
    /// waiting on it stay so the chain can still be walked.
    pub fn remove(&mut self, id: u64) -> Option<PendingRequest> {
        self.delays.remove(&id);
        self.pending.remove(&id)
    }

    /// Ids of redirects pointing at `id`.
    pub fn redirects_of(&self, id: u64) -> Vec<u64> {
        self.pending
            .values()
            .filter(|r| r.kind == OperationKind::Redirect && r.linked == Some(id))
            .map(|r| r.id)
            .collect()
    }

    /// Declare that the completion of `deferred` must wait for `waiting_on`.
    pub fn defer(&mut self, deferred: u64, waiting_on: u64) -> Result<()> {
        if deferred == waiting_on {
            return Err(Error::unexpected(format!(
                "request {deferred} cannot wait on itself"
            )));
        }
        if let Some(existing) = self.waiter_of(waiting_on) {
            return Err(Error::unexpected(format!(
                "request {waiting_on} is already waited on by {existing}"
            )));
        }
        if self.delays.contains_key(&deferred) {
            return Err(Error::unexpected(format!(
                "request {deferred} already waits on another request"
            )));
        }
        // Walking backwards from `waiting_on` must never meet `deferred`.
        let mut cur = waiting_on;
        while let Some(next) = self.delays.get(&cur) {
            if *next == deferred {
                return Err(Error::unexpected(format!(
                    "waiting on {waiting_on} from {deferred} would form a cycle"
                )));
            }
            cur = *next;
        }

        self.delays.insert(deferred, waiting_on);
        Ok(())
    }

    /// The id `deferred` waits on, if any.
    pub fn waiting_on(&self, deferred: u64) -> Option<u64> {
        self.delays.get(&deferred).copied()
    }

    /// The id waiting on `id`, if any.
    pub fn waiter_of(&self, id: u64) -> Option<u64> {
        self.delays
            .iter()
            .find(|(_, waiting_on)| **waiting_on == id)
            .map(|(deferred, _)| *deferred)
    }

    /// Walk the chain of ids waiting on `id`, in order.
    ///
    /// Every traversed edge is removed. The walk stops before the first waiter
    /// for which `ready` returns `false`; that waiter's edge is dropped too, so
    /// it resolves on its own once its completion arrives.
    pub fn take_chain(&mut self, id: u64, ready: impl Fn(u64) -> bool) -> Vec<u64> {
        let mut chain = Vec::new();
        let mut cur = id;

        // Edges are acyclic, the bound only guards the loop.
        for _ in 0..=self.delays.len() {
            let Some(next) = self.waiter_of(cur) else {
                break;
            };
            self.delays.remove(&next);
            if !ready(next) {
                break;
            }
            chain.push(next);
            cur = next;
        }

        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dropsign_core::ErrorKind;

    fn registry_with(ids: &[u64]) -> Registry {
        let mut r = Registry::new();
        for _ in ids {
            let id = r.next_id();
            r.register(id, OperationKind::AccountInfo, Method::GET, "api.dropbox.com");
        }
        r
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut r = Registry::new();
        let a = r.next_id();
        let b = r.next_id();
        r.register(a, OperationKind::RequestToken, Method::GET, "api.dropbox.com");
        r.remove(a);
        let c = r.next_id();

        assert_eq!((a, b, c), (1, 2, 3));
    }

    #[test]
    fn test_register_lookup_remove() {
        let mut r = Registry::new();
        let id = r.next_id();
        r.register(id, OperationKind::FileRead, Method::GET, "api-content.dropbox.com");

        let req = r.lookup(id).unwrap();
        assert_eq!(req.kind, OperationKind::FileRead);
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.host, "api-content.dropbox.com");
        assert_eq!(req.linked, None);

        assert!(r.remove(id).is_some());
        assert!(r.lookup(id).is_none());
        assert!(r.is_empty());
    }

    #[test]
    fn test_link_redirect() -> Result<()> {
        let mut r = registry_with(&[1, 2]);
        r.link_redirect(1, 2)?;

        let redirect = r.lookup(2).unwrap();
        assert_eq!(redirect.kind, OperationKind::Redirect);
        assert_eq!(redirect.linked, Some(1));
        assert_eq!(r.lookup(1).unwrap().kind, OperationKind::AccountInfo);
        assert_eq!(r.redirects_of(1), vec![2]);

        let err = r.link_redirect(9, 2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        Ok(())
    }

    #[test]
    fn test_defer_rejects_cycles() -> Result<()> {
        let mut r = registry_with(&[1, 2, 3]);
        r.defer(1, 2)?;
        r.defer(2, 3)?;

        assert!(r.defer(3, 1).is_err());
        assert!(r.defer(3, 3).is_err());
        // 2 is already waited on by 1.
        assert!(r.defer(3, 2).is_err());
        // 1 already waits on 2.
        assert!(r.defer(1, 3).is_err());
        assert_eq!(r.waiting_on(1), Some(2));
        assert_eq!(r.waiter_of(3), Some(2));
        Ok(())
    }

    #[test]
    fn test_take_chain_in_order() -> Result<()> {
        let mut r = registry_with(&[1, 2, 3, 4]);
        // 3 waits on 2 waits on 1.
        r.defer(2, 1)?;
        r.defer(3, 2)?;

        assert_eq!(r.take_chain(1, |_| true), vec![2, 3]);
        assert_eq!(r.waiting_on(2), None);
        assert_eq!(r.waiting_on(3), None);
        assert!(r.take_chain(1, |_| true).is_empty());
        Ok(())
    }

    #[test]
    fn test_take_chain_stops_at_unready() -> Result<()> {
        let mut r = registry_with(&[1, 2, 3]);
        r.defer(2, 1)?;
        r.defer(3, 2)?;

        assert!(r.take_chain(1, |id| id != 2).is_empty());
        // 2 no longer waits, 3 still waits on 2.
        assert_eq!(r.waiting_on(2), None);
        assert_eq!(r.waiting_on(3), Some(2));
        Ok(())
    }

    #[test]
    fn test_remove_keeps_waiters() -> Result<()> {
        let mut r = registry_with(&[1, 2, 3]);
        r.defer(2, 1)?;
        r.defer(3, 2)?;

        r.remove(2);
        assert_eq!(r.waiting_on(2), None);
        assert_eq!(r.waiting_on(3), Some(2));
        Ok(())
    }
}
