//! Transport seam between the client and the network.
use std::fmt::Debug;

use bytes::Bytes;
use log::debug;
use tokio::sync::mpsc;

use dropsign_core::{Context, Result};

/// Completion of one exchange, correlated by the id the client assigned.
#[derive(Debug)]
pub struct Completion {
    /// Id of the request this completion answers.
    pub id: u64,
    /// The response, or the transport failure.
    ///
    /// HTTP level failures are carried as responses.
    pub result: Result<http::Response<Bytes>>,
}

impl Completion {
    /// Create a completion.
    pub fn new(id: u64, result: Result<http::Response<Bytes>>) -> Self {
        Self { id, result }
    }
}

/// Transport issues requests and later reports their [`Completion`] on the
/// channel it was built with.
///
/// `issue` must not block: the exchange runs in the background.
pub trait Transport: Debug + Send + Sync + 'static {
    /// Issue a request under the given id.
    fn issue(&self, id: u64, req: http::Request<Bytes>);
}

/// HttpTransport runs every exchange through [`Context::http_send`] on its
/// own tokio task.
///
/// Must be used inside a tokio runtime.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    ctx: Context,
    tx: mpsc::UnboundedSender<Completion>,
}

impl HttpTransport {
    /// Create a transport reporting completions on `tx`.
    pub fn new(ctx: Context, tx: mpsc::UnboundedSender<Completion>) -> Self {
        Self { ctx, tx }
    }
}

impl Transport for HttpTransport {
    fn issue(&self, id: u64, req: http::Request<Bytes>) {
        let ctx = self.ctx.clone();
        let tx = self.tx.clone();

        tokio::spawn(async move {
            let result = ctx.http_send(req).await;
            debug!("request {id} completed, ok: {}", result.is_ok());
            // The client is gone, nobody cares about this completion anymore.
            let _ = tx.send(Completion { id, result });
        });
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{Client, Config, Credential};

    /// Records issued requests; tests feed completions by hand.
    #[derive(Debug, Clone, Default)]
    pub struct MockTransport {
        issued: Arc<Mutex<Vec<(u64, http::Request<Bytes>)>>>,
    }

    impl MockTransport {
        pub fn issued(&self) -> Vec<(u64, http::Method, String, Bytes)> {
            self.issued
                .lock()
                .unwrap()
                .iter()
                .map(|(id, req)| {
                    (
                        *id,
                        req.method().clone(),
                        req.uri().to_string(),
                        req.body().clone(),
                    )
                })
                .collect()
        }

        pub fn header(&self, id: u64, name: &str) -> Option<String> {
            self.issued
                .lock()
                .unwrap()
                .iter()
                .find(|(i, _)| *i == id)
                .and_then(|(_, req)| req.headers().get(name))
                .map(|v| v.to_str().unwrap().to_string())
        }
    }

    impl Transport for MockTransport {
        fn issue(&self, id: u64, req: http::Request<Bytes>) {
            self.issued.lock().unwrap().push((id, req));
        }
    }

    /// A client on top of a fresh mock transport, with the sender feeding
    /// its completions.
    pub fn client_with(
        config: Config,
    ) -> (Client, MockTransport, mpsc::UnboundedSender<Completion>) {
        let transport = MockTransport::default();
        let (tx, rx) = mpsc::unbounded_channel();
        let client = Client::with_transport(
            &config,
            Credential::new("consumer-key", "consumer-secret"),
            transport.clone(),
            rx,
        )
        .unwrap();
        (client, transport, tx)
    }

    pub fn response(status: u16, body: &str) -> Result<http::Response<Bytes>> {
        Ok(http::Response::builder()
            .status(status)
            .body(Bytes::from(body.to_string()))
            .unwrap())
    }

    pub fn redirect(location: &str) -> Result<http::Response<Bytes>> {
        Ok(http::Response::builder()
            .status(302)
            .header(http::header::LOCATION, location)
            .body(Bytes::new())
            .unwrap())
    }
}
