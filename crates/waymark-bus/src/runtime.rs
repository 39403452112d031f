//! One-shot request/response channel between extension contexts.
//!
//! Every request carries its own reply slot. The receiving context may answer
//! from a spawned task long after it picked the request up; holding the
//! [`Responder`] is what keeps the reply channel open. The caller owns the
//! timeout, and a reply arriving after it has given up is discarded.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::trace;
use waymark_protocols::{BusError, Envelope, Response, RuntimeMessage, Source, TabId};

/// Reply slot for one request. Consumed by the single reply it can carry.
#[derive(Debug)]
pub struct Responder(oneshot::Sender<Response>);

impl Responder {
    /// Send the reply. Returns false when the caller already gave up.
    pub fn send(self, response: Response) -> bool {
        self.0.send(response).is_ok()
    }
}

/// A request as seen by the receiving context.
#[derive(Debug)]
pub struct RuntimeRequest {
    pub envelope: Envelope,
    pub responder: Responder,
}

/// Sending side of a context's runtime channel.
#[derive(Debug, Clone)]
pub struct RuntimePort {
    tx: mpsc::UnboundedSender<RuntimeRequest>,
}

/// Create a runtime channel for one receiving context.
pub fn runtime_channel() -> (RuntimePort, mpsc::UnboundedReceiver<RuntimeRequest>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RuntimePort { tx }, rx)
}

impl RuntimePort {
    /// Send `envelope` and wait at most `timeout` for the reply.
    pub async fn request(&self, envelope: Envelope, timeout: Duration) -> Result<Response, BusError> {
        let kind = envelope.message.kind();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RuntimeRequest {
                envelope,
                responder: Responder(reply_tx),
            })
            .map_err(|_| BusError::ChannelClosed)?;
        trace!("Sent {} request", kind);

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(BusError::ChannelClosed),
            Err(_) => Err(BusError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Whether the receiving context is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A context's handle for talking to another one: fixes the source tag and
/// tab every envelope is stamped with.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    port: RuntimePort,
    source: Source,
    tab_id: Option<TabId>,
    timeout: Duration,
}

impl RuntimeClient {
    pub fn new(port: RuntimePort, source: Source, timeout: Duration) -> Self {
        Self {
            port,
            source,
            tab_id: None,
            timeout,
        }
    }

    pub fn for_tab(mut self, tab_id: TabId) -> Self {
        self.tab_id = Some(tab_id);
        self
    }

    pub fn source(&self) -> Source {
        self.source
    }

    pub async fn send(&self, message: RuntimeMessage) -> Result<Response, BusError> {
        let envelope = Envelope {
            source: self.source,
            tab_id: self.tab_id,
            message,
        };
        self.port.request(envelope, self.timeout).await
    }
}
