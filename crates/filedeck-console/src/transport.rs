//! Outbound transport seam for the terminal connection

use filedeck_types::ClientFrame;
use tokio::sync::mpsc;

/// Error surfaced when a frame cannot be handed to the connection
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
}

/// Outbound half of the duplex terminal connection.
///
/// Implementations hand the frame off without blocking. Delivery is
/// fire-and-forget: a successful return means the frame was accepted for
/// transmission in call order, not that the host received it.
pub trait FrameTransport {
    fn send(&self, frame: ClientFrame) -> Result<(), TransportError>;
}

/// Transport backed by an unbounded channel.
///
/// The connection runner drains the receiving end onto the socket from a
/// dedicated writer task, so sends never block the session.
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<ClientFrame>,
}

impl ChannelTransport {
    pub fn new(tx: mpsc::UnboundedSender<ClientFrame>) -> Self {
        Self { tx }
    }
}

impl FrameTransport for ChannelTransport {
    fn send(&self, frame: ClientFrame) -> Result<(), TransportError> {
        self.tx.send(frame).map_err(|_| TransportError::Closed)
    }
}
