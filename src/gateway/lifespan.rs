//! Minimal lifecycle responder.

use tracing::debug;

use super::{GatewayError, Message, Receiver, Sender};

/// Acknowledge startup and shutdown; no application logic runs here.
///
/// Returns after the shutdown acknowledgement, or when the transport
/// disconnects.
pub async fn respond(receive: &Receiver, send: &Sender) -> Result<(), GatewayError> {
    loop {
        match receive.recv().await {
            Message::Startup => {
                debug!("lifespan startup");
                send.send(Message::StartupComplete).await?;
            }
            Message::Shutdown => {
                debug!("lifespan shutdown");
                send.send(Message::ShutdownComplete).await?;
                return Ok(());
            }
            Message::Disconnect => return Ok(()),
            other => {
                debug!(kind = other.kind(), "ignoring message during lifespan");
            }
        }
    }
}
