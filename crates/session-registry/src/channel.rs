use async_trait::async_trait;

use pagebridge_core_types::BridgeError;
use pagebridge_protocol::Envelope;

/// Duplex per-page transport as seen from the coordinator side. Outgoing
/// traffic goes through `send`; incoming traffic is pushed into
/// [`SessionRegistry::handle_message`](crate::SessionRegistry::handle_message)
/// by whoever pumps the underlying connection.
///
/// Messages on one channel instance are delivered in send order; nothing is
/// guaranteed across a channel replacement.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send(&self, envelope: Envelope) -> Result<(), BridgeError>;
}
