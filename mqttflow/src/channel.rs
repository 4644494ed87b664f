//! Outbound packet path of a client connection.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mqttflow_codec::Packet;

use crate::error::MqttError;
use crate::Result;

/// The transport-facing half of a connection, as seen by the flows.
///
/// `send` hands a packet to the transport; `is_connected` reports whether the
/// peer is still reachable. A disconnected channel is a reason for retry
/// loops to stop, not an error.
#[async_trait]
pub trait MessageChannel: Send + Sync {
    fn is_connected(&self) -> bool;
    async fn send(&self, packet: Packet) -> Result<()>;
}

/// Serializes all sends for one connection through a single worker task so
/// wire order matches call order, whatever task a flow runs on.
///
/// The worker stops when the inner channel disconnects, when it rejects a
/// send, or when the last `OrderedSender` clone is dropped.
pub struct OrderedSender {
    inner: Arc<dyn MessageChannel>,
    tx: mpsc::UnboundedSender<Packet>,
}

impl OrderedSender {
    pub fn new(inner: Arc<dyn MessageChannel>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Packet>();
        let worker_channel = inner.clone();
        tokio::spawn(async move {
            while let Some(packet) = rx.recv().await {
                if !worker_channel.is_connected() {
                    break;
                }
                if let Err(e) = worker_channel.send(packet).await {
                    log::debug!("ordered sender stopping, send failed: {e:?}");
                    break;
                }
            }
        });
        Self { inner, tx }
    }
}

#[async_trait]
impl MessageChannel for OrderedSender {
    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    async fn send(&self, packet: Packet) -> Result<()> {
        self.tx.send(packet).map_err(|_| MqttError::ChannelClosed)?;
        Ok(())
    }
}
