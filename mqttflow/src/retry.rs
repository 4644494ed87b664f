//! Acknowledgement monitoring for in-flight QoS > 0 exchanges.

use std::num::NonZeroU16;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use mqttflow_codec::{Packet, PacketType};

use crate::channel::MessageChannel;
use crate::session::ClientId;

struct Monitor {
    awaited: PacketType,
    token: CancellationToken,
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// One cancellable retransmission timer per in-flight (client, packet id)
/// exchange.
///
/// Each monitor resends its packet every `interval` until the awaited
/// acknowledgement is observed or the channel disconnects. There is no retry
/// cap; retransmission continues for as long as the channel reports
/// connected.
#[derive(Default)]
pub struct RetryMonitorRegistry {
    monitors: DashMap<(ClientId, u16), Monitor>,
}

impl RetryMonitorRegistry {
    /// Starts monitoring an exchange, replacing (and cancelling) any
    /// previous monitor for the same (client, packet id).
    ///
    /// `packet` must already carry the retransmission form of the exchange
    /// (dup flag set for a publish).
    pub fn start(
        &self,
        client_id: ClientId,
        packet_id: NonZeroU16,
        awaited: PacketType,
        packet: Packet,
        channel: Arc<dyn MessageChannel>,
        interval: Duration,
    ) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        self.monitors.insert((client_id.clone(), packet_id.get()), Monitor { awaited, token });

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        if !channel.is_connected() {
                            log::debug!(
                                "{client_id} channel disconnected, stop monitoring packet {packet_id}",
                            );
                            break;
                        }
                        log::debug!(
                            "{client_id} no {awaited:?} for packet {packet_id} within {interval:?}, resending",
                        );
                        if channel.send(packet.clone()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    /// Cancels the monitor for (client, packet id) if it is awaiting
    /// `packet_type`; returns whether a monitor was cancelled.
    pub fn complete(&self, client_id: &str, packet_id: NonZeroU16, packet_type: PacketType) -> bool {
        self.monitors
            .remove_if(&(ClientId::from(client_id), packet_id.get()), |_, m| {
                m.awaited == packet_type
            })
            .is_some()
    }

    /// Cancels every monitor owned by the client.
    pub fn cancel_all(&self, client_id: &str) {
        self.monitors.retain(|(owner, _), _| owner != client_id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.monitors.len()
    }
}
