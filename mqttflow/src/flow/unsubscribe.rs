//! Unsubscribe exchange.

use std::sync::Arc;

use mqttflow_codec::Packet;

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::session::ClientId;
use crate::Result;

pub(crate) async fn execute(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet: Packet,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::Unsubscribe { packet_id, topic_filters } => {
            let mut session = ctx
                .sessions
                .read(client_id)
                .ok_or_else(|| MqttError::SessionNotFound(client_id.clone()))?;
            for filter in &topic_filters {
                session = session.without_subscription(filter);
            }
            ctx.sessions.update(client_id.clone(), session);
            channel.send(Packet::UnsubscribeAck { packet_id }).await
        }
        Packet::UnsubscribeAck { packet_id } => {
            log::debug!("{client_id} unsubscribe {packet_id} acknowledged");
            Ok(())
        }
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}
