//! Keep-alive exchange.

use std::sync::Arc;

use mqttflow_codec::Packet;

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::session::ClientId;
use crate::Result;

pub(crate) async fn execute(
    _ctx: &FlowContext,
    client_id: &ClientId,
    packet: Packet,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::PingRequest => channel.send(Packet::PingResponse).await,
        Packet::PingResponse => {
            log::debug!("{client_id} pong");
            Ok(())
        }
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}
