//! Receiver side of the publish exchange: inbound QoS 0/1/2 delivery,
//! duplicate suppression and retained-message bookkeeping.

use std::num::NonZeroU16;
use std::sync::Arc;

use mqttflow_codec::{Packet, PacketType, Publish, QoS};

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::session::{ClientId, ClientSession, PendingAcknowledgement, RetainedMessage};
use crate::Result;

pub(crate) async fn execute(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet: Packet,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::Publish(publish) => receive(ctx, client_id, publish, channel).await,
        Packet::PublishRelease { packet_id } => {
            released(ctx, client_id, packet_id, channel).await
        }
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}

async fn receive(
    ctx: &FlowContext,
    client_id: &ClientId,
    publish: Publish,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    if publish.qos == QoS::AtMostOnce {
        if publish.packet_id.is_some() {
            return Err(MqttError::PacketIdNotAllowed.into());
        }
    } else if publish.packet_id.is_none() {
        return Err(MqttError::PacketIdRequired.into());
    }

    if publish.retain {
        retain(ctx, &publish);
    }

    match publish.qos {
        QoS::AtMostOnce => {
            ctx.delivery.deliver(client_id, &publish).await;
            Ok(())
        }
        QoS::AtLeastOnce => {
            // packet_id presence was checked above
            let packet_id = publish.packet_id.ok_or(MqttError::PacketIdRequired)?;
            ctx.delivery.deliver(client_id, &publish).await;
            channel.send(Packet::PublishAck { packet_id }).await
        }
        QoS::ExactlyOnce => {
            let packet_id = publish.packet_id.ok_or(MqttError::PacketIdRequired)?;
            let session = read_session(ctx, client_id)?;
            if session.has_pending_acknowledgement(packet_id, PacketType::PublishReceived) {
                // duplicate delivery of an unreleased publish: acknowledge
                // again without re-delivering to the application
                log::debug!("{client_id} duplicate publish {packet_id}, delivery skipped");
            } else {
                ctx.sessions.update(
                    client_id.clone(),
                    session.with_pending_acknowledgement(PendingAcknowledgement {
                        packet_id,
                        packet_type: PacketType::PublishReceived,
                    }),
                );
                ctx.delivery.deliver(client_id, &publish).await;
            }
            channel.send(Packet::PublishReceived { packet_id }).await
        }
    }
}

/// QoS 2 final inbound stage: the sender released the exchange.
async fn released(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet_id: NonZeroU16,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    let session = read_session(ctx, client_id)?;
    ctx.sessions.update(
        client_id.clone(),
        session.without_pending_acknowledgement(packet_id, PacketType::PublishReceived),
    );
    channel.send(Packet::PublishComplete { packet_id }).await
}

/// A retained publish replaces the topic's retained entry; an empty payload
/// deletes it instead.
fn retain(ctx: &FlowContext, publish: &Publish) {
    if publish.payload.is_empty() {
        ctx.retained.delete(&publish.topic);
    } else {
        ctx.retained.update(publish.topic.clone(), RetainedMessage::from_publish(publish));
    }
}

fn read_session(ctx: &FlowContext, client_id: &ClientId) -> Result<ClientSession, MqttError> {
    ctx.sessions.read(client_id).ok_or_else(|| MqttError::SessionNotFound(client_id.clone()))
}
