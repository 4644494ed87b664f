//! Sender side of the publish exchange: QoS 0/1/2 outbound delivery and the
//! acknowledgement packets that drive it forward.

use std::num::NonZeroU16;
use std::sync::Arc;

use mqttflow_codec::{Packet, PacketType, Publish, QoS};

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::session::{
    ClientId, ClientSession, PendingAcknowledgement, PendingMessage, PendingMessageStatus,
};
use crate::Result;

/// Initiates an outbound publish on behalf of `client_id`.
///
/// QoS 0 is send-and-forget. QoS 1/2 allocate a packet id if the caller did
/// not, persist the message as pending and start an acknowledgement monitor
/// that resends with the dup flag until the expected ack arrives.
pub async fn send_publish(
    ctx: &FlowContext,
    client_id: &ClientId,
    channel: &Arc<dyn MessageChannel>,
    mut publish: Publish,
) -> Result<()> {
    if publish.qos == QoS::AtMostOnce {
        if publish.packet_id.is_some() {
            return Err(MqttError::PacketIdNotAllowed.into());
        }
        return channel.send(Packet::Publish(publish)).await;
    }

    let packet_id = match publish.packet_id {
        Some(id) => id,
        None => {
            let id = ctx.packet_ids.next_id();
            publish.packet_id = Some(id);
            id
        }
    };

    let session = read_session(ctx, client_id)?;
    let pending =
        PendingMessage::from_publish(&publish, PendingMessageStatus::PendingToAcknowledge);
    ctx.sessions.update(client_id.clone(), session.with_pending_message(pending.clone()));

    channel.send(Packet::Publish(publish)).await?;

    let awaited = match pending.qos {
        QoS::AtLeastOnce => PacketType::PublishAck,
        _ => PacketType::PublishReceived,
    };
    ctx.monitors.start(
        client_id.clone(),
        packet_id,
        awaited,
        Packet::Publish(pending.to_duplicate_publish()),
        channel.clone(),
        ctx.cfg.wait_timeout(),
    );
    Ok(())
}

/// Handles the acknowledgements a sender receives: PublishAck (QoS 1),
/// PublishReceived and PublishComplete (QoS 2).
pub(crate) async fn execute(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet: Packet,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::PublishAck { packet_id } => acknowledged(ctx, client_id, packet_id),
        Packet::PublishReceived { packet_id } => {
            received(ctx, client_id, packet_id, channel).await
        }
        Packet::PublishComplete { packet_id } => completed(ctx, client_id, packet_id),
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}

/// QoS 1 terminal stage: the peer acknowledged, clear the pending message.
fn acknowledged(ctx: &FlowContext, client_id: &ClientId, packet_id: NonZeroU16) -> Result<()> {
    ctx.monitors.complete(client_id, packet_id, PacketType::PublishAck);
    let session = read_session(ctx, client_id)?;
    ctx.sessions.update(client_id.clone(), session.without_pending_message(packet_id));
    log::debug!("{client_id} publish {packet_id} acknowledged");
    Ok(())
}

/// QoS 2 middle stage: the peer stored the publish; release it and await
/// PublishComplete.
async fn received(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet_id: NonZeroU16,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    ctx.monitors.complete(client_id, packet_id, PacketType::PublishReceived);
    let session = read_session(ctx, client_id)?;
    let session = session.without_pending_message(packet_id).with_pending_acknowledgement(
        PendingAcknowledgement { packet_id, packet_type: PacketType::PublishRelease },
    );
    ctx.sessions.update(client_id.clone(), session);

    channel.send(Packet::PublishRelease { packet_id }).await?;
    ctx.monitors.start(
        client_id.clone(),
        packet_id,
        PacketType::PublishComplete,
        Packet::PublishRelease { packet_id },
        channel.clone(),
        ctx.cfg.wait_timeout(),
    );
    Ok(())
}

/// QoS 2 terminal stage: the handshake is complete, clear the release state.
fn completed(ctx: &FlowContext, client_id: &ClientId, packet_id: NonZeroU16) -> Result<()> {
    ctx.monitors.complete(client_id, packet_id, PacketType::PublishComplete);
    let session = read_session(ctx, client_id)?;
    ctx.sessions.update(
        client_id.clone(),
        session.without_pending_acknowledgement(packet_id, PacketType::PublishRelease),
    );
    log::debug!("{client_id} publish {packet_id} completed");
    Ok(())
}

fn read_session(ctx: &FlowContext, client_id: &ClientId) -> Result<ClientSession, MqttError> {
    ctx.sessions.read(client_id).ok_or_else(|| MqttError::SessionNotFound(client_id.clone()))
}
