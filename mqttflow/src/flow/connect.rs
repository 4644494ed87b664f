//! Connect exchange: server-side session establishment and client-side
//! ConnectAck handling.

use std::sync::Arc;

use uuid::Uuid;

use mqttflow_codec::{is_valid_client_id, Connect, ConnectAck, ConnectAckReason, Packet};

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::session::{ClientId, ClientSession, ConnectionWill};
use crate::Result;

pub(crate) async fn execute(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet: Packet,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::Connect(connect) => accept(ctx, *connect, channel).await,
        Packet::ConnectAck(ack) => acknowledge(client_id, ack),
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}

/// Server side: validate the Connect, establish or resume the session and
/// answer with a ConnectAck.
///
/// Refusals are a wire response, not an error; the host closes the channel
/// after a non-accepted ConnectAck.
async fn accept(
    ctx: &FlowContext,
    connect: Connect,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    let client_id = if connect.client_id.is_empty() {
        if connect.clean_session && ctx.cfg.allow_anonymous {
            ClientId::from(Uuid::new_v4().as_simple().to_string())
        } else {
            return refuse(channel, ConnectAckReason::IdentifierRejected).await;
        }
    } else if !is_valid_client_id(&connect.client_id) {
        return refuse(channel, ConnectAckReason::IdentifierRejected).await;
    } else {
        connect.client_id.clone()
    };

    let authenticated = ctx
        .authenticator
        .authenticate(&client_id, connect.username.as_deref(), connect.password.as_deref())
        .await;
    if !authenticated {
        log::info!("{client_id} authentication failed");
        return refuse(channel, ConnectAckReason::BadUserNameOrPassword).await;
    }

    let existing = ctx.sessions.read(&client_id);
    let session_present = existing.is_some() && !connect.clean_session;
    let session = if connect.clean_session {
        // discard prior state, including any still-running retransmissions
        ctx.monitors.cancel_all(&client_id);
        ctx.sessions.delete(&client_id);
        ClientSession::new(client_id.clone(), true)
    } else {
        existing.unwrap_or_else(|| ClientSession::new(client_id.clone(), false))
    };
    ctx.sessions.update(client_id.clone(), session);

    match connect.last_will {
        Some(will) => {
            ctx.wills.update(client_id.clone(), ConnectionWill { client_id: client_id.clone(), will })
        }
        None => {
            ctx.wills.delete(&client_id);
        }
    }

    log::debug!("{client_id} connected, session_present: {session_present}");
    channel
        .send(Packet::ConnectAck(ConnectAck {
            return_code: ConnectAckReason::ConnectionAccepted,
            session_present,
        }))
        .await
}

/// Client side: a non-accepted return code fails the connect attempt.
fn acknowledge(client_id: &ClientId, ack: ConnectAck) -> Result<()> {
    if ack.return_code != ConnectAckReason::ConnectionAccepted {
        return Err(MqttError::ConnectionRefused(ack.return_code).into());
    }
    log::debug!("{client_id} connection accepted, session_present: {}", ack.session_present);
    Ok(())
}

async fn refuse(channel: &Arc<dyn MessageChannel>, reason: ConnectAckReason) -> Result<()> {
    channel
        .send(Packet::ConnectAck(ConnectAck { return_code: reason, session_present: false }))
        .await
}
