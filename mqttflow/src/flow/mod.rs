//! Packet-type to flow dispatch and the flow implementations.
//!
//! Flows are free functions keyed by [`ProtocolFlowType`]; the dispatcher
//! resolves the flow for a packet type under its role (a server never
//! resolves a ConnectAck for receipt, a client never a Connect) and invokes
//! it.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use mqttflow_codec::{Packet, PacketType};

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::session::ClientId;
use crate::Result;

pub(crate) mod connect;
pub(crate) mod disconnect;
pub(crate) mod ping;
pub(crate) mod publish_receiver;
pub mod publish_sender;
pub(crate) mod subscribe;
pub(crate) mod unsubscribe;

pub use publish_sender::send_publish;

/// Which end of the connection this dispatcher serves. The two roles accept
/// different inbound packet-type sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowRole {
    Client,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolFlowType {
    Connect,
    PublishSender,
    PublishReceiver,
    Subscribe,
    Unsubscribe,
    Ping,
    Disconnect,
}

static SERVER_FLOWS: Lazy<HashMap<PacketType, ProtocolFlowType>> = Lazy::new(|| {
    HashMap::from([
        (PacketType::Connect, ProtocolFlowType::Connect),
        (PacketType::Publish, ProtocolFlowType::PublishReceiver),
        (PacketType::PublishRelease, ProtocolFlowType::PublishReceiver),
        (PacketType::PublishAck, ProtocolFlowType::PublishSender),
        (PacketType::PublishReceived, ProtocolFlowType::PublishSender),
        (PacketType::PublishComplete, ProtocolFlowType::PublishSender),
        (PacketType::Subscribe, ProtocolFlowType::Subscribe),
        (PacketType::Unsubscribe, ProtocolFlowType::Unsubscribe),
        (PacketType::PingRequest, ProtocolFlowType::Ping),
        (PacketType::Disconnect, ProtocolFlowType::Disconnect),
    ])
});

static CLIENT_FLOWS: Lazy<HashMap<PacketType, ProtocolFlowType>> = Lazy::new(|| {
    HashMap::from([
        (PacketType::ConnectAck, ProtocolFlowType::Connect),
        (PacketType::Publish, ProtocolFlowType::PublishReceiver),
        (PacketType::PublishRelease, ProtocolFlowType::PublishReceiver),
        (PacketType::PublishAck, ProtocolFlowType::PublishSender),
        (PacketType::PublishReceived, ProtocolFlowType::PublishSender),
        (PacketType::PublishComplete, ProtocolFlowType::PublishSender),
        (PacketType::SubscribeAck, ProtocolFlowType::Subscribe),
        (PacketType::UnsubscribeAck, ProtocolFlowType::Unsubscribe),
        (PacketType::PingResponse, ProtocolFlowType::Ping),
    ])
});

/// Resolves inbound packets to flows for one role and runs them.
#[derive(Debug, Clone, Copy)]
pub struct ProtocolFlowDispatcher {
    role: FlowRole,
}

impl ProtocolFlowDispatcher {
    pub fn new(role: FlowRole) -> Self {
        Self { role }
    }

    pub fn role(&self) -> FlowRole {
        self.role
    }

    pub fn get_flow(&self, packet_type: PacketType) -> Result<ProtocolFlowType, MqttError> {
        let table = match self.role {
            FlowRole::Server => &*SERVER_FLOWS,
            FlowRole::Client => &*CLIENT_FLOWS,
        };
        table.get(&packet_type).copied().ok_or(MqttError::UnsupportedPacketType(packet_type))
    }

    /// Resolves and executes the flow for an inbound packet.
    pub async fn execute(
        &self,
        ctx: &FlowContext,
        client_id: &ClientId,
        packet: Packet,
        channel: &Arc<dyn MessageChannel>,
    ) -> Result<()> {
        match self.get_flow(packet.packet_type())? {
            ProtocolFlowType::Connect => connect::execute(ctx, client_id, packet, channel).await,
            ProtocolFlowType::PublishSender => {
                publish_sender::execute(ctx, client_id, packet, channel).await
            }
            ProtocolFlowType::PublishReceiver => {
                publish_receiver::execute(ctx, client_id, packet, channel).await
            }
            ProtocolFlowType::Subscribe => {
                subscribe::execute(ctx, client_id, packet, channel).await
            }
            ProtocolFlowType::Unsubscribe => {
                unsubscribe::execute(ctx, client_id, packet, channel).await
            }
            ProtocolFlowType::Ping => ping::execute(ctx, client_id, packet, channel).await,
            ProtocolFlowType::Disconnect => {
                disconnect::execute(ctx, client_id, packet, channel).await
            }
        }
    }
}
