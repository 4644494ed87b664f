//! Persisted session, retained-message and will entities manipulated by the
//! flow state machines.
//!
//! Sessions are plain values: flows read a session from the repository,
//! derive an updated value through the `with_*`/`without_*` methods and write
//! it back. No entity is mutated in place behind a shared reference.

use std::num::NonZeroU16;

use bytes::Bytes;
use bytestring::ByteString;
use serde::{Deserialize, Serialize};

use mqttflow_codec::{LastWill, PacketType, Publish, QoS};

pub type ClientId = ByteString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingMessageStatus {
    /// Queued for an offline session, not yet handed to a channel.
    PendingToSend,
    /// Sent at QoS > 0, awaiting the peer's acknowledgement.
    PendingToAcknowledge,
}

/// An outbound publish that has not completed its delivery exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub status: PendingMessageStatus,
    pub qos: QoS,
    pub retain: bool,
    pub dup: bool,
    pub topic: ByteString,
    pub packet_id: Option<NonZeroU16>,
    pub payload: Bytes,
}

impl PendingMessage {
    pub fn from_publish(publish: &Publish, status: PendingMessageStatus) -> Self {
        Self {
            status,
            qos: publish.qos,
            retain: publish.retain,
            dup: publish.dup,
            topic: publish.topic.clone(),
            packet_id: publish.packet_id,
            payload: publish.payload.clone(),
        }
    }

    /// Rebuilds the wire packet, marking it as a duplicate delivery.
    pub fn to_duplicate_publish(&self) -> Publish {
        Publish {
            dup: true,
            retain: self.retain,
            qos: self.qos,
            topic: self.topic.clone(),
            packet_id: self.packet_id,
            payload: self.payload.clone(),
        }
    }
}

/// Inbound QoS 2 handshake state that has not completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAcknowledgement {
    pub packet_id: NonZeroU16,
    pub packet_type: PacketType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSubscription {
    pub topic_filter: ByteString,
    pub maximum_qos: QoS,
}

/// Per-client protocol state surviving across packets (and, for non-clean
/// sessions, across connections).
///
/// Invariant: `pending_messages` holds at most one entry per packet id, and
/// `pending_acknowledgements` at most one entry per (packet id, packet type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSession {
    pub client_id: ClientId,
    pub clean_session: bool,
    pub pending_messages: Vec<PendingMessage>,
    pub pending_acknowledgements: Vec<PendingAcknowledgement>,
    pub subscriptions: Vec<ClientSubscription>,
}

impl ClientSession {
    pub fn new(client_id: ClientId, clean_session: bool) -> Self {
        Self {
            client_id,
            clean_session,
            pending_messages: Vec::new(),
            pending_acknowledgements: Vec::new(),
            subscriptions: Vec::new(),
        }
    }

    pub fn pending_message(&self, packet_id: NonZeroU16) -> Option<&PendingMessage> {
        self.pending_messages.iter().find(|m| m.packet_id == Some(packet_id))
    }

    /// Inserts or replaces the pending message carrying the same packet id.
    pub fn with_pending_message(mut self, message: PendingMessage) -> Self {
        if let Some(id) = message.packet_id {
            self.pending_messages.retain(|m| m.packet_id != Some(id));
        }
        self.pending_messages.push(message);
        self
    }

    pub fn without_pending_message(mut self, packet_id: NonZeroU16) -> Self {
        self.pending_messages.retain(|m| m.packet_id != Some(packet_id));
        self
    }

    pub fn has_pending_acknowledgement(
        &self,
        packet_id: NonZeroU16,
        packet_type: PacketType,
    ) -> bool {
        self.pending_acknowledgements
            .iter()
            .any(|a| a.packet_id == packet_id && a.packet_type == packet_type)
    }

    /// Inserts or replaces the acknowledgement for the same (id, type) pair.
    pub fn with_pending_acknowledgement(mut self, ack: PendingAcknowledgement) -> Self {
        self.pending_acknowledgements
            .retain(|a| !(a.packet_id == ack.packet_id && a.packet_type == ack.packet_type));
        self.pending_acknowledgements.push(ack);
        self
    }

    pub fn without_pending_acknowledgement(
        mut self,
        packet_id: NonZeroU16,
        packet_type: PacketType,
    ) -> Self {
        self.pending_acknowledgements
            .retain(|a| !(a.packet_id == packet_id && a.packet_type == packet_type));
        self
    }

    pub fn subscription(&self, topic_filter: &str) -> Option<&ClientSubscription> {
        self.subscriptions.iter().find(|s| s.topic_filter == topic_filter)
    }

    /// Inserts or replaces the subscription for the same topic filter.
    pub fn with_subscription(mut self, subscription: ClientSubscription) -> Self {
        self.subscriptions.retain(|s| s.topic_filter != subscription.topic_filter);
        self.subscriptions.push(subscription);
        self
    }

    pub fn without_subscription(mut self, topic_filter: &str) -> Self {
        self.subscriptions.retain(|s| s.topic_filter != topic_filter);
        self
    }
}

/// The last message published to a topic with the retain flag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedMessage {
    pub topic: ByteString,
    pub qos: QoS,
    pub payload: Bytes,
}

impl RetainedMessage {
    pub fn from_publish(publish: &Publish) -> Self {
        Self { topic: publish.topic.clone(), qos: publish.qos, payload: publish.payload.clone() }
    }
}

/// A will registered at connect time, published on ungraceful disconnection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionWill {
    pub client_id: ClientId,
    pub will: LastWill,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: u16) -> PendingMessage {
        PendingMessage {
            status: PendingMessageStatus::PendingToAcknowledge,
            qos: QoS::AtLeastOnce,
            retain: false,
            dup: false,
            topic: ByteString::from_static("a/b"),
            packet_id: NonZeroU16::new(id),
            payload: Bytes::from_static(b"x"),
        }
    }

    #[test]
    fn test_pending_message_unique_per_id() {
        let session = ClientSession::new("c1".into(), false)
            .with_pending_message(msg(1))
            .with_pending_message(msg(2))
            .with_pending_message(msg(1));
        assert_eq!(session.pending_messages.len(), 2);
        assert!(session.pending_message(NonZeroU16::new(1).unwrap()).is_some());

        let session = session.without_pending_message(NonZeroU16::new(1).unwrap());
        assert!(session.pending_message(NonZeroU16::new(1).unwrap()).is_none());
        assert_eq!(session.pending_messages.len(), 1);
    }

    #[test]
    fn test_pending_acknowledgement_unique_per_id_and_type() {
        let id = NonZeroU16::new(9).unwrap();
        let session = ClientSession::new("c1".into(), false)
            .with_pending_acknowledgement(PendingAcknowledgement {
                packet_id: id,
                packet_type: PacketType::PublishReceived,
            })
            .with_pending_acknowledgement(PendingAcknowledgement {
                packet_id: id,
                packet_type: PacketType::PublishReceived,
            })
            .with_pending_acknowledgement(PendingAcknowledgement {
                packet_id: id,
                packet_type: PacketType::PublishRelease,
            });
        assert_eq!(session.pending_acknowledgements.len(), 2);
        assert!(session.has_pending_acknowledgement(id, PacketType::PublishReceived));

        let session = session.without_pending_acknowledgement(id, PacketType::PublishReceived);
        assert!(!session.has_pending_acknowledgement(id, PacketType::PublishReceived));
        assert!(session.has_pending_acknowledgement(id, PacketType::PublishRelease));
    }

    #[test]
    fn test_subscription_upsert() {
        let session = ClientSession::new("c1".into(), true)
            .with_subscription(ClientSubscription {
                topic_filter: "a/+".into(),
                maximum_qos: QoS::AtMostOnce,
            })
            .with_subscription(ClientSubscription {
                topic_filter: "a/+".into(),
                maximum_qos: QoS::ExactlyOnce,
            });
        assert_eq!(session.subscriptions.len(), 1);
        assert_eq!(session.subscription("a/+").unwrap().maximum_qos, QoS::ExactlyOnce);

        let session = session.without_subscription("a/+");
        assert!(session.subscription("a/+").is_none());
    }

    #[test]
    fn test_duplicate_publish_sets_dup() {
        let p = msg(3).to_duplicate_publish();
        assert!(p.dup);
        assert_eq!(p.packet_id, NonZeroU16::new(3));
        assert_eq!(p.qos, QoS::AtLeastOnce);
    }
}
