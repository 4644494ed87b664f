//! Orderly disconnect: discards the will, stops retransmissions and drops
//! clean sessions.

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
    _channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::Disconnect => {
            // an orderly disconnect never publishes the will
            ctx.wills.delete(client_id);
            ctx.monitors.cancel_all(client_id);
            if let Some(session) = ctx.sessions.read(client_id) {
                if session.clean_session {
                    ctx.sessions.delete(client_id);
                }
            }
            log::debug!("{client_id} disconnected");
            Ok(())
        }
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::test_support::{channel, context_with_session};
    use crate::session::ConnectionWill;
    use bytes::Bytes;
    use bytestring::ByteString;
    use mqttflow_codec::{LastWill, QoS};

    fn will(client_id: &'static str) -> ConnectionWill {
        ConnectionWill {
            client_id: ByteString::from_static(client_id),
            will: LastWill {
                qos: QoS::AtLeastOnce,
                retain: false,
                topic: ByteString::from_static("will/t"),
                message: Bytes::from_static(b"gone"),
            },
        }
    }

    #[tokio::test]
    async fn test_clean_session_dropped_and_will_discarded() {
        let ctx = context_with_session("c1", true);
        ctx.wills.create("c1".into(), will("c1"));
        let (mock, ch) = channel();

        execute(&ctx, &"c1".into(), Packet::Disconnect, &ch).await.unwrap();

        assert!(ctx.sessions.read("c1").is_none());
        assert!(ctx.wills.read("c1").is_none());
        // no response packet for a Disconnect
        assert_eq!(mock.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_persistent_session_survives_disconnect() {
        let ctx = context_with_session("c1", false);
        ctx.wills.create("c1".into(), will("c1"));
        let (_, ch) = channel();

        execute(&ctx, &"c1".into(), Packet::Disconnect, &ch).await.unwrap();

        assert!(ctx.sessions.read("c1").is_some());
        assert!(ctx.wills.read("c1").is_none());
    }
}
