//! Subscribe exchange: filter validation, subscription persistence and
//! retained-message delivery to new subscribers.

use std::sync::Arc;

use bytestring::ByteString;

use mqttflow_codec::{Packet, Publish, QoS, SubscribeReturnCode};

use crate::channel::MessageChannel;
use crate::context::FlowContext;
use crate::error::MqttError;
use crate::flow::publish_sender;
use crate::session::{ClientId, ClientSubscription};
use crate::Result;

pub(crate) async fn execute(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet: Packet,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    match packet {
        Packet::Subscribe { packet_id, topic_filters } => {
            subscribe(ctx, client_id, packet_id, topic_filters, channel).await
        }
        Packet::SubscribeAck { packet_id, status } => {
            log::debug!("{client_id} subscribe {packet_id} acknowledged: {status:?}");
            Ok(())
        }
        other => Err(MqttError::UnsupportedPacketType(other.packet_type()).into()),
    }
}

/// Server side: each filter is granted or failed individually; one bad filter
/// degrades to a Failure return code instead of rejecting the whole packet.
async fn subscribe(
    ctx: &FlowContext,
    client_id: &ClientId,
    packet_id: std::num::NonZeroU16,
    topic_filters: Vec<(ByteString, QoS)>,
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    let mut session = ctx
        .sessions
        .read(client_id)
        .ok_or_else(|| MqttError::SessionNotFound(client_id.clone()))?;

    let mut status = Vec::with_capacity(topic_filters.len());
    let mut granted = Vec::new();
    for (filter, qos) in topic_filters {
        if ctx.topics.is_valid_topic_filter(&filter) {
            session = session.with_subscription(ClientSubscription {
                topic_filter: filter.clone(),
                maximum_qos: qos,
            });
            status.push(SubscribeReturnCode::Success(qos));
            granted.push((filter, qos));
        } else {
            log::info!("{client_id} subscription to {filter:?} failed, invalid filter");
            status.push(SubscribeReturnCode::Failure);
        }
    }
    ctx.sessions.update(client_id.clone(), session);

    channel.send(Packet::SubscribeAck { packet_id, status }).await?;

    deliver_retained(ctx, client_id, &granted, channel).await
}

/// Replays matching retained messages to the new subscriber, capped at the
/// granted maximum QoS.
async fn deliver_retained(
    ctx: &FlowContext,
    client_id: &ClientId,
    granted: &[(ByteString, QoS)],
    channel: &Arc<dyn MessageChannel>,
) -> Result<()> {
    for (topic, retained) in ctx.retained.read_all() {
        for (filter, max_qos) in granted {
            if ctx.topics.matches(&topic, filter).unwrap_or(false) {
                let publish = Publish {
                    dup: false,
                    retain: true,
                    qos: retained.qos.less_value(*max_qos),
                    topic: retained.topic.clone(),
                    packet_id: None,
                    payload: retained.payload.clone(),
                };
                publish_sender::send_publish(ctx, client_id, channel, publish).await?;
                break;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::test_support::{channel, context_with_session};
    use crate::session::RetainedMessage;
    use bytes::Bytes;
    use std::num::NonZeroU16;

    fn subscribe_packet(filters: &[(&'static str, QoS)]) -> Packet {
        Packet::Subscribe {
            packet_id: NonZeroU16::new(11).unwrap(),
            topic_filters: filters
                .iter()
                .map(|(f, q)| (ByteString::from_static(f), *q))
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_grants_valid_filters_and_fails_invalid_ones() {
        let ctx = context_with_session("c1", true);
        let (mock, ch) = channel();

        execute(
            &ctx,
            &"c1".into(),
            subscribe_packet(&[
                ("sport/+", QoS::AtLeastOnce),
                ("bad/#/filter", QoS::ExactlyOnce),
                ("news", QoS::AtMostOnce),
            ]),
            &ch,
        )
        .await
        .unwrap();

        match &mock.sent()[0] {
            Packet::SubscribeAck { packet_id, status } => {
                assert_eq!(packet_id.get(), 11);
                assert_eq!(
                    status,
                    &vec![
                        SubscribeReturnCode::Success(QoS::AtLeastOnce),
                        SubscribeReturnCode::Failure,
                        SubscribeReturnCode::Success(QoS::AtMostOnce),
                    ]
                );
            }
            other => panic!("expected SubscribeAck, got {other:?}"),
        }

        let session = ctx.sessions.read("c1").unwrap();
        assert!(session.subscription("sport/+").is_some());
        assert!(session.subscription("news").is_some());
        assert!(session.subscription("bad/#/filter").is_none());
    }

    #[tokio::test]
    async fn test_resubscribe_updates_maximum_qos() {
        let ctx = context_with_session("c1", true);
        let (_, ch) = channel();

        execute(&ctx, &"c1".into(), subscribe_packet(&[("a/b", QoS::AtMostOnce)]), &ch)
            .await
            .unwrap();
        execute(&ctx, &"c1".into(), subscribe_packet(&[("a/b", QoS::ExactlyOnce)]), &ch)
            .await
            .unwrap();

        let session = ctx.sessions.read("c1").unwrap();
        assert_eq!(session.subscriptions.len(), 1);
        assert_eq!(session.subscription("a/b").unwrap().maximum_qos, QoS::ExactlyOnce);
    }

    #[tokio::test]
    async fn test_retained_delivered_to_new_subscriber() {
        let ctx = context_with_session("c1", true);
        let (mock, ch) = channel();

        ctx.retained.create(
            "sport/tennis".into(),
            RetainedMessage {
                topic: "sport/tennis".into(),
                qos: QoS::ExactlyOnce,
                payload: Bytes::from_static(b"score"),
            },
        );
        ctx.retained.create(
            "news/world".into(),
            RetainedMessage {
                topic: "news/world".into(),
                qos: QoS::AtMostOnce,
                payload: Bytes::from_static(b"headline"),
            },
        );

        execute(&ctx, &"c1".into(), subscribe_packet(&[("sport/+", QoS::AtMostOnce)]), &ch)
            .await
            .unwrap();

        let sent = mock.sent();
        assert_eq!(sent.len(), 2);
        match &sent[1] {
            Packet::Publish(p) => {
                assert_eq!(p.topic, "sport/tennis");
                assert!(p.retain);
                // capped at the granted maximum QoS
                assert_eq!(p.qos, QoS::AtMostOnce);
                assert_eq!(p.payload, Bytes::from_static(b"score"));
            }
            other => panic!("expected retained Publish, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_session_is_fatal() {
        let ctx = crate::flow::test_support::context();
        let (_, ch) = channel();

        let err = execute(&ctx, &"ghost".into(), subscribe_packet(&[("a", QoS::AtMostOnce)]), &ch)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<MqttError>(), Some(MqttError::SessionNotFound(_))));
    }
}
