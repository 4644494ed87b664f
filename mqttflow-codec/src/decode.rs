use std::num::NonZeroU16;

use bytes::{Buf, Bytes};
use bytestring::ByteString;

use crate::error::DecodeError;
use crate::packet::{is_valid_client_id, Connect, ConnectAck, LastWill, Packet, Publish, SubscribeReturnCode};
use crate::types::{ConnectAckFlags, ConnectFlags, PacketType, QoS, MQTT, MQTT_LEVEL_311, WILL_QOS_SHIFT};
use crate::utils::Decode;

pub(crate) fn decode_packet(mut src: Bytes, first_byte: u8) -> Result<Packet, DecodeError> {
    let packet_type = PacketType::try_from(first_byte >> 4)?;
    let flags = first_byte & 0b0000_1111;
    if let Some(expected) = packet_type.expected_flags() {
        ensure!(flags == expected, DecodeError::InvalidHeaderFlag);
    }

    match packet_type {
        PacketType::Connect => decode_connect_packet(&mut src),
        PacketType::ConnectAck => decode_connect_ack_packet(&mut src),
        PacketType::Publish => decode_publish_packet(&mut src, flags),
        PacketType::PublishAck => decode_ack(src, |packet_id| Packet::PublishAck { packet_id }),
        PacketType::PublishReceived => {
            decode_ack(src, |packet_id| Packet::PublishReceived { packet_id })
        }
        PacketType::PublishRelease => {
            decode_ack(src, |packet_id| Packet::PublishRelease { packet_id })
        }
        PacketType::PublishComplete => {
            decode_ack(src, |packet_id| Packet::PublishComplete { packet_id })
        }
        PacketType::Subscribe => decode_subscribe_packet(&mut src),
        PacketType::SubscribeAck => decode_subscribe_ack_packet(&mut src),
        PacketType::Unsubscribe => decode_unsubscribe_packet(&mut src),
        PacketType::UnsubscribeAck => {
            decode_ack(src, |packet_id| Packet::UnsubscribeAck { packet_id })
        }
        PacketType::PingRequest => decode_empty(src, Packet::PingRequest),
        PacketType::PingResponse => decode_empty(src, Packet::PingResponse),
        PacketType::Disconnect => decode_empty(src, Packet::Disconnect),
    }
}

#[inline]
fn decode_ack(mut src: Bytes, f: impl Fn(NonZeroU16) -> Packet) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(&mut src)?;
    ensure!(!src.has_remaining(), DecodeError::InvalidLength);
    Ok(f(packet_id))
}

#[inline]
fn decode_empty(src: Bytes, packet: Packet) -> Result<Packet, DecodeError> {
    ensure!(!src.has_remaining(), DecodeError::InvalidLength);
    Ok(packet)
}

fn decode_connect_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    ensure!(src.remaining() >= 10, DecodeError::InvalidLength);
    let len = src.get_u16();

    if len == 4 && &src.as_ref()[0..4] == MQTT {
        src.advance(4);
    } else {
        return Err(DecodeError::InvalidProtocolName);
    }

    let level = src.get_u8();
    ensure!(level >= MQTT_LEVEL_311, DecodeError::UnsupportedProtocolLevel);

    let flags = ConnectFlags::from_bits(src.get_u8()).ok_or(DecodeError::ConnectReservedFlagSet)?;

    let will_qos = (flags & ConnectFlags::WILL_QOS).bits() >> WILL_QOS_SHIFT;
    ensure!(will_qos <= 2, DecodeError::InvalidWillConfiguration);
    if !flags.contains(ConnectFlags::WILL) {
        // will retain/QoS are meaningless without the will flag
        ensure!(
            will_qos == 0 && !flags.contains(ConnectFlags::WILL_RETAIN),
            DecodeError::InvalidWillConfiguration
        );
    }
    ensure!(
        !flags.contains(ConnectFlags::PASSWORD) || flags.contains(ConnectFlags::USERNAME),
        DecodeError::PasswordWithoutUserName
    );

    let keep_alive = u16::decode(src)?;
    let client_id = ByteString::decode(src)?;

    if client_id.is_empty() {
        ensure!(flags.contains(ConnectFlags::CLEAN_START), DecodeError::InvalidClientId);
    } else {
        ensure!(is_valid_client_id(&client_id), DecodeError::InvalidClientId);
    }

    let last_will = if flags.contains(ConnectFlags::WILL) {
        let topic = ByteString::decode(src)?;
        let message = Bytes::decode(src)?;
        Some(LastWill {
            qos: QoS::try_from(will_qos)?,
            retain: flags.contains(ConnectFlags::WILL_RETAIN),
            topic,
            message,
        })
    } else {
        None
    };
    let username =
        if flags.contains(ConnectFlags::USERNAME) { Some(ByteString::decode(src)?) } else { None };
    let password =
        if flags.contains(ConnectFlags::PASSWORD) { Some(Bytes::decode(src)?) } else { None };
    Ok(Connect {
        clean_session: flags.contains(ConnectFlags::CLEAN_START),
        keep_alive,
        client_id,
        last_will,
        username,
        password,
    }
    .into())
}

fn decode_connect_ack_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    ensure!(src.remaining() >= 2, DecodeError::InvalidLength);
    let flags =
        ConnectAckFlags::from_bits(src.get_u8()).ok_or(DecodeError::ConnAckReservedFlagSet)?;

    let return_code: super::packet::ConnectAckReason = src.get_u8().try_into()?;
    let session_present = flags.contains(ConnectAckFlags::SESSION_PRESENT);
    ensure!(
        matches!(return_code, super::packet::ConnectAckReason::ConnectionAccepted)
            || !session_present,
        DecodeError::InvalidSessionPresent
    );
    Ok(Packet::ConnectAck(ConnectAck { return_code, session_present }))
}

fn decode_publish_packet(src: &mut Bytes, packet_flags: u8) -> Result<Packet, DecodeError> {
    let qos = QoS::try_from((packet_flags & 0b0110) >> 1)?;
    let dup = (packet_flags & 0b1000) == 0b1000;
    ensure!(!(dup && qos == QoS::AtMostOnce), DecodeError::MalformedPacket);

    let topic = ByteString::decode(src)?;
    ensure!(!topic.is_empty() && !topic.contains(['#', '+']), DecodeError::InvalidTopicName);

    let packet_id = if qos == QoS::AtMostOnce {
        None
    } else {
        Some(NonZeroU16::decode(src)?) // packet id = 0 is malformed
    };

    Ok(Packet::Publish(Publish {
        dup,
        qos,
        retain: (packet_flags & 0b0001) == 0b0001,
        topic,
        packet_id,
        payload: src.split_off(0),
    }))
}

fn decode_subscribe_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(src)?;
    let mut topic_filters = Vec::new();
    while src.has_remaining() {
        let topic = ByteString::decode(src)?;
        ensure!(src.remaining() >= 1, DecodeError::InvalidLength);
        let qos_byte = src.get_u8();
        ensure!(qos_byte & 0b1111_1100 == 0, DecodeError::MalformedPacket);
        topic_filters.push((topic, qos_byte.try_into()?));
    }
    ensure!(!topic_filters.is_empty(), DecodeError::MissingTopicFilters);

    Ok(Packet::Subscribe { packet_id, topic_filters })
}

fn decode_subscribe_ack_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(src)?;
    ensure!(src.has_remaining(), DecodeError::InvalidReturnCodes);
    let mut status = Vec::with_capacity(src.len());
    for code in src.as_ref().iter() {
        status.push(match *code {
            0x80 => SubscribeReturnCode::Failure,
            0x00..=0x02 => SubscribeReturnCode::Success(QoS::try_from(*code)?),
            _ => return Err(DecodeError::InvalidReturnCodes),
        });
    }
    Ok(Packet::SubscribeAck { packet_id, status })
}

fn decode_unsubscribe_packet(src: &mut Bytes) -> Result<Packet, DecodeError> {
    let packet_id = NonZeroU16::decode(src)?;
    let mut topic_filters = Vec::new();
    while src.remaining() > 0 {
        topic_filters.push(ByteString::decode(src)?);
    }
    ensure!(!topic_filters.is_empty(), DecodeError::MissingTopics);
    Ok(Packet::Unsubscribe { packet_id, topic_filters })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ConnectAckReason;
    use crate::utils::decode_variable_length;

    macro_rules! assert_decode_packet (
        ($bytes:expr, $res:expr) => {{
            let first_byte = $bytes.as_ref()[0];
            let (_len, consumed) = decode_variable_length(&$bytes[1..]).unwrap().unwrap();
            let cur = Bytes::from_static(&$bytes[consumed + 1..]);
            assert_eq!(decode_packet(cur, first_byte).unwrap(), $res);
        }};
    );

    macro_rules! assert_decode_err (
        ($bytes:expr, $err:pat) => {{
            let first_byte = $bytes.as_ref()[0];
            let (_len, consumed) = decode_variable_length(&$bytes[1..]).unwrap().unwrap();
            let cur = Bytes::from_static(&$bytes[consumed + 1..]);
            assert!(matches!(decode_packet(cur, first_byte), Err($err)));
        }};
    );

    fn packet_id(v: u16) -> NonZeroU16 {
        NonZeroU16::new(v).unwrap()
    }

    #[test]
    fn test_decode_connect_packets() {
        assert_eq!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\xC0\x00\x3C\x00\x0512345\x00\x04user\x00\x04pass"
            ))
            .unwrap(),
            Packet::Connect(Box::new(Connect {
                clean_session: false,
                keep_alive: 60,
                client_id: ByteString::from_static("12345"),
                last_will: None,
                username: Some(ByteString::from_static("user")),
                password: Some(Bytes::from(&b"pass"[..])),
            }))
        );

        assert_eq!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x14\x00\x3C\x00\x0512345\x00\x05topic\x00\x07message"
            ))
            .unwrap(),
            Packet::Connect(Box::new(Connect {
                clean_session: false,
                keep_alive: 60,
                client_id: ByteString::from_static("12345"),
                last_will: Some(LastWill {
                    qos: QoS::ExactlyOnce,
                    retain: false,
                    topic: ByteString::from_static("topic"),
                    message: Bytes::from(&b"message"[..]),
                }),
                username: None,
                password: None,
            }))
        );

        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(b"\x00\x02MQ00000000000000000000")),
            Err(DecodeError::InvalidProtocolName)
        ));
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(b"\x00\x10MQ00000000000000000000")),
            Err(DecodeError::InvalidProtocolName)
        ));
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(b"\x00\x04MQAA00000000000000000000")),
            Err(DecodeError::InvalidProtocolName)
        ));
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x0300000000000000000000"
            )),
            Err(DecodeError::UnsupportedProtocolLevel)
        ));
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\xff00000000000000000000"
            )),
            Err(DecodeError::ConnectReservedFlagSet)
        ));

        // password flag without user name flag
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x40\x00\x3C\x00\x0512345\x00\x04pass"
            )),
            Err(DecodeError::PasswordWithoutUserName)
        ));

        // will retain without will flag
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x20\x00\x3C\x00\x0512345"
            )),
            Err(DecodeError::InvalidWillConfiguration)
        ));

        // will QoS = 3
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x1C\x00\x3C\x00\x0512345\x00\x05topic\x00\x07message"
            )),
            Err(DecodeError::InvalidWillConfiguration)
        ));

        // client id longer than 23 bytes
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x00\x00\x3C\x00\x18abcdefghijklmnopqrstuvwx"
            )),
            Err(DecodeError::InvalidClientId)
        ));

        // client id with an invalid character
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x00\x00\x3C\x00\x05cl en"
            )),
            Err(DecodeError::InvalidClientId)
        ));

        // empty client id without clean session
        assert!(matches!(
            decode_connect_packet(&mut Bytes::from_static(
                b"\x00\x04MQTT\x04\x00\x00\x3C\x00\x00"
            )),
            Err(DecodeError::InvalidClientId)
        ));

        // empty client id with clean session is left to the anonymous-id policy
        assert!(decode_connect_packet(&mut Bytes::from_static(
            b"\x00\x04MQTT\x04\x02\x00\x3C\x00\x00"
        ))
        .is_ok());

        assert_decode_packet!(b"\xe0\x00", Packet::Disconnect);
    }

    #[test]
    fn test_decode_connect_ack_packets() {
        assert_eq!(
            decode_connect_ack_packet(&mut Bytes::from_static(b"\x01\x00")).unwrap(),
            Packet::ConnectAck(ConnectAck {
                session_present: true,
                return_code: ConnectAckReason::ConnectionAccepted
            })
        );

        // session present must be false for a refused connection
        assert!(matches!(
            decode_connect_ack_packet(&mut Bytes::from_static(b"\x01\x04")),
            Err(DecodeError::InvalidSessionPresent)
        ));

        assert!(matches!(
            decode_connect_ack_packet(&mut Bytes::from_static(b"\x03\x04")),
            Err(DecodeError::ConnAckReservedFlagSet)
        ));

        assert_decode_packet!(
            b"\x20\x02\x00\x04",
            Packet::ConnectAck(ConnectAck {
                session_present: false,
                return_code: ConnectAckReason::BadUserNameOrPassword,
            })
        );
    }

    #[test]
    fn test_decode_publish_packets() {
        assert_decode_packet!(
            b"\x3d\x0D\x00\x05topic\x43\x21data",
            Packet::Publish(Publish {
                dup: true,
                retain: true,
                qos: QoS::ExactlyOnce,
                topic: ByteString::from_static("topic"),
                packet_id: Some(packet_id(0x4321)),
                payload: Bytes::from_static(b"data"),
            })
        );
        assert_decode_packet!(
            b"\x30\x0b\x00\x05topicdata",
            Packet::Publish(Publish {
                dup: false,
                retain: false,
                qos: QoS::AtMostOnce,
                topic: ByteString::from_static("topic"),
                packet_id: None,
                payload: Bytes::from_static(b"data"),
            })
        );

        // dup flag with QoS 0
        assert_decode_err!(b"\x38\x0b\x00\x05topicdata", DecodeError::MalformedPacket);
        // wildcard in a publish topic
        assert_decode_err!(b"\x30\x0b\x00\x05top+cdata", DecodeError::InvalidTopicName);
        // packet id = 0 with QoS 1
        assert_decode_err!(b"\x32\x0D\x00\x05topic\x00\x00data", DecodeError::MalformedPacket);

        assert_decode_packet!(b"\x40\x02\x43\x21", Packet::PublishAck { packet_id: packet_id(0x4321) });
        assert_decode_packet!(
            b"\x50\x02\x43\x21",
            Packet::PublishReceived { packet_id: packet_id(0x4321) }
        );
        assert_decode_packet!(
            b"\x62\x02\x43\x21",
            Packet::PublishRelease { packet_id: packet_id(0x4321) }
        );
        assert_decode_packet!(
            b"\x70\x02\x43\x21",
            Packet::PublishComplete { packet_id: packet_id(0x4321) }
        );

        // PublishRelease must carry flag bits 0b0010
        assert_decode_err!(b"\x60\x02\x43\x21", DecodeError::InvalidHeaderFlag);
    }

    #[test]
    fn test_decode_subscribe_packets() {
        let p = Packet::Subscribe {
            packet_id: packet_id(0x1234),
            topic_filters: vec![
                (ByteString::from_static("test"), QoS::AtLeastOnce),
                (ByteString::from_static("filter"), QoS::ExactlyOnce),
            ],
        };

        assert_eq!(
            decode_subscribe_packet(&mut Bytes::from_static(
                b"\x12\x34\x00\x04test\x01\x00\x06filter\x02"
            ))
            .unwrap(),
            p
        );
        assert_decode_packet!(b"\x82\x12\x12\x34\x00\x04test\x01\x00\x06filter\x02", p);

        // wrong fixed header flags
        assert_decode_err!(
            b"\x80\x12\x12\x34\x00\x04test\x01\x00\x06filter\x02",
            DecodeError::InvalidHeaderFlag
        );
        // empty payload
        assert!(matches!(
            decode_subscribe_packet(&mut Bytes::from_static(b"\x12\x34")),
            Err(DecodeError::MissingTopicFilters)
        ));

        let p = Packet::SubscribeAck {
            packet_id: packet_id(0x1234),
            status: vec![
                SubscribeReturnCode::Success(QoS::AtLeastOnce),
                SubscribeReturnCode::Failure,
                SubscribeReturnCode::Success(QoS::ExactlyOnce),
            ],
        };

        assert_eq!(
            decode_subscribe_ack_packet(&mut Bytes::from_static(b"\x12\x34\x01\x80\x02")).unwrap(),
            p
        );
        assert_decode_packet!(b"\x90\x05\x12\x34\x01\x80\x02", p);

        // 0x40 is not a valid return code
        assert!(matches!(
            decode_subscribe_ack_packet(&mut Bytes::from_static(b"\x12\x34\x01\x40")),
            Err(DecodeError::InvalidReturnCodes)
        ));
        // at least one return code is required
        assert!(matches!(
            decode_subscribe_ack_packet(&mut Bytes::from_static(b"\x12\x34")),
            Err(DecodeError::InvalidReturnCodes)
        ));

        let p = Packet::Unsubscribe {
            packet_id: packet_id(0x1234),
            topic_filters: vec![
                ByteString::from_static("test"),
                ByteString::from_static("filter"),
            ],
        };

        assert_eq!(
            decode_unsubscribe_packet(&mut Bytes::from_static(
                b"\x12\x34\x00\x04test\x00\x06filter"
            ))
            .unwrap(),
            p
        );
        assert_decode_packet!(b"\xa2\x10\x12\x34\x00\x04test\x00\x06filter", p);

        assert!(matches!(
            decode_unsubscribe_packet(&mut Bytes::from_static(b"\x12\x34")),
            Err(DecodeError::MissingTopics)
        ));

        assert_decode_packet!(
            b"\xb0\x02\x43\x21",
            Packet::UnsubscribeAck { packet_id: packet_id(0x4321) }
        );
    }

    #[test]
    fn test_decode_ping_packets() {
        assert_decode_packet!(b"\xc0\x00", Packet::PingRequest);
        assert_decode_packet!(b"\xd0\x00", Packet::PingResponse);
    }

    #[test]
    fn test_unknown_packet_type() {
        assert!(matches!(
            decode_packet(Bytes::new(), 0xf0),
            Err(DecodeError::UnsupportedPacketType(15))
        ));
        assert!(matches!(
            decode_packet(Bytes::new(), 0x00),
            Err(DecodeError::UnsupportedPacketType(0))
        ));
    }
}
