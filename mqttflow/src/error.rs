use bytestring::ByteString;

use mqttflow_codec::error::{DecodeError, EncodeError};
use mqttflow_codec::{ConnectAckReason, PacketType};

/// Protocol-engine errors
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    /// MQTT decoding error
    #[error("Decoding error: {0:?}")]
    Decode(#[from] DecodeError),
    /// MQTT encoding error
    #[error("Encoding error: {0:?}")]
    Encode(#[from] EncodeError),
    /// No session exists for an active client id mid-flow; fatal for the exchange
    #[error("session not found: {0}")]
    SessionNotFound(ByteString),
    #[error("packet id is required")]
    PacketIdRequired,
    #[error("packet id is not allowed")]
    PacketIdNotAllowed,
    /// The packet type is not valid for this dispatcher's role
    #[error("unsupported packet type: {0:?}")]
    UnsupportedPacketType(PacketType),
    #[error("invalid topic name: {0}")]
    InvalidTopicName(String),
    #[error("invalid topic filter: {0}")]
    InvalidTopicFilter(String),
    /// The peer refused the connection with the given return code
    #[error("connection refused: {}", .0.reason())]
    ConnectionRefused(ConnectAckReason),
    /// The outbound send path of the channel is closed
    #[error("channel closed")]
    ChannelClosed,
}
