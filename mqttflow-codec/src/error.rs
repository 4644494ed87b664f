use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// More than 4 bytes in the Remaining Length field
    #[error("Malformed remaining length")]
    MalformedRemainingLength,
    /// Fixed header flag bits do not match the packet type's expected value
    #[error("Invalid fixed header flag")]
    InvalidHeaderFlag,
    #[error("Unsupported packet type: {0}")]
    UnsupportedPacketType(u8),
    /// Connect protocol name is not "MQTT"
    #[error("Invalid protocol name")]
    InvalidProtocolName,
    /// Connect protocol level is below the supported level
    #[error("Unsupported protocol level")]
    UnsupportedProtocolLevel,
    #[error("Connect frame's reserved flag is set")]
    ConnectReservedFlagSet,
    #[error("ConnectAck frame's reserved flag is set")]
    ConnAckReservedFlagSet,
    /// Session-present may only be set alongside an Accepted return code
    #[error("Invalid session present for error return code")]
    InvalidSessionPresent,
    #[error("Invalid client id")]
    InvalidClientId,
    #[error("Password flag set without user name flag")]
    PasswordWithoutUserName,
    /// Will QoS = 3, or will retain/QoS set without the will flag
    #[error("Invalid will configuration")]
    InvalidWillConfiguration,
    #[error("Publish topic name is empty or contains wildcards")]
    InvalidTopicName,
    #[error("Subscribe packet carries no topic filter/QoS pairs")]
    MissingTopicFilters,
    #[error("Unsubscribe packet carries no topics")]
    MissingTopics,
    #[error("SubscribeAck return codes are missing or invalid")]
    InvalidReturnCodes,
    #[error("Packet id is required")]
    PacketIdRequired,
    #[error("Packet id is not allowed")]
    PacketIdNotAllowed,
    #[error("Invalid length")]
    InvalidLength,
    #[error("Malformed packet")]
    MalformedPacket,
    #[error("utf8 error")]
    Utf8Error,
    #[error("Max size exceeded")]
    MaxSizeExceeded,
    #[error("io error, {:?}", _0)]
    Io(io::Error),
}

impl From<io::Error> for DecodeError {
    fn from(e: io::Error) -> DecodeError {
        DecodeError::Io(e)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// UTF-8 length of a string field exceeds 65,535 bytes
    #[error("String field is too long")]
    StringTooLong,
    #[error("Packet id is required")]
    PacketIdRequired,
    #[error("Packet id is not allowed")]
    PacketIdNotAllowed,
    #[error("Malformed packet")]
    MalformedPacket,
    #[error("io error, {:?}", _0)]
    Io(io::Error),
}

impl From<io::Error> for EncodeError {
    fn from(e: io::Error) -> EncodeError {
        EncodeError::Io(e)
    }
}
