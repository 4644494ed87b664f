#![deny(unsafe_code)]

//! MQTT v3.1.1 wire codec
//!
//! ## Core Features:
//! - **Binary Packet Codec**: fixed header, variable-length "Remaining Length",
//!   UTF-8 length-prefixed strings, per-packet-type variable headers and payloads
//! - **Strict Validation**: per-type fixed-header flag checks, connect-flag
//!   cross-validation and client id rules applied during decoding
//! - **Zero-Copy Decoding**: binary processing on `bytes::Bytes` slices
//! - **Tokio Integration**: frame reassembly via `tokio_util::codec`
//!
//! ## Architecture Components:
//! - [`Packet`]: closed tagged union over the 14 MQTT 3.1.1 control packets
//! - [`Codec`]: `Encoder`/`Decoder` turning a byte stream into packets and back
//! - Error handling with dedicated [`error::EncodeError`]/[`error::DecodeError`] types

#[macro_use]
mod utils;

/// Error types for encoding/decoding operations
pub mod error;

/// Shared types and constants for MQTT protocol
pub mod types;

#[allow(clippy::module_inception)]
mod codec;
mod decode;
mod encode;
mod packet;

pub use self::codec::Codec;
pub use self::packet::{
    is_valid_client_id, Connect, ConnectAck, ConnectAckReason, LastWill, Packet, Publish,
    SubscribeReturnCode,
};
pub use self::types::{ConnectAckFlags, ConnectFlags, PacketType, QoS, CLIENT_ID_MAX_LEN};
