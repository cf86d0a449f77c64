//! # gridlink-protocol
//!
//! Wire protocol for the gridlink SQL driver.
//!
//! This crate provides:
//! - The length-prefixed frame envelope (`[i32 length][payload]`)
//! - Protocol versions and the supported-version set
//! - Handshake request/response messages and their binary codec
//! - SQLSTATE codes surfaced through diagnostics
//!
//! It performs no I/O; the partial send/receive loops live in
//! `gridlink-client`.

pub mod codec;
pub mod error;
pub mod frame;
pub mod message;
pub mod version;

pub use codec::MessageCodec;
pub use error::{ProtocolError, SqlState};
pub use frame::{encode_frame, Frame, FrameHeader, FRAME_HEADER_SIZE};
pub use message::{ClientType, HandshakeRequest, HandshakeResponse, RequestType};
pub use version::ProtocolVersion;

/// Default port of the backend's client connector.
pub const DEFAULT_PORT: u16 = 10800;

/// Largest payload a single frame can carry (the length field is a signed `i32`).
pub const MAX_PAYLOAD_SIZE: usize = i32::MAX as usize - FRAME_HEADER_SIZE;
