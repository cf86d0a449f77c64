//! Version and feature negotiation.
//!
//! The handshake is split in two: [`prepare`] validates what the
//! configuration asks for before any socket activity, and [`negotiate`]
//! runs the single request/response exchange on an open transport.

use crate::config::Configuration;
use crate::error::DriverError;
use crate::framer::Framer;
use crate::transport::Transport;
use gridlink_protocol::{HandshakeRequest, HandshakeResponse, MessageCodec, ProtocolVersion};

/// Builds the handshake request described by `config`.
pub fn prepare(config: &Configuration) -> Result<HandshakeRequest, DriverError> {
    let version = config
        .protocol_version()
        .map_err(|e| DriverError::InvalidConnectionStringAttribute(e.to_string()))?;

    if !version.is_supported() {
        return Err(DriverError::InvalidConnectionStringAttribute(format!(
            "Protocol version is not supported: {}",
            version
        )));
    }

    Ok(HandshakeRequest::new(version)
        .with_distributed_joins(config.distributed_joins)
        .with_enforce_join_order(config.enforce_join_order)
        .with_replicated_only(config.replicated_only)
        .with_collocated(config.collocated)
        .with_lazy(config.lazy))
}

/// Sends `request` and waits for the node's answer.
///
/// Returns the negotiated version, which is always the requested one.
/// Link failures are returned as they are; an undecodable answer is a
/// [`DriverError::MalformedHandshake`]. The caller closes the transport on
/// error.
pub fn negotiate<T: Transport>(
    framer: &mut Framer<T>,
    codec: &MessageCodec,
    request: &HandshakeRequest,
) -> Result<ProtocolVersion, DriverError> {
    tracing::debug!(
        "Sending handshake: version={}, lazy={}",
        request.protocol_version,
        request.lazy
    );

    framer.send(&codec.encode_handshake_request(request))?;
    let payload = framer.receive()?;

    let response = codec
        .decode_handshake_response(&payload)
        .map_err(DriverError::MalformedHandshake)?;

    if !response.is_accepted() {
        let message = rejection_message(&response, request.protocol_version);
        tracing::warn!("{}", message);
        return Err(DriverError::ConnectionRejected(message));
    }

    tracing::debug!("Handshake accepted: version={}", request.protocol_version);
    Ok(request.protocol_version)
}

fn rejection_message(response: &HandshakeResponse, requested: ProtocolVersion) -> String {
    let mut message = String::from("Node rejected handshake message. ");

    if let Some(error) = response.error.as_deref().filter(|e| !e.is_empty()) {
        message.push_str("Additional info: ");
        message.push_str(error);
        message.push(' ');
    }

    let node_version = response
        .server_version
        .map(|v| v.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    message.push_str(&format!(
        "Current node version: {}, driver protocol version introduced in version: {}.",
        node_version, requested
    ));
    message
}
