//! Frame-level send and receive over a [`Transport`].
//!
//! Both directions run a blocking loop that keeps handing the unsent (or
//! unfilled) remainder to the transport. The loop ends when every byte has
//! moved or when a transport call transfers nothing or fails; in the latter
//! case the transport is closed before the error is returned. There is no
//! retry and no backoff.

use crate::error::DriverError;
use crate::transport::Transport;
use bytes::Bytes;
use gridlink_protocol::{encode_frame, FrameHeader, FRAME_HEADER_SIZE};

/// Largest body growth per read.
const RECEIVE_STEP: usize = 64 * 1024;

/// Writes and reads length-prefixed frames.
#[derive(Debug)]
pub struct Framer<T: Transport> {
    transport: T,
}

impl<T: Transport> Framer<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    /// Sends `payload` as a single frame.
    pub fn send(&mut self, payload: &[u8]) -> Result<(), DriverError> {
        let frame = encode_frame(payload).map_err(|e| DriverError::General(e.to_string()))?;

        let sent = self.send_all(&frame);
        if sent != frame.len() {
            return Err(DriverError::LinkFailure(
                "Can not send message due to connection failure".to_string(),
            ));
        }

        tracing::trace!(
            "Message sent ({} bytes): {}",
            frame.len(),
            hex::encode(&frame)
        );
        Ok(())
    }

    /// Receives a single frame and returns its payload.
    ///
    /// A truncated body is discarded rather than returned.
    pub fn receive(&mut self) -> Result<Bytes, DriverError> {
        let mut header = [0u8; FRAME_HEADER_SIZE];
        let received = self.receive_all(&mut header);
        if received != FRAME_HEADER_SIZE {
            return Err(DriverError::LinkFailure(
                "Can not receive message header".to_string(),
            ));
        }

        let header = FrameHeader::decode(header);
        let len = match header.payload_len() {
            Ok(len) => len,
            Err(e) => {
                tracing::debug!("Closing transport: {}", e);
                self.close();
                return Err(DriverError::LinkFailure(
                    "Protocol error: Message length is negative".to_string(),
                ));
            }
        };

        if len == 0 {
            return Ok(Bytes::new());
        }

        // Grows as bytes arrive; the header alone never sizes the buffer
        let mut body = Vec::new();
        while body.len() < len {
            let start = body.len();
            let step = (len - start).min(RECEIVE_STEP);
            if body.try_reserve_exact(step).is_err() {
                self.close();
                return Err(DriverError::MemoryAllocation);
            }
            body.resize(start + step, 0);

            let received = self.receive_all(&mut body[start..]);
            if received != step {
                return Err(DriverError::LinkFailure(
                    "Can not receive message body".to_string(),
                ));
            }
        }

        tracing::trace!("Message received ({} bytes): {}", len, hex::encode(&body));
        Ok(Bytes::from(body))
    }

    /// Writes `data` until all of it is sent or the transport gives up.
    /// Returns the number of bytes sent.
    fn send_all(&mut self, data: &[u8]) -> usize {
        let mut sent = 0;

        while sent < data.len() {
            match self.transport.send(&data[sent..]) {
                Ok(n) if n > 0 => {
                    tracing::trace!("Sent: {}", n);
                    sent += n;
                }
                result => {
                    tracing::debug!("Send failed after {} bytes: {:?}", sent, result);
                    self.close();
                    return sent;
                }
            }
        }

        sent
    }

    /// Fills `dst` until it is full or the transport gives up.
    /// Returns the number of bytes received.
    fn receive_all(&mut self, dst: &mut [u8]) -> usize {
        let mut received = 0;

        while received < dst.len() {
            match self.transport.receive(&mut dst[received..]) {
                Ok(n) if n > 0 => {
                    tracing::trace!("Receive res: {} remain: {}", n, dst.len() - received);
                    received += n;
                }
                result => {
                    tracing::debug!(
                        "Receive failed after {} of {} bytes: {:?}",
                        received,
                        dst.len(),
                        result
                    );
                    self.close();
                    return received;
                }
            }
        }

        received
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;
    use proptest::prelude::*;

    fn connected(transport: MemoryTransport) -> Framer<MemoryTransport> {
        let mut transport = transport;
        transport.connect("localhost", 10800).unwrap();
        Framer::new(transport)
    }

    #[test]
    fn test_send_writes_header_and_payload() {
        let mut framer = connected(MemoryTransport::new());
        framer.send(b"query").unwrap();
        assert_eq!(framer.transport().sent(), b"\x05\x00\x00\x00query");
    }

    #[test]
    fn test_zero_length_roundtrip() {
        let mut framer = connected(MemoryTransport::loopback());
        framer.send(&[]).unwrap();

        let payload = framer.receive().unwrap();
        assert!(payload.is_empty());
        // Header only, no body read
        assert_eq!(framer.transport().receive_calls(), 1);
    }

    #[test]
    fn test_negative_length_is_fatal() {
        let mut framer = connected(MemoryTransport::new());
        framer.transport_mut().push_inbound(&(-1i32).to_le_bytes());
        framer.transport_mut().push_inbound(b"trailing");

        let err = framer.receive().unwrap_err();
        assert!(matches!(err, DriverError::LinkFailure(_)));
        assert!(err.to_string().contains("Message length is negative"));
        assert!(!framer.is_open());
        assert_eq!(framer.transport().receive_calls(), 1);
        assert_eq!(framer.transport().pending_inbound(), 8);
    }

    #[test]
    fn test_partial_receive_resumes() {
        let mut framer = connected(MemoryTransport::new().with_max_chunk(1));
        framer
            .transport_mut()
            .push_inbound(&encode_frame(b"abc").unwrap());

        let payload = framer.receive().unwrap();
        assert_eq!(&payload[..], b"abc");
        assert_eq!(framer.transport().receive_calls(), 7);
        assert!(framer.is_open());
    }

    #[test]
    fn test_partial_send_resumes() {
        let mut framer = connected(MemoryTransport::new().with_max_chunk(3));
        framer.send(b"0123456789").unwrap();

        assert_eq!(framer.transport().sent().len(), 14);
        assert_eq!(framer.transport().send_calls(), 5);
        assert!(framer.is_open());
    }

    #[test]
    fn test_send_stops_on_zero_write() {
        let mut framer = connected(MemoryTransport::new().with_send_budget(6));

        let err = framer.send(b"0123456789").unwrap_err();
        assert!(matches!(err, DriverError::LinkFailure(_)));
        assert!(!framer.is_open());
        assert_eq!(framer.transport().sent().len(), 6);
        assert_eq!(framer.transport().close_calls(), 1);
    }

    #[test]
    fn test_send_on_closed_transport() {
        let mut framer = Framer::new(MemoryTransport::new());
        let err = framer.send(b"x").unwrap_err();
        assert!(err
            .to_string()
            .contains("Can not send message due to connection failure"));
    }

    #[test]
    fn test_short_header() {
        let mut framer = connected(MemoryTransport::new());
        framer.transport_mut().push_inbound(&[1, 0]);

        let err = framer.receive().unwrap_err();
        assert_eq!(err.to_string(), "Can not receive message header");
        assert!(!framer.is_open());
    }

    #[test]
    fn test_short_body() {
        let mut framer = connected(MemoryTransport::new());
        framer.transport_mut().push_inbound(&10i32.to_le_bytes());
        framer.transport_mut().push_inbound(b"only5");

        let err = framer.receive().unwrap_err();
        assert_eq!(err.to_string(), "Can not receive message body");
        assert!(!framer.is_open());
    }

    #[test]
    fn test_huge_header_short_body() {
        let mut framer = connected(MemoryTransport::new());
        framer.transport_mut().push_inbound(&i32::MAX.to_le_bytes());
        framer.transport_mut().push_inbound(b"abc");

        let err = framer.receive().unwrap_err();
        assert!(matches!(err, DriverError::LinkFailure(_)));
        assert_eq!(err.to_string(), "Can not receive message body");
        assert!(!framer.is_open());
    }

    #[test]
    fn test_body_spanning_several_steps() {
        let payload: Vec<u8> = (0..3 * RECEIVE_STEP + 17).map(|i| i as u8).collect();
        let mut framer = connected(MemoryTransport::loopback().with_max_chunk(4096));
        framer.send(&payload).unwrap();

        let received = framer.receive().unwrap();
        assert_eq!(received.len(), payload.len());
        assert_eq!(&received[..], &payload[..]);
    }

    #[test]
    fn test_consecutive_frames() {
        let mut framer = connected(MemoryTransport::loopback().with_max_chunk(2));
        framer.send(b"first").unwrap();
        framer.send(b"").unwrap();
        framer.send(b"third").unwrap();

        assert_eq!(&framer.receive().unwrap()[..], b"first");
        assert!(framer.receive().unwrap().is_empty());
        assert_eq!(&framer.receive().unwrap()[..], b"third");
    }

    proptest! {
        #[test]
        fn prop_loopback_roundtrip(
            payload in proptest::collection::vec(any::<u8>(), 0..2048),
            chunk in 1usize..64,
        ) {
            let mut framer = connected(MemoryTransport::loopback().with_max_chunk(chunk));
            framer.send(&payload).unwrap();

            let received = framer.receive().unwrap();
            prop_assert_eq!(&received[..], &payload[..]);
            prop_assert!(framer.is_open());
        }
    }
}
