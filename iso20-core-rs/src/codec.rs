//! Message codec seam
//!
//! The EXI codec lives outside this crate. The state machine only sees
//! [`MessageCodec`]; [`JsonCodec`] is a serde_json stand-in used by the
//! tests and the harness.

use crate::error::{Error, Result};
use crate::message::{PayloadType, Request, Response};

/// Pure, synchronous transformation between payload bytes and messages
pub trait MessageCodec: Send {
    /// Decode an inbound payload received under `payload_type`
    fn decode(&self, payload_type: PayloadType, payload: &[u8]) -> Result<Request>;

    /// Encode an outbound response payload
    fn encode(&self, response: &Response) -> Result<Vec<u8>>;
}

/// JSON codec for development and testing
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encode a request (EV side)
    pub fn encode_request(&self, request: &Request) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(request)?)
    }

    /// Decode a response (EV side)
    pub fn decode_response(&self, payload: &[u8]) -> Result<Response> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl MessageCodec for JsonCodec {
    fn decode(&self, payload_type: PayloadType, payload: &[u8]) -> Result<Request> {
        let request: Request = serde_json::from_slice(payload)?;
        let expected = request.message_type().payload_type();
        if expected != payload_type {
            return Err(Error::Codec(format!(
                "{:?} received under payload type {:#06x}, expected {:#06x}",
                request.message_type(),
                payload_type.value(),
                expected.value()
            )));
        }
        Ok(request)
    }

    fn encode(&self, response: &Response) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(response)?)
    }
}
