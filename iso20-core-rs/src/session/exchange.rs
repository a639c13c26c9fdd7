//! Single-slot request/response exchange between the session loop and the FSM

use crate::message::{PayloadType, Request, Type};

/// Encoded response waiting to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResponse {
    pub message_type: Type,
    pub payload_type: PayloadType,
    pub payload: Vec<u8>,
}

impl PendingResponse {
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Holds at most one decoded request and one encoded response
#[derive(Debug, Default)]
pub struct MessageExchange {
    request: Option<Request>,
    response: Option<PendingResponse>,
}

impl MessageExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the next request, replacing any request not yet pulled
    pub fn set_request(&mut self, request: Request) {
        self.request = Some(request);
    }

    /// Take the pending request; later pulls see nothing until the next `set_request`
    pub fn pull_request(&mut self) -> Option<Request> {
        self.request.take()
    }

    pub fn set_response(&mut self, message_type: Type, payload: Vec<u8>) {
        self.response = Some(PendingResponse {
            message_type,
            payload_type: message_type.payload_type(),
            payload,
        });
    }

    /// Take the pending response, if any
    pub fn check_and_clear_response(&mut self) -> Option<PendingResponse> {
        self.response.take()
    }
}
