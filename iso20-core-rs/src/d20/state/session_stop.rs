use crate::error::Result;
use crate::message::datatypes::ChargingSession;
use crate::message::{Request, ResponseCode, SessionStopRequest, SessionStopResponse};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header};

pub fn handle_request(req: &SessionStopRequest, session: &Session) -> SessionStopResponse {
    let mut res = SessionStopResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    res.response_code = match req.charging_session {
        ChargingSession::ServiceRenegotiation => ResponseCode::FailedNoServiceRenegotiationSupported,
        ChargingSession::Pause | ChargingSession::Terminate => ResponseCode::Ok,
    };
    res
}

/// Terminal state; only a repeated SessionStopReq is answered
#[derive(Debug, Default)]
pub struct SessionStop;

impl SessionStop {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for SessionStop {
    fn name(&self) -> &'static str {
        "SessionStop"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
