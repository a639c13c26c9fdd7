use tracing::info;

use crate::error::Result;
use crate::message::datatypes::EvseProcessing;
use crate::message::{DcCableCheckRequest, DcCableCheckResponse, Request, ResponseCode};
use crate::session::feedback::Signal;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, DcPreCharge};

/// Answer DC_CableCheckReq; `finished` is the insulation check outcome, if any
pub fn handle_request(req: &DcCableCheckRequest, session: &Session, finished: Option<bool>) -> DcCableCheckResponse {
    let mut res = DcCableCheckResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    match finished {
        None => {
            res.processing = EvseProcessing::Ongoing;
            res.response_code = ResponseCode::Ok;
        }
        Some(true) => {
            res.processing = EvseProcessing::Finished;
            res.response_code = ResponseCode::Ok;
        }
        Some(false) => {
            res.processing = EvseProcessing::Finished;
            res.response_code = ResponseCode::Failed;
        }
    }

    res
}

#[derive(Debug, Default)]
pub struct DcCableCheck {
    cable_check_initiated: bool,
}

impl DcCableCheck {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for DcCableCheck {
    fn name(&self) -> &'static str {
        "DcCableCheck"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::DcCableCheck(req) => {
                if !self.cable_check_initiated {
                    info!("Starting cable check");
                    ctx.feedback().signal(Signal::StartCableCheck);
                    self.cable_check_initiated = true;
                }

                let res = handle_request(&req, &ctx.session, ctx.cache.cable_check_finished);
                let done = res.processing == EvseProcessing::Finished;
                let code = res.response_code;
                ctx.respond(res)?;

                if done && !code.is_failure() {
                    return Ok(Transition::next(DcPreCharge::new()));
                }
                Ok(Transition::Stay)
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
