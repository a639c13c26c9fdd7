use crate::error::Result;
use crate::message::datatypes::RationalNumber;
use crate::message::{DcWeldingDetectionRequest, DcWeldingDetectionResponse, Request, ResponseCode};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header};

pub fn handle_request(
    req: &DcWeldingDetectionRequest,
    session: &Session,
    present_voltage: f32,
) -> DcWeldingDetectionResponse {
    let mut res = DcWeldingDetectionResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    res.present_voltage = RationalNumber::from_float(present_voltage);
    res.response_code = ResponseCode::Ok;
    res
}

#[derive(Debug, Default)]
pub struct DcWeldingDetection;

impl DcWeldingDetection {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for DcWeldingDetection {
    fn name(&self) -> &'static str {
        "DcWeldingDetection"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::DcWeldingDetection(req) => {
                let res = handle_request(&req, &ctx.session, ctx.cache.present_voltage);
                ctx.respond(res)?;
                Ok(Transition::Stay)
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::datatypes::{ChargingSession, Processing, ServiceCategory};
    use crate::message::{Response, SessionStopRequest};
    use crate::session::control::ControlEvent;
    use super::super::testing;

    #[test]
    fn test_answers_present_voltage_until_stop() {
        let (mut ctx, _) = testing::context(vec![ServiceCategory::Dc]);
        let mut fsm = testing::start(DcWeldingDetection::new(), &mut ctx);

        ctx.set_control_event(ControlEvent::PresentVoltageCurrent { voltage: 12.5, current: 0.0 });
        fsm.handle_event(&mut ctx, Event::ControlMessage).unwrap();
        ctx.clear_control_event();

        let req = DcWeldingDetectionRequest { header: testing::header(&ctx), processing: Processing::Ongoing };
        let Response::DcWeldingDetection(res) = testing::exchange(&mut fsm, &mut ctx, Request::DcWeldingDetection(req))
        else {
            panic!("expected DC_WeldingDetectionRes")
        };
        assert_eq!(res.response_code, ResponseCode::Ok);
        assert_eq!(res.present_voltage, RationalNumber::new(125, -1));
        assert_eq!(fsm.current_name(), "DcWeldingDetection");

        let stop = SessionStopRequest {
            header: testing::header(&ctx),
            charging_session: ChargingSession::Terminate,
            ev_termination_code: None,
            ev_termination_explanation: None,
        };
        let res = testing::exchange(&mut fsm, &mut ctx, Request::SessionStop(stop));
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));
        assert_eq!(fsm.current_name(), "SessionStop");
        assert!(ctx.session_stopped);
    }

    #[test]
    fn test_unknown_session() {
        let (ctx, _) = testing::context(vec![ServiceCategory::Dc]);
        let req = DcWeldingDetectionRequest {
            header: crate::message::Header::new([1; 8], 0),
            processing: Processing::Finished,
        };
        let res = handle_request(&req, &ctx.session, 0.0);
        assert_eq!(res.response_code, ResponseCode::FailedUnknownSession);
    }
}
