use tracing::debug;

use crate::error::Result;
use crate::message::datatypes::{Processing, RationalNumber};
use crate::message::{DcPreChargeRequest, DcPreChargeResponse, Request, ResponseCode};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, PowerDelivery};

pub fn handle_request(req: &DcPreChargeRequest, session: &Session, present_voltage: f32) -> DcPreChargeResponse {
    let mut res = DcPreChargeResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    res.present_voltage = RationalNumber::from_float(present_voltage);
    res.response_code = ResponseCode::Ok;
    res
}

#[derive(Debug, Default)]
pub struct DcPreCharge;

impl DcPreCharge {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for DcPreCharge {
    fn name(&self) -> &'static str {
        "DcPreCharge"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::DcPreCharge(req) => {
                let target_voltage = req.target_voltage.to_float();
                debug!("EV pre-charge target {} V", target_voltage);
                ctx.feedback().dc_pre_charge_target_voltage(target_voltage);

                let res = handle_request(&req, &ctx.session, ctx.cache.present_voltage);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() || req.processing == Processing::Ongoing {
                    return Ok(Transition::Stay);
                }
                Ok(Transition::next(PowerDelivery::new()))
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::datatypes::ServiceCategory;
    use crate::message::Response;
    use crate::session::control::ControlEvent;
    use super::super::testing;

    fn pre_charge(ctx: &Context, processing: Processing) -> Request {
        Request::DcPreCharge(DcPreChargeRequest {
            header: testing::header(ctx),
            processing,
            present_voltage: RationalNumber::new(380, 0),
            target_voltage: RationalNumber::new(400, 0),
        })
    }

    #[test]
    fn test_present_voltage_and_target_reported() {
        let (mut ctx, feedback) = testing::context(vec![ServiceCategory::Dc]);
        let mut fsm = testing::start(DcPreCharge::new(), &mut ctx);

        ctx.set_control_event(ControlEvent::PresentVoltageCurrent { voltage: 395.5, current: 0.0 });
        fsm.handle_event(&mut ctx, Event::ControlMessage).unwrap();
        ctx.clear_control_event();

        let req = pre_charge(&ctx, Processing::Ongoing);
        let res = testing::exchange(&mut fsm, &mut ctx, req);
        let Response::DcPreCharge(res) = res else { panic!("expected DC_PreChargeRes") };
        assert_eq!(res.response_code, ResponseCode::Ok);
        assert_eq!(res.present_voltage, RationalNumber::new(3955, -1));
        assert_eq!(fsm.current_name(), "DcPreCharge");
        assert_eq!(feedback.record().pre_charge_voltages, vec![400.0]);
    }

    #[test]
    fn test_finished_moves_to_power_delivery() {
        let (mut ctx, _) = testing::context(vec![ServiceCategory::Dc]);
        let mut fsm = testing::start(DcPreCharge::new(), &mut ctx);

        let req = pre_charge(&ctx, Processing::Finished);
        testing::exchange(&mut fsm, &mut ctx, req);
        assert_eq!(fsm.current_name(), "PowerDelivery");
    }
}
