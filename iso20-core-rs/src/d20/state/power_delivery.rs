use tracing::{info, warn};

use crate::error::Result;
use crate::message::datatypes::Progress;
use crate::message::{PowerDeliveryRequest, PowerDeliveryResponse, Request, ResponseCode};
use crate::session::feedback::Signal;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{
    dc_pre_charge, handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, AcChargeLoop,
    DcChargeLoop, SessionStop,
};

pub fn handle_request(req: &PowerDeliveryRequest, session: &Session) -> PowerDeliveryResponse {
    let mut res = PowerDeliveryResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    res.response_code = match req.charge_progress {
        Progress::ScheduleRenegotiation => ResponseCode::FailedScheduleRenegotiation,
        Progress::Start | Progress::Stop | Progress::Standby => ResponseCode::Ok,
    };
    res
}

/// PowerDelivery before the charge loop
#[derive(Debug, Default)]
pub struct PowerDelivery;

impl PowerDelivery {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for PowerDelivery {
    fn name(&self) -> &'static str {
        "PowerDelivery"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::PowerDelivery(req) => {
                let res = handle_request(&req, &ctx.session);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    warn!("PowerDelivery rejected: {:?}", code);
                    return Ok(Transition::Stay);
                }

                let is_dc = ctx
                    .session
                    .selected_services()
                    .is_some_and(|s| s.selected_energy_service.is_dc());

                match req.charge_progress {
                    Progress::Start if is_dc => {
                        info!("Power delivery started, entering DC charge loop");
                        Ok(Transition::next(DcChargeLoop::new()))
                    }
                    Progress::Start => {
                        info!("Power delivery started, entering AC charge loop");
                        ctx.feedback().signal(Signal::AcCloseContactor);
                        Ok(Transition::next(AcChargeLoop::new()))
                    }
                    Progress::Stop => Ok(Transition::next(SessionStop::new())),
                    Progress::Standby | Progress::ScheduleRenegotiation => Ok(Transition::Stay),
                }
            }
            Request::DcPreCharge(req) => {
                // the EV may keep pre-charging until it starts power delivery
                let target_voltage = req.target_voltage.to_float();
                ctx.feedback().dc_pre_charge_target_voltage(target_voltage);
                let res = dc_pre_charge::handle_request(&req, &ctx.session, ctx.cache.present_voltage);
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
    use crate::d20::session::SelectedServiceParameters;
    use crate::message::datatypes::{ControlMode, MobilityNeedsMode, Processing, ServiceCategory};
    use crate::message::Response;
    use super::super::testing;

    fn request(ctx: &Context, progress: Progress) -> Request {
        Request::PowerDelivery(PowerDeliveryRequest {
            header: testing::header(ctx),
            processing: Processing::Finished,
            charge_progress: progress,
            bpt_channel_selection: None,
        })
    }

    fn context(service: ServiceCategory) -> (Context, crate::session::feedback::RecordingFeedback) {
        let (mut ctx, feedback) = testing::context(vec![service]);
        ctx.session = Session::with_selected_services(SelectedServiceParameters::new(
            service,
            ControlMode::Scheduled,
            MobilityNeedsMode::ProvidedByEvcc,
        ));
        (ctx, feedback)
    }

    #[test]
    fn test_dc_start_enters_charge_loop() {
        let (mut ctx, feedback) = context(ServiceCategory::Dc);
        let mut fsm = testing::start(PowerDelivery::new(), &mut ctx);

        let req = request(&ctx, Progress::Start);
        let res = testing::exchange(&mut fsm, &mut ctx, req);
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));
        assert_eq!(fsm.current_name(), "DcChargeLoop");
        assert!(feedback.signals().is_empty());
    }

    #[test]
    fn test_ac_start_closes_contactor() {
        let (mut ctx, feedback) = context(ServiceCategory::Ac);
        let mut fsm = testing::start(PowerDelivery::new(), &mut ctx);

        let req = request(&ctx, Progress::Start);
        testing::exchange(&mut fsm, &mut ctx, req);
        assert_eq!(fsm.current_name(), "AcChargeLoop");
        assert_eq!(feedback.signals(), vec![Signal::AcCloseContactor]);
    }

    #[test]
    fn test_standby_stays_and_stop_leaves() {
        let (mut ctx, _) = context(ServiceCategory::Dc);
        let mut fsm = testing::start(PowerDelivery::new(), &mut ctx);

        let req = request(&ctx, Progress::Standby);
        testing::exchange(&mut fsm, &mut ctx, req);
        assert_eq!(fsm.current_name(), "PowerDelivery");

        let req = request(&ctx, Progress::Stop);
        testing::exchange(&mut fsm, &mut ctx, req);
        assert_eq!(fsm.current_name(), "SessionStop");
    }

    #[test]
    fn test_schedule_renegotiation_rejected() {
        let (mut ctx, _) = context(ServiceCategory::Dc);
        let mut fsm = testing::start(PowerDelivery::new(), &mut ctx);

        let req = request(&ctx, Progress::ScheduleRenegotiation);
        let res = testing::exchange(&mut fsm, &mut ctx, req);
        let Response::PowerDelivery(res) = res else { panic!("expected PowerDeliveryRes") };
        assert_eq!(res.response_code, ResponseCode::FailedScheduleRenegotiation);
        assert!(ctx.session_stopped);
    }
}
