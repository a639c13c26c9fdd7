use tracing::{info, warn};

use crate::config::AcTransferLimits;
use crate::error::Result;
use crate::message::datatypes::{ControlMode, MobilityNeedsMode, Progress, ServiceCategory};
use crate::message::{
    AcChargeLoopRequest, AcChargeLoopResponse, AcClReqControlMode, AcClResControlMode, DynamicAcClRes, Request,
    ResponseCode, ScheduledAcClRes,
};
use crate::session::control::{AcPresentPower, AcTargetPower, ControlEvent, UpdateDynamicModeParameters};
use crate::session::feedback::Signal;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{
    evse_status, handle_session_stop, power_delivery, pull_request, send_sequence_error, take_display_parameters,
    validate_and_setup_header, DynamicTargets, SessionStop, ACK_MAX_DELAY,
};

/// EVSE-side inputs to one AC_ChargeLoopRes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AcLoopConditions {
    /// Announce termination
    pub stop: bool,
    /// Announce a pause; ignored when `stop` is set
    pub pause: bool,
    pub target_power: AcTargetPower,
    pub present_power: AcPresentPower,
    /// Mobility targets for Dynamic mode with SECC-provided needs
    pub dynamic_parameters: Option<UpdateDynamicModeParameters>,
}

pub fn handle_request(
    req: &AcChargeLoopRequest,
    session: &Session,
    limits: &AcTransferLimits,
    conditions: &AcLoopConditions,
) -> AcChargeLoopResponse {
    let mut res = AcChargeLoopResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    let Some(selected) = session.selected_services() else {
        res.response_code = ResponseCode::Failed;
        return res;
    };
    let control_mode = selected.selected_control_mode;
    let service = selected.selected_energy_service;
    let now = res.header.timestamp;

    let mode_matches = match &req.control_mode {
        AcClReqControlMode::Scheduled(_) => control_mode == ControlMode::Scheduled && service == ServiceCategory::Ac,
        AcClReqControlMode::BptScheduled(_) => {
            control_mode == ControlMode::Scheduled && service == ServiceCategory::AcBpt
        }
        AcClReqControlMode::Dynamic(_) => control_mode == ControlMode::Dynamic && service == ServiceCategory::Ac,
        AcClReqControlMode::BptDynamic(_) => control_mode == ControlMode::Dynamic && service == ServiceCategory::AcBpt,
    };
    if !mode_matches {
        res.response_code = ResponseCode::Failed;
        return res;
    }

    let scheduled = || ScheduledAcClRes {
        target_active_power: conditions.target_power.target_active_power,
        target_reactive_power: conditions.target_power.target_reactive_power,
        present_active_power: conditions.present_power.present_active_power,
    };

    let dynamic = || {
        let mut mode = DynamicAcClRes {
            target_active_power: conditions
                .target_power
                .target_active_power
                .unwrap_or(limits.charge_power.max),
            target_reactive_power: conditions.target_power.target_reactive_power,
            present_active_power: conditions.present_power.present_active_power,
            ..Default::default()
        };
        if selected.selected_mobility_needs_mode == MobilityNeedsMode::ProvidedBySecc {
            let targets = DynamicTargets::new(conditions.dynamic_parameters.as_ref(), now);
            mode.departure_time = targets.departure_time;
            mode.minimum_soc = targets.minimum_soc;
            mode.target_soc = targets.target_soc;
            mode.ack_max_delay = Some(ACK_MAX_DELAY);
        }
        mode
    };

    res.control_mode = match &req.control_mode {
        AcClReqControlMode::Scheduled(_) => AcClResControlMode::Scheduled(scheduled()),
        AcClReqControlMode::BptScheduled(_) => AcClResControlMode::BptScheduled(scheduled()),
        AcClReqControlMode::Dynamic(_) => AcClResControlMode::Dynamic(dynamic()),
        AcClReqControlMode::BptDynamic(_) => AcClResControlMode::BptDynamic(dynamic()),
    };

    res.target_frequency = Some(limits.nominal_frequency);
    res.status = evse_status(conditions.stop, conditions.pause, control_mode);
    res.response_code = ResponseCode::Ok;
    res
}

#[derive(Debug)]
pub struct AcChargeLoop {
    stop: bool,
    pause: bool,
    target_power: AcTargetPower,
    first_entry_in_charge_loop: bool,
}

impl Default for AcChargeLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl AcChargeLoop {
    pub fn new() -> Self {
        Self {
            stop: false,
            pause: false,
            target_power: AcTargetPower::default(),
            first_entry_in_charge_loop: true,
        }
    }
}

impl Handler for AcChargeLoop {
    fn name(&self) -> &'static str {
        "AcChargeLoop"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev == Event::ControlMessage {
            match ctx.control_event() {
                Some(ControlEvent::StopCharging(stop)) => self.stop = *stop,
                Some(ControlEvent::PauseCharging(pause)) => self.pause = *pause,
                Some(ControlEvent::AcTargetPower(target)) => self.target_power = *target,
                Some(ControlEvent::DisplayParameters(display)) => {
                    let display = display.clone();
                    take_display_parameters(ctx, display);
                }
                _ => {}
            }
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::PowerDelivery(req) => {
                let res = power_delivery::handle_request(&req, &ctx.session);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    return Ok(Transition::Stay);
                }

                self.first_entry_in_charge_loop = true;

                if req.charge_progress == Progress::Stop {
                    info!("EV stopped power delivery");
                    ctx.feedback().signal(Signal::ChargeLoopFinished);
                    ctx.feedback().signal(Signal::AcOpenContactor);
                    return Ok(Transition::next(SessionStop::new()));
                }
                Ok(Transition::Stay)
            }
            Request::AcChargeLoop(req) => {
                if self.first_entry_in_charge_loop {
                    ctx.feedback().signal(Signal::ChargeLoopStarted);
                    self.first_entry_in_charge_loop = false;
                }

                let conditions = AcLoopConditions {
                    stop: self.stop,
                    pause: self.pause,
                    target_power: self.target_power,
                    present_power: ctx.cache.ac_present_power,
                    dynamic_parameters: ctx.cache.dynamic_mode_parameters,
                };
                let res = handle_request(&req, &ctx.session, &ctx.session_config.ac_limits, &conditions);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    warn!("AC charge loop request rejected: {:?}", code);
                    return Ok(Transition::Stay);
                }

                if let Some(display) = &req.display_parameters {
                    ctx.feedback().display_parameters(display);
                }
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
    use crate::message::datatypes::{DisplayParameters, EvseNotification, Processing, RationalNumber};
    use crate::message::{DynamicAcClReq, Header, PowerDeliveryRequest, Response, ScheduledAcClReq};
    use super::super::testing;

    fn selected(service: ServiceCategory, mode: ControlMode, mobility: MobilityNeedsMode) -> Session {
        Session::with_selected_services(SelectedServiceParameters::new(service, mode, mobility))
    }

    fn request(session: &Session, control_mode: AcClReqControlMode) -> AcChargeLoopRequest {
        AcChargeLoopRequest {
            header: Header::new(session.id(), 1691411798),
            display_parameters: None,
            meter_info_requested: false,
            control_mode,
        }
    }

    fn present_power() -> AcPresentPower {
        AcPresentPower { present_active_power: Some(RationalNumber::new(11, 3)) }
    }

    #[test]
    fn test_scheduled_present_power_and_frequency() {
        let session = selected(ServiceCategory::Ac, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&session, AcClReqControlMode::Scheduled(ScheduledAcClReq::default()));
        let conditions = AcLoopConditions { present_power: present_power(), ..Default::default() };

        let res = handle_request(&req, &session, &testing::ac_limits(), &conditions);
        assert_eq!(res.response_code, ResponseCode::Ok);
        assert!(res.status.is_none());
        assert_eq!(res.target_frequency.map(|f| f.to_float()), Some(50.0));
        let AcClResControlMode::Scheduled(mode) = res.control_mode else { panic!("expected scheduled mode") };
        assert_eq!(mode.present_active_power.map(|p| p.to_float()), Some(11000.0));
        assert!(mode.target_active_power.is_none());
    }

    #[test]
    fn test_dynamic_target_power() {
        let session = selected(ServiceCategory::Ac, ControlMode::Dynamic, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&session, AcClReqControlMode::Dynamic(DynamicAcClReq::default()));

        let res = handle_request(&req, &session, &testing::ac_limits(), &AcLoopConditions::default());
        let AcClResControlMode::Dynamic(mode) = res.control_mode else { panic!("expected dynamic mode") };
        assert_eq!(mode.target_active_power, RationalNumber::new(22, 3));
        assert!(mode.ack_max_delay.is_none());

        let conditions = AcLoopConditions {
            target_power: AcTargetPower { target_active_power: Some(RationalNumber::new(11, 3)), ..Default::default() },
            present_power: present_power(),
            ..Default::default()
        };
        let res = handle_request(&req, &session, &testing::ac_limits(), &conditions);
        let AcClResControlMode::Dynamic(mode) = res.control_mode else { panic!("expected dynamic mode") };
        assert_eq!(mode.target_active_power.to_float(), 11000.0);
        assert_eq!(mode.present_active_power.map(|p| p.to_float()), Some(11000.0));
    }

    #[test]
    fn test_dynamic_secc_acknowledge_delay() {
        let session = selected(ServiceCategory::AcBpt, ControlMode::Dynamic, MobilityNeedsMode::ProvidedBySecc);
        let req = request(&session, AcClReqControlMode::BptDynamic(Default::default()));
        let conditions = AcLoopConditions {
            dynamic_parameters: Some(UpdateDynamicModeParameters { target_soc: Some(90), ..Default::default() }),
            ..Default::default()
        };

        let res = handle_request(&req, &session, &testing::ac_limits(), &conditions);
        let AcClResControlMode::BptDynamic(mode) = res.control_mode else { panic!("expected BPT dynamic mode") };
        assert_eq!(mode.target_soc, Some(90));
        assert_eq!(mode.ack_max_delay, Some(30));
    }

    #[test]
    fn test_wrong_energy_or_control_mode_fails() {
        let session = selected(ServiceCategory::AcBpt, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&session, AcClReqControlMode::Scheduled(ScheduledAcClReq::default()));
        let res = handle_request(&req, &session, &testing::ac_limits(), &AcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::Failed);

        let session = selected(ServiceCategory::Ac, ControlMode::Dynamic, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&session, AcClReqControlMode::Scheduled(ScheduledAcClReq::default()));
        let res = handle_request(&req, &session, &testing::ac_limits(), &AcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::Failed);
        assert!(res.target_frequency.is_none());
    }

    #[test]
    fn test_unknown_session() {
        let session = selected(ServiceCategory::Ac, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&Session::new(), AcClReqControlMode::Scheduled(ScheduledAcClReq::default()));
        let res = handle_request(&req, &session, &testing::ac_limits(), &AcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::FailedUnknownSession);
        assert!(res.status.is_none());
    }

    #[test]
    fn test_loop_events_and_stop() {
        let (mut ctx, feedback) = testing::context(vec![ServiceCategory::Ac]);
        ctx.session = selected(ServiceCategory::Ac, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc);
        let mut fsm = testing::start(AcChargeLoop::new(), &mut ctx);

        for event in [
            ControlEvent::AcPresentPower(present_power()),
            ControlEvent::AcTargetPower(AcTargetPower {
                target_active_power: Some(RationalNumber::new(7, 3)),
                ..Default::default()
            }),
            ControlEvent::PauseCharging(true),
            ControlEvent::DisplayParameters(DisplayParameters { present_soc: Some(30), ..Default::default() }),
        ] {
            ctx.set_control_event(event);
            fsm.handle_event(&mut ctx, Event::ControlMessage).unwrap();
            ctx.clear_control_event();
        }

        let req = request(&ctx.session, AcClReqControlMode::Scheduled(ScheduledAcClReq::default()));
        let Response::AcChargeLoop(res) = testing::exchange(&mut fsm, &mut ctx, Request::AcChargeLoop(req)) else {
            panic!("expected AC_ChargeLoopRes")
        };
        let status = res.status.unwrap();
        assert_eq!(status.notification, EvseNotification::Pause);
        assert_eq!(status.notification_max_delay, 0);
        assert_eq!(ctx.cache.display_parameters.as_ref().and_then(|d| d.present_soc), Some(30));
        let AcClResControlMode::Scheduled(mode) = res.control_mode else { panic!("expected scheduled mode") };
        assert_eq!(mode.target_active_power, Some(RationalNumber::new(7, 3)));
        assert_eq!(mode.present_active_power, Some(RationalNumber::new(11, 3)));

        let stop = PowerDeliveryRequest {
            header: testing::header(&ctx),
            processing: Processing::Finished,
            charge_progress: Progress::Stop,
            bpt_channel_selection: None,
        };
        testing::exchange(&mut fsm, &mut ctx, Request::PowerDelivery(stop));
        assert_eq!(
            feedback.signals(),
            vec![Signal::ChargeLoopStarted, Signal::ChargeLoopFinished, Signal::AcOpenContactor]
        );
        assert_eq!(fsm.current_name(), "SessionStop");
    }
}
