use tracing::{error, info, warn};

use crate::config::DcTransferLimits;
use crate::error::Result;
use crate::message::datatypes::{ControlMode, MobilityNeedsMode, Progress, RationalNumber, ServiceCategory};
use crate::message::{
    BptDynamicDcClRes, BptScheduledDcClRes, DcChargeLoopRequest, DcChargeLoopResponse, DcClReqControlMode,
    DcClResControlMode, DynamicDcClRes, Request, ResponseCode, ScheduledDcClRes,
};
use crate::session::control::{ControlEvent, UpdateDynamicModeParameters};
use crate::session::feedback::{DcChargeTarget, DcMaximumLimits, Signal};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{
    evse_status, handle_session_stop, power_delivery, pull_request, send_sequence_error, take_display_parameters,
    validate_and_setup_header, DcWeldingDetection, DynamicTargets, ACK_MAX_DELAY,
};

/// EVSE-side inputs to one DC_ChargeLoopRes
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DcLoopConditions {
    /// Last measured output voltage, in V
    pub present_voltage: f32,
    /// Last measured output current, in A
    pub present_current: f32,
    /// Announce termination
    pub stop: bool,
    /// Announce a pause; ignored when `stop` is set
    pub pause: bool,
    /// Mobility targets for Dynamic mode with SECC-provided needs
    pub dynamic_parameters: Option<UpdateDynamicModeParameters>,
}

fn scheduled_limits(limits: &DcTransferLimits) -> ScheduledDcClRes {
    ScheduledDcClRes {
        max_charge_power: Some(limits.charge_limits.power.max),
        min_charge_power: Some(limits.charge_limits.power.min),
        max_charge_current: Some(limits.charge_limits.current.max),
        max_voltage: Some(limits.voltage.max),
    }
}

fn dynamic_limits(limits: &DcTransferLimits) -> DynamicDcClRes {
    DynamicDcClRes {
        max_charge_power: limits.charge_limits.power.max,
        min_charge_power: limits.charge_limits.power.min,
        max_charge_current: limits.charge_limits.current.max,
        max_voltage: limits.voltage.max,
        ..Default::default()
    }
}

fn apply_dynamic_targets(res: &mut DynamicDcClRes, parameters: Option<&UpdateDynamicModeParameters>, now: u64) {
    let targets = DynamicTargets::new(parameters, now);
    res.departure_time = targets.departure_time;
    res.minimum_soc = targets.minimum_soc;
    res.target_soc = targets.target_soc;
    res.ack_max_delay = Some(ACK_MAX_DELAY);
}

fn is_plain_dc(service: ServiceCategory) -> bool {
    matches!(service, ServiceCategory::Dc | ServiceCategory::Mcs)
}

fn is_bpt_dc(service: ServiceCategory) -> bool {
    matches!(service, ServiceCategory::DcBpt | ServiceCategory::McsBpt)
}

pub fn handle_request(
    req: &DcChargeLoopRequest,
    session: &Session,
    limits: &DcTransferLimits,
    conditions: &DcLoopConditions,
) -> DcChargeLoopResponse {
    let mut res = DcChargeLoopResponse::default();

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
    let secc_mobility = selected.selected_mobility_needs_mode == MobilityNeedsMode::ProvidedBySecc;
    let now = res.header.timestamp;

    // a control mode or service other than the negotiated one ends the session
    let mode_matches = match &req.control_mode {
        DcClReqControlMode::Scheduled(_) => control_mode == ControlMode::Scheduled && is_plain_dc(service),
        DcClReqControlMode::BptScheduled(_) => control_mode == ControlMode::Scheduled && is_bpt_dc(service),
        DcClReqControlMode::Dynamic(_) => control_mode == ControlMode::Dynamic && is_plain_dc(service),
        DcClReqControlMode::BptDynamic(_) => control_mode == ControlMode::Dynamic && is_bpt_dc(service),
    };
    if !mode_matches {
        res.response_code = ResponseCode::Failed;
        return res;
    }

    res.control_mode = match &req.control_mode {
        DcClReqControlMode::Scheduled(_) => DcClResControlMode::Scheduled(scheduled_limits(limits)),
        DcClReqControlMode::BptScheduled(_) => {
            let Some(discharge) = &limits.discharge_limits else {
                error!("Transfer mode is BPT, but only dc limits without discharge limits are provided");
                res.response_code = ResponseCode::Failed;
                return res;
            };
            DcClResControlMode::BptScheduled(BptScheduledDcClRes {
                charge: scheduled_limits(limits),
                min_voltage: Some(limits.voltage.min),
                max_discharge_power: Some(discharge.power.max),
                min_discharge_power: Some(discharge.power.min),
                max_discharge_current: Some(discharge.current.max),
            })
        }
        DcClReqControlMode::Dynamic(_) => {
            let mut mode = dynamic_limits(limits);
            if secc_mobility {
                apply_dynamic_targets(&mut mode, conditions.dynamic_parameters.as_ref(), now);
            }
            DcClResControlMode::Dynamic(mode)
        }
        DcClReqControlMode::BptDynamic(_) => {
            let Some(discharge) = &limits.discharge_limits else {
                error!("Transfer mode is BPT, but only dc limits without discharge limits are provided");
                res.response_code = ResponseCode::Failed;
                return res;
            };
            let mut charge = dynamic_limits(limits);
            if secc_mobility {
                apply_dynamic_targets(&mut charge, conditions.dynamic_parameters.as_ref(), now);
            }
            DcClResControlMode::BptDynamic(BptDynamicDcClRes {
                charge,
                min_voltage: limits.voltage.min,
                max_discharge_power: discharge.power.max,
                min_discharge_power: discharge.power.min,
                max_discharge_current: discharge.current.max,
            })
        }
    };

    res.present_voltage = RationalNumber::from_float(conditions.present_voltage);
    res.present_current = RationalNumber::from_float(conditions.present_current);
    res.status = evse_status(conditions.stop, conditions.pause, control_mode);

    res.response_code = ResponseCode::Ok;
    res
}

fn report_ev_request(ctx: &mut Context, req: &DcChargeLoopRequest) {
    let feedback = ctx.feedback();
    match &req.control_mode {
        DcClReqControlMode::Scheduled(mode) => feedback.dc_charge_target(DcChargeTarget {
            voltage: mode.target_voltage.to_float(),
            current: mode.target_current.to_float(),
        }),
        DcClReqControlMode::BptScheduled(mode) => feedback.dc_charge_target(DcChargeTarget {
            voltage: mode.charge.target_voltage.to_float(),
            current: mode.charge.target_current.to_float(),
        }),
        DcClReqControlMode::Dynamic(mode) => feedback.dc_max_limits(DcMaximumLimits {
            voltage: mode.max_voltage.to_float(),
            current: mode.max_charge_current.to_float(),
            power: mode.max_charge_power.to_float(),
        }),
        DcClReqControlMode::BptDynamic(mode) => feedback.dc_max_limits(DcMaximumLimits {
            voltage: mode.charge.max_voltage.to_float(),
            current: mode.charge.max_charge_current.to_float(),
            power: mode.charge.max_charge_power.to_float(),
        }),
    }

    if let Some(display) = &req.display_parameters {
        feedback.display_parameters(display);
    }
}

#[derive(Debug)]
pub struct DcChargeLoop {
    stop: bool,
    pause: bool,
    first_entry_in_charge_loop: bool,
}

impl Default for DcChargeLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl DcChargeLoop {
    pub fn new() -> Self {
        Self {
            stop: false,
            pause: false,
            first_entry_in_charge_loop: true,
        }
    }

    fn conditions(&self, ctx: &Context) -> DcLoopConditions {
        DcLoopConditions {
            present_voltage: ctx.cache.present_voltage,
            present_current: ctx.cache.present_current,
            stop: self.stop,
            pause: self.pause,
            dynamic_parameters: ctx.cache.dynamic_mode_parameters,
        }
    }
}

impl Handler for DcChargeLoop {
    fn name(&self) -> &'static str {
        "DcChargeLoop"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev == Event::ControlMessage {
            match ctx.control_event() {
                Some(ControlEvent::StopCharging(stop)) => self.stop = *stop,
                Some(ControlEvent::PauseCharging(pause)) => self.pause = *pause,
                Some(ControlEvent::DisplayParameters(display)) => {
                    let display = display.clone();
                    take_display_parameters(ctx, display);
                }
                // measurements and dynamic targets are read from the cache
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
                    ctx.feedback().signal(Signal::DcOpenContactor);
                    return Ok(Transition::next(DcWeldingDetection::new()));
                }
                Ok(Transition::Stay)
            }
            Request::DcChargeLoop(req) => {
                if self.first_entry_in_charge_loop {
                    ctx.feedback().signal(Signal::ChargeLoopStarted);
                    self.first_entry_in_charge_loop = false;
                }

                let conditions = self.conditions(ctx);
                let res = handle_request(&req, &ctx.session, &ctx.session_config.dc_limits, &conditions);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    warn!("DC charge loop request rejected: {:?}", code);
                    return Ok(Transition::Stay);
                }

                report_ev_request(ctx, &req);
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
    use crate::config::{Limits, PowerCurrentLimits};
    use crate::d20::session::SelectedServiceParameters;
    use crate::message::datatypes::{DisplayParameters, EvseNotification, Processing};
    use crate::message::{
        BptScheduledDcClReq, DynamicDcClReq, Header, PowerDeliveryRequest, Response, ScheduledDcClReq,
    };
    use crate::session::log::LogEvent;
    use super::super::testing;

    fn session(service: ServiceCategory, mode: ControlMode, mobility: MobilityNeedsMode) -> Session {
        Session::with_selected_services(SelectedServiceParameters::new(service, mode, mobility))
    }

    fn scheduled_req() -> ScheduledDcClReq {
        ScheduledDcClReq {
            target_current: RationalNumber::new(20, 0),
            target_voltage: RationalNumber::new(400, 0),
            ..Default::default()
        }
    }

    fn request(session: &Session, control_mode: DcClReqControlMode) -> DcChargeLoopRequest {
        DcChargeLoopRequest {
            header: Header::new(session.id(), 1691411798),
            display_parameters: None,
            meter_info_requested: false,
            present_voltage: RationalNumber::new(400, 0),
            control_mode,
        }
    }

    fn discharge_limits() -> DcTransferLimits {
        let mut limits = testing::dc_limits();
        limits.discharge_limits = Some(PowerCurrentLimits {
            power: Limits::new(RationalNumber::new(11, 3), RationalNumber::new(1, 2)),
            current: Limits::new(RationalNumber::new(25, 0), RationalNumber::new(0, 0)),
        });
        limits
    }

    #[test]
    fn test_scheduled_limits_and_present_values() {
        let session = session(ServiceCategory::Dc, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc);
        let conditions = DcLoopConditions { present_voltage: 400.0, present_current: 20.0, ..Default::default() };
        let req = request(&session, DcClReqControlMode::Scheduled(scheduled_req()));

        let res = handle_request(&req, &session, &testing::dc_limits(), &conditions);
        assert_eq!(res.response_code, ResponseCode::Ok);
        assert_eq!(res.present_voltage.to_float(), 400.0);
        assert_eq!(res.present_current.to_float(), 20.0);
        assert!(res.status.is_none());
        assert_eq!(
            res.control_mode,
            DcClResControlMode::Scheduled(ScheduledDcClRes {
                max_charge_power: Some(RationalNumber::new(150, 3)),
                min_charge_power: Some(RationalNumber::new(1, 3)),
                max_charge_current: Some(RationalNumber::new(400, 0)),
                max_voltage: Some(RationalNumber::new(900, 0)),
            })
        );
    }

    #[test]
    fn test_control_mode_mismatch_fails() {
        let session = session(ServiceCategory::Dc, ControlMode::Dynamic, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&session, DcClReqControlMode::Scheduled(scheduled_req()));
        let res = handle_request(&req, &session, &testing::dc_limits(), &DcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::Failed);

        let session = session_with_service(ServiceCategory::DcBpt);
        let req = request(&session, DcClReqControlMode::Scheduled(scheduled_req()));
        let res = handle_request(&req, &session, &testing::dc_limits(), &DcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::Failed);
    }

    fn session_with_service(service: ServiceCategory) -> Session {
        session(service, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc)
    }

    #[test]
    fn test_bpt_without_discharge_limits() {
        let session = session_with_service(ServiceCategory::DcBpt);
        let req = request(
            &session,
            DcClReqControlMode::BptScheduled(BptScheduledDcClReq { charge: scheduled_req(), ..Default::default() }),
        );

        let res = handle_request(&req, &session, &testing::dc_limits(), &DcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::Failed);
        assert_eq!(res.control_mode, DcClResControlMode::default());
    }

    #[test]
    fn test_bpt_scheduled_discharge_limits() {
        let session = session_with_service(ServiceCategory::McsBpt);
        let req = request(
            &session,
            DcClReqControlMode::BptScheduled(BptScheduledDcClReq { charge: scheduled_req(), ..Default::default() }),
        );

        let res = handle_request(&req, &session, &discharge_limits(), &DcLoopConditions::default());
        assert_eq!(res.response_code, ResponseCode::Ok);
        let DcClResControlMode::BptScheduled(mode) = res.control_mode else { panic!("expected BPT scheduled") };
        assert_eq!(mode.max_discharge_power, Some(RationalNumber::new(11, 3)));
        assert_eq!(mode.min_discharge_power, Some(RationalNumber::new(1, 2)));
        assert_eq!(mode.max_discharge_current, Some(RationalNumber::new(25, 0)));
        assert_eq!(mode.min_voltage, Some(RationalNumber::new(150, 0)));
    }

    #[test]
    fn test_dynamic_secc_targets() {
        let session = session(ServiceCategory::Dc, ControlMode::Dynamic, MobilityNeedsMode::ProvidedBySecc);
        let req = request(&session, DcClReqControlMode::Dynamic(DynamicDcClReq::default()));
        let conditions = DcLoopConditions {
            dynamic_parameters: Some(UpdateDynamicModeParameters {
                departure_time: Some(u64::MAX / 2),
                target_soc: Some(80),
                min_soc: Some(20),
            }),
            ..Default::default()
        };

        let res = handle_request(&req, &session, &testing::dc_limits(), &conditions);
        let DcClResControlMode::Dynamic(mode) = res.control_mode else { panic!("expected dynamic mode") };
        assert_eq!(mode.departure_time, Some(u32::MAX));
        assert_eq!(mode.target_soc, Some(80));
        assert_eq!(mode.minimum_soc, Some(20));
        assert_eq!(mode.ack_max_delay, Some(30));
        assert_eq!(mode.max_voltage, RationalNumber::new(900, 0));
    }

    #[test]
    fn test_dynamic_departure_in_the_past_is_dropped() {
        let session = session(ServiceCategory::Dc, ControlMode::Dynamic, MobilityNeedsMode::ProvidedBySecc);
        let req = request(&session, DcClReqControlMode::Dynamic(DynamicDcClReq::default()));
        let conditions = DcLoopConditions {
            dynamic_parameters: Some(UpdateDynamicModeParameters { departure_time: Some(1), ..Default::default() }),
            ..Default::default()
        };

        let res = handle_request(&req, &session, &testing::dc_limits(), &conditions);
        let DcClResControlMode::Dynamic(mode) = res.control_mode else { panic!("expected dynamic mode") };
        assert_eq!(mode.departure_time, None);
    }

    #[test]
    fn test_stop_and_pause_status() {
        let session = session(ServiceCategory::Dc, ControlMode::Dynamic, MobilityNeedsMode::ProvidedByEvcc);
        let req = request(&session, DcClReqControlMode::Dynamic(DynamicDcClReq::default()));

        let paused = DcLoopConditions { pause: true, ..Default::default() };
        let res = handle_request(&req, &session, &testing::dc_limits(), &paused);
        let status = res.status.unwrap();
        assert_eq!(status.notification, EvseNotification::Pause);
        assert_eq!(status.notification_max_delay, 60);

        let stopped = DcLoopConditions { stop: true, pause: true, ..Default::default() };
        let res = handle_request(&req, &session, &testing::dc_limits(), &stopped);
        let status = res.status.unwrap();
        assert_eq!(status.notification, EvseNotification::Terminate);
        assert_eq!(status.notification_max_delay, 0);
    }

    fn loop_context() -> (Context, crate::session::feedback::RecordingFeedback) {
        let (mut ctx, feedback) = testing::context(vec![ServiceCategory::Dc]);
        ctx.session = session(ServiceCategory::Dc, ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc);
        (ctx, feedback)
    }

    fn feed_control(fsm: &mut crate::d20::fsm::Fsm, ctx: &mut Context, event: ControlEvent) {
        ctx.set_control_event(event);
        fsm.handle_event(ctx, Event::ControlMessage).unwrap();
        ctx.clear_control_event();
    }

    #[test]
    fn test_loop_reflects_control_events() {
        let (mut ctx, feedback) = loop_context();
        let mut fsm = testing::start(DcChargeLoop::new(), &mut ctx);

        feed_control(&mut fsm, &mut ctx, ControlEvent::PresentVoltageCurrent { voltage: 400.0, current: 20.0 });
        feed_control(&mut fsm, &mut ctx, ControlEvent::StopCharging(true));

        let mut req = request(&ctx.session, DcClReqControlMode::Scheduled(scheduled_req()));
        req.display_parameters = Some(DisplayParameters { present_soc: Some(55), ..Default::default() });
        let res = testing::exchange(&mut fsm, &mut ctx, Request::DcChargeLoop(req.clone()));
        let Response::DcChargeLoop(res) = res else { panic!("expected DC_ChargeLoopRes") };

        assert_eq!(res.present_voltage.to_float(), 400.0);
        assert_eq!(res.present_current.to_float(), 20.0);
        assert_eq!(res.status.map(|s| s.notification), Some(EvseNotification::Terminate));

        testing::exchange(&mut fsm, &mut ctx, Request::DcChargeLoop(req));
        assert_eq!(feedback.signals(), vec![Signal::ChargeLoopStarted]);

        let record = feedback.record();
        assert_eq!(record.dc_charge_targets.len(), 2);
        assert_eq!(record.dc_charge_targets[0], DcChargeTarget { voltage: 400.0, current: 20.0 });
        assert_eq!(record.display_parameters[0].present_soc, Some(55));
    }

    #[test]
    fn test_display_parameters_kept_by_charge_loop() {
        let (mut ctx, feedback) = loop_context();
        let mut fsm = testing::start(DcChargeLoop::new(), &mut ctx);

        let display = DisplayParameters { present_soc: Some(42), target_soc: Some(80), ..Default::default() };
        feed_control(&mut fsm, &mut ctx, ControlEvent::DisplayParameters(display.clone()));

        assert_eq!(ctx.cache.display_parameters, Some(display));
        assert!(ctx.log.entries().iter().any(|e| matches!(
            &e.event,
            LogEvent::Info(text) if text.contains("present SoC Some(42)")
        )));
        assert_eq!(fsm.current_name(), "DcChargeLoop");
        assert!(feedback.signals().is_empty());
    }

    #[test]
    fn test_display_parameters_ignored_outside_charge_loop() {
        let (mut ctx, _) = loop_context();
        let mut fsm = testing::start(super::super::DcCableCheck::new(), &mut ctx);

        let display = DisplayParameters { present_soc: Some(42), ..Default::default() };
        feed_control(&mut fsm, &mut ctx, ControlEvent::DisplayParameters(display));

        assert_eq!(ctx.cache.display_parameters, None);
        assert_eq!(fsm.current_name(), "DcCableCheck");
    }

    #[test]
    fn test_power_delivery_stop_opens_contactor() {
        let (mut ctx, feedback) = loop_context();
        let mut fsm = testing::start(DcChargeLoop::new(), &mut ctx);

        let req = request(&ctx.session, DcClReqControlMode::Scheduled(scheduled_req()));
        testing::exchange(&mut fsm, &mut ctx, Request::DcChargeLoop(req));

        let stop = PowerDeliveryRequest {
            header: testing::header(&ctx),
            processing: Processing::Finished,
            charge_progress: Progress::Stop,
            bpt_channel_selection: None,
        };
        let res = testing::exchange(&mut fsm, &mut ctx, Request::PowerDelivery(stop));
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));
        assert_eq!(
            feedback.signals(),
            vec![Signal::ChargeLoopStarted, Signal::ChargeLoopFinished, Signal::DcOpenContactor]
        );
        assert_eq!(fsm.current_name(), "DcWeldingDetection");
    }

    #[test]
    fn test_unexpected_request_is_sequence_error() {
        let (mut ctx, _) = loop_context();
        let mut fsm = testing::start(DcChargeLoop::new(), &mut ctx);

        let req = crate::message::DcCableCheckRequest { header: testing::header(&ctx) };
        let res = testing::exchange(&mut fsm, &mut ctx, Request::DcCableCheck(req));
        assert_eq!(res.message_type(), crate::message::Type::DcCableCheckRes);
        assert_eq!(res.response_code(), Some(ResponseCode::FailedSequenceError));
        assert!(ctx.session_stopped);
    }
}
