use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::message::datatypes::{ControlMode, EvseProcessing, MobilityNeedsMode, RationalNumber};
use crate::message::{
    PowerSchedule, PowerScheduleEntry, Request, ResponseCode, ScheduleExchangeReqControlMode, ScheduleExchangeRequest,
    ScheduleExchangeResControlMode, ScheduleExchangeResponse, ScheduleTuple,
};
use crate::session::control::UpdateDynamicModeParameters;
use crate::session::feedback::Signal;

use super::super::context::{unix_timestamp, Context};
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{
    handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, DcCableCheck, DynamicTargets,
    PowerDelivery,
};

/// One day, the length of the single schedule entry offered
const SCHEDULE_DURATION: u32 = 86_400;
const SCHEDULE_TUPLE_ID: u32 = 1;

fn schedule(time_anchor: u64, power: RationalNumber) -> PowerSchedule {
    PowerSchedule {
        time_anchor,
        entries: vec![PowerScheduleEntry { duration: SCHEDULE_DURATION, power }],
    }
}

/// Answer ScheduleExchangeReq.
///
/// `now` anchors the offered schedule and turns an absolute departure time
/// into the relative one sent to the EV.
pub fn handle_request(
    req: &ScheduleExchangeRequest,
    session: &Session,
    config: &SessionConfig,
    dynamic_parameters: Option<&UpdateDynamicModeParameters>,
    now: u64,
) -> ScheduleExchangeResponse {
    let mut res = ScheduleExchangeResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    let Some(selected) = session.selected_services() else {
        res.response_code = ResponseCode::Failed;
        return res;
    };
    let service = selected.selected_energy_service;

    match (&req.control_mode, selected.selected_control_mode) {
        (ScheduleExchangeReqControlMode::Scheduled { .. }, ControlMode::Scheduled) => {
            let (charge_power, discharge_power) = if service.is_dc() {
                let limits = &config.dc_limits;
                (limits.charge_limits.power.max, limits.discharge_limits.map(|d| d.power.max))
            } else {
                let limits = &config.ac_limits;
                (limits.charge_power.max, limits.discharge_power.map(|d| d.max))
            };

            let discharging_schedule = if service.is_bpt() {
                discharge_power.map(|power| schedule(now, power))
            } else {
                None
            };

            res.control_mode = ScheduleExchangeResControlMode::Scheduled {
                schedule_tuples: vec![ScheduleTuple {
                    schedule_tuple_id: SCHEDULE_TUPLE_ID,
                    charging_schedule: schedule(now, charge_power),
                    discharging_schedule,
                }],
            };
        }
        (ScheduleExchangeReqControlMode::Dynamic { .. }, ControlMode::Dynamic) => {
            let targets = match selected.selected_mobility_needs_mode {
                MobilityNeedsMode::ProvidedBySecc => DynamicTargets::new(dynamic_parameters, now),
                MobilityNeedsMode::ProvidedByEvcc => DynamicTargets::default(),
            };
            res.control_mode = ScheduleExchangeResControlMode::Dynamic {
                departure_time: targets.departure_time,
                minimum_soc: targets.minimum_soc,
                target_soc: targets.target_soc,
            };
        }
        (_, selected_mode) => {
            warn!("ScheduleExchange control mode does not match selected {:?}", selected_mode);
            res.response_code = ResponseCode::Failed;
            return res;
        }
    }

    res.processing = EvseProcessing::Finished;
    res.response_code = ResponseCode::Ok;
    res
}

#[derive(Debug, Default)]
pub struct ScheduleExchange;

impl ScheduleExchange {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for ScheduleExchange {
    fn name(&self) -> &'static str {
        "ScheduleExchange"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::ScheduleExchange(req) => {
                let res = handle_request(
                    &req,
                    &ctx.session,
                    &ctx.session_config,
                    ctx.cache.dynamic_mode_parameters.as_ref(),
                    unix_timestamp(),
                );
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    return Ok(Transition::Stay);
                }

                ctx.feedback().signal(Signal::SetupFinished);

                let is_dc = ctx
                    .session
                    .selected_services()
                    .is_some_and(|s| s.selected_energy_service.is_dc());
                debug!("Schedule exchange finished, continuing on the {} path", if is_dc { "DC" } else { "AC" });
                if is_dc {
                    Ok(Transition::next(DcCableCheck::new()))
                } else {
                    Ok(Transition::next(PowerDelivery::new()))
                }
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
