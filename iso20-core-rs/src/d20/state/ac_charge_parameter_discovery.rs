use tracing::{error, warn};

use crate::config::AcTransferLimits;
use crate::error::Result;
use crate::message::datatypes::RationalNumber;
use crate::message::{
    AcChargeParameterDiscoveryRequest, AcChargeParameterDiscoveryResponse, AcCpdReqTransferMode,
    AcCpdResEnergyTransferMode, AcCpdResTransferMode, BptAcCpdResEnergyTransferMode, Request, ResponseCode,
};
use crate::session::control::AcPresentPower;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, ScheduleExchange};

fn charge_limits(limits: &AcTransferLimits, present: &AcPresentPower) -> AcCpdResEnergyTransferMode {
    AcCpdResEnergyTransferMode {
        max_charge_power: limits.charge_power.max,
        min_charge_power: limits.charge_power.min,
        nominal_frequency: limits.nominal_frequency,
        max_power_asymmetry: limits.max_power_asymmetry,
        power_ramp_limitation: limits.power_ramp_limitation,
        present_active_power: present.present_active_power,
    }
}

pub fn handle_request(
    req: &AcChargeParameterDiscoveryRequest,
    session: &Session,
    limits: &AcTransferLimits,
    present: &AcPresentPower,
) -> AcChargeParameterDiscoveryResponse {
    let mut res = AcChargeParameterDiscoveryResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    let Some(selected) = session.selected_services() else {
        res.response_code = ResponseCode::Failed;
        return res;
    };
    let service = selected.selected_energy_service;

    match &req.transfer_mode {
        AcCpdReqTransferMode::Ac(_) if service.is_ac() && !service.is_bpt() => {
            res.transfer_mode = AcCpdResTransferMode::Ac(charge_limits(limits, present));
        }
        AcCpdReqTransferMode::BptAc(_) if service.is_ac() && service.is_bpt() => {
            let Some(discharge) = &limits.discharge_power else {
                error!("Transfer mode is BPT, but no discharge limits are configured");
                res.response_code = ResponseCode::Failed;
                return res;
            };
            res.transfer_mode = AcCpdResTransferMode::BptAc(BptAcCpdResEnergyTransferMode {
                charge: charge_limits(limits, present),
                max_discharge_power: discharge.max,
                min_discharge_power: discharge.min,
            });
        }
        _ => {
            warn!("Transfer mode does not match selected service {:?}", service);
            res.response_code = ResponseCode::FailedWrongChargeParameter;
            return res;
        }
    }

    res.response_code = ResponseCode::Ok;
    res
}

fn ev_max_charge_power(mode: &AcCpdReqTransferMode) -> RationalNumber {
    match mode {
        AcCpdReqTransferMode::Ac(m) => m.max_charge_power,
        AcCpdReqTransferMode::BptAc(m) => m.charge.max_charge_power,
    }
}

#[derive(Debug, Default)]
pub struct AcChargeParameterDiscovery;

impl AcChargeParameterDiscovery {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for AcChargeParameterDiscovery {
    fn name(&self) -> &'static str {
        "AcChargeParameterDiscovery"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::AcChargeParameterDiscovery(req) => {
                let res = handle_request(
                    &req,
                    &ctx.session,
                    &ctx.session_config.ac_limits,
                    &ctx.cache.ac_present_power,
                );
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    return Ok(Transition::Stay);
                }

                ctx.feedback().ac_max_charge_power(ev_max_charge_power(&req.transfer_mode));
                Ok(Transition::next(ScheduleExchange::new()))
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
