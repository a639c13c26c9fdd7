use tracing::{error, warn};

use crate::config::DcTransferLimits;
use crate::error::Result;
use crate::message::{
    BptDcCpdResEnergyTransferMode, DcChargeParameterDiscoveryRequest, DcChargeParameterDiscoveryResponse,
    DcCpdReqEnergyTransferMode, DcCpdReqTransferMode, DcCpdResEnergyTransferMode, DcCpdResTransferMode, Request,
    ResponseCode,
};
use crate::session::feedback::DcMaximumLimits;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, ScheduleExchange};

fn charge_limits(limits: &DcTransferLimits) -> DcCpdResEnergyTransferMode {
    DcCpdResEnergyTransferMode {
        max_charge_power: limits.charge_limits.power.max,
        min_charge_power: limits.charge_limits.power.min,
        max_charge_current: limits.charge_limits.current.max,
        min_charge_current: limits.charge_limits.current.min,
        max_voltage: limits.voltage.max,
        min_voltage: limits.voltage.min,
        power_ramp_limit: limits.power_ramp_limit,
    }
}

pub fn handle_request(
    req: &DcChargeParameterDiscoveryRequest,
    session: &Session,
    limits: &DcTransferLimits,
) -> DcChargeParameterDiscoveryResponse {
    let mut res = DcChargeParameterDiscoveryResponse::default();

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
        DcCpdReqTransferMode::Dc(_) if service.is_dc() && !service.is_bpt() => {
            res.transfer_mode = DcCpdResTransferMode::Dc(charge_limits(limits));
        }
        DcCpdReqTransferMode::BptDc(_) if service.is_dc() && service.is_bpt() => {
            let Some(discharge) = &limits.discharge_limits else {
                error!("Transfer mode is BPT, but no discharge limits are configured");
                res.response_code = ResponseCode::Failed;
                return res;
            };
            res.transfer_mode = DcCpdResTransferMode::BptDc(BptDcCpdResEnergyTransferMode {
                charge: charge_limits(limits),
                max_discharge_power: discharge.power.max,
                min_discharge_power: discharge.power.min,
                max_discharge_current: discharge.current.max,
                min_discharge_current: discharge.current.min,
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

fn ev_maximum_limits(mode: &DcCpdReqEnergyTransferMode) -> DcMaximumLimits {
    DcMaximumLimits {
        voltage: mode.max_voltage.to_float(),
        current: mode.max_charge_current.to_float(),
        power: mode.max_charge_power.to_float(),
    }
}

#[derive(Debug, Default)]
pub struct DcChargeParameterDiscovery;

impl DcChargeParameterDiscovery {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for DcChargeParameterDiscovery {
    fn name(&self) -> &'static str {
        "DcChargeParameterDiscovery"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::DcChargeParameterDiscovery(req) => {
                let res = handle_request(&req, &ctx.session, &ctx.session_config.dc_limits);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    return Ok(Transition::Stay);
                }

                let ev_mode = match &req.transfer_mode {
                    DcCpdReqTransferMode::Dc(mode) => mode,
                    DcCpdReqTransferMode::BptDc(mode) => &mode.charge,
                };
                ctx.feedback().dc_max_limits(ev_maximum_limits(ev_mode));

                Ok(Transition::next(ScheduleExchange::new()))
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
    use crate::message::datatypes::{ControlMode, MobilityNeedsMode, RationalNumber, ServiceCategory};
    use crate::message::{BptDcCpdReqEnergyTransferMode, Header};
    use super::super::testing;

    fn ev_mode() -> DcCpdReqEnergyTransferMode {
        DcCpdReqEnergyTransferMode {
            max_charge_power: RationalNumber::new(100, 3),
            min_charge_power: RationalNumber::new(1, 3),
            max_charge_current: RationalNumber::new(250, 0),
            min_charge_current: RationalNumber::new(1, 0),
            max_voltage: RationalNumber::new(800, 0),
            min_voltage: RationalNumber::new(200, 0),
            target_soc: None,
        }
    }

    fn bpt_ev_mode() -> BptDcCpdReqEnergyTransferMode {
        BptDcCpdReqEnergyTransferMode {
            charge: ev_mode(),
            max_discharge_power: RationalNumber::new(50, 3),
            min_discharge_power: RationalNumber::new(1, 3),
            max_discharge_current: RationalNumber::new(100, 0),
            min_discharge_current: RationalNumber::new(1, 0),
        }
    }

    fn session(service: ServiceCategory) -> Session {
        Session::with_selected_services(SelectedServiceParameters::new(
            service,
            ControlMode::Scheduled,
            MobilityNeedsMode::ProvidedByEvcc,
        ))
    }

    fn request(session: &Session, transfer_mode: DcCpdReqTransferMode) -> DcChargeParameterDiscoveryRequest {
        DcChargeParameterDiscoveryRequest {
            header: Header::new(session.id(), 1691411798),
            transfer_mode,
        }
    }

    #[test]
    fn test_dc_limits_returned() {
        let session = session(ServiceCategory::Dc);
        let limits = testing::dc_limits();
        let res = handle_request(&request(&session, DcCpdReqTransferMode::Dc(ev_mode())), &session, &limits);

        assert_eq!(res.response_code, ResponseCode::Ok);
        match res.transfer_mode {
            DcCpdResTransferMode::Dc(mode) => {
                assert_eq!(mode.max_charge_power, RationalNumber::new(150, 3));
                assert_eq!(mode.max_voltage, RationalNumber::new(900, 0));
                assert_eq!(mode.min_charge_current, RationalNumber::new(1, 0));
            }
            other => panic!("expected DC mode, got {:?}", other),
        }
    }

    #[test]
    fn test_wrong_transfer_mode() {
        let session = session(ServiceCategory::Dc);
        let limits = testing::dc_limits();
        let req = request(&session, DcCpdReqTransferMode::BptDc(bpt_ev_mode()));
        let res = handle_request(&req, &session, &limits);
        assert_eq!(res.response_code, ResponseCode::FailedWrongChargeParameter);
    }

    #[test]
    fn test_bpt_without_discharge_limits() {
        let session = session(ServiceCategory::DcBpt);
        let limits = testing::dc_limits();
        let req = request(&session, DcCpdReqTransferMode::BptDc(bpt_ev_mode()));
        let res = handle_request(&req, &session, &limits);
        assert_eq!(res.response_code, ResponseCode::Failed);
        assert!(matches!(res.transfer_mode, DcCpdResTransferMode::Dc(_)));
    }

    #[test]
    fn test_bpt_with_discharge_limits() {
        let session = session(ServiceCategory::DcBpt);
        let mut limits = testing::dc_limits();
        limits.discharge_limits = Some(PowerCurrentLimits {
            power: Limits::new(RationalNumber::new(11, 3), RationalNumber::new(0, 0)),
            current: Limits::new(RationalNumber::new(25, 0), RationalNumber::new(0, 0)),
        });

        let req = request(&session, DcCpdReqTransferMode::BptDc(bpt_ev_mode()));
        let res = handle_request(&req, &session, &limits);
        assert_eq!(res.response_code, ResponseCode::Ok);
        match res.transfer_mode {
            DcCpdResTransferMode::BptDc(mode) => {
                assert_eq!(mode.max_discharge_power, RationalNumber::new(11, 3));
                assert_eq!(mode.charge.max_charge_current, RationalNumber::new(400, 0));
            }
            other => panic!("expected BPT mode, got {:?}", other),
        }
    }

    #[test]
    fn test_reports_ev_limits_and_moves_on() {
        let (mut ctx, feedback) = testing::context(vec![ServiceCategory::Dc]);
        ctx.session = session(ServiceCategory::Dc);
        let mut fsm = testing::start(DcChargeParameterDiscovery::new(), &mut ctx);

        let req = request(&ctx.session, DcCpdReqTransferMode::Dc(ev_mode()));
        testing::exchange(&mut fsm, &mut ctx, Request::DcChargeParameterDiscovery(req));

        assert_eq!(fsm.current_name(), "ScheduleExchange");
        let record = feedback.record();
        assert_eq!(
            record.dc_max_limits,
            vec![DcMaximumLimits { voltage: 800.0, current: 250.0, power: 100_000.0 }]
        );
    }
}
