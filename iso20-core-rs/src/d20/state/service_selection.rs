use tracing::{info, warn};

use crate::error::Result;
use crate::message::{Request, ResponseCode, ServiceSelectionRequest, ServiceSelectionResponse};
use crate::session::feedback::SelectedServiceReport;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{
    handle_session_stop, pull_request, send_sequence_error, service_detail, validate_and_setup_header,
    AcChargeParameterDiscovery, DcChargeParameterDiscovery,
};

/// Validate the EV's selection against what was offered and record it
pub fn handle_request(req: &ServiceSelectionRequest, session: &mut Session) -> ServiceSelectionResponse {
    let mut res = ServiceSelectionResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    let selected = &req.selected_energy_transfer_service;
    if !session.offered_services.energy_services.contains(&selected.service_id) {
        res.response_code = ResponseCode::FailedNoEnergyTransferServiceSelected;
        return res;
    }

    let Some(energy) = session.resolve_energy_service(selected.service_id, selected.parameter_set_id) else {
        res.response_code = ResponseCode::FailedServiceSelectionInvalid;
        return res;
    };

    let vas = req.selected_vas_list.clone().unwrap_or_default();
    for service in &vas {
        if !session.offered_services.vas_services.contains(&service.service_id) {
            res.response_code = ResponseCode::FailedServiceSelectionInvalid;
            return res;
        }
        if !session.vas_parameter_set_offered(service.service_id, service.parameter_set_id) {
            res.response_code = ResponseCode::FailedServiceSelectionInvalid;
            return res;
        }
    }

    session.select_services(energy, vas);
    res.response_code = ResponseCode::Ok;
    res
}

/// Answer ServiceSelectionReq and pick the charge parameter discovery flavour
pub(crate) fn respond_service_selection(ctx: &mut Context, req: &ServiceSelectionRequest) -> Result<Transition> {
    let res = handle_request(req, &mut ctx.session);
    let code = res.response_code;
    ctx.respond(res)?;

    if code.is_failure() {
        warn!("Service selection rejected: {:?}", code);
        return Ok(Transition::Stay);
    }

    let Some(selected) = ctx.session.selected_services().copied() else {
        return Ok(Transition::Stay);
    };

    info!(
        "Selected {:?} with parameter set {} ({:?})",
        selected.selected_energy_service, selected.parameter_set_id, selected.selected_control_mode
    );
    let report = SelectedServiceReport {
        energy_service: selected.selected_energy_service,
        parameter_set_id: selected.parameter_set_id,
        control_mode: selected.selected_control_mode,
        mobility_needs_mode: selected.selected_mobility_needs_mode,
    };
    ctx.feedback().selected_service_parameters(&report);

    let vas = ctx.session.selected_vas_services().to_vec();
    if !vas.is_empty() {
        ctx.feedback().selected_vas_services(&vas);
    }

    if selected.selected_energy_service.is_dc() {
        Ok(Transition::next(DcChargeParameterDiscovery::new()))
    } else {
        Ok(Transition::next(AcChargeParameterDiscovery::new()))
    }
}

#[derive(Debug, Default)]
pub struct ServiceSelection;

impl ServiceSelection {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for ServiceSelection {
    fn name(&self) -> &'static str {
        "ServiceSelection"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::ServiceSelection(req) => respond_service_selection(ctx, &req),
            Request::ServiceDetail(req) => {
                service_detail::respond_service_detail(ctx, &req)?;
                Ok(Transition::Stay)
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
