use tracing::debug;

use crate::config::SessionConfig;
use crate::error::Result;
use crate::message::{Request, ResponseCode, Service, ServiceDiscoveryRequest, ServiceDiscoveryResponse};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, ServiceDetail};

/// Announce energy and value-added services, remembering what was offered
pub fn handle_request(
    req: &ServiceDiscoveryRequest,
    session: &mut Session,
    config: &SessionConfig,
) -> ServiceDiscoveryResponse {
    let mut res = ServiceDiscoveryResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    let wanted = |id: u16| match &req.supported_service_ids {
        Some(ids) => ids.contains(&id),
        None => true,
    };

    let energy_services: Vec<_> = config
        .supported_energy_transfer_services
        .iter()
        .copied()
        .filter(|s| wanted(s.id()))
        .collect();

    let vas_services: Vec<u16> = config
        .supported_vas_services
        .iter()
        .copied()
        .filter(|&id| wanted(id))
        .collect();

    res.energy_transfer_service_list = energy_services
        .iter()
        .map(|s| Service { service_id: s.id(), free_service: false })
        .collect();

    if !vas_services.is_empty() {
        res.vas_list = Some(
            vas_services
                .iter()
                .map(|&id| Service { service_id: id, free_service: true })
                .collect(),
        );
    }

    session.offered_services.energy_services = energy_services;
    session.offered_services.vas_services = vas_services;

    res.service_renegotiation_supported = false;
    res.response_code = if res.energy_transfer_service_list.is_empty() {
        ResponseCode::FailedNoEnergyTransferServiceSelected
    } else {
        ResponseCode::Ok
    };
    res
}

#[derive(Debug, Default)]
pub struct ServiceDiscovery;

impl ServiceDiscovery {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for ServiceDiscovery {
    fn name(&self) -> &'static str {
        "ServiceDiscovery"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::ServiceDiscovery(req) => {
                let res = handle_request(&req, &mut ctx.session, &ctx.session_config);
                debug!(
                    "Offering {} energy service(s), {} value-added service(s)",
                    res.energy_transfer_service_list.len(),
                    res.vas_list.as_ref().map_or(0, |l| l.len())
                );
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    return Ok(Transition::Stay);
                }
                Ok(Transition::next(ServiceDetail::new()))
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
