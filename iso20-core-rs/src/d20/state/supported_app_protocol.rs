use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::message::{
    Request, SupportedAppProtocolRequest, SupportedAppProtocolResponse, SupportedAppProtocolResponseCode,
};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::{pull_request, send_sequence_error, SessionSetup};

pub const ISO20_DC_NAMESPACE: &str = "urn:iso:std:iso:15118:-20:DC";
pub const ISO20_AC_NAMESPACE: &str = "urn:iso:std:iso:15118:-20:AC";

const ISO20_MAJOR_VERSION: u32 = 1;
const ISO20_MINOR_VERSION: u32 = 0;

fn supported_namespaces(config: &SessionConfig) -> Vec<&str> {
    let services = &config.supported_energy_transfer_services;
    let mut namespaces = Vec::new();
    if services.iter().any(|s| s.is_dc()) {
        namespaces.push(ISO20_DC_NAMESPACE);
    }
    if services.iter().any(|s| s.is_ac()) {
        namespaces.push(ISO20_AC_NAMESPACE);
    }
    if let Some(custom) = config.custom_protocol.as_deref() {
        namespaces.push(custom);
    }
    namespaces
}

/// Pick the EV's highest-priority protocol we speak.
///
/// Returns the response and the chosen namespace.
pub fn handle_request(
    req: &SupportedAppProtocolRequest,
    config: &SessionConfig,
) -> (SupportedAppProtocolResponse, Option<String>) {
    let supported = supported_namespaces(config);

    let mut offered: Vec<_> = req.app_protocol.iter().collect();
    offered.sort_by_key(|p| p.priority);

    for protocol in offered {
        if protocol.version_number_major != ISO20_MAJOR_VERSION {
            continue;
        }
        if !supported.contains(&protocol.protocol_namespace.as_str()) {
            continue;
        }

        let response_code = if protocol.version_number_minor == ISO20_MINOR_VERSION {
            SupportedAppProtocolResponseCode::OkSuccessfulNegotiation
        } else {
            SupportedAppProtocolResponseCode::OkSuccessfulNegotiationWithMinorDeviation
        };

        let res = SupportedAppProtocolResponse {
            response_code,
            schema_id: Some(protocol.schema_id),
        };
        return (res, Some(protocol.protocol_namespace.clone()));
    }

    (SupportedAppProtocolResponse::default(), None)
}

/// Initial state: supportedAppProtocol handshake
#[derive(Debug, Default)]
pub struct SupportedAppProtocol;

impl SupportedAppProtocol {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for SupportedAppProtocol {
    fn name(&self) -> &'static str {
        "SupportedAppProtocol"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::SupportedAppProtocol(req) => {
                let (res, namespace) = handle_request(&req, &ctx.session_config);
                ctx.respond(res)?;

                match namespace {
                    Some(ns) => {
                        info!("Negotiated protocol {}", ns);
                        ctx.feedback().selected_protocol(&ns);
                        Ok(Transition::next(SessionSetup::new()))
                    }
                    None => {
                        warn!("No supported protocol offered by the EV");
                        ctx.log.failure("supportedAppProtocol: no negotiation");
                        ctx.session_stopped = true;
                        Ok(Transition::Stay)
                    }
                }
            }
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
