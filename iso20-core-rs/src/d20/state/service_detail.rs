use tracing::{debug, warn};

use crate::config::{
    AcBptParameterList, AcParameterList, DcBptParameterList, DcParameterList, InternetParameterList,
    ParkingParameterList, SessionConfig,
};
use crate::error::Result;
use crate::message::datatypes::{
    ControlMode, DcConnector, IntendedService, MobilityNeedsMode, Parameter, ParameterSet, ParameterValue,
    ParkingStatus, Port, Pricing, Protocol, ServiceCategory,
};
use crate::message::{Request, ResponseCode, ServiceDetailRequest, ServiceDetailResponse};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{
    handle_session_stop, pull_request, send_sequence_error, service_selection, validate_and_setup_header,
    ServiceSelection,
};

// Scheduled control mode always takes its mobility needs from the EV
fn effective_mobility(control_mode: ControlMode, mobility: MobilityNeedsMode) -> MobilityNeedsMode {
    match control_mode {
        ControlMode::Scheduled => MobilityNeedsMode::ProvidedByEvcc,
        ControlMode::Dynamic => mobility,
    }
}

fn dc_parameters(list: &DcParameterList) -> Vec<Parameter> {
    vec![
        Parameter::int("Connector", list.connector.value()),
        Parameter::int("ControlMode", list.control_mode.value()),
        Parameter::int(
            "MobilityNeedsMode",
            effective_mobility(list.control_mode, list.mobility_needs_mode).value(),
        ),
        Parameter::int("Pricing", list.pricing.value()),
    ]
}

fn dc_bpt_parameters(list: &DcBptParameterList) -> Vec<Parameter> {
    let mut parameters = dc_parameters(&list.dc);
    parameters.push(Parameter::int("BPTChannel", list.bpt_channel.value()));
    parameters.push(Parameter::int("GeneratorMode", list.generator_mode.value()));
    parameters
}

fn ac_parameters(list: &AcParameterList) -> Vec<Parameter> {
    vec![
        Parameter::int("Connector", list.connector.value()),
        Parameter::int("ControlMode", list.control_mode.value()),
        Parameter::int("EVSENominalVoltage", list.evse_nominal_voltage as i32),
        Parameter::int(
            "MobilityNeedsMode",
            effective_mobility(list.control_mode, list.mobility_needs_mode).value(),
        ),
        Parameter::int("Pricing", list.pricing.value()),
    ]
}

fn ac_bpt_parameters(list: &AcBptParameterList) -> Vec<Parameter> {
    let mut parameters = ac_parameters(&list.ac);
    parameters.push(Parameter::int("BPTChannel", list.bpt_channel.value()));
    parameters.push(Parameter::int("GeneratorMode", list.generator_mode.value()));
    parameters.push(Parameter::int(
        "DetectionMethodGridCodeIslanding",
        list.grid_code_detection_method.value(),
    ));
    parameters
}

/// Fixed DC set sent along with FAILED_ServiceIDInvalid
fn mandatory_parameter_set() -> ParameterSet {
    let list = DcParameterList {
        connector: DcConnector::Core,
        control_mode: ControlMode::Scheduled,
        mobility_needs_mode: MobilityNeedsMode::ProvidedByEvcc,
        pricing: Pricing::NoPricing,
    };
    ParameterSet::new(0, dc_parameters(&list))
}

fn find_parameter<'a>(set: &'a ParameterSet, name: &str) -> Option<&'a Parameter> {
    set.parameter.iter().find(|p| p.name == name)
}

fn parse_internet(set: &ParameterSet) -> Option<InternetParameterList> {
    let protocol = find_parameter(set, "Protocol")?.as_str().and_then(Protocol::parse)?;
    let port = find_parameter(set, "Port")?.as_int().and_then(Port::from_value)?;
    Some(InternetParameterList { protocol, port })
}

fn parse_parking(set: &ParameterSet) -> Option<ParkingParameterList> {
    let intended_service = find_parameter(set, "IntendedService")?
        .as_int()
        .and_then(IntendedService::from_value)?;
    let parking_status = find_parameter(set, "ParkingStatusType")?
        .as_int()
        .and_then(ParkingStatus::from_value)?;
    Some(ParkingParameterList { intended_service, parking_status })
}

fn parse_sets<T>(sets: &[ParameterSet], service: &str, parse: impl Fn(&ParameterSet) -> Option<T>) -> Vec<T> {
    sets.iter()
        .filter_map(|set| {
            let parsed = parse(set);
            if parsed.is_none() {
                warn!("Ignoring malformed {} parameter set {}", service, set.id);
            }
            parsed
        })
        .collect()
}

fn energy_service_detail(service: ServiceCategory, session: &mut Session, config: &SessionConfig) -> Vec<ParameterSet> {
    let offered = &mut session.offered_services;
    let mut sets = Vec::new();

    match service {
        ServiceCategory::Dc | ServiceCategory::Mcs => {
            let target = if service == ServiceCategory::Dc {
                &mut offered.dc_parameter_list
            } else {
                &mut offered.mcs_parameter_list
            };
            for (id, list) in config.dc_parameter_list.iter().enumerate() {
                let id = id as u16;
                let mut list = *list;
                list.mobility_needs_mode = effective_mobility(list.control_mode, list.mobility_needs_mode);
                sets.push(ParameterSet::new(id, dc_parameters(&list)));
                target.insert(id, list);
            }
        }
        ServiceCategory::DcBpt | ServiceCategory::McsBpt => {
            let target = if service == ServiceCategory::DcBpt {
                &mut offered.dc_bpt_parameter_list
            } else {
                &mut offered.mcs_bpt_parameter_list
            };
            for (id, list) in config.dc_bpt_parameter_list.iter().enumerate() {
                let id = id as u16;
                let mut list = *list;
                list.dc.mobility_needs_mode = effective_mobility(list.dc.control_mode, list.dc.mobility_needs_mode);
                sets.push(ParameterSet::new(id, dc_bpt_parameters(&list)));
                target.insert(id, list);
            }
        }
        ServiceCategory::Ac => {
            for (id, list) in config.ac_parameter_list.iter().enumerate() {
                let id = id as u16;
                let mut list = *list;
                list.mobility_needs_mode = effective_mobility(list.control_mode, list.mobility_needs_mode);
                sets.push(ParameterSet::new(id, ac_parameters(&list)));
                offered.ac_parameter_list.insert(id, list);
            }
        }
        ServiceCategory::AcBpt => {
            for (id, list) in config.ac_bpt_parameter_list.iter().enumerate() {
                let id = id as u16;
                let mut list = *list;
                list.ac.mobility_needs_mode = effective_mobility(list.ac.control_mode, list.ac.mobility_needs_mode);
                sets.push(ParameterSet::new(id, ac_bpt_parameters(&list)));
                offered.ac_bpt_parameter_list.insert(id, list);
            }
        }
        other => warn!("No parameter sets for energy service {:?}", other),
    }

    sets
}

fn vas_service_detail(
    service_id: u16,
    session: &mut Session,
    config: &mut SessionConfig,
    vas_parameters: Option<Vec<ParameterSet>>,
) -> Vec<ParameterSet> {
    let offered = &mut session.offered_services;

    match ServiceCategory::from_id(service_id) {
        Some(ServiceCategory::Internet) => {
            if config.internet_parameter_list.is_empty() {
                if let Some(sets) = &vas_parameters {
                    config.internet_parameter_list = parse_sets(sets, "Internet", parse_internet);
                }
            }

            let mut sets = Vec::new();
            for list in &config.internet_parameter_list {
                let Some(id) = list.parameter_set_id() else {
                    warn!("Unsupported Internet protocol/port pair {:?}/{:?}", list.protocol, list.port);
                    continue;
                };
                sets.push(ParameterSet::new(
                    id,
                    vec![
                        Parameter::new("Protocol", ParameterValue::Finite(list.protocol.as_str().to_string())),
                        Parameter::int("Port", list.port.value()),
                    ],
                ));
                offered.internet_parameter_list.insert(id, *list);
            }
            sets
        }
        Some(ServiceCategory::ParkingStatus) => {
            if config.parking_parameter_list.is_empty() {
                if let Some(sets) = &vas_parameters {
                    config.parking_parameter_list = parse_sets(sets, "ParkingStatus", parse_parking);
                }
            }

            let mut sets = Vec::new();
            for (id, list) in config.parking_parameter_list.iter().enumerate() {
                let id = id as u16;
                sets.push(ParameterSet::new(
                    id,
                    vec![
                        Parameter::int("IntendedService", list.intended_service.value()),
                        Parameter::int("ParkingStatusType", list.parking_status.value()),
                    ],
                ));
                offered.parking_parameter_list.insert(id, *list);
            }
            sets
        }
        _ => {
            let sets = vas_parameters.unwrap_or_default();
            offered.custom_vas_parameters.insert(service_id, sets.clone());
            sets
        }
    }
}

/// Answer ServiceDetailReq.
///
/// `vas_parameters` is what the embedding application returned for a
/// value-added service id; it is ignored for energy services.
pub fn handle_request(
    req: &ServiceDetailRequest,
    session: &mut Session,
    config: &mut SessionConfig,
    vas_parameters: Option<Vec<ParameterSet>>,
) -> ServiceDetailResponse {
    // failures still carry a schema-valid DC service description
    let mut res = ServiceDetailResponse {
        service: ServiceCategory::Dc.id(),
        service_parameter_list: vec![mandatory_parameter_set()],
        ..Default::default()
    };

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    let energy_service = ServiceCategory::from_id(req.service)
        .filter(|s| s.is_energy_service())
        .filter(|s| session.offered_services.energy_services.contains(s));

    if let Some(service) = energy_service {
        res.service_parameter_list = energy_service_detail(service, session, config);
    } else if session.offered_services.vas_services.contains(&req.service) {
        res.service_parameter_list = vas_service_detail(req.service, session, config, vas_parameters);
    } else {
        res.response_code = ResponseCode::FailedServiceIdInvalid;
        return res;
    }

    res.service = req.service;
    res.response_code = ResponseCode::Ok;
    res
}

/// Whether the request will be answered from the application's VAS
/// parameters; rejected requests never reach the application
fn needs_vas_parameters(req: &ServiceDetailRequest, session: &Session) -> bool {
    req.header.session_id == session.id()
        && !ServiceCategory::from_id(req.service).is_some_and(|s| s.is_energy_service())
        && session.offered_services.vas_services.contains(&req.service)
}

/// Answer ServiceDetailReq with the context's session data, asking the
/// embedding application for value-added parameters when needed
pub(crate) fn respond_service_detail(ctx: &mut Context, req: &ServiceDetailRequest) -> Result<ResponseCode> {
    let vas_parameters = if needs_vas_parameters(req, &ctx.session) {
        ctx.feedback().get_vas_parameters(req.service)?
    } else {
        None
    };

    let res = handle_request(req, &mut ctx.session, &mut ctx.session_config, vas_parameters);
    debug!(
        "ServiceDetail for service {}: {} parameter set(s)",
        req.service,
        res.service_parameter_list.len()
    );
    let code = res.response_code;
    ctx.respond(res)?;
    Ok(code)
}

#[derive(Debug, Default)]
pub struct ServiceDetail;

impl ServiceDetail {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for ServiceDetail {
    fn name(&self) -> &'static str {
        "ServiceDetail"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::ServiceDetail(req) => {
                let code = respond_service_detail(ctx, &req)?;
                if code.is_failure() {
                    return Ok(Transition::Stay);
                }
                Ok(Transition::next(ServiceSelection::new()))
            }
            Request::ServiceSelection(req) => service_selection::respond_service_selection(ctx, &req),
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
