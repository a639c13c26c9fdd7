//! Service discovery, detail and selection messages

use serde::{Deserialize, Serialize};

use super::datatypes::{ParameterSet, ResponseCode, ServiceCategory};
use super::Header;

/// Service entry in a discovery list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// Service category id, see `ServiceCategory::id`
    pub service_id: u16,
    /// Whether the service is free of charge
    pub free_service: bool,
}

/// ServiceDiscoveryReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDiscoveryRequest {
    pub header: Header,
    /// Restricts the answer to these ids
    pub supported_service_ids: Option<Vec<u16>>,
}

/// ServiceDiscoveryRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceDiscoveryResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    pub service_renegotiation_supported: bool,
    /// Offered energy transfer services, never empty on success
    pub energy_transfer_service_list: Vec<Service>,
    /// Offered value-added services
    pub vas_list: Option<Vec<Service>>,
}

/// ServiceDetailReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDetailRequest {
    pub header: Header,
    /// Id of the service to describe
    pub service: u16,
}

/// ServiceDetailRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceDetailResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// Described service; DC on a failed request
    pub service: u16,
    /// Parameter sets the EV may choose from
    pub service_parameter_list: Vec<ParameterSet>,
}

/// Energy transfer service picked by the EV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedEnergyService {
    pub service_id: ServiceCategory,
    /// Id from the matching ServiceDetailRes
    pub parameter_set_id: u16,
}

/// Value-added service picked by the EV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedService {
    pub service_id: u16,
    pub parameter_set_id: u16,
}

/// ServiceSelectionReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSelectionRequest {
    pub header: Header,
    pub selected_energy_transfer_service: SelectedEnergyService,
    pub selected_vas_list: Option<Vec<SelectedService>>,
}

/// ServiceSelectionRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ServiceSelectionResponse {
    pub header: Header,
    pub response_code: ResponseCode,
}
