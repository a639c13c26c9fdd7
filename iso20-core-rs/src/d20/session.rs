//! d20 session data: id, offered services and the negotiated selection

use std::collections::BTreeMap;

use crate::config::{
    AcBptParameterList, AcParameterList, DcBptParameterList, DcParameterList, InternetParameterList,
    ParkingParameterList,
};
use crate::message::datatypes::{
    BptChannel, ControlMode, GeneratorMode, MobilityNeedsMode, ParameterSet, Pricing, ServiceCategory, SessionId,
};
use crate::message::service::SelectedService;

/// Services and parameter sets announced to the EV, keyed by parameter set id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferedServices {
    pub energy_services: Vec<ServiceCategory>,
    pub vas_services: Vec<u16>,

    pub dc_parameter_list: BTreeMap<u16, DcParameterList>,
    pub dc_bpt_parameter_list: BTreeMap<u16, DcBptParameterList>,
    pub mcs_parameter_list: BTreeMap<u16, DcParameterList>,
    pub mcs_bpt_parameter_list: BTreeMap<u16, DcBptParameterList>,
    pub ac_parameter_list: BTreeMap<u16, AcParameterList>,
    pub ac_bpt_parameter_list: BTreeMap<u16, AcBptParameterList>,
    pub internet_parameter_list: BTreeMap<u16, InternetParameterList>,
    pub parking_parameter_list: BTreeMap<u16, ParkingParameterList>,
    /// Raw parameter sets of custom value-added services
    pub custom_vas_parameters: BTreeMap<u16, Vec<ParameterSet>>,
}

/// Energy service parameters fixed by ServiceSelection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedServiceParameters {
    pub selected_energy_service: ServiceCategory,
    pub parameter_set_id: u16,
    pub selected_control_mode: ControlMode,
    pub selected_mobility_needs_mode: MobilityNeedsMode,
    pub pricing: Pricing,
    pub bpt_channel: Option<BptChannel>,
    pub generator_mode: Option<GeneratorMode>,
    /// AC only
    pub evse_nominal_voltage: Option<u32>,
}

impl SelectedServiceParameters {
    pub fn new(service: ServiceCategory, control_mode: ControlMode, mobility: MobilityNeedsMode) -> Self {
        Self {
            selected_energy_service: service,
            parameter_set_id: 0,
            selected_control_mode: control_mode,
            selected_mobility_needs_mode: mobility,
            pricing: Pricing::NoPricing,
            bpt_channel: None,
            generator_mode: None,
            evse_nominal_voltage: None,
        }
    }

    fn from_dc(service: ServiceCategory, id: u16, p: &DcParameterList) -> Self {
        Self {
            parameter_set_id: id,
            pricing: p.pricing,
            ..Self::new(service, p.control_mode, p.mobility_needs_mode)
        }
    }

    fn from_dc_bpt(service: ServiceCategory, id: u16, p: &DcBptParameterList) -> Self {
        Self {
            bpt_channel: Some(p.bpt_channel),
            generator_mode: Some(p.generator_mode),
            ..Self::from_dc(service, id, &p.dc)
        }
    }

    fn from_ac(service: ServiceCategory, id: u16, p: &AcParameterList) -> Self {
        Self {
            parameter_set_id: id,
            pricing: p.pricing,
            evse_nominal_voltage: Some(p.evse_nominal_voltage),
            ..Self::new(service, p.control_mode, p.mobility_needs_mode)
        }
    }

    fn from_ac_bpt(service: ServiceCategory, id: u16, p: &AcBptParameterList) -> Self {
        Self {
            bpt_channel: Some(p.bpt_channel),
            generator_mode: Some(p.generator_mode),
            ..Self::from_ac(service, id, &p.ac)
        }
    }
}

/// One EV-charger dialogue
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,
    pub offered_services: OfferedServices,
    selected_services: Option<SelectedServiceParameters>,
    selected_vas: Vec<SelectedService>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// New session with a random id
    pub fn new() -> Self {
        Self::with_id(rand::random())
    }

    pub fn with_id(id: SessionId) -> Self {
        Self {
            id,
            offered_services: OfferedServices::default(),
            selected_services: None,
            selected_vas: Vec::new(),
        }
    }

    /// Session with an already negotiated energy service
    pub fn with_selected_services(parameters: SelectedServiceParameters) -> Self {
        let mut session = Self::new();
        session.selected_services = Some(parameters);
        session
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn selected_services(&self) -> Option<&SelectedServiceParameters> {
        self.selected_services.as_ref()
    }

    pub fn selected_vas_services(&self) -> &[SelectedService] {
        &self.selected_vas
    }

    /// Resolve an offered (service, parameter set) pair
    pub fn resolve_energy_service(&self, service: ServiceCategory, id: u16) -> Option<SelectedServiceParameters> {
        let offered = &self.offered_services;
        match service {
            ServiceCategory::Dc => offered.dc_parameter_list.get(&id).map(|p| SelectedServiceParameters::from_dc(service, id, p)),
            ServiceCategory::Mcs => {
                offered.mcs_parameter_list.get(&id).map(|p| SelectedServiceParameters::from_dc(service, id, p))
            }
            ServiceCategory::DcBpt => offered
                .dc_bpt_parameter_list
                .get(&id)
                .map(|p| SelectedServiceParameters::from_dc_bpt(service, id, p)),
            ServiceCategory::McsBpt => offered
                .mcs_bpt_parameter_list
                .get(&id)
                .map(|p| SelectedServiceParameters::from_dc_bpt(service, id, p)),
            ServiceCategory::Ac => offered.ac_parameter_list.get(&id).map(|p| SelectedServiceParameters::from_ac(service, id, p)),
            ServiceCategory::AcBpt => offered
                .ac_bpt_parameter_list
                .get(&id)
                .map(|p| SelectedServiceParameters::from_ac_bpt(service, id, p)),
            _ => None,
        }
    }

    /// Whether a value-added (service, parameter set) pair was offered
    pub fn vas_parameter_set_offered(&self, service_id: u16, id: u16) -> bool {
        let offered = &self.offered_services;
        match ServiceCategory::from_id(service_id) {
            Some(ServiceCategory::Internet) => offered.internet_parameter_list.contains_key(&id),
            Some(ServiceCategory::ParkingStatus) => offered.parking_parameter_list.contains_key(&id),
            _ => offered
                .custom_vas_parameters
                .get(&service_id)
                .is_some_and(|sets| sets.iter().any(|s| s.id == id)),
        }
    }

    pub fn select_services(&mut self, energy: SelectedServiceParameters, vas: Vec<SelectedService>) {
        self.selected_services = Some(energy);
        self.selected_vas = vas;
    }
}
