//! EVSE and session configuration
//!
//! [`EvseSetupConfig`] is what an embedding application provides (it can be
//! deserialized from JSON). [`SessionConfig`] is derived from it once per
//! session and carries the per-service parameter lists offered in
//! ServiceDetail.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::message::datatypes::{
    AcConnector, Authorization, BptChannel, ControlMode, DcConnector, GeneratorMode,
    GridCodeIslandingDetectionMethod, IntendedService, MobilityNeedsMode, ParkingStatus, Port, Pricing,
    Protocol, RationalNumber, ServiceCategory,
};

/// Idle deadline, re-armed while disconnected and on every received packet
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_millis(5000);

// ============================================================================
// Transfer limits
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Limits {
    pub max: RationalNumber,
    pub min: RationalNumber,
}

impl Limits {
    pub fn new(max: RationalNumber, min: RationalNumber) -> Self {
        Self { max, min }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PowerCurrentLimits {
    pub power: Limits,
    pub current: Limits,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DcTransferLimits {
    pub charge_limits: PowerCurrentLimits,
    /// Present only when bidirectional transfer is supported
    pub discharge_limits: Option<PowerCurrentLimits>,
    pub voltage: Limits,
    pub power_ramp_limit: Option<RationalNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcTransferLimits {
    pub charge_power: Limits,
    /// Present only when bidirectional transfer is supported
    pub discharge_power: Option<Limits>,
    pub nominal_frequency: RationalNumber,
    pub max_power_asymmetry: Option<RationalNumber>,
    pub power_ramp_limitation: Option<RationalNumber>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMobilityNeedsModes {
    pub control_mode: ControlMode,
    pub mobility_mode: MobilityNeedsMode,
}

impl ControlMobilityNeedsModes {
    pub fn new(control_mode: ControlMode, mobility_mode: MobilityNeedsMode) -> Self {
        Self { control_mode, mobility_mode }
    }
}

// ============================================================================
// EVSE setup
// ============================================================================

/// Static EVSE capabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvseSetupConfig {
    /// EVSE id sent in SessionSetupRes
    pub evse_id: String,

    pub supported_energy_services: Vec<ServiceCategory>,

    pub authorization_services: Vec<Authorization>,

    /// Value-added service ids, including custom ones
    pub supported_vas_services: Vec<u16>,

    pub enable_certificate_install_service: bool,

    pub dc_limits: DcTransferLimits,

    pub ac_limits: AcTransferLimits,

    pub control_mobility_modes: Vec<ControlMobilityNeedsModes>,

    /// Extra protocol namespace accepted in supportedAppProtocol
    pub custom_protocol: Option<String>,

    pub dc_connector: DcConnector,

    pub ac_connector: AcConnector,

    /// Nominal AC grid voltage in volts
    pub evse_nominal_voltage: u32,

    pub pricing: Pricing,

    pub bpt_channel: BptChannel,

    pub generator_mode: GeneratorMode,

    pub islanding_detection: GridCodeIslandingDetectionMethod,
}

impl Default for EvseSetupConfig {
    fn default() -> Self {
        Self {
            evse_id: "DE*PNX*E12345*1".to_string(),
            supported_energy_services: vec![ServiceCategory::Dc],
            authorization_services: vec![Authorization::Eim],
            supported_vas_services: Vec::new(),
            enable_certificate_install_service: false,
            dc_limits: DcTransferLimits::default(),
            ac_limits: AcTransferLimits::default(),
            control_mobility_modes: vec![ControlMobilityNeedsModes::new(
                ControlMode::Scheduled,
                MobilityNeedsMode::ProvidedByEvcc,
            )],
            custom_protocol: None,
            dc_connector: DcConnector::Extended,
            ac_connector: AcConnector::ThreePhase,
            evse_nominal_voltage: 230,
            pricing: Pricing::NoPricing,
            bpt_channel: BptChannel::Unified,
            generator_mode: GeneratorMode::GridFollowing,
            islanding_detection: GridCodeIslandingDetectionMethod::Passive,
        }
    }
}

impl EvseSetupConfig {
    /// Create config with basic parameters
    pub fn new(evse_id: impl Into<String>, energy_services: Vec<ServiceCategory>) -> Self {
        Self {
            evse_id: evse_id.into(),
            supported_energy_services: energy_services,
            ..Default::default()
        }
    }

    /// Load config from a JSON document
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_dc_limits(mut self, limits: DcTransferLimits) -> Self {
        self.dc_limits = limits;
        self
    }

    pub fn with_ac_limits(mut self, limits: AcTransferLimits) -> Self {
        self.ac_limits = limits;
        self
    }

    pub fn with_vas_services(mut self, services: Vec<u16>) -> Self {
        self.supported_vas_services = services;
        self
    }

    pub fn with_authorization_services(mut self, services: Vec<Authorization>) -> Self {
        self.authorization_services = services;
        self
    }

    pub fn with_control_mobility_modes(mut self, modes: Vec<ControlMobilityNeedsModes>) -> Self {
        self.control_mobility_modes = modes;
        self
    }

    pub fn with_custom_protocol(mut self, namespace: impl Into<String>) -> Self {
        self.custom_protocol = Some(namespace.into());
        self
    }

    pub fn with_certificate_install_service(mut self, enabled: bool) -> Self {
        self.enable_certificate_install_service = enabled;
        self
    }
}

// ============================================================================
// Service parameter lists
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcParameterList {
    pub connector: DcConnector,
    pub control_mode: ControlMode,
    pub mobility_needs_mode: MobilityNeedsMode,
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcBptParameterList {
    pub dc: DcParameterList,
    pub bpt_channel: BptChannel,
    pub generator_mode: GeneratorMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcParameterList {
    pub connector: AcConnector,
    pub control_mode: ControlMode,
    pub mobility_needs_mode: MobilityNeedsMode,
    pub evse_nominal_voltage: u32,
    pub pricing: Pricing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcBptParameterList {
    pub ac: AcParameterList,
    pub bpt_channel: BptChannel,
    pub generator_mode: GeneratorMode,
    pub grid_code_detection_method: GridCodeIslandingDetectionMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternetParameterList {
    pub protocol: Protocol,
    pub port: Port,
}

impl InternetParameterList {
    /// Parameter set id assigned to each protocol/port pair
    pub fn parameter_set_id(&self) -> Option<u16> {
        match (self.protocol, self.port) {
            (Protocol::Ftp, Port::Port20) => Some(1),
            (Protocol::Ftp, Port::Port21) => Some(2),
            (Protocol::Http, Port::Port80) => Some(3),
            (Protocol::Https, Port::Port443) => Some(4),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParkingParameterList {
    pub intended_service: IntendedService,
    pub parking_status: ParkingStatus,
}

// ============================================================================
// Session config
// ============================================================================

/// Per-session configuration derived from [`EvseSetupConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub evse_id: String,

    pub cert_install_service: bool,
    pub authorization_services: Vec<Authorization>,

    pub supported_energy_transfer_services: Vec<ServiceCategory>,
    pub supported_vas_services: Vec<u16>,

    pub dc_parameter_list: Vec<DcParameterList>,
    pub dc_bpt_parameter_list: Vec<DcBptParameterList>,
    pub ac_parameter_list: Vec<AcParameterList>,
    pub ac_bpt_parameter_list: Vec<AcBptParameterList>,

    /// Filled on the first ServiceDetail request for the Internet service
    pub internet_parameter_list: Vec<InternetParameterList>,
    /// Filled on the first ServiceDetail request for the parking service
    pub parking_parameter_list: Vec<ParkingParameterList>,

    pub dc_limits: DcTransferLimits,
    pub ac_limits: AcTransferLimits,

    pub supported_control_mobility_modes: Vec<ControlMobilityNeedsModes>,

    pub custom_protocol: Option<String>,
}

impl SessionConfig {
    pub fn new(setup: &EvseSetupConfig) -> Self {
        // Scheduled mode always gets its mobility needs from the EV
        let mut modes: Vec<(ControlMode, MobilityNeedsMode)> = Vec::new();
        for m in &setup.control_mobility_modes {
            let mobility = match m.control_mode {
                ControlMode::Scheduled => MobilityNeedsMode::ProvidedByEvcc,
                ControlMode::Dynamic => m.mobility_mode,
            };
            if !modes.contains(&(m.control_mode, mobility)) {
                modes.push((m.control_mode, mobility));
            }
        }

        let dc_parameter_list: Vec<DcParameterList> = modes
            .iter()
            .map(|&(control_mode, mobility_needs_mode)| DcParameterList {
                connector: setup.dc_connector,
                control_mode,
                mobility_needs_mode,
                pricing: setup.pricing,
            })
            .collect();

        let dc_bpt_parameter_list = dc_parameter_list
            .iter()
            .map(|&dc| DcBptParameterList {
                dc,
                bpt_channel: setup.bpt_channel,
                generator_mode: setup.generator_mode,
            })
            .collect();

        let ac_parameter_list: Vec<AcParameterList> = modes
            .iter()
            .map(|&(control_mode, mobility_needs_mode)| AcParameterList {
                connector: setup.ac_connector,
                control_mode,
                mobility_needs_mode,
                evse_nominal_voltage: setup.evse_nominal_voltage,
                pricing: setup.pricing,
            })
            .collect();

        let ac_bpt_parameter_list = ac_parameter_list
            .iter()
            .map(|&ac| AcBptParameterList {
                ac,
                bpt_channel: setup.bpt_channel,
                generator_mode: setup.generator_mode,
                grid_code_detection_method: setup.islanding_detection,
            })
            .collect();

        Self {
            evse_id: setup.evse_id.clone(),
            cert_install_service: setup.enable_certificate_install_service,
            authorization_services: setup.authorization_services.clone(),
            supported_energy_transfer_services: setup.supported_energy_services.clone(),
            supported_vas_services: setup.supported_vas_services.clone(),
            dc_parameter_list,
            dc_bpt_parameter_list,
            ac_parameter_list,
            ac_bpt_parameter_list,
            internet_parameter_list: Vec::new(),
            parking_parameter_list: Vec::new(),
            dc_limits: setup.dc_limits.clone(),
            ac_limits: setup.ac_limits.clone(),
            supported_control_mobility_modes: setup.control_mobility_modes.clone(),
            custom_protocol: setup.custom_protocol.clone(),
        }
    }
}
