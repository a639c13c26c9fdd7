//! Charge parameter discovery and schedule exchange messages

use serde::{Deserialize, Serialize};

use super::datatypes::{EvseProcessing, RationalNumber, ResponseCode};
use super::Header;

// ============================================================================
// DC_ChargeParameterDiscovery
// ============================================================================

/// EV limits sent in DC_ChargeParameterDiscoveryReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcCpdReqEnergyTransferMode {
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
    pub max_charge_current: RationalNumber,
    pub min_charge_current: RationalNumber,
    pub max_voltage: RationalNumber,
    pub min_voltage: RationalNumber,
    /// SoC in percent the EV wants to reach
    pub target_soc: Option<i8>,
}

/// EV charge and discharge limits for DC BPT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BptDcCpdReqEnergyTransferMode {
    /// Charge-direction limits
    #[serde(flatten)]
    pub charge: DcCpdReqEnergyTransferMode,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
    pub max_discharge_current: RationalNumber,
    pub min_discharge_current: RationalNumber,
}

/// Must match the energy service selected in ServiceSelection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DcCpdReqTransferMode {
    Dc(DcCpdReqEnergyTransferMode),
    BptDc(BptDcCpdReqEnergyTransferMode),
}

/// DC_ChargeParameterDiscoveryReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcChargeParameterDiscoveryRequest {
    pub header: Header,
    pub transfer_mode: DcCpdReqTransferMode,
}

/// EVSE output limits from the DC transfer limits config
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DcCpdResEnergyTransferMode {
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
    pub max_charge_current: RationalNumber,
    pub min_charge_current: RationalNumber,
    pub max_voltage: RationalNumber,
    pub min_voltage: RationalNumber,
    /// Maximum power change per second
    pub power_ramp_limit: Option<RationalNumber>,
}

/// EVSE charge and discharge limits for DC BPT
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptDcCpdResEnergyTransferMode {
    /// Charge-direction limits
    #[serde(flatten)]
    pub charge: DcCpdResEnergyTransferMode,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
    pub max_discharge_current: RationalNumber,
    pub min_discharge_current: RationalNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DcCpdResTransferMode {
    Dc(DcCpdResEnergyTransferMode),
    BptDc(BptDcCpdResEnergyTransferMode),
}

impl Default for DcCpdResTransferMode {
    fn default() -> Self {
        DcCpdResTransferMode::Dc(DcCpdResEnergyTransferMode::default())
    }
}

/// DC_ChargeParameterDiscoveryRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DcChargeParameterDiscoveryResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    pub transfer_mode: DcCpdResTransferMode,
}

// ============================================================================
// AC_ChargeParameterDiscovery
// ============================================================================

/// EV limits sent in AC_ChargeParameterDiscoveryReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcCpdReqEnergyTransferMode {
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
}

/// EV charge and discharge limits for AC BPT
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BptAcCpdReqEnergyTransferMode {
    /// Charge-direction limits
    #[serde(flatten)]
    pub charge: AcCpdReqEnergyTransferMode,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
}

/// Must match the energy service selected in ServiceSelection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AcCpdReqTransferMode {
    Ac(AcCpdReqEnergyTransferMode),
    BptAc(BptAcCpdReqEnergyTransferMode),
}

/// AC_ChargeParameterDiscoveryReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcChargeParameterDiscoveryRequest {
    pub header: Header,
    pub transfer_mode: AcCpdReqTransferMode,
}

/// EVSE limits from the AC transfer limits config
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcCpdResEnergyTransferMode {
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
    /// Grid frequency, in Hz
    pub nominal_frequency: RationalNumber,
    /// Maximum imbalance between phases, in W
    pub max_power_asymmetry: Option<RationalNumber>,
    pub power_ramp_limitation: Option<RationalNumber>,
    /// Power currently drawn at the EVSE meter, in W
    pub present_active_power: Option<RationalNumber>,
}

/// EVSE charge and discharge limits for AC BPT
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptAcCpdResEnergyTransferMode {
    /// Charge-direction limits
    #[serde(flatten)]
    pub charge: AcCpdResEnergyTransferMode,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AcCpdResTransferMode {
    Ac(AcCpdResEnergyTransferMode),
    BptAc(BptAcCpdResEnergyTransferMode),
}

impl Default for AcCpdResTransferMode {
    fn default() -> Self {
        AcCpdResTransferMode::Ac(AcCpdResEnergyTransferMode::default())
    }
}

/// AC_ChargeParameterDiscoveryRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcChargeParameterDiscoveryResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    pub transfer_mode: AcCpdResTransferMode,
}

// ============================================================================
// ScheduleExchange
// ============================================================================

/// EV mobility needs, by control mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleExchangeReqControlMode {
    Scheduled {
        /// Seconds from now until the planned departure
        departure_time: Option<u32>,
        /// Energy needed to reach the target SoC, in Wh
        ev_target_energy_request: Option<RationalNumber>,
        ev_max_energy_request: Option<RationalNumber>,
        ev_min_energy_request: Option<RationalNumber>,
    },
    Dynamic {
        /// Seconds from now until the planned departure
        departure_time: u32,
        minimum_soc: Option<i8>,
        target_soc: Option<i8>,
        /// Energy needed to reach the target SoC, in Wh
        ev_target_energy_request: RationalNumber,
        ev_max_energy_request: RationalNumber,
        ev_min_energy_request: RationalNumber,
    },
}

/// ScheduleExchangeReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleExchangeRequest {
    pub header: Header,
    /// Upper bound on schedule entries the EV can process
    pub max_supporting_points: u16,
    pub control_mode: ScheduleExchangeReqControlMode,
}

/// One step of a power schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerScheduleEntry {
    /// Length of the step, in seconds
    pub duration: u32,
    /// Power limit during the step, in W
    pub power: RationalNumber,
}

/// Power steps starting at `time_anchor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerSchedule {
    /// Unix time in seconds the first entry starts at
    pub time_anchor: u64,
    pub entries: Vec<PowerScheduleEntry>,
}

/// Charging schedule with its optional discharging counterpart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTuple {
    pub schedule_tuple_id: u32,
    pub charging_schedule: PowerSchedule,
    /// Only present for BPT services with discharge limits
    pub discharging_schedule: Option<PowerSchedule>,
}

/// Schedule offer, by control mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScheduleExchangeResControlMode {
    Scheduled {
        schedule_tuples: Vec<ScheduleTuple>,
    },
    Dynamic {
        /// Seconds until departure, set when the SECC provides mobility needs
        departure_time: Option<u32>,
        minimum_soc: Option<i8>,
        target_soc: Option<i8>,
    },
}

impl Default for ScheduleExchangeResControlMode {
    fn default() -> Self {
        ScheduleExchangeResControlMode::Scheduled { schedule_tuples: Vec::new() }
    }
}

/// ScheduleExchangeRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduleExchangeResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    pub processing: EvseProcessing,
    /// Asks the EV to pause right after this exchange
    pub go_to_pause: Option<bool>,
    pub control_mode: ScheduleExchangeResControlMode,
}
