//! DC and AC charge loop messages

use serde::{Deserialize, Serialize};

use super::datatypes::{DisplayParameters, EvseStatus, RationalNumber, ResponseCode};
use super::Header;

// ============================================================================
// DC_ChargeLoop
// ============================================================================

/// EV side of a scheduled DC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduledDcClReq {
    /// Energy needed to reach the target SoC, in Wh
    pub target_energy_request: Option<RationalNumber>,
    /// Energy needed to reach the maximum SoC, in Wh
    pub max_energy_request: Option<RationalNumber>,
    /// Energy needed to reach the minimum SoC, in Wh
    pub min_energy_request: Option<RationalNumber>,
    /// Current the EV asks the charger to deliver
    pub target_current: RationalNumber,
    /// Voltage the EV asks the charger to hold
    pub target_voltage: RationalNumber,
    /// Updated EV limits; `None` keeps the values from discovery
    pub max_charge_power: Option<RationalNumber>,
    pub min_charge_power: Option<RationalNumber>,
    pub max_charge_current: Option<RationalNumber>,
    pub max_voltage: Option<RationalNumber>,
    pub min_voltage: Option<RationalNumber>,
}

/// Scheduled DC charge loop with bidirectional power transfer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptScheduledDcClReq {
    /// Charge-direction fields
    #[serde(flatten)]
    pub charge: ScheduledDcClReq,
    /// Discharge limits of the EV, positive values
    pub max_discharge_power: Option<RationalNumber>,
    pub min_discharge_power: Option<RationalNumber>,
    pub max_discharge_current: Option<RationalNumber>,
}

/// EV side of a dynamic DC charge loop; the EVSE picks the operating point
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicDcClReq {
    /// Seconds from now until the planned departure
    pub departure_time: Option<u32>,
    /// Energy needed to reach the target SoC, in Wh
    pub target_energy_request: RationalNumber,
    pub max_energy_request: RationalNumber,
    pub min_energy_request: RationalNumber,
    /// Hard EV limits the EVSE must stay within
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
    pub max_charge_current: RationalNumber,
    pub max_voltage: RationalNumber,
    pub min_voltage: RationalNumber,
}

/// Dynamic DC charge loop with bidirectional power transfer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptDynamicDcClReq {
    /// Charge-direction fields
    #[serde(flatten)]
    pub charge: DynamicDcClReq,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
    pub max_discharge_current: RationalNumber,
    /// Energy the EV accepts for V2X use before its minimum SoC, in Wh
    pub max_v2x_energy_request: Option<RationalNumber>,
    pub min_v2x_energy_request: Option<RationalNumber>,
}

/// Control mode specific part of DC_ChargeLoopReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DcClReqControlMode {
    Scheduled(ScheduledDcClReq),
    BptScheduled(BptScheduledDcClReq),
    Dynamic(DynamicDcClReq),
    BptDynamic(BptDynamicDcClReq),
}

/// DC_ChargeLoopReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcChargeLoopRequest {
    pub header: Header,
    /// Values for the charger HMI
    pub display_parameters: Option<DisplayParameters>,
    /// EV wants a signed meter reading in a later response
    pub meter_info_requested: bool,
    /// Voltage measured by the EV at its inlet
    pub present_voltage: RationalNumber,
    pub control_mode: DcClReqControlMode,
}

/// EVSE limits returned in a scheduled DC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduledDcClRes {
    pub max_charge_power: Option<RationalNumber>,
    pub min_charge_power: Option<RationalNumber>,
    pub max_charge_current: Option<RationalNumber>,
    pub max_voltage: Option<RationalNumber>,
}

/// EVSE limits for a scheduled BPT DC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptScheduledDcClRes {
    /// Charge-direction limits
    #[serde(flatten)]
    pub charge: ScheduledDcClRes,
    pub min_voltage: Option<RationalNumber>,
    /// Discharge limits; only populated when configured
    pub max_discharge_power: Option<RationalNumber>,
    pub min_discharge_power: Option<RationalNumber>,
    pub max_discharge_current: Option<RationalNumber>,
}

/// EVSE limits and mobility targets for a dynamic DC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicDcClRes {
    /// Seconds until departure, set when the SECC provides mobility needs
    pub departure_time: Option<u32>,
    /// SoC in percent to reach as fast as possible
    pub minimum_soc: Option<i8>,
    /// SoC in percent to reach by departure
    pub target_soc: Option<i8>,
    /// Seconds the EV may take to follow changed targets
    pub ack_max_delay: Option<u16>,
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
    pub max_charge_current: RationalNumber,
    pub max_voltage: RationalNumber,
}

/// EVSE limits for a dynamic BPT DC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptDynamicDcClRes {
    /// Charge-direction limits and targets
    #[serde(flatten)]
    pub charge: DynamicDcClRes,
    pub min_voltage: RationalNumber,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
    pub max_discharge_current: RationalNumber,
}

/// Control mode specific part of DC_ChargeLoopRes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DcClResControlMode {
    Scheduled(ScheduledDcClRes),
    BptScheduled(BptScheduledDcClRes),
    Dynamic(DynamicDcClRes),
    BptDynamic(BptDynamicDcClRes),
}

impl Default for DcClResControlMode {
    fn default() -> Self {
        DcClResControlMode::Scheduled(ScheduledDcClRes::default())
    }
}

/// DC_ChargeLoopRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DcChargeLoopResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// Stop or pause request towards the EV, if any
    pub status: Option<EvseStatus>,
    /// Output current measured by the charger
    pub present_current: RationalNumber,
    /// Output voltage measured by the charger
    pub present_voltage: RationalNumber,
    /// Output is clamped by an EVSE limit
    pub power_limit_achieved: bool,
    pub current_limit_achieved: bool,
    pub voltage_limit_achieved: bool,
    pub control_mode: DcClResControlMode,
}

// ============================================================================
// AC_ChargeLoop
// ============================================================================

/// EV side of a scheduled AC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduledAcClReq {
    /// Energy needed to reach the target SoC, in Wh
    pub target_energy_request: Option<RationalNumber>,
    pub max_energy_request: Option<RationalNumber>,
    pub min_energy_request: Option<RationalNumber>,
    pub max_charge_power: Option<RationalNumber>,
    pub min_charge_power: Option<RationalNumber>,
    /// Active power the EV currently draws, in W
    pub present_active_power: RationalNumber,
    /// Reactive power the EV currently draws, in var
    pub present_reactive_power: Option<RationalNumber>,
}

/// Scheduled AC charge loop with bidirectional power transfer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptScheduledAcClReq {
    /// Charge-direction fields
    #[serde(flatten)]
    pub charge: ScheduledAcClReq,
    pub max_discharge_power: Option<RationalNumber>,
    pub min_discharge_power: Option<RationalNumber>,
}

/// EV side of a dynamic AC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicAcClReq {
    /// Seconds from now until the planned departure
    pub departure_time: Option<u32>,
    pub target_energy_request: RationalNumber,
    pub max_energy_request: RationalNumber,
    pub min_energy_request: RationalNumber,
    pub max_charge_power: RationalNumber,
    pub min_charge_power: RationalNumber,
    /// Active power the EV currently draws, in W
    pub present_active_power: RationalNumber,
    pub present_reactive_power: RationalNumber,
}

/// Dynamic AC charge loop with bidirectional power transfer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BptDynamicAcClReq {
    /// Charge-direction fields
    #[serde(flatten)]
    pub charge: DynamicAcClReq,
    pub max_discharge_power: RationalNumber,
    pub min_discharge_power: RationalNumber,
    pub max_v2x_energy_request: Option<RationalNumber>,
    pub min_v2x_energy_request: Option<RationalNumber>,
}

/// Control mode specific part of AC_ChargeLoopReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AcClReqControlMode {
    Scheduled(ScheduledAcClReq),
    BptScheduled(BptScheduledAcClReq),
    Dynamic(DynamicAcClReq),
    BptDynamic(BptDynamicAcClReq),
}

/// AC_ChargeLoopReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcChargeLoopRequest {
    pub header: Header,
    pub display_parameters: Option<DisplayParameters>,
    /// EV wants a signed meter reading in a later response
    pub meter_info_requested: bool,
    pub control_mode: AcClReqControlMode,
}

/// EVSE side of a scheduled AC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScheduledAcClRes {
    /// Power the EV should draw, in W
    pub target_active_power: Option<RationalNumber>,
    pub target_reactive_power: Option<RationalNumber>,
    /// Active power measured at the EVSE meter, in W
    pub present_active_power: Option<RationalNumber>,
}

/// EVSE setpoint and mobility targets for a dynamic AC charge loop
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicAcClRes {
    /// Seconds until departure, set when the SECC provides mobility needs
    pub departure_time: Option<u32>,
    pub minimum_soc: Option<i8>,
    pub target_soc: Option<i8>,
    /// Seconds the EV may take to follow changed targets
    pub ack_max_delay: Option<u16>,
    /// Power the EV should draw, in W
    pub target_active_power: RationalNumber,
    pub target_reactive_power: Option<RationalNumber>,
    pub present_active_power: Option<RationalNumber>,
}

/// BPT variants carry the same fields as their charge-only counterparts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AcClResControlMode {
    Scheduled(ScheduledAcClRes),
    BptScheduled(ScheduledAcClRes),
    Dynamic(DynamicAcClRes),
    BptDynamic(DynamicAcClRes),
}

impl Default for AcClResControlMode {
    fn default() -> Self {
        AcClResControlMode::Scheduled(ScheduledAcClRes::default())
    }
}

/// AC_ChargeLoopRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AcChargeLoopResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// Stop or pause request towards the EV, if any
    pub status: Option<EvseStatus>,
    /// Grid frequency the EV should synchronize to, in Hz
    pub target_frequency: Option<RationalNumber>,
    pub control_mode: AcClResControlMode,
}
