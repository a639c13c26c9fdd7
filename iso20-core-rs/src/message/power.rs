//! DC cable check, pre-charge, power delivery and welding detection messages

use serde::{Deserialize, Serialize};

use super::datatypes::{BptChannel, EvseProcessing, EvseStatus, Processing, Progress, RationalNumber, ResponseCode};
use super::Header;

/// DC_CableCheckReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcCableCheckRequest {
    pub header: Header,
}

/// DC_CableCheckRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DcCableCheckResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// `Ongoing` until the isolation check finishes
    pub processing: EvseProcessing,
}

/// DC_PreChargeReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcPreChargeRequest {
    pub header: Header,
    pub processing: Processing,
    /// Battery voltage measured by the EV
    pub present_voltage: RationalNumber,
    /// Voltage the charger should ramp its output to
    pub target_voltage: RationalNumber,
}

/// DC_PreChargeRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DcPreChargeResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// Output voltage measured by the charger
    pub present_voltage: RationalNumber,
}

/// PowerDeliveryReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerDeliveryRequest {
    pub header: Header,
    pub processing: Processing,
    /// Start, stop, standby or schedule renegotiation
    pub charge_progress: Progress,
    /// Power direction for BPT services
    pub bpt_channel_selection: Option<BptChannel>,
}

/// PowerDeliveryRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PowerDeliveryResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    pub status: Option<EvseStatus>,
}

/// DC_WeldingDetectionReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcWeldingDetectionRequest {
    pub header: Header,
    pub processing: Processing,
}

/// DC_WeldingDetectionRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DcWeldingDetectionResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// Voltage still present on the output
    pub present_voltage: RationalNumber,
}
