//! supportedAppProtocol handshake (DIN 70121 / ISO 15118 common)

use serde::{Deserialize, Serialize};

/// Protocol namespace advertised by the EV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppProtocol {
    /// Namespace URN, e.g. `urn:iso:std:iso:15118:-20:DC`
    pub protocol_namespace: String,
    pub version_number_major: u32,
    pub version_number_minor: u32,
    /// Id the EVSE echoes back to select this entry
    pub schema_id: u8,
    /// 1 is the EV's most preferred protocol
    pub priority: u8,
}

/// supportedAppProtocolReq, the first message of every session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupportedAppProtocolRequest {
    /// Protocols in the EV's order of preference
    pub app_protocol: Vec<AppProtocol>,
}

/// Outcome of the protocol negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SupportedAppProtocolResponseCode {
    #[serde(rename = "OK_SuccessfulNegotiation")]
    OkSuccessfulNegotiation,
    #[serde(rename = "OK_SuccessfulNegotiationWithMinorDeviation")]
    OkSuccessfulNegotiationWithMinorDeviation,
    #[default]
    #[serde(rename = "Failed_NoNegotiation")]
    FailedNoNegotiation,
}

/// supportedAppProtocolRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SupportedAppProtocolResponse {
    pub response_code: SupportedAppProtocolResponseCode,
    /// Schema id of the selected protocol; `None` when negotiation failed
    pub schema_id: Option<u8>,
}
