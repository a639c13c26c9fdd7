//! Session setup, authorization and session stop messages

use serde::{Deserialize, Serialize};

use super::datatypes::{Authorization, ChargingSession, EvseProcessing, ResponseCode};
use super::Header;

/// SessionSetupReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSetupRequest {
    pub header: Header,
    /// EVCC identifier, usually the EV's MAC address
    pub evcc_id: String,
}

/// SessionSetupRes; the header carries the new session id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSetupResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// EVSE identifier from the setup config
    pub evse_id: String,
}

/// AuthorizationSetupReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationSetupRequest {
    pub header: Header,
}

/// Authorization mode offered by the EVSE
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum AuthorizationSetupMode {
    #[default]
    Eim,
    Pnc {
        /// 16 random bytes the EV signs in its AuthorizationReq
        gen_challenge: Vec<u8>,
        supported_providers: Option<Vec<String>>,
    },
}

/// AuthorizationSetupRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorizationSetupResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// Authorization methods the EVSE accepts
    pub authorization_services: Vec<Authorization>,
    /// Whether contract certificates can be installed
    pub certificate_installation_service: bool,
    pub authorization_mode: AuthorizationSetupMode,
}

/// Authorization data sent by the EV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuthorizationRequestMode {
    Eim,
    Pnc {
        /// Id attribute of the signed element
        id: String,
        /// Challenge echoed from AuthorizationSetupRes
        gen_challenge: Vec<u8>,
        contract_certificate_chain: Vec<u8>,
    },
}

/// AuthorizationReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub header: Header,
    /// Method picked from AuthorizationSetupRes
    pub selected_authorization_service: Authorization,
    pub authorization_mode: AuthorizationRequestMode,
}

/// AuthorizationRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuthorizationResponse {
    pub header: Header,
    pub response_code: ResponseCode,
    /// `Ongoing` until the charger decides
    pub evse_processing: EvseProcessing,
}

/// SessionStopReq
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStopRequest {
    pub header: Header,
    /// Whether the EV terminates, pauses or renegotiates
    pub charging_session: ChargingSession,
    pub ev_termination_code: Option<String>,
    pub ev_termination_explanation: Option<String>,
}

/// SessionStopRes
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionStopResponse {
    pub header: Header,
    pub response_code: ResponseCode,
}
