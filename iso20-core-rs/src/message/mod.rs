//! d20 message family
//!
//! Typed request/response structs for every message the EVSE handles,
//! plus the [`Request`] and [`Response`] variants exchanged between the
//! codec and the state machine.

pub mod app_protocol;
pub mod charge_loop;
pub mod charge_parameter;
pub mod datatypes;
pub mod power;
pub mod service;
pub mod setup;

use serde::{Deserialize, Serialize};

pub use app_protocol::*;
pub use charge_loop::*;
pub use charge_parameter::*;
pub use datatypes::{ResponseCode, SessionId};
pub use power::*;
pub use service::*;
pub use setup::*;

/// Common message header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    pub session_id: SessionId,
    /// Unix timestamp in seconds
    pub timestamp: u64,
}

impl Header {
    pub fn new(session_id: SessionId, timestamp: u64) -> Self {
        Self { session_id, timestamp }
    }
}

// ============================================================================
// Payload types
// ============================================================================

/// V2GTP payload type carried in bytes 2-3 of the packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadType {
    /// supportedAppProtocol handshake
    Sap,
    /// Common d20 messages
    Part20Main,
    Part20Ac,
    Part20Dc,
    Part20Acdp,
    Part20Wpt,
}

impl PayloadType {
    pub fn value(self) -> u16 {
        match self {
            PayloadType::Sap => 0x8001,
            PayloadType::Part20Main => 0x8002,
            PayloadType::Part20Ac => 0x8003,
            PayloadType::Part20Dc => 0x8004,
            PayloadType::Part20Acdp => 0x8005,
            PayloadType::Part20Wpt => 0x8006,
        }
    }

    pub fn from_value(v: u16) -> Option<Self> {
        match v {
            0x8001 => Some(PayloadType::Sap),
            0x8002 => Some(PayloadType::Part20Main),
            0x8003 => Some(PayloadType::Part20Ac),
            0x8004 => Some(PayloadType::Part20Dc),
            0x8005 => Some(PayloadType::Part20Acdp),
            0x8006 => Some(PayloadType::Part20Wpt),
            _ => None,
        }
    }
}

// ============================================================================
// Message type tags
// ============================================================================

/// Tag for every message in the family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    SupportedAppProtocolReq,
    SupportedAppProtocolRes,
    SessionSetupReq,
    SessionSetupRes,
    AuthorizationSetupReq,
    AuthorizationSetupRes,
    AuthorizationReq,
    AuthorizationRes,
    ServiceDiscoveryReq,
    ServiceDiscoveryRes,
    ServiceDetailReq,
    ServiceDetailRes,
    ServiceSelectionReq,
    ServiceSelectionRes,
    DcChargeParameterDiscoveryReq,
    DcChargeParameterDiscoveryRes,
    AcChargeParameterDiscoveryReq,
    AcChargeParameterDiscoveryRes,
    ScheduleExchangeReq,
    ScheduleExchangeRes,
    DcCableCheckReq,
    DcCableCheckRes,
    DcPreChargeReq,
    DcPreChargeRes,
    PowerDeliveryReq,
    PowerDeliveryRes,
    DcChargeLoopReq,
    DcChargeLoopRes,
    AcChargeLoopReq,
    AcChargeLoopRes,
    DcWeldingDetectionReq,
    DcWeldingDetectionRes,
    SessionStopReq,
    SessionStopRes,
}

impl Type {
    /// Response tag paired with a request tag. Response tags map to themselves.
    pub fn response_type(self) -> Type {
        match self {
            Type::SupportedAppProtocolReq => Type::SupportedAppProtocolRes,
            Type::SessionSetupReq => Type::SessionSetupRes,
            Type::AuthorizationSetupReq => Type::AuthorizationSetupRes,
            Type::AuthorizationReq => Type::AuthorizationRes,
            Type::ServiceDiscoveryReq => Type::ServiceDiscoveryRes,
            Type::ServiceDetailReq => Type::ServiceDetailRes,
            Type::ServiceSelectionReq => Type::ServiceSelectionRes,
            Type::DcChargeParameterDiscoveryReq => Type::DcChargeParameterDiscoveryRes,
            Type::AcChargeParameterDiscoveryReq => Type::AcChargeParameterDiscoveryRes,
            Type::ScheduleExchangeReq => Type::ScheduleExchangeRes,
            Type::DcCableCheckReq => Type::DcCableCheckRes,
            Type::DcPreChargeReq => Type::DcPreChargeRes,
            Type::PowerDeliveryReq => Type::PowerDeliveryRes,
            Type::DcChargeLoopReq => Type::DcChargeLoopRes,
            Type::AcChargeLoopReq => Type::AcChargeLoopRes,
            Type::DcWeldingDetectionReq => Type::DcWeldingDetectionRes,
            Type::SessionStopReq => Type::SessionStopRes,
            other => other,
        }
    }

    /// Payload type the message travels under
    pub fn payload_type(self) -> PayloadType {
        match self {
            Type::SupportedAppProtocolReq | Type::SupportedAppProtocolRes => PayloadType::Sap,
            Type::AcChargeParameterDiscoveryReq
            | Type::AcChargeParameterDiscoveryRes
            | Type::AcChargeLoopReq
            | Type::AcChargeLoopRes => PayloadType::Part20Ac,
            Type::DcChargeParameterDiscoveryReq
            | Type::DcChargeParameterDiscoveryRes
            | Type::DcCableCheckReq
            | Type::DcCableCheckRes
            | Type::DcPreChargeReq
            | Type::DcPreChargeRes
            | Type::DcChargeLoopReq
            | Type::DcChargeLoopRes
            | Type::DcWeldingDetectionReq
            | Type::DcWeldingDetectionRes => PayloadType::Part20Dc,
            _ => PayloadType::Part20Main,
        }
    }
}

// ============================================================================
// Request / Response variants
// ============================================================================

/// Decoded request as handed to the state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    SupportedAppProtocol(SupportedAppProtocolRequest),
    SessionSetup(SessionSetupRequest),
    AuthorizationSetup(AuthorizationSetupRequest),
    Authorization(AuthorizationRequest),
    ServiceDiscovery(ServiceDiscoveryRequest),
    ServiceDetail(ServiceDetailRequest),
    ServiceSelection(ServiceSelectionRequest),
    DcChargeParameterDiscovery(DcChargeParameterDiscoveryRequest),
    AcChargeParameterDiscovery(AcChargeParameterDiscoveryRequest),
    ScheduleExchange(ScheduleExchangeRequest),
    DcCableCheck(DcCableCheckRequest),
    DcPreCharge(DcPreChargeRequest),
    PowerDelivery(PowerDeliveryRequest),
    DcChargeLoop(DcChargeLoopRequest),
    AcChargeLoop(AcChargeLoopRequest),
    DcWeldingDetection(DcWeldingDetectionRequest),
    SessionStop(SessionStopRequest),
}

impl Request {
    pub fn message_type(&self) -> Type {
        match self {
            Request::SupportedAppProtocol(_) => Type::SupportedAppProtocolReq,
            Request::SessionSetup(_) => Type::SessionSetupReq,
            Request::AuthorizationSetup(_) => Type::AuthorizationSetupReq,
            Request::Authorization(_) => Type::AuthorizationReq,
            Request::ServiceDiscovery(_) => Type::ServiceDiscoveryReq,
            Request::ServiceDetail(_) => Type::ServiceDetailReq,
            Request::ServiceSelection(_) => Type::ServiceSelectionReq,
            Request::DcChargeParameterDiscovery(_) => Type::DcChargeParameterDiscoveryReq,
            Request::AcChargeParameterDiscovery(_) => Type::AcChargeParameterDiscoveryReq,
            Request::ScheduleExchange(_) => Type::ScheduleExchangeReq,
            Request::DcCableCheck(_) => Type::DcCableCheckReq,
            Request::DcPreCharge(_) => Type::DcPreChargeReq,
            Request::PowerDelivery(_) => Type::PowerDeliveryReq,
            Request::DcChargeLoop(_) => Type::DcChargeLoopReq,
            Request::AcChargeLoop(_) => Type::AcChargeLoopReq,
            Request::DcWeldingDetection(_) => Type::DcWeldingDetectionReq,
            Request::SessionStop(_) => Type::SessionStopReq,
        }
    }

    /// Header of the request; supportedAppProtocol carries none
    pub fn header(&self) -> Option<&Header> {
        match self {
            Request::SupportedAppProtocol(_) => None,
            Request::SessionSetup(r) => Some(&r.header),
            Request::AuthorizationSetup(r) => Some(&r.header),
            Request::Authorization(r) => Some(&r.header),
            Request::ServiceDiscovery(r) => Some(&r.header),
            Request::ServiceDetail(r) => Some(&r.header),
            Request::ServiceSelection(r) => Some(&r.header),
            Request::DcChargeParameterDiscovery(r) => Some(&r.header),
            Request::AcChargeParameterDiscovery(r) => Some(&r.header),
            Request::ScheduleExchange(r) => Some(&r.header),
            Request::DcCableCheck(r) => Some(&r.header),
            Request::DcPreCharge(r) => Some(&r.header),
            Request::PowerDelivery(r) => Some(&r.header),
            Request::DcChargeLoop(r) => Some(&r.header),
            Request::AcChargeLoop(r) => Some(&r.header),
            Request::DcWeldingDetection(r) => Some(&r.header),
            Request::SessionStop(r) => Some(&r.header),
        }
    }
}

/// Response produced by a state handler, ready for encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    SupportedAppProtocol(SupportedAppProtocolResponse),
    SessionSetup(SessionSetupResponse),
    AuthorizationSetup(AuthorizationSetupResponse),
    Authorization(AuthorizationResponse),
    ServiceDiscovery(ServiceDiscoveryResponse),
    ServiceDetail(ServiceDetailResponse),
    ServiceSelection(ServiceSelectionResponse),
    DcChargeParameterDiscovery(DcChargeParameterDiscoveryResponse),
    AcChargeParameterDiscovery(AcChargeParameterDiscoveryResponse),
    ScheduleExchange(ScheduleExchangeResponse),
    DcCableCheck(DcCableCheckResponse),
    DcPreCharge(DcPreChargeResponse),
    PowerDelivery(PowerDeliveryResponse),
    DcChargeLoop(DcChargeLoopResponse),
    AcChargeLoop(AcChargeLoopResponse),
    DcWeldingDetection(DcWeldingDetectionResponse),
    SessionStop(SessionStopResponse),
}

macro_rules! response_conversions {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Response {
                fn from(res: $ty) -> Self {
                    Response::$variant(res)
                }
            }
        )*
    };
}

response_conversions! {
    SupportedAppProtocol => SupportedAppProtocolResponse,
    SessionSetup => SessionSetupResponse,
    AuthorizationSetup => AuthorizationSetupResponse,
    Authorization => AuthorizationResponse,
    ServiceDiscovery => ServiceDiscoveryResponse,
    ServiceDetail => ServiceDetailResponse,
    ServiceSelection => ServiceSelectionResponse,
    DcChargeParameterDiscovery => DcChargeParameterDiscoveryResponse,
    AcChargeParameterDiscovery => AcChargeParameterDiscoveryResponse,
    ScheduleExchange => ScheduleExchangeResponse,
    DcCableCheck => DcCableCheckResponse,
    DcPreCharge => DcPreChargeResponse,
    PowerDelivery => PowerDeliveryResponse,
    DcChargeLoop => DcChargeLoopResponse,
    AcChargeLoop => AcChargeLoopResponse,
    DcWeldingDetection => DcWeldingDetectionResponse,
    SessionStop => SessionStopResponse,
}

impl Response {
    pub fn message_type(&self) -> Type {
        match self {
            Response::SupportedAppProtocol(_) => Type::SupportedAppProtocolRes,
            Response::SessionSetup(_) => Type::SessionSetupRes,
            Response::AuthorizationSetup(_) => Type::AuthorizationSetupRes,
            Response::Authorization(_) => Type::AuthorizationRes,
            Response::ServiceDiscovery(_) => Type::ServiceDiscoveryRes,
            Response::ServiceDetail(_) => Type::ServiceDetailRes,
            Response::ServiceSelection(_) => Type::ServiceSelectionRes,
            Response::DcChargeParameterDiscovery(_) => Type::DcChargeParameterDiscoveryRes,
            Response::AcChargeParameterDiscovery(_) => Type::AcChargeParameterDiscoveryRes,
            Response::ScheduleExchange(_) => Type::ScheduleExchangeRes,
            Response::DcCableCheck(_) => Type::DcCableCheckRes,
            Response::DcPreCharge(_) => Type::DcPreChargeRes,
            Response::PowerDelivery(_) => Type::PowerDeliveryRes,
            Response::DcChargeLoop(_) => Type::DcChargeLoopRes,
            Response::AcChargeLoop(_) => Type::AcChargeLoopRes,
            Response::DcWeldingDetection(_) => Type::DcWeldingDetectionRes,
            Response::SessionStop(_) => Type::SessionStopRes,
        }
    }

    pub fn payload_type(&self) -> PayloadType {
        self.message_type().payload_type()
    }

    /// d20 response code; `None` for the supportedAppProtocol handshake
    pub fn response_code(&self) -> Option<ResponseCode> {
        let code = match self {
            Response::SupportedAppProtocol(_) => return None,
            Response::SessionSetup(r) => r.response_code,
            Response::AuthorizationSetup(r) => r.response_code,
            Response::Authorization(r) => r.response_code,
            Response::ServiceDiscovery(r) => r.response_code,
            Response::ServiceDetail(r) => r.response_code,
            Response::ServiceSelection(r) => r.response_code,
            Response::DcChargeParameterDiscovery(r) => r.response_code,
            Response::AcChargeParameterDiscovery(r) => r.response_code,
            Response::ScheduleExchange(r) => r.response_code,
            Response::DcCableCheck(r) => r.response_code,
            Response::DcPreCharge(r) => r.response_code,
            Response::PowerDelivery(r) => r.response_code,
            Response::DcChargeLoop(r) => r.response_code,
            Response::AcChargeLoop(r) => r.response_code,
            Response::DcWeldingDetection(r) => r.response_code,
            Response::SessionStop(r) => r.response_code,
        };
        Some(code)
    }

    /// Build the sequence-error answer to a request of type `req_type`.
    ///
    /// The answer has the response type paired with the offending request,
    /// default mandatory fields and `FAILED_SequenceError`.
    pub fn sequence_error(req_type: Type, header: Header) -> Response {
        let code = ResponseCode::FailedSequenceError;
        match req_type.response_type() {
            Type::SupportedAppProtocolRes => SupportedAppProtocolResponse::default().into(),
            Type::SessionSetupRes => SessionSetupResponse { header, response_code: code, ..Default::default() }.into(),
            Type::AuthorizationSetupRes => {
                AuthorizationSetupResponse { header, response_code: code, ..Default::default() }.into()
            }
            Type::AuthorizationRes => AuthorizationResponse { header, response_code: code, ..Default::default() }.into(),
            Type::ServiceDiscoveryRes => {
                ServiceDiscoveryResponse { header, response_code: code, ..Default::default() }.into()
            }
            Type::ServiceDetailRes => ServiceDetailResponse { header, response_code: code, ..Default::default() }.into(),
            Type::ServiceSelectionRes => {
                ServiceSelectionResponse { header, response_code: code, ..Default::default() }.into()
            }
            Type::DcChargeParameterDiscoveryRes => {
                DcChargeParameterDiscoveryResponse { header, response_code: code, ..Default::default() }.into()
            }
            Type::AcChargeParameterDiscoveryRes => {
                AcChargeParameterDiscoveryResponse { header, response_code: code, ..Default::default() }.into()
            }
            Type::ScheduleExchangeRes => {
                ScheduleExchangeResponse { header, response_code: code, ..Default::default() }.into()
            }
            Type::DcCableCheckRes => DcCableCheckResponse { header, response_code: code, ..Default::default() }.into(),
            Type::DcPreChargeRes => DcPreChargeResponse { header, response_code: code, ..Default::default() }.into(),
            Type::PowerDeliveryRes => PowerDeliveryResponse { header, response_code: code, ..Default::default() }.into(),
            Type::DcChargeLoopRes => DcChargeLoopResponse { header, response_code: code, ..Default::default() }.into(),
            Type::AcChargeLoopRes => AcChargeLoopResponse { header, response_code: code, ..Default::default() }.into(),
            Type::DcWeldingDetectionRes => {
                DcWeldingDetectionResponse { header, response_code: code, ..Default::default() }.into()
            }
            _ => SessionStopResponse { header, response_code: code }.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_type_roundtrip() {
        for v in 0x8001u16..=0x8006 {
            assert_eq!(PayloadType::from_value(v).map(|p| p.value()), Some(v));
        }
        assert!(PayloadType::from_value(0x9000).is_none());
    }

    #[test]
    fn test_payload_type_per_message() {
        assert_eq!(Type::SupportedAppProtocolReq.payload_type(), PayloadType::Sap);
        assert_eq!(Type::DcChargeLoopRes.payload_type(), PayloadType::Part20Dc);
        assert_eq!(Type::AcChargeParameterDiscoveryReq.payload_type(), PayloadType::Part20Ac);
        assert_eq!(Type::ServiceDetailRes.payload_type(), PayloadType::Part20Main);
        assert_eq!(Type::PowerDeliveryReq.payload_type(), PayloadType::Part20Main);
    }

    #[test]
    fn test_sequence_error_matches_request_type() {
        let header = Header::new([1; 8], 42);
        let res = Response::sequence_error(Type::DcCableCheckReq, header);
        assert_eq!(res.message_type(), Type::DcCableCheckRes);
        assert_eq!(res.response_code(), Some(ResponseCode::FailedSequenceError));

        let res = Response::sequence_error(Type::SupportedAppProtocolReq, header);
        assert_eq!(res.message_type(), Type::SupportedAppProtocolRes);
        assert_eq!(res.response_code(), None);
    }
}
