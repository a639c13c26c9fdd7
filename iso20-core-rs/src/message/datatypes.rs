//! Common d20 datatypes
//!
//! Enumerations and value objects shared by several message families.
//! Numeric values follow the ISO 15118-20 schema so an external EXI codec
//! can map them one to one.

use serde::{Deserialize, Serialize};

/// 8-byte session identifier
pub type SessionId = [u8; 8];

// ============================================================================
// RationalNumber
// ============================================================================

/// Exponent range tried when converting from floating point
const MIN_EXPONENT: i8 = -3;
const MAX_EXPONENT: i8 = 3;

/// Decimal fixed-point number as carried on the wire: `value * 10^exponent`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RationalNumber {
    /// Mantissa
    pub value: i16,
    /// Power of ten, -3 to 3
    pub exponent: i8,
}

impl RationalNumber {
    pub const fn new(value: i16, exponent: i8) -> Self {
        Self { value, exponent }
    }

    /// Encode a float, keeping up to three decimal places.
    ///
    /// The smallest exponent whose scaled value fits into `i16` wins, then
    /// trailing decimal zeros are folded into the exponent. Values beyond
    /// `i16::MAX * 10^3` saturate.
    pub fn from_float(input: f32) -> Self {
        if !input.is_finite() {
            return Self::default();
        }

        let input = input as f64;
        for exponent in MIN_EXPONENT..=MAX_EXPONENT {
            let scaled = (input * 10f64.powi(-(exponent as i32))).round();
            if scaled >= i16::MIN as f64 && scaled <= i16::MAX as f64 {
                return Self::normalized(scaled as i16, exponent);
            }
        }

        let value = if input.is_sign_negative() { i16::MIN } else { i16::MAX };
        Self::new(value, MAX_EXPONENT)
    }

    /// Decode into a float
    pub fn to_float(self) -> f32 {
        let value = self.value as f64;
        let decoded = if self.exponent < 0 {
            value / 10f64.powi(-(self.exponent as i32))
        } else {
            value * 10f64.powi(self.exponent as i32)
        };
        decoded as f32
    }

    fn normalized(mut value: i16, mut exponent: i8) -> Self {
        while value != 0 && value % 10 == 0 && exponent < MAX_EXPONENT {
            value /= 10;
            exponent += 1;
        }
        Self { value, exponent }
    }
}

impl From<f32> for RationalNumber {
    fn from(v: f32) -> Self {
        Self::from_float(v)
    }
}

impl From<RationalNumber> for f32 {
    fn from(r: RationalNumber) -> Self {
        r.to_float()
    }
}

// ============================================================================
// Response codes
// ============================================================================

/// d20 response code
///
/// Ordering matters: every code at or above [`ResponseCode::Failed`]
/// terminates the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ResponseCode {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "OK_CertificateExpiresSoon")]
    OkCertificateExpiresSoon,
    #[serde(rename = "OK_NewSessionEstablished")]
    OkNewSessionEstablished,
    #[serde(rename = "OK_OldSessionJoined")]
    OkOldSessionJoined,
    #[serde(rename = "OK_PowerToleranceConfirmed")]
    OkPowerToleranceConfirmed,
    #[serde(rename = "WARNING_AuthorizationSelectionInvalid")]
    WarningAuthorizationSelectionInvalid,
    #[serde(rename = "WARNING_CertificateExpired")]
    WarningCertificateExpired,
    #[serde(rename = "WARNING_CertificateNotYetValid")]
    WarningCertificateNotYetValid,
    #[serde(rename = "WARNING_CertificateRevoked")]
    WarningCertificateRevoked,
    #[serde(rename = "WARNING_CertificateValidationError")]
    WarningCertificateValidationError,
    #[serde(rename = "WARNING_ChallengeInvalid")]
    WarningChallengeInvalid,
    #[serde(rename = "WARNING_EIMAuthorizationFailure")]
    WarningEimAuthorizationFailure,
    #[serde(rename = "WARNING_eMSPUnknown")]
    WarningEmspUnknown,
    #[serde(rename = "WARNING_EVPowerProfileViolation")]
    WarningEvPowerProfileViolation,
    #[serde(rename = "WARNING_GeneralPnCAuthorizationError")]
    WarningGeneralPncAuthorizationError,
    #[serde(rename = "WARNING_NoCertificateAvailable")]
    WarningNoCertificateAvailable,
    #[serde(rename = "WARNING_NoContractMatchingPCIDFound")]
    WarningNoContractMatchingPcidFound,
    #[serde(rename = "WARNING_PowerToleranceNotConfirmed")]
    WarningPowerToleranceNotConfirmed,
    #[serde(rename = "WARNING_ScheduleRenegotiationFailed")]
    WarningScheduleRenegotiationFailed,
    #[serde(rename = "WARNING_StandbyNotAllowed")]
    WarningStandbyNotAllowed,
    #[serde(rename = "WARNING_WPT")]
    WarningWpt,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "FAILED_AssociationError")]
    FailedAssociationError,
    #[serde(rename = "FAILED_ContactorError")]
    FailedContactorError,
    #[serde(rename = "FAILED_EVPowerProfileInvalid")]
    FailedEvPowerProfileInvalid,
    #[serde(rename = "FAILED_EVPowerProfileViolation")]
    FailedEvPowerProfileViolation,
    #[serde(rename = "FAILED_MeteringSignatureNotValid")]
    FailedMeteringSignatureNotValid,
    #[serde(rename = "FAILED_NoEnergyTransferServiceSelected")]
    FailedNoEnergyTransferServiceSelected,
    #[serde(rename = "FAILED_NoServiceRenegotiationSupported")]
    FailedNoServiceRenegotiationSupported,
    #[serde(rename = "FAILED_PauseNotAllowed")]
    FailedPauseNotAllowed,
    #[serde(rename = "FAILED_PowerDeliveryNotApplied")]
    FailedPowerDeliveryNotApplied,
    #[serde(rename = "FAILED_PowerToleranceNotConfirmed")]
    FailedPowerToleranceNotConfirmed,
    #[serde(rename = "FAILED_ScheduleRenegotiation")]
    FailedScheduleRenegotiation,
    #[serde(rename = "FAILED_ScheduleSelectionInvalid")]
    FailedScheduleSelectionInvalid,
    #[serde(rename = "FAILED_SequenceError")]
    FailedSequenceError,
    #[serde(rename = "FAILED_ServiceIDInvalid")]
    FailedServiceIdInvalid,
    #[serde(rename = "FAILED_ServiceSelectionInvalid")]
    FailedServiceSelectionInvalid,
    #[serde(rename = "FAILED_SignatureError")]
    FailedSignatureError,
    #[serde(rename = "FAILED_UnknownSession")]
    FailedUnknownSession,
    #[serde(rename = "FAILED_WrongChargeParameter")]
    FailedWrongChargeParameter,
}

impl ResponseCode {
    /// Whether this code ends the session
    pub fn is_failure(self) -> bool {
        self >= ResponseCode::Failed
    }
}

// ============================================================================
// Service enumerations
// ============================================================================

/// Service identifiers as offered in ServiceDiscovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceCategory {
    #[serde(rename = "AC")]
    Ac,
    #[serde(rename = "DC")]
    Dc,
    #[serde(rename = "WPT")]
    Wpt,
    #[serde(rename = "DC_ACDP")]
    DcAcdp,
    #[serde(rename = "AC_BPT")]
    AcBpt,
    #[serde(rename = "DC_BPT")]
    DcBpt,
    #[serde(rename = "DC_ACDP_BPT")]
    DcAcdpBpt,
    #[serde(rename = "MCS")]
    Mcs,
    #[serde(rename = "MCS_BPT")]
    McsBpt,
    Internet,
    ParkingStatus,
}

impl ServiceCategory {
    /// Numeric service id
    pub fn id(self) -> u16 {
        match self {
            ServiceCategory::Ac => 1,
            ServiceCategory::Dc => 2,
            ServiceCategory::Wpt => 3,
            ServiceCategory::DcAcdp => 4,
            ServiceCategory::AcBpt => 5,
            ServiceCategory::DcBpt => 6,
            ServiceCategory::DcAcdpBpt => 7,
            ServiceCategory::Mcs => 8,
            ServiceCategory::McsBpt => 9,
            ServiceCategory::Internet => 65,
            ServiceCategory::ParkingStatus => 66,
        }
    }

    pub fn from_id(id: u16) -> Option<Self> {
        let category = match id {
            1 => ServiceCategory::Ac,
            2 => ServiceCategory::Dc,
            3 => ServiceCategory::Wpt,
            4 => ServiceCategory::DcAcdp,
            5 => ServiceCategory::AcBpt,
            6 => ServiceCategory::DcBpt,
            7 => ServiceCategory::DcAcdpBpt,
            8 => ServiceCategory::Mcs,
            9 => ServiceCategory::McsBpt,
            65 => ServiceCategory::Internet,
            66 => ServiceCategory::ParkingStatus,
            _ => return None,
        };
        Some(category)
    }

    /// Energy transfer services (as opposed to value-added services)
    pub fn is_energy_service(self) -> bool {
        !matches!(self, ServiceCategory::Internet | ServiceCategory::ParkingStatus)
    }

    /// Services carried by the DC charge loop
    pub fn is_dc(self) -> bool {
        matches!(
            self,
            ServiceCategory::Dc | ServiceCategory::DcBpt | ServiceCategory::Mcs | ServiceCategory::McsBpt
        )
    }

    pub fn is_ac(self) -> bool {
        matches!(self, ServiceCategory::Ac | ServiceCategory::AcBpt)
    }

    pub fn is_bpt(self) -> bool {
        matches!(
            self,
            ServiceCategory::AcBpt | ServiceCategory::DcBpt | ServiceCategory::DcAcdpBpt | ServiceCategory::McsBpt
        )
    }
}

/// Authorization method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Authorization {
    #[serde(rename = "EIM")]
    Eim,
    #[serde(rename = "PnC")]
    Pnc,
}

/// DC connector type advertised in ServiceDetail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DcConnector {
    Core,
    Extended,
    Dual2,
    Dual4,
}

impl DcConnector {
    pub fn value(self) -> i32 {
        match self {
            DcConnector::Core => 1,
            DcConnector::Extended => 2,
            DcConnector::Dual2 => 3,
            DcConnector::Dual4 => 4,
        }
    }
}

/// AC connector type advertised in ServiceDetail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcConnector {
    SinglePhase,
    ThreePhase,
}

impl AcConnector {
    pub fn value(self) -> i32 {
        match self {
            AcConnector::SinglePhase => 1,
            AcConnector::ThreePhase => 3,
        }
    }
}

/// Who decides the operating point: the EV (Scheduled) or the EVSE (Dynamic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    #[default]
    Scheduled,
    Dynamic,
}

impl ControlMode {
    pub fn value(self) -> i32 {
        match self {
            ControlMode::Scheduled => 1,
            ControlMode::Dynamic => 2,
        }
    }
}

/// Who provides departure time and SoC targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MobilityNeedsMode {
    #[default]
    ProvidedByEvcc,
    ProvidedBySecc,
}

impl MobilityNeedsMode {
    pub fn value(self) -> i32 {
        match self {
            MobilityNeedsMode::ProvidedByEvcc => 1,
            MobilityNeedsMode::ProvidedBySecc => 2,
        }
    }
}

/// Pricing model advertised in ServiceDetail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pricing {
    #[default]
    NoPricing,
    AbsolutePricing,
    PriceLevels,
}

impl Pricing {
    pub fn value(self) -> i32 {
        match self {
            Pricing::NoPricing => 0,
            Pricing::AbsolutePricing => 1,
            Pricing::PriceLevels => 2,
        }
    }
}

/// Power path used for bidirectional transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BptChannel {
    Unified,
    Separated,
}

impl BptChannel {
    pub fn value(self) -> i32 {
        match self {
            BptChannel::Unified => 1,
            BptChannel::Separated => 2,
        }
    }
}

/// Grid behaviour of the inverter while discharging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneratorMode {
    GridFollowing,
    GridForming,
}

impl GeneratorMode {
    pub fn value(self) -> i32 {
        match self {
            GeneratorMode::GridFollowing => 1,
            GeneratorMode::GridForming => 2,
        }
    }
}

/// Anti-islanding method for AC BPT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridCodeIslandingDetectionMethod {
    Active,
    Passive,
}

impl GridCodeIslandingDetectionMethod {
    pub fn value(self) -> i32 {
        match self {
            GridCodeIslandingDetectionMethod::Active => 1,
            GridCodeIslandingDetectionMethod::Passive => 2,
        }
    }
}

/// Internet VAS protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    Ftp,
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Ftp => "ftp",
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ftp" => Some(Protocol::Ftp),
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }
}

/// Internet VAS port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Port {
    Port20,
    Port21,
    Port80,
    Port443,
}

impl Port {
    pub fn value(self) -> i32 {
        match self {
            Port::Port20 => 20,
            Port::Port21 => 21,
            Port::Port80 => 80,
            Port::Port443 => 443,
        }
    }

    pub fn from_value(v: i32) -> Option<Self> {
        match v {
            20 => Some(Port::Port20),
            21 => Some(Port::Port21),
            80 => Some(Port::Port80),
            443 => Some(Port::Port443),
            _ => None,
        }
    }
}

/// Parking VAS intended service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntendedService {
    VehicleCheckIn,
    VehicleCheckOut,
}

impl IntendedService {
    pub fn value(self) -> i32 {
        match self {
            IntendedService::VehicleCheckIn => 1,
            IntendedService::VehicleCheckOut => 2,
        }
    }

    pub fn from_value(v: i32) -> Option<Self> {
        match v {
            1 => Some(IntendedService::VehicleCheckIn),
            2 => Some(IntendedService::VehicleCheckOut),
            _ => None,
        }
    }
}

/// Parking VAS status type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParkingStatus {
    AutoInternal,
    AutoExternal,
    ManualInternal,
    ManualExternal,
}

impl ParkingStatus {
    pub fn value(self) -> i32 {
        match self {
            ParkingStatus::AutoInternal => 1,
            ParkingStatus::AutoExternal => 2,
            ParkingStatus::ManualInternal => 3,
            ParkingStatus::ManualExternal => 4,
        }
    }

    pub fn from_value(v: i32) -> Option<Self> {
        match v {
            1 => Some(ParkingStatus::AutoInternal),
            2 => Some(ParkingStatus::AutoExternal),
            3 => Some(ParkingStatus::ManualInternal),
            4 => Some(ParkingStatus::ManualExternal),
            _ => None,
        }
    }
}

// ============================================================================
// Service parameters
// ============================================================================

/// Typed value of a service parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    RationalNumber(RationalNumber),
    Finite(String),
}

/// Named service parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name, e.g. `Connector` or `ControlMode`
    pub name: String,
    pub value: ParameterValue,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: ParameterValue) -> Self {
        Self { name: name.into(), value }
    }

    pub fn int(name: impl Into<String>, value: i32) -> Self {
        Self::new(name, ParameterValue::Int(value))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.value {
            ParameterValue::Int(v) => Some(v),
            ParameterValue::Short(v) => Some(v as i32),
            ParameterValue::Byte(v) => Some(v as i32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            ParameterValue::Finite(s) => Some(s),
            _ => None,
        }
    }
}

/// Parameter set offered in ServiceDetailRes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// Id the EV refers to in ServiceSelectionReq
    pub id: u16,
    pub parameter: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new(id: u16, parameter: Vec<Parameter>) -> Self {
        Self { id, parameter }
    }
}

// ============================================================================
// Status and progress
// ============================================================================

/// Action the EVSE asks the EV to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvseNotification {
    Pause,
    ExitStandby,
    Terminate,
    ScheduleRenegotiation,
    ServiceRenegotiation,
    MeteringConfirmation,
}

/// Notification attached to a charge loop or power delivery response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvseStatus {
    /// Seconds the EV has to react
    pub notification_max_delay: u16,
    pub notification: EvseNotification,
}

/// EVSE-side processing flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EvseProcessing {
    #[default]
    Finished,
    Ongoing,
    WaitingForCustomerInteraction,
}

/// EV-side processing flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Processing {
    #[default]
    Finished,
    Ongoing,
}

/// ChargeProgress of PowerDeliveryReq
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Progress {
    Start,
    Stop,
    Standby,
    ScheduleRenegotiation,
}

/// What the EV wants in SessionStopReq
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChargingSession {
    Pause,
    Terminate,
    ServiceRenegotiation,
}

/// Values the EV shows to the driver, forwarded to the HMI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayParameters {
    /// State of charge in percent
    pub present_soc: Option<i8>,
    pub min_soc: Option<i8>,
    pub target_soc: Option<i8>,
    pub max_soc: Option<i8>,
    pub remaining_time_to_min_soc: Option<u32>,
    /// Seconds until the target SoC is reached
    pub remaining_time_to_target_soc: Option<u32>,
    pub remaining_time_to_max_soc: Option<u32>,
    pub charging_complete: Option<bool>,
    /// Usable battery capacity, in Wh
    pub battery_energy_capacity: Option<RationalNumber>,
    /// Inlet temperature is over the EV's limit
    pub inlet_hot: Option<bool>,
}
