//! Feedback channel from the session to the charger application
//!
//! Every method has a no-op default so an integration only implements the
//! hooks it cares about.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;
use crate::message::datatypes::{
    ControlMode, DisplayParameters, MobilityNeedsMode, ParameterSet, RationalNumber, ResponseCode, ServiceCategory,
};
use crate::message::service::SelectedService;
use crate::message::Type;

/// Coarse session lifecycle signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    RequireAuthEim,
    StartCableCheck,
    SetupFinished,
    ChargeLoopStarted,
    ChargeLoopFinished,
    DcOpenContactor,
    AcCloseContactor,
    AcOpenContactor,
    DlinkTerminate,
    DlinkPause,
    DlinkError,
}

/// EV charge target during a scheduled DC charge loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcChargeTarget {
    pub voltage: f32,
    pub current: f32,
}

/// EV maximum limits reported during discovery or a dynamic charge loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DcMaximumLimits {
    pub voltage: f32,
    pub current: f32,
    pub power: f32,
}

/// Parameters of the accepted ServiceSelection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedServiceReport {
    pub energy_service: ServiceCategory,
    pub parameter_set_id: u16,
    pub control_mode: ControlMode,
    pub mobility_needs_mode: MobilityNeedsMode,
}

/// Callbacks into the charger application
pub trait Feedback: Send {
    fn signal(&mut self, _signal: Signal) {}

    /// Parameter sets of a value-added service; `Ok(None)` if unknown
    fn get_vas_parameters(&mut self, _service_id: u16) -> Result<Option<Vec<ParameterSet>>> {
        Ok(None)
    }

    fn dc_charge_target(&mut self, _target: DcChargeTarget) {}

    fn dc_max_limits(&mut self, _limits: DcMaximumLimits) {}

    fn dc_pre_charge_target_voltage(&mut self, _voltage: f32) {}

    fn display_parameters(&mut self, _parameters: &DisplayParameters) {}

    fn selected_service_parameters(&mut self, _selected: &SelectedServiceReport) {}

    fn selected_vas_services(&mut self, _services: &[SelectedService]) {}

    fn selected_protocol(&mut self, _namespace: &str) {}

    fn evcc_id(&mut self, _id: &str) {}

    fn ac_max_charge_power(&mut self, _power: RationalNumber) {}

    fn response_code(&mut self, _code: ResponseCode) {}

    /// Observability hook fired for every received request
    fn v2g_message(&mut self, _message_type: Type) {}
}

/// Feedback sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFeedback;

impl Feedback for NoFeedback {}

// ============================================================================
// Recording feedback
// ============================================================================

/// Everything a [`RecordingFeedback`] observed
#[derive(Debug, Default, Clone)]
pub struct FeedbackRecord {
    pub signals: Vec<Signal>,
    pub response_codes: Vec<ResponseCode>,
    pub messages: Vec<Type>,
    pub dc_charge_targets: Vec<DcChargeTarget>,
    pub dc_max_limits: Vec<DcMaximumLimits>,
    pub pre_charge_voltages: Vec<f32>,
    pub display_parameters: Vec<DisplayParameters>,
    pub selected_service: Option<SelectedServiceReport>,
    pub selected_vas: Vec<SelectedService>,
    pub selected_protocol: Option<String>,
    pub evcc_id: Option<String>,
    pub ac_max_charge_power: Option<RationalNumber>,
}

/// Feedback that records every callback and serves configured VAS parameters
///
/// Clones share the same record, so one handle can be boxed into a session
/// while another inspects it.
#[derive(Debug, Default, Clone)]
pub struct RecordingFeedback {
    record: Arc<Mutex<FeedbackRecord>>,
    vas_parameters: Arc<Mutex<BTreeMap<u16, Vec<ParameterSet>>>>,
}

impl RecordingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `sets` for `service_id` from `get_vas_parameters`
    pub fn with_vas_parameters(self, service_id: u16, sets: Vec<ParameterSet>) -> Self {
        self.vas_parameters.lock().insert(service_id, sets);
        self
    }

    pub fn record(&self) -> MutexGuard<'_, FeedbackRecord> {
        self.record.lock()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.record.lock().signals.clone()
    }
}

impl Feedback for RecordingFeedback {
    fn signal(&mut self, signal: Signal) {
        self.record.lock().signals.push(signal);
    }

    fn get_vas_parameters(&mut self, service_id: u16) -> Result<Option<Vec<ParameterSet>>> {
        Ok(self.vas_parameters.lock().get(&service_id).cloned())
    }

    fn dc_charge_target(&mut self, target: DcChargeTarget) {
        self.record.lock().dc_charge_targets.push(target);
    }

    fn dc_max_limits(&mut self, limits: DcMaximumLimits) {
        self.record.lock().dc_max_limits.push(limits);
    }

    fn dc_pre_charge_target_voltage(&mut self, voltage: f32) {
        self.record.lock().pre_charge_voltages.push(voltage);
    }

    fn display_parameters(&mut self, parameters: &DisplayParameters) {
        self.record.lock().display_parameters.push(parameters.clone());
    }

    fn selected_service_parameters(&mut self, selected: &SelectedServiceReport) {
        self.record.lock().selected_service = Some(*selected);
    }

    fn selected_vas_services(&mut self, services: &[SelectedService]) {
        self.record.lock().selected_vas = services.to_vec();
    }

    fn selected_protocol(&mut self, namespace: &str) {
        self.record.lock().selected_protocol = Some(namespace.to_string());
    }

    fn evcc_id(&mut self, id: &str) {
        self.record.lock().evcc_id = Some(id.to_string());
    }

    fn ac_max_charge_power(&mut self, power: RationalNumber) {
        self.record.lock().ac_max_charge_power = Some(power);
    }

    fn response_code(&mut self, code: ResponseCode) {
        self.record.lock().response_codes.push(code);
    }

    fn v2g_message(&mut self, message_type: Type) {
        self.record.lock().messages.push(message_type);
    }
}
