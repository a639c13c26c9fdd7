//! Simulated charger application
//!
//! Reacts to session signals the way a power module controller would:
//! authorizes, finishes the cable check and reports output measurements
//! through the control channel.

use std::time::Duration;

use iso20_core::message::datatypes::{RationalNumber, ResponseCode};
use iso20_core::message::service::SelectedService;
use iso20_core::message::Type;
use iso20_core::session::control::AcPresentPower;
use iso20_core::session::feedback::{DcChargeTarget, DcMaximumLimits, SelectedServiceReport};
use iso20_core::{ControlEvent, ControlSender, Feedback, RecordingFeedback, Signal};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Output the simulated power module settles at
#[derive(Debug, Clone, Copy)]
pub struct ChargerProfile {
    pub voltage: f32,
    pub current: f32,
    /// AC active power in watts
    pub ac_power: f32,
    pub authorization_delay: Duration,
    pub cable_check_delay: Duration,
}

impl Default for ChargerProfile {
    fn default() -> Self {
        Self {
            voltage: 400.0,
            current: 50.0,
            ac_power: 11_000.0,
            authorization_delay: Duration::from_millis(50),
            cable_check_delay: Duration::from_millis(150),
        }
    }
}

/// Feedback that records everything and forwards signals to the charger task
pub struct ChargerFeedback {
    record: RecordingFeedback,
    signals: mpsc::UnboundedSender<Signal>,
}

impl ChargerFeedback {
    pub fn new(record: RecordingFeedback) -> (Self, mpsc::UnboundedReceiver<Signal>) {
        let (signals, rx) = mpsc::unbounded_channel();
        (Self { record, signals }, rx)
    }
}

impl Feedback for ChargerFeedback {
    fn signal(&mut self, signal: Signal) {
        info!("Signal: {:?}", signal);
        self.record.signal(signal);
        if self.signals.send(signal).is_err() {
            debug!("Charger task gone, dropping {:?}", signal);
        }
    }

    fn dc_charge_target(&mut self, target: DcChargeTarget) {
        debug!("EV target {} V / {} A", target.voltage, target.current);
        self.record.dc_charge_target(target);
    }

    fn dc_max_limits(&mut self, limits: DcMaximumLimits) {
        debug!("EV max {} V / {} A / {} W", limits.voltage, limits.current, limits.power);
        self.record.dc_max_limits(limits);
    }

    fn dc_pre_charge_target_voltage(&mut self, voltage: f32) {
        self.record.dc_pre_charge_target_voltage(voltage);
    }

    fn selected_service_parameters(&mut self, selected: &SelectedServiceReport) {
        info!(
            "EV selected {:?}, parameter set {}, {:?}/{:?}",
            selected.energy_service, selected.parameter_set_id, selected.control_mode, selected.mobility_needs_mode
        );
        self.record.selected_service_parameters(selected);
    }

    fn selected_vas_services(&mut self, services: &[SelectedService]) {
        self.record.selected_vas_services(services);
    }

    fn selected_protocol(&mut self, namespace: &str) {
        info!("Negotiated {}", namespace);
        self.record.selected_protocol(namespace);
    }

    fn evcc_id(&mut self, id: &str) {
        self.record.evcc_id(id);
    }

    fn ac_max_charge_power(&mut self, power: RationalNumber) {
        self.record.ac_max_charge_power(power);
    }

    fn response_code(&mut self, code: ResponseCode) {
        if code.is_failure() {
            warn!("EVSE answered {:?}", code);
        }
        self.record.response_code(code);
    }

    fn v2g_message(&mut self, message_type: Type) {
        self.record.v2g_message(message_type);
    }
}

/// Drive the control channel until the data link goes down
pub async fn run(mut signals: mpsc::UnboundedReceiver<Signal>, control: ControlSender, profile: ChargerProfile) {
    while let Some(signal) = signals.recv().await {
        let result = match signal {
            Signal::RequireAuthEim => {
                sleep(profile.authorization_delay).await;
                info!("Charger: EIM authorization granted");
                control.push(ControlEvent::AuthorizationResponse(true))
            }
            Signal::StartCableCheck => {
                sleep(profile.cable_check_delay).await;
                info!("Charger: isolation check passed");
                control
                    .push(ControlEvent::PresentVoltageCurrent { voltage: profile.voltage, current: 0.0 })
                    .and_then(|_| control.push(ControlEvent::CableCheckFinished(true)))
            }
            Signal::ChargeLoopStarted => control.push(ControlEvent::PresentVoltageCurrent {
                voltage: profile.voltage,
                current: profile.current,
            }),
            Signal::AcCloseContactor => control.push(ControlEvent::AcPresentPower(AcPresentPower {
                present_active_power: Some(RationalNumber::from_float(profile.ac_power)),
            })),
            Signal::DcOpenContactor => {
                control.push(ControlEvent::PresentVoltageCurrent { voltage: 0.0, current: 0.0 })
            }
            Signal::DlinkTerminate | Signal::DlinkPause | Signal::DlinkError => {
                info!("Charger: data link down ({:?})", signal);
                break;
            }
            _ => Ok(()),
        };

        if let Err(e) = result {
            warn!("Charger: control event dropped: {}", e);
            break;
        }
    }
}
