//! Out-of-band control events
//!
//! Measurements and charger decisions reach the state machine through an
//! MPSC queue. Producers may live on any thread; the session drains the
//! queue at the start of every poll.

use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::message::datatypes::{DisplayParameters, RationalNumber};

/// Dynamic-mode targets provided by the charger (mobility needs by SECC)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UpdateDynamicModeParameters {
    /// Unix timestamp of the departure, in seconds
    pub departure_time: Option<u64>,
    /// SoC in percent to reach by departure
    pub target_soc: Option<i8>,
    /// SoC in percent to reach as fast as possible
    pub min_soc: Option<i8>,
}

/// Dynamic AC setpoint chosen by the charger
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AcTargetPower {
    /// Active power in W; dynamic mode falls back to the configured maximum
    pub target_active_power: Option<RationalNumber>,
    pub target_reactive_power: Option<RationalNumber>,
}

/// Active power measured at the EVSE meter
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AcPresentPower {
    pub present_active_power: Option<RationalNumber>,
}

/// Event pushed into a running session
#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    /// DC output measurement, in V and A
    PresentVoltageCurrent { voltage: f32, current: f32 },
    /// Announce termination in the next charge loop response
    StopCharging(bool),
    PauseCharging(bool),
    /// HMI values; kept only while a charge loop is active
    DisplayParameters(DisplayParameters),
    UpdateDynamicModeParameters(UpdateDynamicModeParameters),
    /// Result of EIM/PnC authorization
    AuthorizationResponse(bool),
    CableCheckFinished(bool),
    AcTargetPower(AcTargetPower),
    AcPresentPower(AcPresentPower),
}

/// Producer handle, cheap to clone across threads
#[derive(Debug, Clone)]
pub struct ControlSender {
    tx: mpsc::UnboundedSender<ControlEvent>,
}

impl ControlSender {
    pub fn push(&self, event: ControlEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| Error::Internal("control event queue closed".to_string()))
    }
}

/// Consumer side, owned by the session
#[derive(Debug)]
pub struct ControlQueue {
    rx: mpsc::UnboundedReceiver<ControlEvent>,
}

impl ControlQueue {
    /// Next queued event without blocking
    pub fn pop(&mut self) -> Option<ControlEvent> {
        self.rx.try_recv().ok()
    }
}

pub fn control_channel() -> (ControlSender, ControlQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ControlSender { tx }, ControlQueue { rx })
}
