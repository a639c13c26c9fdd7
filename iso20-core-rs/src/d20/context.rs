//! Per-session context shared by all state handlers

use chrono::Utc;
use tracing::debug;

use crate::codec::MessageCodec;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::message::datatypes::DisplayParameters;
use crate::message::{Header, Request, Response};
use crate::session::control::{AcPresentPower, ControlEvent, UpdateDynamicModeParameters};
use crate::session::exchange::MessageExchange;
use crate::session::feedback::Feedback;
use crate::session::log::{Direction, SessionLog};

use super::session::Session;

/// Control results that must survive state transitions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControlCache {
    /// EIM/PnC authorization decision
    pub authorization: Option<bool>,
    pub cable_check_finished: Option<bool>,
    pub dynamic_mode_parameters: Option<UpdateDynamicModeParameters>,
    /// Last measured DC output
    pub present_voltage: f32,
    pub present_current: f32,
    pub ac_present_power: AcPresentPower,
    /// HMI values from the charger, taken while a charge loop is active
    pub display_parameters: Option<DisplayParameters>,
}

impl ControlCache {
    fn apply(&mut self, event: &ControlEvent) {
        match event {
            ControlEvent::AuthorizationResponse(authorized) => self.authorization = Some(*authorized),
            ControlEvent::CableCheckFinished(ok) => self.cable_check_finished = Some(*ok),
            ControlEvent::UpdateDynamicModeParameters(p) => self.dynamic_mode_parameters = Some(*p),
            ControlEvent::PresentVoltageCurrent { voltage, current } => {
                self.present_voltage = *voltage;
                self.present_current = *current;
            }
            ControlEvent::AcPresentPower(p) => self.ac_present_power = *p,
            _ => {}
        }
    }
}

/// Unix time in seconds
pub fn unix_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

pub struct Context {
    pub session_config: SessionConfig,
    pub session: Session,
    pub cache: ControlCache,
    pub log: SessionLog,
    /// Set once a response ends the session; the driver then closes the link
    pub session_stopped: bool,
    /// Session stop requested a pause rather than termination
    pub session_paused: bool,

    feedback: Box<dyn Feedback>,
    codec: Box<dyn MessageCodec>,
    exchange: MessageExchange,
    current_control_event: Option<ControlEvent>,
}

impl Context {
    pub fn new(session_config: SessionConfig, feedback: Box<dyn Feedback>, codec: Box<dyn MessageCodec>) -> Self {
        Self {
            session_config,
            session: Session::new(),
            cache: ControlCache::default(),
            log: SessionLog::new(),
            session_stopped: false,
            session_paused: false,
            feedback,
            codec,
            exchange: MessageExchange::new(),
            current_control_event: None,
        }
    }

    pub fn feedback(&mut self) -> &mut dyn Feedback {
        self.feedback.as_mut()
    }

    pub fn codec(&self) -> &dyn MessageCodec {
        self.codec.as_ref()
    }

    pub fn exchange(&mut self) -> &mut MessageExchange {
        &mut self.exchange
    }

    /// Take the pending request
    pub fn pull_request(&mut self) -> Option<Request> {
        self.exchange.pull_request()
    }

    /// Install the control event the FSM is about to be fed with
    pub fn set_control_event(&mut self, event: ControlEvent) {
        self.cache.apply(&event);
        self.current_control_event = Some(event);
    }

    pub fn control_event(&self) -> Option<&ControlEvent> {
        self.current_control_event.as_ref()
    }

    pub fn clear_control_event(&mut self) {
        self.current_control_event = None;
    }

    /// Header for an outgoing response of this session
    pub fn response_header(&self) -> Header {
        Header::new(self.session.id(), unix_timestamp())
    }

    /// Encode and queue a response
    ///
    /// Any response code at or above `FAILED` marks the session stopped.
    pub fn respond(&mut self, response: impl Into<Response>) -> Result<()> {
        let response = response.into();
        let message_type = response.message_type();
        let payload = self.codec.encode(&response)?;

        debug!("Responding with {:?} ({} bytes)", message_type, payload.len());
        self.log
            .message(Direction::Sent, message_type, message_type.payload_type(), payload.len());

        if let Some(code) = response.response_code() {
            self.feedback.response_code(code);
            if code.is_failure() {
                self.log.failure(format!("{:?} answered with {:?}", message_type, code));
                self.session_stopped = true;
            }
        }

        self.exchange.set_response(message_type, payload);
        Ok(())
    }
}
