//! d20 state handlers
//!
//! Each state has a pure `handle_request` that turns a request plus the
//! relevant session data into a response, and a [`Handler`] impl that wires
//! it to the context: pulling the request, responding, signalling feedback
//! and picking the next state.

mod ac_charge_loop;
mod ac_charge_parameter_discovery;
mod authorization;
mod authorization_setup;
mod dc_cable_check;
mod dc_charge_loop;
mod dc_charge_parameter_discovery;
mod dc_pre_charge;
mod dc_welding_detection;
mod power_delivery;
mod schedule_exchange;
mod service_detail;
mod service_discovery;
mod service_selection;
mod session_setup;
mod session_stop;
mod supported_app_protocol;

pub use ac_charge_loop::{AcChargeLoop, AcLoopConditions};
pub use ac_charge_parameter_discovery::AcChargeParameterDiscovery;
pub use authorization::Authorization;
pub use authorization_setup::AuthorizationSetup;
pub use dc_cable_check::DcCableCheck;
pub use dc_charge_loop::{DcChargeLoop, DcLoopConditions};
pub use dc_charge_parameter_discovery::DcChargeParameterDiscovery;
pub use dc_pre_charge::DcPreCharge;
pub use dc_welding_detection::DcWeldingDetection;
pub use power_delivery::PowerDelivery;
pub use schedule_exchange::ScheduleExchange;
pub use service_detail::ServiceDetail;
pub use service_discovery::ServiceDiscovery;
pub use service_selection::ServiceSelection;
pub use session_setup::SessionSetup;
pub use session_stop::SessionStop;
pub use supported_app_protocol::SupportedAppProtocol;

pub mod handlers {
    //! Pure request handlers, usable without a running session
    pub use super::ac_charge_loop::handle_request as ac_charge_loop;
    pub use super::ac_charge_parameter_discovery::handle_request as ac_charge_parameter_discovery;
    pub use super::authorization::handle_request as authorization;
    pub use super::authorization_setup::handle_request as authorization_setup;
    pub use super::dc_cable_check::handle_request as dc_cable_check;
    pub use super::dc_charge_loop::handle_request as dc_charge_loop;
    pub use super::dc_charge_parameter_discovery::handle_request as dc_charge_parameter_discovery;
    pub use super::dc_pre_charge::handle_request as dc_pre_charge;
    pub use super::dc_welding_detection::handle_request as dc_welding_detection;
    pub use super::power_delivery::handle_request as power_delivery;
    pub use super::schedule_exchange::handle_request as schedule_exchange;
    pub use super::service_detail::handle_request as service_detail;
    pub use super::service_discovery::handle_request as service_discovery;
    pub use super::service_selection::handle_request as service_selection;
    pub use super::session_setup::handle_request as session_setup;
    pub use super::session_stop::handle_request as session_stop;
    pub use super::supported_app_protocol::handle_request as supported_app_protocol;
}

use tracing::warn;

use crate::error::Result;
use crate::message::{Header, Request, Response, SessionId, SessionStopRequest, Type};
use crate::message::datatypes::{ChargingSession, ControlMode, DisplayParameters, EvseNotification, EvseStatus};
use crate::session::control::UpdateDynamicModeParameters;
use crate::session::feedback::Signal;

use super::context::{unix_timestamp, Context};
use super::fsm::Transition;
use super::session::Session;

/// Fill the response header and check the request's session id
pub(crate) fn validate_and_setup_header(header: &mut Header, session: &Session, req_session_id: &SessionId) -> bool {
    header.session_id = session.id();
    header.timestamp = unix_timestamp();
    *req_session_id == session.id()
}

/// Answer an unexpected request with `FAILED_SequenceError` and stop the session
pub(crate) fn send_sequence_error(ctx: &mut Context, req_type: Type, state: &str) -> Result<Transition> {
    warn!("{}: unexpected {:?}, sequence error", state, req_type);
    ctx.log.failure(format!("{} received unexpected {:?}", state, req_type));

    let header = ctx.response_header();
    ctx.respond(Response::sequence_error(req_type, header))?;
    ctx.session_stopped = true;
    Ok(Transition::Stay)
}

/// Common SessionStopReq handling for every state after session setup
pub(crate) fn handle_session_stop(ctx: &mut Context, req: &SessionStopRequest) -> Result<Transition> {
    let res = session_stop::handle_request(req, &ctx.session);
    let code = res.response_code;
    ctx.respond(res)?;

    if code.is_failure() {
        return Ok(Transition::Stay);
    }

    match req.charging_session {
        ChargingSession::Pause => {
            ctx.feedback().signal(Signal::DlinkPause);
            ctx.session_paused = true;
        }
        ChargingSession::Terminate | ChargingSession::ServiceRenegotiation => {}
    }
    ctx.session_stopped = true;

    Ok(Transition::next(SessionStop::new()))
}

/// Dynamic mode targets announced by the EVSE when it provides mobility needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DynamicTargets {
    /// Seconds from `now`
    pub departure_time: Option<u32>,
    pub minimum_soc: Option<i8>,
    pub target_soc: Option<i8>,
}

impl DynamicTargets {
    pub(crate) fn new(params: Option<&UpdateDynamicModeParameters>, now: u64) -> Self {
        let Some(params) = params else {
            return Self::default();
        };
        Self {
            departure_time: params
                .departure_time
                .filter(|&t| t > now)
                .map(|t| (t - now).min(u32::MAX as u64) as u32),
            minimum_soc: params.min_soc,
            target_soc: params.target_soc,
        }
    }
}

/// Seconds the EV may take to acknowledge changed dynamic mode targets
pub(crate) const ACK_MAX_DELAY: u16 = 30;

/// Charge loop status from the stop/pause directives received so far
pub(crate) fn evse_status(stop: bool, pause: bool, control_mode: ControlMode) -> Option<EvseStatus> {
    if stop {
        return Some(EvseStatus { notification_max_delay: 0, notification: EvseNotification::Terminate });
    }
    if pause {
        let notification_max_delay = match control_mode {
            ControlMode::Dynamic => 60,
            ControlMode::Scheduled => 0,
        };
        return Some(EvseStatus { notification_max_delay, notification: EvseNotification::Pause });
    }
    None
}

/// Pull the pending request and report it to the observability hook
pub(crate) fn pull_request(ctx: &mut Context) -> Option<Request> {
    let request = ctx.pull_request()?;
    ctx.feedback().v2g_message(request.message_type());
    Some(request)
}

/// Keep the charger's HMI values for the rest of the session
pub(crate) fn take_display_parameters(ctx: &mut Context, display: DisplayParameters) {
    ctx.log.info(format!(
        "Charger display: present SoC {:?}, target SoC {:?}, charging complete {:?}",
        display.present_soc, display.target_soc, display.charging_complete
    ));
    ctx.cache.display_parameters = Some(display);
}
