use tracing::info;

use crate::error::Result;
use crate::message::{Request, ResponseCode, SessionSetupRequest, SessionSetupResponse};

use super::super::context::{unix_timestamp, Context};
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{pull_request, send_sequence_error, AuthorizationSetup};

/// Answer SessionSetupReq for a freshly established `session`
pub fn handle_request(_req: &SessionSetupRequest, session: &Session, evse_id: &str) -> SessionSetupResponse {
    let mut res = SessionSetupResponse {
        evse_id: evse_id.to_string(),
        response_code: ResponseCode::Ok,
        ..Default::default()
    };
    res.header.session_id = session.id();
    res.header.timestamp = unix_timestamp();
    res
}

#[derive(Debug, Default)]
pub struct SessionSetup;

impl SessionSetup {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for SessionSetup {
    fn name(&self) -> &'static str {
        "SessionSetup"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::SessionSetup(req) => {
                ctx.session = Session::new();
                info!("New session established for EVCC {}", req.evcc_id);
                ctx.feedback().evcc_id(&req.evcc_id);

                let res = handle_request(&req, &ctx.session, &ctx.session_config.evse_id);
                ctx.respond(res)?;
                Ok(Transition::next(AuthorizationSetup::new()))
            }
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
