use crate::config::SessionConfig;
use crate::error::Result;
use crate::message::datatypes::Authorization;
use crate::message::{
    AuthorizationSetupMode, AuthorizationSetupRequest, AuthorizationSetupResponse, Request, ResponseCode,
};

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header};

const GEN_CHALLENGE_LENGTH: usize = 16;

pub fn handle_request(
    req: &AuthorizationSetupRequest,
    session: &Session,
    config: &SessionConfig,
) -> AuthorizationSetupResponse {
    let mut res = AuthorizationSetupResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    res.authorization_services = config.authorization_services.clone();
    res.certificate_installation_service = config.cert_install_service;

    if config.authorization_services.contains(&Authorization::Pnc) {
        let gen_challenge: [u8; GEN_CHALLENGE_LENGTH] = rand::random();
        res.authorization_mode = AuthorizationSetupMode::Pnc {
            gen_challenge: gen_challenge.to_vec(),
            supported_providers: None,
        };
    } else {
        res.authorization_mode = AuthorizationSetupMode::Eim;
    }

    res.response_code = ResponseCode::Ok;
    res
}

#[derive(Debug, Default)]
pub struct AuthorizationSetup;

impl AuthorizationSetup {
    pub fn new() -> Self {
        Self
    }
}

impl Handler for AuthorizationSetup {
    fn name(&self) -> &'static str {
        "AuthorizationSetup"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::AuthorizationSetup(req) => {
                let res = handle_request(&req, &ctx.session, &ctx.session_config);
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    return Ok(Transition::Stay);
                }
                Ok(Transition::next(super::Authorization::new()))
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}
