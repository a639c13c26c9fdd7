use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::Result;
use crate::message::datatypes::{Authorization as AuthorizationService, EvseProcessing};
use crate::message::{AuthorizationRequest, AuthorizationResponse, Request, ResponseCode};
use crate::session::feedback::Signal;

use super::super::context::Context;
use super::super::fsm::{Event, Handler, Transition};
use super::super::session::Session;
use super::{handle_session_stop, pull_request, send_sequence_error, validate_and_setup_header, ServiceDiscovery};

/// Answer AuthorizationReq given the authorization decision so far.
///
/// `authorized` is `None` while the decision is still pending.
pub fn handle_request(
    req: &AuthorizationRequest,
    session: &Session,
    config: &SessionConfig,
    authorized: Option<bool>,
) -> AuthorizationResponse {
    let mut res = AuthorizationResponse::default();

    if !validate_and_setup_header(&mut res.header, session, &req.header.session_id) {
        res.response_code = ResponseCode::FailedUnknownSession;
        return res;
    }

    if !config.authorization_services.contains(&req.selected_authorization_service) {
        res.response_code = ResponseCode::WarningAuthorizationSelectionInvalid;
        return res;
    }

    match authorized {
        None => {
            res.evse_processing = EvseProcessing::Ongoing;
            res.response_code = ResponseCode::Ok;
        }
        Some(true) => {
            res.evse_processing = EvseProcessing::Finished;
            res.response_code = ResponseCode::Ok;
        }
        Some(false) => {
            res.evse_processing = EvseProcessing::Finished;
            res.response_code = ResponseCode::Failed;
        }
    }

    res
}

#[derive(Debug, Default)]
pub struct Authorization {
    eim_requested: bool,
}

impl Authorization {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Handler for Authorization {
    fn name(&self) -> &'static str {
        "Authorization"
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition> {
        if ev != Event::V2gtpMessage {
            // the decision itself lands in the control cache
            return Ok(Transition::Stay);
        }

        let Some(request) = pull_request(ctx) else {
            return Ok(Transition::Stay);
        };

        match request {
            Request::Authorization(req) => {
                if req.selected_authorization_service == AuthorizationService::Eim && !self.eim_requested {
                    info!("Requesting external identification");
                    ctx.feedback().signal(Signal::RequireAuthEim);
                    self.eim_requested = true;
                }

                let res = handle_request(&req, &ctx.session, &ctx.session_config, ctx.cache.authorization);
                let finished = res.evse_processing == EvseProcessing::Finished;
                let code = res.response_code;
                ctx.respond(res)?;

                if code.is_failure() {
                    warn!("Authorization failed: {:?}", code);
                    return Ok(Transition::Stay);
                }
                if finished && code == ResponseCode::Ok {
                    return Ok(Transition::next(ServiceDiscovery::new()));
                }
                Ok(Transition::Stay)
            }
            Request::SessionStop(req) => handle_session_stop(ctx, &req),
            other => send_sequence_error(ctx, other.message_type(), self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::datatypes::ServiceCategory;
    use crate::message::{AuthorizationRequestMode, Response};
    use crate::session::control::ControlEvent;
    use super::super::testing;

    fn eim_request(ctx: &Context) -> Request {
        Request::Authorization(AuthorizationRequest {
            header: testing::header(ctx),
            selected_authorization_service: AuthorizationService::Eim,
            authorization_mode: AuthorizationRequestMode::Eim,
        })
    }

    fn unwrap_response(res: Response) -> AuthorizationResponse {
        match res {
            Response::Authorization(r) => r,
            other => panic!("expected AuthorizationRes, got {:?}", other),
        }
    }

    #[test]
    fn test_ongoing_until_authorized() {
        let (mut ctx, feedback) = testing::context(vec![ServiceCategory::Dc]);
        let mut fsm = testing::start(Authorization::new(), &mut ctx);

        let req = eim_request(&ctx);
        let res = unwrap_response(testing::exchange(&mut fsm, &mut ctx, req));
        assert_eq!(res.evse_processing, EvseProcessing::Ongoing);
        assert_eq!(res.response_code, ResponseCode::Ok);
        assert_eq!(fsm.current_name(), "Authorization");

        // a second request does not re-trigger external identification
        let req = eim_request(&ctx);
        unwrap_response(testing::exchange(&mut fsm, &mut ctx, req));
        assert_eq!(feedback.signals(), vec![Signal::RequireAuthEim]);

        ctx.set_control_event(ControlEvent::AuthorizationResponse(true));
        fsm.handle_event(&mut ctx, Event::ControlMessage).unwrap();
        ctx.clear_control_event();

        let req = eim_request(&ctx);
        let res = unwrap_response(testing::exchange(&mut fsm, &mut ctx, req));
        assert_eq!(res.evse_processing, EvseProcessing::Finished);
        assert_eq!(fsm.current_name(), "ServiceDiscovery");
    }

    #[test]
    fn test_rejected_authorization_fails() {
        let (mut ctx, _) = testing::context(vec![ServiceCategory::Dc]);
        let mut fsm = testing::start(Authorization::new(), &mut ctx);
        ctx.set_control_event(ControlEvent::AuthorizationResponse(false));
        ctx.clear_control_event();

        let req = eim_request(&ctx);
        let res = unwrap_response(testing::exchange(&mut fsm, &mut ctx, req));
        assert_eq!(res.response_code, ResponseCode::Failed);
        assert!(ctx.session_stopped);
    }

    #[test]
    fn test_unoffered_service_warns() {
        let (ctx, _) = testing::context(vec![ServiceCategory::Dc]);
        let req = AuthorizationRequest {
            header: testing::header(&ctx),
            selected_authorization_service: AuthorizationService::Pnc,
            authorization_mode: AuthorizationRequestMode::Pnc {
                id: "id1".to_string(),
                gen_challenge: vec![0; 16],
                contract_certificate_chain: Vec::new(),
            },
        };

        let res = handle_request(&req, &ctx.session, &ctx.session_config, Some(true));
        assert_eq!(res.response_code, ResponseCode::WarningAuthorizationSelectionInvalid);
    }
}
