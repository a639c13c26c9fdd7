//! End-to-end sessions over an in-memory connection
//!
//! A scripted EV encodes requests with `JsonCodec`, frames them and feeds
//! them through `Session::poll`, exactly like an embedding event loop would.

use iso20_core::config::{AcTransferLimits, ControlMobilityNeedsModes, DcTransferLimits, Limits, PowerCurrentLimits};
use iso20_core::message::datatypes::{
    Authorization, ChargingSession, ControlMode, EvseNotification, EvseProcessing, MobilityNeedsMode, Processing,
    Progress, RationalNumber, ServiceCategory,
};
use iso20_core::message::*;
use iso20_core::session::packet::{frame, V2GTP_HEADER_LENGTH};
use iso20_core::{
    memory_pipe, ConnectionEvent, ControlEvent, ControlSender, EvseSetupConfig, JsonCodec, MemoryPeer,
    RecordingFeedback, Session, Signal,
};

const TIMESTAMP: u64 = 1691411798;

/// Route session logs to the test output; `RUST_LOG=debug` shows the dialogue
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn dc_limits() -> DcTransferLimits {
    DcTransferLimits {
        charge_limits: PowerCurrentLimits {
            power: Limits::new(RationalNumber::new(150, 3), RationalNumber::new(1, 3)),
            current: Limits::new(RationalNumber::new(400, 0), RationalNumber::new(1, 0)),
        },
        discharge_limits: None,
        voltage: Limits::new(RationalNumber::new(900, 0), RationalNumber::new(150, 0)),
        power_ramp_limit: None,
    }
}

fn ac_limits() -> AcTransferLimits {
    AcTransferLimits {
        charge_power: Limits::new(RationalNumber::new(22, 3), RationalNumber::new(10, 0)),
        discharge_power: None,
        nominal_frequency: RationalNumber::new(50, 0),
        max_power_asymmetry: None,
        power_ramp_limitation: None,
    }
}

fn setup_config() -> EvseSetupConfig {
    EvseSetupConfig::new("everest se", vec![ServiceCategory::Dc, ServiceCategory::Ac])
        .with_dc_limits(dc_limits())
        .with_ac_limits(ac_limits())
        .with_control_mobility_modes(vec![
            ControlMobilityNeedsModes::new(ControlMode::Scheduled, MobilityNeedsMode::ProvidedByEvcc),
            ControlMobilityNeedsModes::new(ControlMode::Dynamic, MobilityNeedsMode::ProvidedBySecc),
        ])
}

/// Scripted EV talking to one EVSE session
struct Ev {
    session: Session,
    control: ControlSender,
    peer: MemoryPeer,
    feedback: RecordingFeedback,
    codec: JsonCodec,
    session_id: SessionId,
}

impl Ev {
    fn connect(setup: &EvseSetupConfig) -> Self {
        init_logging();
        let (evse, peer) = memory_pipe();
        let feedback = RecordingFeedback::new();
        let (mut session, control) =
            Session::new(Box::new(evse), setup, Box::new(feedback.clone()), Box::new(JsonCodec::new()));
        session.handle_connection_event(ConnectionEvent::Accepted);
        session.handle_connection_event(ConnectionEvent::Open);

        Self { session, control, peer, feedback, codec: JsonCodec::new(), session_id: [0; 8] }
    }

    fn header(&self) -> Header {
        Header::new(self.session_id, TIMESTAMP)
    }

    fn push(&self, event: ControlEvent) {
        self.control.push(event).unwrap();
    }

    fn send(&mut self, request: Request) -> Response {
        let payload = self.codec.encode_request(&request).unwrap();
        self.peer.send(&frame(request.message_type().payload_type().value(), &payload));
        self.session.handle_connection_event(ConnectionEvent::NewData);
        self.session.poll().unwrap();

        let bytes = self.peer.take_received();
        assert!(bytes.len() > V2GTP_HEADER_LENGTH, "no response to {:?}", request.message_type());
        let response = self.codec.decode_response(&bytes[V2GTP_HEADER_LENGTH..]).unwrap();
        assert_eq!(response.message_type(), request.message_type().response_type());
        response
    }

    fn handshake(&mut self, namespace: &str) {
        let response = self.send(Request::SupportedAppProtocol(SupportedAppProtocolRequest {
            app_protocol: vec![AppProtocol {
                protocol_namespace: namespace.to_string(),
                version_number_major: 1,
                version_number_minor: 0,
                schema_id: 1,
                priority: 1,
            }],
        }));
        let Response::SupportedAppProtocol(res) = response else { unreachable!() };
        assert_eq!(res.response_code, SupportedAppProtocolResponseCode::OkSuccessfulNegotiation);
    }

    fn session_setup(&mut self) {
        let response = self.send(Request::SessionSetup(SessionSetupRequest {
            header: self.header(),
            evcc_id: "WMIV1234567890ABCDEX".to_string(),
        }));
        let Response::SessionSetup(res) = response else { unreachable!() };
        assert_eq!(res.response_code, ResponseCode::OkNewSessionEstablished);
        assert_ne!(res.header.session_id, [0; 8]);
        self.session_id = res.header.session_id;
    }

    fn authorize(&mut self) {
        let res = self.send(Request::AuthorizationSetup(AuthorizationSetupRequest { header: self.header() }));
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));

        let request = Request::Authorization(AuthorizationRequest {
            header: self.header(),
            selected_authorization_service: Authorization::Eim,
            authorization_mode: AuthorizationRequestMode::Eim,
        });
        let Response::Authorization(res) = self.send(request.clone()) else { unreachable!() };
        assert_eq!(res.evse_processing, EvseProcessing::Ongoing);

        self.push(ControlEvent::AuthorizationResponse(true));
        let Response::Authorization(res) = self.send(request) else { unreachable!() };
        assert_eq!(res.evse_processing, EvseProcessing::Finished);
        assert_eq!(res.response_code, ResponseCode::Ok);
    }

    fn discover_and_select(&mut self, service: ServiceCategory, parameter_set_id: u16) {
        let Response::ServiceDiscovery(res) = self.send(Request::ServiceDiscovery(ServiceDiscoveryRequest {
            header: self.header(),
            supported_service_ids: None,
        })) else {
            unreachable!()
        };
        assert!(res.energy_transfer_service_list.iter().any(|s| s.service_id == service.id()));

        let Response::ServiceDetail(res) = self.send(Request::ServiceDetail(ServiceDetailRequest {
            header: self.header(),
            service: service.id(),
        })) else {
            unreachable!()
        };
        assert_eq!(res.response_code, ResponseCode::Ok);
        assert_eq!(res.service_parameter_list.len(), 2);

        let res = self.send(Request::ServiceSelection(ServiceSelectionRequest {
            header: self.header(),
            selected_energy_transfer_service: SelectedEnergyService { service_id: service, parameter_set_id },
            selected_vas_list: None,
        }));
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));
    }

    fn schedule_exchange(&mut self) -> Response {
        self.send(Request::ScheduleExchange(ScheduleExchangeRequest {
            header: self.header(),
            max_supporting_points: 1024,
            control_mode: ScheduleExchangeReqControlMode::Scheduled {
                departure_time: None,
                ev_target_energy_request: None,
                ev_max_energy_request: None,
                ev_min_energy_request: None,
            },
        }))
    }

    fn power_delivery(&mut self, progress: Progress) -> Response {
        self.send(Request::PowerDelivery(PowerDeliveryRequest {
            header: self.header(),
            processing: Processing::Finished,
            charge_progress: progress,
            bpt_channel_selection: None,
        }))
    }

    fn dc_charge_loop(&mut self) -> DcChargeLoopResponse {
        let Response::DcChargeLoop(res) = self.send(Request::DcChargeLoop(DcChargeLoopRequest {
            header: self.header(),
            display_parameters: None,
            meter_info_requested: false,
            present_voltage: RationalNumber::new(400, 0),
            control_mode: DcClReqControlMode::Scheduled(ScheduledDcClReq {
                target_current: RationalNumber::new(20, 0),
                target_voltage: RationalNumber::new(400, 0),
                ..Default::default()
            }),
        })) else {
            unreachable!()
        };
        res
    }

    fn session_stop(&mut self, charging_session: ChargingSession) -> Response {
        self.send(Request::SessionStop(SessionStopRequest {
            header: self.header(),
            charging_session,
            ev_termination_code: None,
            ev_termination_explanation: None,
        }))
    }

    /// Run a DC session up to the first charge loop response
    fn dc_session_until_charge_loop(&mut self) {
        self.handshake("urn:iso:std:iso:15118:-20:DC");
        self.session_setup();
        self.authorize();
        self.discover_and_select(ServiceCategory::Dc, 0);
        assert_eq!(self.session.state_name(), "DcChargeParameterDiscovery");

        let res = self.send(Request::DcChargeParameterDiscovery(DcChargeParameterDiscoveryRequest {
            header: self.header(),
            transfer_mode: DcCpdReqTransferMode::Dc(DcCpdReqEnergyTransferMode {
                max_charge_power: RationalNumber::new(50, 3),
                min_charge_power: RationalNumber::new(0, 0),
                max_charge_current: RationalNumber::new(125, 0),
                min_charge_current: RationalNumber::new(0, 0),
                max_voltage: RationalNumber::new(500, 0),
                min_voltage: RationalNumber::new(0, 0),
                target_soc: None,
            }),
        }));
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));

        let res = self.schedule_exchange();
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));
        assert_eq!(self.session.state_name(), "DcCableCheck");

        let cable_check = Request::DcCableCheck(DcCableCheckRequest { header: self.header() });
        let Response::DcCableCheck(res) = self.send(cable_check.clone()) else { unreachable!() };
        assert_eq!(res.processing, EvseProcessing::Ongoing);
        self.push(ControlEvent::CableCheckFinished(true));
        let Response::DcCableCheck(res) = self.send(cable_check) else { unreachable!() };
        assert_eq!(res.processing, EvseProcessing::Finished);

        self.push(ControlEvent::PresentVoltageCurrent { voltage: 398.0, current: 0.0 });
        let Response::DcPreCharge(res) = self.send(Request::DcPreCharge(DcPreChargeRequest {
            header: self.header(),
            processing: Processing::Finished,
            present_voltage: RationalNumber::new(398, 0),
            target_voltage: RationalNumber::new(400, 0),
        })) else {
            unreachable!()
        };
        assert_eq!(res.present_voltage.to_float(), 398.0);

        let res = self.power_delivery(Progress::Start);
        assert_eq!(res.response_code(), Some(ResponseCode::Ok));
        assert_eq!(self.session.state_name(), "DcChargeLoop");
    }
}

#[test]
fn test_full_dc_session() {
    let mut ev = Ev::connect(&setup_config());
    ev.dc_session_until_charge_loop();

    ev.push(ControlEvent::PresentVoltageCurrent { voltage: 400.0, current: 20.0 });
    let res = ev.dc_charge_loop();
    assert_eq!(res.response_code, ResponseCode::Ok);
    assert_eq!(res.present_voltage.to_float(), 400.0);
    assert_eq!(res.present_current.to_float(), 20.0);

    let res = ev.power_delivery(Progress::Stop);
    assert_eq!(res.response_code(), Some(ResponseCode::Ok));
    assert_eq!(ev.session.state_name(), "DcWeldingDetection");

    let res = ev.send(Request::DcWeldingDetection(DcWeldingDetectionRequest {
        header: ev.header(),
        processing: Processing::Finished,
    }));
    assert_eq!(res.response_code(), Some(ResponseCode::Ok));

    let res = ev.session_stop(ChargingSession::Terminate);
    assert_eq!(res.response_code(), Some(ResponseCode::Ok));
    assert!(ev.session.is_finished());
    assert!(ev.peer.is_closed());

    assert_eq!(
        ev.feedback.signals(),
        vec![
            Signal::RequireAuthEim,
            Signal::SetupFinished,
            Signal::StartCableCheck,
            Signal::ChargeLoopStarted,
            Signal::ChargeLoopFinished,
            Signal::DcOpenContactor,
            Signal::DlinkTerminate,
        ]
    );

    let record = ev.feedback.record();
    assert_eq!(record.selected_protocol.as_deref(), Some("urn:iso:std:iso:15118:-20:DC"));
    assert_eq!(record.evcc_id.as_deref(), Some("WMIV1234567890ABCDEX"));
    assert_eq!(record.pre_charge_voltages, vec![400.0]);
    assert_eq!(record.dc_max_limits.len(), 1);
    assert_eq!(record.dc_charge_targets.len(), 1);
    assert!(record.response_codes.iter().all(|c| !c.is_failure()));
}

#[test]
fn test_full_ac_session() {
    let mut ev = Ev::connect(&setup_config());
    ev.handshake("urn:iso:std:iso:15118:-20:AC");
    ev.session_setup();
    ev.authorize();
    ev.discover_and_select(ServiceCategory::Ac, 0);
    assert_eq!(ev.session.state_name(), "AcChargeParameterDiscovery");

    let Response::AcChargeParameterDiscovery(res) =
        ev.send(Request::AcChargeParameterDiscovery(AcChargeParameterDiscoveryRequest {
            header: ev.header(),
            transfer_mode: AcCpdReqTransferMode::Ac(AcCpdReqEnergyTransferMode {
                max_charge_power: RationalNumber::new(11, 3),
                min_charge_power: RationalNumber::new(0, 0),
            }),
        }))
    else {
        unreachable!()
    };
    assert_eq!(res.response_code, ResponseCode::Ok);

    ev.schedule_exchange();
    assert_eq!(ev.session.state_name(), "PowerDelivery");

    ev.power_delivery(Progress::Start);
    assert_eq!(ev.session.state_name(), "AcChargeLoop");

    ev.push(ControlEvent::AcPresentPower(iso20_core::session::control::AcPresentPower {
        present_active_power: Some(RationalNumber::new(11, 3)),
    }));
    let Response::AcChargeLoop(res) = ev.send(Request::AcChargeLoop(AcChargeLoopRequest {
        header: ev.header(),
        display_parameters: None,
        meter_info_requested: false,
        control_mode: AcClReqControlMode::Scheduled(ScheduledAcClReq::default()),
    })) else {
        unreachable!()
    };
    assert_eq!(res.response_code, ResponseCode::Ok);
    assert_eq!(res.target_frequency, Some(RationalNumber::new(50, 0)));
    let AcClResControlMode::Scheduled(mode) = res.control_mode else { unreachable!() };
    assert_eq!(mode.present_active_power, Some(RationalNumber::new(11, 3)));

    ev.power_delivery(Progress::Stop);
    assert_eq!(ev.session.state_name(), "SessionStop");

    ev.session_stop(ChargingSession::Terminate);
    assert!(ev.session.is_finished());
    assert_eq!(
        ev.feedback.signals(),
        vec![
            Signal::RequireAuthEim,
            Signal::SetupFinished,
            Signal::AcCloseContactor,
            Signal::ChargeLoopStarted,
            Signal::ChargeLoopFinished,
            Signal::AcOpenContactor,
            Signal::DlinkTerminate,
        ]
    );
    assert_eq!(ev.feedback.record().ac_max_charge_power, Some(RationalNumber::new(11, 3)));
}

#[test]
fn test_session_setup_establishes_new_session() {
    let mut ev = Ev::connect(&setup_config());
    ev.handshake("urn:iso:std:iso:15118:-20:DC");
    ev.session_setup();
    assert_eq!(ev.session.state_name(), "AuthorizationSetup");
    assert_eq!(ev.session.context().session.id(), ev.session_id);
}

#[test]
fn test_dynamic_service_selection_enters_charge_parameter_discovery() {
    let mut ev = Ev::connect(&setup_config());
    ev.handshake("urn:iso:std:iso:15118:-20:DC");
    ev.session_setup();
    ev.authorize();
    ev.discover_and_select(ServiceCategory::Dc, 1);

    assert_eq!(ev.session.state_name(), "DcChargeParameterDiscovery");
    let selected = ev.feedback.record().selected_service.unwrap();
    assert_eq!(selected.control_mode, ControlMode::Dynamic);
    assert_eq!(selected.mobility_needs_mode, MobilityNeedsMode::ProvidedBySecc);
}

#[test]
fn test_stop_event_is_announced_in_charge_loop() {
    let mut ev = Ev::connect(&setup_config());
    ev.dc_session_until_charge_loop();

    let res = ev.dc_charge_loop();
    assert!(res.status.is_none());

    ev.push(ControlEvent::StopCharging(true));
    let res = ev.dc_charge_loop();
    assert_eq!(res.status.map(|s| s.notification), Some(EvseNotification::Terminate));
    assert_eq!(ev.feedback.signals().iter().filter(|s| **s == Signal::ChargeLoopStarted).count(), 1);
}

#[test]
fn test_unknown_session_id_ends_session() {
    let mut ev = Ev::connect(&setup_config());
    ev.handshake("urn:iso:std:iso:15118:-20:DC");
    ev.session_setup();

    ev.session_id = [0xAA; 8];
    let res = ev.send(Request::AuthorizationSetup(AuthorizationSetupRequest { header: ev.header() }));
    assert_eq!(res.response_code(), Some(ResponseCode::FailedUnknownSession));
    assert!(ev.session.is_finished());
    assert_eq!(ev.session.state_name(), "AuthorizationSetup");
}

#[test]
fn test_out_of_order_request_is_sequence_error() {
    let mut ev = Ev::connect(&setup_config());
    ev.handshake("urn:iso:std:iso:15118:-20:DC");
    ev.session_setup();

    let res = ev.power_delivery(Progress::Start);
    assert_eq!(res.message_type(), Type::PowerDeliveryRes);
    assert_eq!(res.response_code(), Some(ResponseCode::FailedSequenceError));
    assert!(ev.peer.is_closed());
}

#[test]
fn test_pause_closes_link_without_terminate() {
    let mut ev = Ev::connect(&setup_config());
    ev.dc_session_until_charge_loop();

    ev.power_delivery(Progress::Stop);
    ev.session_stop(ChargingSession::Pause);

    let signals = ev.feedback.signals();
    assert_eq!(signals.last(), Some(&Signal::DlinkPause));
    assert!(!signals.contains(&Signal::DlinkTerminate));
    assert!(ev.session.is_finished());
}

#[test]
fn test_session_log_records_the_dialogue() {
    let mut ev = Ev::connect(&setup_config());
    ev.handshake("urn:iso:std:iso:15118:-20:DC");
    ev.session_setup();

    let history = ev.session.log().state_history();
    assert_eq!(history, vec!["SupportedAppProtocol", "SessionSetup", "AuthorizationSetup"]);
    assert_eq!(
        ev.feedback.record().messages,
        vec![Type::SupportedAppProtocolReq, Type::SessionSetupReq]
    );
}
