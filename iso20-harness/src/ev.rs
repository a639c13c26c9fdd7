//! Scripted EV
//!
//! Plays the EVCC side of a complete d20 session against a [`Session`]
//! over an in-memory pipe, retrying requests the EVSE answers with
//! `Ongoing` the way a real EV would.

use std::time::Duration;

use iso20_core::d20::context::unix_timestamp;
use iso20_core::message::datatypes::{
    Authorization, ChargingSession, ControlMode, EvseProcessing, Processing, Progress, RationalNumber, ResponseCode,
    ServiceCategory,
};
use iso20_core::message::*;
use iso20_core::session::packet::{frame, V2GTP_HEADER_LENGTH};
use iso20_core::{ConnectionEvent, JsonCodec, MemoryPeer, Session};
use tokio::time::sleep;
use tracing::{debug, info};

const EVCC_ID: &str = "WMIV1234567890ABCDEX";
const RETRY_INTERVAL: Duration = Duration::from_millis(20);
const MAX_RETRIES: usize = 100;

pub type HarnessResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Which half of the energy service matrix to exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EnergyMode {
    Dc,
    Ac,
}

impl EnergyMode {
    fn namespace(self) -> &'static str {
        match self {
            EnergyMode::Dc => "urn:iso:std:iso:15118:-20:DC",
            EnergyMode::Ac => "urn:iso:std:iso:15118:-20:AC",
        }
    }

    fn service(self) -> ServiceCategory {
        match self {
            EnergyMode::Dc => ServiceCategory::Dc,
            EnergyMode::Ac => ServiceCategory::Ac,
        }
    }
}

/// How the scripted session should go
#[derive(Debug, Clone, Copy)]
pub struct Script {
    pub mode: EnergyMode,
    pub charge_loops: usize,
    pub pause: bool,
    pub target_voltage: f32,
    pub target_current: f32,
}

pub struct ScriptedEv {
    session: Session,
    peer: MemoryPeer,
    codec: JsonCodec,
    session_id: SessionId,
    exchanged: usize,
}

impl ScriptedEv {
    pub fn new(mut session: Session, peer: MemoryPeer) -> Self {
        session.handle_connection_event(ConnectionEvent::Accepted);
        session.handle_connection_event(ConnectionEvent::Open);
        Self { session, peer, codec: JsonCodec::new(), session_id: [0; 8], exchanged: 0 }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn exchanged(&self) -> usize {
        self.exchanged
    }

    fn header(&self) -> Header {
        Header::new(self.session_id, unix_timestamp())
    }

    /// Send one request and wait for its response
    async fn send(&mut self, request: Request) -> HarnessResult<Response> {
        let req_type = request.message_type();
        let payload = self.codec.encode_request(&request)?;
        self.peer.send(&frame(req_type.payload_type().value(), &payload));
        self.session.handle_connection_event(ConnectionEvent::NewData);

        for _ in 0..MAX_RETRIES {
            self.session.poll()?;
            let bytes = self.peer.take_received();
            if bytes.len() > V2GTP_HEADER_LENGTH {
                let response = self.codec.decode_response(&bytes[V2GTP_HEADER_LENGTH..])?;
                debug!("EV <- {:?} {:?}", response.message_type(), response.response_code());
                self.exchanged += 1;
                return Ok(response);
            }
            sleep(RETRY_INTERVAL).await;
        }
        Err(format!("no response to {:?}", req_type).into())
    }

    /// Send a request until the EVSE stops answering `Ongoing`
    async fn send_until_finished(
        &mut self,
        request: impl Fn(Header) -> Request,
        processing: impl Fn(&Response) -> Option<EvseProcessing>,
    ) -> HarnessResult<Response> {
        for _ in 0..MAX_RETRIES {
            let response = expect_ok(self.send(request(self.header())).await?)?;
            if processing(&response) != Some(EvseProcessing::Ongoing) {
                return Ok(response);
            }
            sleep(RETRY_INTERVAL).await;
        }
        Err("EVSE kept answering Ongoing".into())
    }

    pub async fn run(&mut self, script: &Script) -> HarnessResult<()> {
        self.setup(script.mode).await?;

        match script.mode {
            EnergyMode::Dc => {
                self.dc_parameters().await?;
                self.schedule_exchange().await?;
                self.cable_check().await?;
                self.pre_charge(script.target_voltage).await?;
                self.power_delivery(Progress::Start).await?;
                for _ in 0..script.charge_loops {
                    self.dc_charge_loop(script).await?;
                    sleep(RETRY_INTERVAL).await;
                }
                self.power_delivery(Progress::Stop).await?;
                self.welding_detection().await?;
            }
            EnergyMode::Ac => {
                self.ac_parameters().await?;
                self.schedule_exchange().await?;
                self.power_delivery(Progress::Start).await?;
                for _ in 0..script.charge_loops {
                    self.ac_charge_loop().await?;
                    sleep(RETRY_INTERVAL).await;
                }
                self.power_delivery(Progress::Stop).await?;
            }
        }

        let charging_session = if script.pause { ChargingSession::Pause } else { ChargingSession::Terminate };
        let request = Request::SessionStop(SessionStopRequest {
            header: self.header(),
            charging_session,
            ev_termination_code: None,
            ev_termination_explanation: None,
        });
        expect_ok(self.send(request).await?)?;
        // let the session close the link
        self.session.poll()?;
        info!("EV: session stopped ({:?})", charging_session);
        Ok(())
    }

    async fn setup(&mut self, mode: EnergyMode) -> HarnessResult<()> {
        let response = self
            .send(Request::SupportedAppProtocol(SupportedAppProtocolRequest {
                app_protocol: vec![AppProtocol {
                    protocol_namespace: mode.namespace().to_string(),
                    version_number_major: 1,
                    version_number_minor: 0,
                    schema_id: 1,
                    priority: 1,
                }],
            }))
            .await?;
        let Response::SupportedAppProtocol(res) = response else {
            return Err("unexpected response to supportedAppProtocolReq".into());
        };
        if res.response_code == SupportedAppProtocolResponseCode::FailedNoNegotiation {
            return Err("EVSE refused the protocol".into());
        }

        let response = self
            .send(Request::SessionSetup(SessionSetupRequest { header: self.header(), evcc_id: EVCC_ID.to_string() }))
            .await?;
        let Response::SessionSetup(res) = expect_ok(response)? else {
            return Err("unexpected response to SessionSetupReq".into());
        };
        self.session_id = res.header.session_id;
        info!("EV: session {} with {}", hex(&self.session_id), res.evse_id);

        expect_ok(self.send(Request::AuthorizationSetup(AuthorizationSetupRequest { header: self.header() })).await?)?;
        self.send_until_finished(
            |header| {
                Request::Authorization(AuthorizationRequest {
                    header,
                    selected_authorization_service: Authorization::Eim,
                    authorization_mode: AuthorizationRequestMode::Eim,
                })
            },
            |res| match res {
                Response::Authorization(r) => Some(r.evse_processing),
                _ => None,
            },
        )
        .await?;

        let response = self
            .send(Request::ServiceDiscovery(ServiceDiscoveryRequest { header: self.header(), supported_service_ids: None }))
            .await?;
        let Response::ServiceDiscovery(res) = expect_ok(response)? else {
            return Err("unexpected response to ServiceDiscoveryReq".into());
        };
        let service = mode.service();
        if !res.energy_transfer_service_list.iter().any(|s| s.service_id == service.id()) {
            return Err(format!("EVSE does not offer {:?}", service).into());
        }

        let response = self
            .send(Request::ServiceDetail(ServiceDetailRequest { header: self.header(), service: service.id() }))
            .await?;
        let Response::ServiceDetail(res) = expect_ok(response)? else {
            return Err("unexpected response to ServiceDetailReq".into());
        };
        let parameter_set_id = res
            .service_parameter_list
            .iter()
            .find(|set| {
                set.parameter
                    .iter()
                    .any(|p| p.name == "ControlMode" && p.as_int() == Some(ControlMode::Scheduled.value()))
            })
            .map(|set| set.id)
            .ok_or("EVSE offers no scheduled parameter set")?;

        expect_ok(
            self.send(Request::ServiceSelection(ServiceSelectionRequest {
                header: self.header(),
                selected_energy_transfer_service: SelectedEnergyService { service_id: service, parameter_set_id },
                selected_vas_list: None,
            }))
            .await?,
        )?;
        Ok(())
    }

    async fn dc_parameters(&mut self) -> HarnessResult<()> {
        let request = Request::DcChargeParameterDiscovery(DcChargeParameterDiscoveryRequest {
            header: self.header(),
            transfer_mode: DcCpdReqTransferMode::Dc(DcCpdReqEnergyTransferMode {
                max_charge_power: RationalNumber::new(100, 3),
                min_charge_power: RationalNumber::new(0, 0),
                max_charge_current: RationalNumber::new(250, 0),
                min_charge_current: RationalNumber::new(0, 0),
                max_voltage: RationalNumber::new(500, 0),
                min_voltage: RationalNumber::new(200, 0),
                target_soc: Some(80),
            }),
        });
        expect_ok(self.send(request).await?)?;
        Ok(())
    }

    async fn ac_parameters(&mut self) -> HarnessResult<()> {
        let request = Request::AcChargeParameterDiscovery(AcChargeParameterDiscoveryRequest {
            header: self.header(),
            transfer_mode: AcCpdReqTransferMode::Ac(AcCpdReqEnergyTransferMode {
                max_charge_power: RationalNumber::new(11, 3),
                min_charge_power: RationalNumber::new(1, 3),
            }),
        });
        expect_ok(self.send(request).await?)?;
        Ok(())
    }

    async fn schedule_exchange(&mut self) -> HarnessResult<()> {
        self.send_until_finished(
            |header| {
                Request::ScheduleExchange(ScheduleExchangeRequest {
                    header,
                    max_supporting_points: 1024,
                    control_mode: ScheduleExchangeReqControlMode::Scheduled {
                        departure_time: None,
                        ev_target_energy_request: None,
                        ev_max_energy_request: None,
                        ev_min_energy_request: None,
                    },
                })
            },
            |res| match res {
                Response::ScheduleExchange(r) => Some(r.processing),
                _ => None,
            },
        )
        .await?;
        Ok(())
    }

    async fn cable_check(&mut self) -> HarnessResult<()> {
        self.send_until_finished(
            |header| Request::DcCableCheck(DcCableCheckRequest { header }),
            |res| match res {
                Response::DcCableCheck(r) => Some(r.processing),
                _ => None,
            },
        )
        .await?;
        Ok(())
    }

    async fn pre_charge(&mut self, target_voltage: f32) -> HarnessResult<()> {
        let target = RationalNumber::from_float(target_voltage);
        let mut present = RationalNumber::new(0, 0);

        for _ in 0..MAX_RETRIES {
            let converged = (present.to_float() - target_voltage).abs() < 10.0;
            let processing = if converged { Processing::Finished } else { Processing::Ongoing };
            let request = Request::DcPreCharge(DcPreChargeRequest {
                header: self.header(),
                processing,
                present_voltage: present,
                target_voltage: target,
            });
            let Response::DcPreCharge(res) = expect_ok(self.send(request).await?)? else {
                return Err("unexpected response to DC_PreChargeReq".into());
            };
            if converged {
                return Ok(());
            }
            present = res.present_voltage;
            sleep(RETRY_INTERVAL).await;
        }
        Err("pre-charge never reached the target voltage".into())
    }

    async fn power_delivery(&mut self, charge_progress: Progress) -> HarnessResult<()> {
        let request = Request::PowerDelivery(PowerDeliveryRequest {
            header: self.header(),
            processing: Processing::Finished,
            charge_progress,
            bpt_channel_selection: None,
        });
        expect_ok(self.send(request).await?)?;
        Ok(())
    }

    async fn dc_charge_loop(&mut self, script: &Script) -> HarnessResult<()> {
        let request = Request::DcChargeLoop(DcChargeLoopRequest {
            header: self.header(),
            display_parameters: None,
            meter_info_requested: false,
            present_voltage: RationalNumber::from_float(script.target_voltage),
            control_mode: DcClReqControlMode::Scheduled(ScheduledDcClReq {
                target_current: RationalNumber::from_float(script.target_current),
                target_voltage: RationalNumber::from_float(script.target_voltage),
                ..Default::default()
            }),
        });
        let Response::DcChargeLoop(res) = expect_ok(self.send(request).await?)? else {
            return Err("unexpected response to DC_ChargeLoopReq".into());
        };
        info!(
            "EV: charging at {} V / {} A",
            res.present_voltage.to_float(),
            res.present_current.to_float()
        );
        Ok(())
    }

    async fn ac_charge_loop(&mut self) -> HarnessResult<()> {
        let request = Request::AcChargeLoop(AcChargeLoopRequest {
            header: self.header(),
            display_parameters: None,
            meter_info_requested: false,
            control_mode: AcClReqControlMode::Scheduled(ScheduledAcClReq::default()),
        });
        let Response::AcChargeLoop(res) = expect_ok(self.send(request).await?)? else {
            return Err("unexpected response to AC_ChargeLoopReq".into());
        };
        if let AcClResControlMode::Scheduled(mode) = &res.control_mode {
            info!("EV: EVSE reports {:?} W", mode.present_active_power.map(|p| p.to_float()));
        }
        Ok(())
    }

    async fn welding_detection(&mut self) -> HarnessResult<()> {
        let request = Request::DcWeldingDetection(DcWeldingDetectionRequest {
            header: self.header(),
            processing: Processing::Finished,
        });
        expect_ok(self.send(request).await?)?;
        Ok(())
    }
}

fn expect_ok(response: Response) -> HarnessResult<Response> {
    match response.response_code() {
        Some(code) if code.is_failure() => Err(format!("{:?} answered {:?}", response.message_type(), code).into()),
        Some(ResponseCode::WarningEimAuthorizationFailure) => Err("EIM authorization refused".into()),
        _ => Ok(response),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}
