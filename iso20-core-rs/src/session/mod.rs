//! Session driver
//!
//! A [`Session`] owns one EV connection and everything needed to serve it:
//! the packet buffer, the control event queue, the d20 state machine and its
//! context. The embedding application calls [`Session::poll`] whenever the
//! connection reports activity, a control event was pushed, or the returned
//! deadline expired.
//!
//! ```text
//! Connection ──► PacketBuffer ──► MessageCodec ──► MessageExchange ──► Fsm
//!     ▲                                                                 │
//!     └──────────── frame ◄── MessageExchange (response) ◄──────────────┘
//!
//! ControlSender ──► ControlQueue ──► Fsm (drained before the next packet)
//! ```

pub mod control;
pub mod exchange;
pub mod feedback;
pub mod log;
pub mod packet;

use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::codec::MessageCodec;
use crate::config::{EvseSetupConfig, SessionConfig, SESSION_IDLE_TIMEOUT};
use crate::d20::context::Context;
use crate::d20::fsm::{Event, Fsm};
use crate::d20::state::SupportedAppProtocol;
use crate::error::{Error, Result};
use crate::message::PayloadType;
use crate::transport::{Connection, ConnectionEvent};

use self::control::{control_channel, ControlEvent, ControlQueue, ControlSender};
use self::feedback::{Feedback, Signal};
use self::log::{Direction, SessionLog};
use self::packet::{PacketBuffer, PacketStatus};

pub struct Session {
    connection: Box<dyn Connection>,
    packet: PacketBuffer,
    control: ControlQueue,
    fsm: Fsm,
    ctx: Context,

    connected: bool,
    new_data: bool,
    finished: bool,
    deadline: Instant,
}

impl Session {
    /// Create a session for a freshly accepted connection
    ///
    /// Returns the session and the sender for its control events.
    pub fn new(
        connection: Box<dyn Connection>,
        setup: &EvseSetupConfig,
        feedback: Box<dyn Feedback>,
        codec: Box<dyn MessageCodec>,
    ) -> (Self, ControlSender) {
        let (sender, control) = control_channel();
        let mut ctx = Context::new(SessionConfig::new(setup), feedback, codec);
        let fsm = Fsm::new(SupportedAppProtocol::new(), &mut ctx);

        if let Some(endpoint) = connection.endpoint() {
            ctx.log.info(format!("New session for {}", endpoint));
        }

        let session = Self {
            connection,
            packet: PacketBuffer::new(),
            control,
            fsm,
            ctx,
            connected: false,
            new_data: false,
            finished: false,
            deadline: Instant::now() + SESSION_IDLE_TIMEOUT,
        };
        (session, sender)
    }

    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Accepted => {
                self.ctx.log.info("Connection accepted");
            }
            ConnectionEvent::Open => {
                self.ctx.log.info("Connection open");
                self.connected = true;
                self.rearm_deadline();
            }
            ConnectionEvent::NewData => {
                self.new_data = true;
            }
            ConnectionEvent::Closed => {
                self.connected = false;
                if !self.finished {
                    self.ctx.log.failure("Connection closed by peer");
                    self.ctx.feedback().signal(Signal::DlinkError);
                    self.finished = true;
                }
            }
        }
    }

    /// Run one cooperative step and return the idle deadline
    ///
    /// The deadline is re-armed on every poll while the link is down, when
    /// it opens, and on every received packet while it is up. Control events and polls that
    /// find no data leave it untouched, so a peer that goes quiet still
    /// times out through [`Session::handle_timeout`].
    pub fn poll(&mut self) -> Result<Instant> {
        if !self.connected {
            self.rearm_deadline();
            return Ok(self.deadline);
        }

        if self.new_data {
            match self.packet.read_from(self.connection.as_mut()) {
                Ok(PacketStatus::WouldBlock) => self.new_data = false,
                Ok(PacketStatus::Complete) => {}
                Err(e) => {
                    error!("Failed to read V2GTP packet: {}", e);
                    self.ctx.log.failure(format!("Packet error: {}", e));
                    return Err(e);
                }
            }
        }

        while let Some(event) = self.control.pop() {
            self.feed_control_event(event)?;
        }

        if self.packet.is_complete() {
            self.handle_packet()?;
        }

        self.write_pending_response()?;

        Ok(self.deadline)
    }

    fn feed_control_event(&mut self, event: ControlEvent) -> Result<()> {
        debug!("Control event: {:?}", event);
        self.ctx.set_control_event(event);
        let result = self.fsm.handle_event(&mut self.ctx, Event::ControlMessage);
        self.ctx.clear_control_event();
        result.map(|_| ())
    }

    fn handle_packet(&mut self) -> Result<()> {
        self.rearm_deadline();

        let raw_type = self.packet.payload_type();
        let payload = self.packet.payload().unwrap_or_default();
        debug!("Received V2GTP packet, type {:#06x}, {} bytes", raw_type, payload.len());

        let Some(payload_type) = PayloadType::from_value(raw_type) else {
            let msg = format!("unknown payload type {:#06x}", raw_type);
            error!("Invalid V2GTP header: {}", msg);
            self.packet.reset();
            return Err(Error::InvalidHeader(msg));
        };

        let size = payload.len();
        let request = self.ctx.codec().decode(payload_type, payload);
        self.packet.reset();
        let request = request?;

        self.ctx
            .log
            .message(Direction::Received, request.message_type(), payload_type, size);
        self.ctx.exchange().set_request(request);

        self.fsm.handle_event(&mut self.ctx, Event::V2gtpMessage)?;
        Ok(())
    }

    fn write_pending_response(&mut self) -> Result<()> {
        let Some(response) = self.ctx.exchange().check_and_clear_response() else {
            return Ok(());
        };

        let frame = packet::frame(response.payload_type.value(), &response.payload);
        self.connection.write(&frame)?;
        debug!("Sent {:?} ({} bytes)", response.message_type, response.size());

        if self.ctx.session_stopped {
            self.close();
        }
        Ok(())
    }

    fn close(&mut self) {
        self.connection.close();
        self.connected = false;
        self.finished = true;

        if self.ctx.session_paused {
            info!("Session paused, data link closed");
        } else {
            info!("Session terminated, data link closed");
            self.ctx.feedback().signal(Signal::DlinkTerminate);
        }
        self.ctx.log.info("Session closed");
    }

    fn rearm_deadline(&mut self) {
        self.deadline = Instant::now() + SESSION_IDLE_TIMEOUT;
    }

    /// The session closed its link, or the peer went away
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn state_name(&self) -> &'static str {
        self.fsm.current_name()
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn log(&self) -> &SessionLog {
        &self.ctx.log
    }

    /// Deadline after which the embedding scheduler should give up on the peer
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Report an expired deadline; closes the link without a response
    pub fn handle_timeout(&mut self) {
        if self.finished {
            return;
        }
        warn!("Session idle for {:?}, closing", SESSION_IDLE_TIMEOUT);
        self.ctx.log.failure("Idle timeout");
        self.connection.close();
        self.connected = false;
        self.finished = true;
        self.ctx.feedback().signal(Signal::DlinkError);
    }
}
