//! # ISO 15118-20 session engine
//!
//! EVSE side of the ISO 15118-20 (d20) charging dialogue: V2GTP framing,
//! the request/response state machine from supportedAppProtocol to
//! SessionStop, and the cooperative session driver that ties them to a
//! byte-stream connection.
//!
//! ## Architecture
//!
//! ```text
//!   EV ──► Connection ──► Session::poll ──► Fsm ──► state handlers
//!                              ▲                        │
//!   charger app ──► ControlSender                       ▼
//!                                              Feedback (signals, limits)
//! ```
//!
//! The EXI codec, TCP/TLS sockets and SDP discovery stay outside this crate
//! and plug in through [`MessageCodec`] and [`Connection`].
//!
//! ## Usage
//!
//! ```no_run
//! use iso20_core::message::datatypes::ServiceCategory;
//! use iso20_core::{memory_pipe, ConnectionEvent, EvseSetupConfig, JsonCodec, NoFeedback, Session};
//!
//! let (evse, _ev) = memory_pipe();
//! let setup = EvseSetupConfig::new("DE*PNX*E12345*1", vec![ServiceCategory::Dc]);
//! let (mut session, control) =
//!     Session::new(Box::new(evse), &setup, Box::new(NoFeedback), Box::new(JsonCodec::new()));
//!
//! session.handle_connection_event(ConnectionEvent::Open);
//! let deadline = session.poll().unwrap();
//! # let _ = (control, deadline);
//! ```

pub mod codec;
pub mod config;
pub mod d20;
pub mod error;
pub mod message;
pub mod session;
pub mod transport;

pub use codec::{JsonCodec, MessageCodec};
pub use config::{EvseSetupConfig, SessionConfig, SESSION_IDLE_TIMEOUT};
pub use error::{Error, Result};
pub use session::control::{ControlEvent, ControlSender};
pub use session::feedback::{Feedback, NoFeedback, RecordingFeedback, Signal};
pub use session::Session;
pub use transport::{memory_pipe, Connection, ConnectionEvent, MemoryConnection, MemoryPeer, ReadResult};
