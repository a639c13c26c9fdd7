//! ISO 15118-20 protocol layer
//!
//! [`fsm`] drives the closed set of states in [`state`]; every state works
//! on the shared [`context::Context`], which carries the negotiated
//! [`session::Session`] data across transitions.

pub mod context;
pub mod fsm;
pub mod session;
pub mod state;
