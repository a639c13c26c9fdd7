//! d20 state machine driver
//!
//! States form a closed enum. The active state is fed one event at a time
//! and either stays or hands back its successor, which replaces it in
//! place after the exit/enter hooks have run.

use crate::error::Result;

use super::context::Context;
use super::state::{
    AcChargeLoop, AcChargeParameterDiscovery, Authorization, AuthorizationSetup, DcCableCheck, DcChargeLoop,
    DcChargeParameterDiscovery, DcPreCharge, DcWeldingDetection, PowerDelivery, ScheduleExchange,
    ServiceDetail, ServiceDiscovery, ServiceSelection, SessionSetup, SessionStop, SupportedAppProtocol,
};

/// Input fed to the active state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A decoded request is waiting in the message exchange
    V2gtpMessage,
    /// A control event is installed in the context
    ControlMessage,
}

/// Outcome of feeding an event
#[derive(Debug)]
pub enum Transition {
    Stay,
    Next(State),
}

impl Transition {
    pub fn next(state: impl Into<State>) -> Self {
        Transition::Next(state.into())
    }
}

/// Behaviour shared by every state
pub trait Handler {
    fn name(&self) -> &'static str;

    fn enter(&mut self, ctx: &mut Context) {
        ctx.log.enter_state(self.name());
    }

    fn feed(&mut self, ctx: &mut Context, ev: Event) -> Result<Transition>;

    fn leave(&mut self, _ctx: &mut Context) {}
}

macro_rules! states {
    ($($variant:ident),* $(,)?) => {
        /// Protocol phase with its phase-local scratch data
        #[derive(Debug)]
        pub enum State {
            $($variant($variant),)*
        }

        $(
            impl From<$variant> for State {
                fn from(s: $variant) -> Self {
                    State::$variant(s)
                }
            }
        )*

        impl State {
            fn handler(&mut self) -> &mut dyn Handler {
                match self {
                    $(State::$variant(s) => s,)*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(State::$variant(s) => s.name(),)*
                }
            }
        }
    };
}

states! {
    SupportedAppProtocol,
    SessionSetup,
    AuthorizationSetup,
    Authorization,
    ServiceDiscovery,
    ServiceDetail,
    ServiceSelection,
    DcChargeParameterDiscovery,
    AcChargeParameterDiscovery,
    ScheduleExchange,
    DcCableCheck,
    DcPreCharge,
    PowerDelivery,
    DcChargeLoop,
    AcChargeLoop,
    DcWeldingDetection,
    SessionStop,
}

pub struct Fsm {
    current: State,
}

impl Fsm {
    /// Start the machine in `initial`, running its enter hook
    pub fn new(initial: impl Into<State>, ctx: &mut Context) -> Self {
        let mut current = initial.into();
        current.handler().enter(ctx);
        Self { current }
    }

    /// Feed one event; returns whether the state changed
    pub fn handle_event(&mut self, ctx: &mut Context, ev: Event) -> Result<bool> {
        match self.current.handler().feed(ctx, ev)? {
            Transition::Stay => Ok(false),
            Transition::Next(mut next) => {
                self.current.handler().leave(ctx);
                next.handler().enter(ctx);
                self.current = next;
                Ok(true)
            }
        }
    }

    pub fn current(&self) -> &State {
        &self.current
    }

    pub fn current_name(&self) -> &'static str {
        self.current.name()
    }
}
