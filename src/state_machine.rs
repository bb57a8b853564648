//! Intake flow state machine
//!
//! Elm-style: a pure transition function from (state, store, event) to
//! (state, effects). The runtime applies the effects.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;


pub use effect::Effect;
pub use event::Event;
pub use state::{ControlFlags, FlowContext, FlowState};
pub use transition::transition;
