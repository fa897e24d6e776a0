//! Shared state types read by the display layer.
//!
//! The driver is the only writer of these; everything outside it works on
//! copies obtained from a [`Snapshot`].

mod arm;
mod state;

pub use arm::*;
pub use state::*;
