//! Domain types for VENOM.

pub mod bar;
pub mod session;
pub mod signal;

pub use bar::{Bar, BarError};
pub use session::Session;
pub use signal::{Direction, Signal, StrengthTier};
