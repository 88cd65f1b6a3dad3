//! Domain types shared by the controller and its adapters.
//!
//! These are pure data types with no runtime or I/O dependencies.

pub mod action;
pub mod language;
pub mod session;
pub mod transcript;

pub use action::{Answer, KioskAction, PaymentMethod, Screen};
pub use language::Language;
pub use session::{Generation, SessionSnapshot, SessionStatus, Turn};
pub use transcript::TranscriptEvent;
