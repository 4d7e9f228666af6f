//! Composer sessions: one wizard per admin workflow, held in memory.

mod service;
mod session;

pub use service::{ComposerError, ComposerService, ConfirmOutcome};
pub use session::{ComposerSession, ComposerSnapshot};
