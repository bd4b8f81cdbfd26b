//! ttymirror - terminal session mirror for assistive readers
//!
//! Runs a program inside a pseudo-terminal, replays its output on the
//! hosting terminal, and mirrors every character cell (glyph, colors,
//! attributes) plus the cursor into a shared-memory screen segment that
//! independent reader processes (braille/speech clients) can attach to.
//! A message channel notifies readers of updates and carries injected
//! input back into the captured program.

pub mod channel;
pub mod error;
pub mod key;
pub mod segment;
pub mod session;
pub mod terminal;

pub use error::{MirrorError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = "ttymirror";
