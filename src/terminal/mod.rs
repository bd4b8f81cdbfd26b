//! Terminal emulation, host drivers and PTY management

pub mod attrs;
pub mod driver;
pub mod pty;
pub mod emulator;
pub mod screen;
pub mod util;
mod performer;

pub use attrs::{CellAttrs, PaletteColor};
pub use driver::{AnsiDriver, NullDriver, TermDriver};
pub use pty::{Pty, PtyWriter};
pub use emulator::Emulator;
pub use screen::{Screen, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND};
pub use util::{get_terminal_size, is_tty, restore_termios, set_raw_mode};
