//! Host terminal drivers.
//!
//! Every screen operation is forwarded to a [`TermDriver`] so the host
//! terminal replays what the captured application drew. Output is
//! queued into an internal buffer and written out in one batch by
//! `present`, keeping partial updates off the wire.

use std::io::{self, Write};

use crossterm::{
    cursor::{Hide, MoveTo, Show},
    queue,
    style::{Attribute, Color, Print, SetAttribute, SetBackgroundColor, SetForegroundColor},
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen, ScrollDown, ScrollUp},
};
use unicode_width::UnicodeWidthChar;

use crate::error::Result;
use crate::terminal::attrs::{CellAttrs, PaletteColor};

/// Rendering backend for the host terminal.
///
/// Drawing operations are infallible: they queue work that only hits
/// the host on `present`. The lifecycle calls and `present` report
/// real I/O failures.
pub trait TermDriver: Send {
    /// Takes over the host terminal. Must be called before any
    /// drawing operation.
    fn begin(&mut self) -> Result<()>;

    /// Restores the host terminal to its pre-`begin` state.
    fn end(&mut self) -> Result<()>;

    /// Flushes all queued drawing to the host.
    fn present(&mut self) -> Result<()>;

    fn move_to(&mut self, row: u32, column: u32);

    /// Sets the scroll region to the inclusive row range `top..=bottom`.
    fn set_scroll_region(&mut self, top: u32, bottom: u32);

    /// Scrolls the region content up, opening blank rows at the bottom.
    fn scroll_up(&mut self, count: u32);

    /// Scrolls the region content down, opening blank rows at the top.
    fn scroll_down(&mut self, count: u32);

    fn set_rendition(
        &mut self,
        attrs: CellAttrs,
        foreground: Option<PaletteColor>,
        background: Option<PaletteColor>,
    );

    fn put_char(&mut self, ch: char);

    fn insert_chars(&mut self, count: u32);

    fn delete_chars(&mut self, count: u32);

    fn erase_chars(&mut self, count: u32);

    fn clear_to_end_of_line(&mut self);

    fn clear_to_beginning_of_line(&mut self);

    fn clear_to_end_of_display(&mut self);

    fn set_cursor_visibility(&mut self, visible: bool);
}

/// Driver that emits ANSI sequences to a writer, normally stdout.
///
/// The driver disables host autowrap while active so cursor motion
/// stays fully under caller control, and tracks the cursor itself to
/// re-home it after sequences with positioning side effects.
pub struct AnsiDriver<W: Write> {
    out: W,
    buf: Vec<u8>,
    row: u32,
    column: u32,
}

impl AnsiDriver<io::Stdout> {
    pub fn stdout() -> Self {
        AnsiDriver::new(io::stdout())
    }
}

impl<W: Write> AnsiDriver<W> {
    pub fn new(out: W) -> Self {
        AnsiDriver {
            out,
            buf: Vec::with_capacity(4096),
            row: 0,
            column: 0,
        }
    }

    // Queueing into a Vec cannot fail, so command errors are dropped.
    fn raw(&mut self, sequence: &str) {
        self.buf.extend_from_slice(sequence.as_bytes());
    }

    fn flush_now(&mut self) -> Result<()> {
        self.out.write_all(&self.buf)?;
        self.out.flush()?;
        self.buf.clear();
        Ok(())
    }
}

fn palette_to_host(color: PaletteColor) -> Color {
    match color {
        PaletteColor::Black => Color::Black,
        PaletteColor::Red => Color::DarkRed,
        PaletteColor::Green => Color::DarkGreen,
        PaletteColor::Yellow => Color::DarkYellow,
        PaletteColor::Blue => Color::DarkBlue,
        PaletteColor::Magenta => Color::DarkMagenta,
        PaletteColor::Cyan => Color::DarkCyan,
        PaletteColor::White => Color::Grey,
    }
}

impl<W: Write + Send> TermDriver for AnsiDriver<W> {
    fn begin(&mut self) -> Result<()> {
        let _ = queue!(self.buf, EnterAlternateScreen, Clear(ClearType::All), MoveTo(0, 0));
        let _ = queue!(self.buf, SetAttribute(Attribute::Reset));
        // Autowrap off: the emulation layer wraps eagerly on its own.
        self.raw("\x1b[?7l");
        self.row = 0;
        self.column = 0;
        self.flush_now()
    }

    fn end(&mut self) -> Result<()> {
        let _ = queue!(self.buf, SetAttribute(Attribute::Reset), Show);
        self.raw("\x1b[r");
        self.raw("\x1b[?7h");
        let _ = queue!(self.buf, LeaveAlternateScreen);
        self.flush_now()
    }

    fn present(&mut self) -> Result<()> {
        self.flush_now()
    }

    fn move_to(&mut self, row: u32, column: u32) {
        let _ = queue!(self.buf, MoveTo(column as u16, row as u16));
        self.row = row;
        self.column = column;
    }

    fn set_scroll_region(&mut self, top: u32, bottom: u32) {
        self.raw(&format!("\x1b[{};{}r", top + 1, bottom + 1));
        // DECSTBM homes the cursor; put it back where the caller left it.
        let _ = queue!(self.buf, MoveTo(self.column as u16, self.row as u16));
    }

    fn scroll_up(&mut self, count: u32) {
        if count > 0 {
            let _ = queue!(self.buf, ScrollUp(count as u16));
        }
    }

    fn scroll_down(&mut self, count: u32) {
        if count > 0 {
            let _ = queue!(self.buf, ScrollDown(count as u16));
        }
    }

    fn set_rendition(
        &mut self,
        attrs: CellAttrs,
        foreground: Option<PaletteColor>,
        background: Option<PaletteColor>,
    ) {
        let _ = queue!(self.buf, SetAttribute(Attribute::Reset));
        if attrs.intersects(CellAttrs::BOLD | CellAttrs::STANDOUT) {
            let _ = queue!(self.buf, SetAttribute(Attribute::Bold));
        }
        if attrs.contains(CellAttrs::DIM) {
            let _ = queue!(self.buf, SetAttribute(Attribute::Dim));
        }
        if attrs.contains(CellAttrs::UNDERLINE) {
            let _ = queue!(self.buf, SetAttribute(Attribute::Underlined));
        }
        if attrs.contains(CellAttrs::BLINK) {
            let _ = queue!(self.buf, SetAttribute(Attribute::SlowBlink));
        }
        if attrs.contains(CellAttrs::REVERSE) {
            let _ = queue!(self.buf, SetAttribute(Attribute::Reverse));
        }
        let fg = foreground.map(palette_to_host).unwrap_or(Color::Reset);
        let bg = background.map(palette_to_host).unwrap_or(Color::Reset);
        let _ = queue!(self.buf, SetForegroundColor(fg), SetBackgroundColor(bg));
    }

    fn put_char(&mut self, ch: char) {
        let _ = queue!(self.buf, Print(ch));
        self.column += ch.width().unwrap_or(1) as u32;
    }

    fn insert_chars(&mut self, count: u32) {
        if count > 0 {
            self.raw(&format!("\x1b[{}@", count));
        }
    }

    fn delete_chars(&mut self, count: u32) {
        if count > 0 {
            self.raw(&format!("\x1b[{}P", count));
        }
    }

    fn erase_chars(&mut self, count: u32) {
        if count > 0 {
            self.raw(&format!("\x1b[{}X", count));
        }
    }

    fn clear_to_end_of_line(&mut self) {
        let _ = queue!(self.buf, Clear(ClearType::UntilNewLine));
    }

    fn clear_to_beginning_of_line(&mut self) {
        self.raw("\x1b[1K");
    }

    fn clear_to_end_of_display(&mut self) {
        let _ = queue!(self.buf, Clear(ClearType::FromCursorDown));
    }

    fn set_cursor_visibility(&mut self, visible: bool) {
        if visible {
            let _ = queue!(self.buf, Show);
        } else {
            let _ = queue!(self.buf, Hide);
        }
    }
}

/// Driver that discards everything.
///
/// Used when stdout is not a terminal: the segment still mirrors the
/// session, there is just nothing to replay it on.
pub struct NullDriver;

impl TermDriver for NullDriver {
    fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        Ok(())
    }

    fn move_to(&mut self, _row: u32, _column: u32) {}

    fn set_scroll_region(&mut self, _top: u32, _bottom: u32) {}

    fn scroll_up(&mut self, _count: u32) {}

    fn scroll_down(&mut self, _count: u32) {}

    fn set_rendition(
        &mut self,
        _attrs: CellAttrs,
        _foreground: Option<PaletteColor>,
        _background: Option<PaletteColor>,
    ) {
    }

    fn put_char(&mut self, _ch: char) {}

    fn insert_chars(&mut self, _count: u32) {}

    fn delete_chars(&mut self, _count: u32) {}

    fn erase_chars(&mut self, _count: u32) {}

    fn clear_to_end_of_line(&mut self) {}

    fn clear_to_beginning_of_line(&mut self) {}

    fn clear_to_end_of_display(&mut self) {}

    fn set_cursor_visibility(&mut self, _visible: bool) {}
}
