//! Shared test support
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use ttymirror::terminal::{CellAttrs, PaletteColor, TermDriver};
use ttymirror::Result;

/// One recorded driver call.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverOp {
    Begin,
    End,
    Present,
    MoveTo(u32, u32),
    SetScrollRegion(u32, u32),
    ScrollUp(u32),
    ScrollDown(u32),
    SetRendition(CellAttrs, Option<PaletteColor>, Option<PaletteColor>),
    PutChar(char),
    InsertChars(u32),
    DeleteChars(u32),
    EraseChars(u32),
    ClearToEndOfLine,
    ClearToBeginningOfLine,
    ClearToEndOfDisplay,
    SetCursorVisibility(bool),
}

/// Driver that records every call it receives, for asserting on the
/// host-facing half of engine operations.
pub struct RecordingDriver {
    ops: Arc<Mutex<Vec<DriverOp>>>,
}

impl RecordingDriver {
    /// Returns the driver and a shared handle to its call log.
    pub fn new() -> (Self, Arc<Mutex<Vec<DriverOp>>>) {
        let ops = Arc::new(Mutex::new(Vec::new()));
        let driver = Self {
            ops: Arc::clone(&ops),
        };
        (driver, ops)
    }

    fn record(&self, op: DriverOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl TermDriver for RecordingDriver {
    fn begin(&mut self) -> Result<()> {
        self.record(DriverOp::Begin);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.record(DriverOp::End);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.record(DriverOp::Present);
        Ok(())
    }

    fn move_to(&mut self, row: u32, column: u32) {
        self.record(DriverOp::MoveTo(row, column));
    }

    fn set_scroll_region(&mut self, top: u32, bottom: u32) {
        self.record(DriverOp::SetScrollRegion(top, bottom));
    }

    fn scroll_up(&mut self, count: u32) {
        self.record(DriverOp::ScrollUp(count));
    }

    fn scroll_down(&mut self, count: u32) {
        self.record(DriverOp::ScrollDown(count));
    }

    fn set_rendition(
        &mut self,
        attrs: CellAttrs,
        foreground: Option<PaletteColor>,
        background: Option<PaletteColor>,
    ) {
        self.record(DriverOp::SetRendition(attrs, foreground, background));
    }

    fn put_char(&mut self, ch: char) {
        self.record(DriverOp::PutChar(ch));
    }

    fn insert_chars(&mut self, count: u32) {
        self.record(DriverOp::InsertChars(count));
    }

    fn delete_chars(&mut self, count: u32) {
        self.record(DriverOp::DeleteChars(count));
    }

    fn erase_chars(&mut self, count: u32) {
        self.record(DriverOp::EraseChars(count));
    }

    fn clear_to_end_of_line(&mut self) {
        self.record(DriverOp::ClearToEndOfLine);
    }

    fn clear_to_beginning_of_line(&mut self) {
        self.record(DriverOp::ClearToBeginningOfLine);
    }

    fn clear_to_end_of_display(&mut self) {
        self.record(DriverOp::ClearToEndOfDisplay);
    }

    fn set_cursor_visibility(&mut self, visible: bool) {
        self.record(DriverOp::SetCursorVisibility(visible));
    }
}
