//! VTE Performer implementation
//!
//! Separated from Emulator to avoid borrow checker issues

use log::trace;
use vte::Perform;

use super::attrs::{CellAttrs, PaletteColor};
use super::screen::Screen;

/// Performer that applies decoded sequences to the screen engine.
///
/// Implements the vte::Perform trait: printable text and recognized
/// control sequences become engine operations, everything else is
/// traced and dropped. Replies the application asked for (device
/// status reports) are collected in `responses` for the caller to
/// write back to the application.
pub struct EnginePerformer<'a> {
    pub screen: &'a mut Screen,
    pub responses: &'a mut Vec<Vec<u8>>,
}

fn first_param(params: &vte::Params, default: u16) -> u16 {
    params
        .iter()
        .next()
        .and_then(|p| p.first().copied())
        .unwrap_or(default)
}

fn second_param(params: &vte::Params, default: u16) -> u16 {
    params
        .iter()
        .nth(1)
        .and_then(|p| p.first().copied())
        .unwrap_or(default)
}

impl<'a> EnginePerformer<'a> {
    /// Blanks everything above the cursor, then the row start through
    /// the cursor cell.
    fn clear_to_cursor(&mut self) {
        let (row, column) = self.screen.cursor();
        for line in 0..row {
            self.screen.set_cursor_position(line, 0);
            self.screen.clear_to_end_of_line();
        }
        self.screen.set_cursor_position(row, column);
        self.screen.clear_to_beginning_of_line();
    }

    /// Blanks the whole grid without moving the cursor.
    fn clear_all(&mut self) {
        let (row, column) = self.screen.cursor();
        self.screen.set_cursor_position(0, 0);
        self.screen.clear_to_end_of_display();
        self.screen.set_cursor_position(row, column);
    }

    fn clear_line(&mut self) {
        let column = self.screen.cursor().1;
        self.screen.set_cursor_column(0);
        self.screen.clear_to_end_of_line();
        self.screen.set_cursor_column(column);
    }

    fn reset(&mut self) {
        self.screen.set_attributes(CellAttrs::empty());
        self.screen.set_foreground_color(None);
        self.screen.set_background_color(None);
        let bottom = self.screen.rows() - 1;
        self.screen.set_scroll_region(0, bottom);
        self.screen.set_cursor_position(0, 0);
        self.screen.clear_to_end_of_display();
        self.screen.set_cursor_visibility(true);
    }

    fn select_graphic_rendition(&mut self, params: &vte::Params) {
        if params.is_empty() {
            self.screen.set_attributes(CellAttrs::empty());
            self.screen.set_foreground_color(None);
            self.screen.set_background_color(None);
            return;
        }

        let groups: Vec<&[u16]> = params.iter().collect();
        let mut index = 0;
        while index < groups.len() {
            let group = groups[index];
            let code = group.first().copied().unwrap_or(0);
            match code {
                0 => {
                    self.screen.set_attributes(CellAttrs::empty());
                    self.screen.set_foreground_color(None);
                    self.screen.set_background_color(None);
                }
                1 => self.screen.add_attributes(CellAttrs::BOLD),
                2 => self.screen.add_attributes(CellAttrs::DIM),
                4 => self.screen.add_attributes(CellAttrs::UNDERLINE),
                5 | 6 => self.screen.add_attributes(CellAttrs::BLINK),
                7 => self.screen.add_attributes(CellAttrs::REVERSE),
                21 | 22 => self
                    .screen
                    .remove_attributes(CellAttrs::BOLD | CellAttrs::DIM),
                24 => self.screen.remove_attributes(CellAttrs::UNDERLINE),
                25 => self.screen.remove_attributes(CellAttrs::BLINK),
                27 => self.screen.remove_attributes(CellAttrs::REVERSE),
                30..=37 => self
                    .screen
                    .set_foreground_color(PaletteColor::from_index(code - 30)),
                39 => self.screen.set_foreground_color(None),
                40..=47 => self
                    .screen
                    .set_background_color(PaletteColor::from_index(code - 40)),
                49 => self.screen.set_background_color(None),
                38 | 48 => {
                    // Extended color select. The colon form arrives as
                    // one subparameter group; the semicolon form spills
                    // into the following groups and has to be consumed
                    // here so its payload is not misread as SGR codes.
                    if group.len() == 1 {
                        let skip = match groups.get(index + 1).and_then(|g| g.first().copied()) {
                            Some(5) => 2,
                            Some(2) => 4,
                            _ => 0,
                        };
                        index += skip;
                    }
                    trace!("Ignoring extended color SGR {}", code);
                }
                _ => {
                    trace!("Unhandled SGR parameter: {}", code);
                }
            }
            index += 1;
        }
    }

    fn dispatch_csi(&mut self, params: &vte::Params, action: char) {
        match action {
            // Cursor movement commands
            'H' | 'f' => {
                let row = first_param(params, 1).saturating_sub(1) as u32;
                let col = second_param(params, 1).saturating_sub(1) as u32;
                self.screen.set_cursor_position(
                    row.min(self.screen.rows() - 1),
                    col.min(self.screen.columns() - 1),
                );
            }
            'A' => {
                let n = first_param(params, 1).max(1);
                self.screen.move_cursor_up(n as u32);
            }
            'B' | 'e' => {
                let n = first_param(params, 1).max(1);
                self.screen.move_cursor_down(n as u32);
            }
            'C' | 'a' => {
                let n = first_param(params, 1).max(1);
                self.screen.move_cursor_right(n as u32);
            }
            'D' => {
                let n = first_param(params, 1).max(1);
                self.screen.move_cursor_left(n as u32);
            }
            'E' => {
                let n = first_param(params, 1).max(1);
                self.screen.move_cursor_down(n as u32);
                self.screen.set_cursor_column(0);
            }
            'F' => {
                let n = first_param(params, 1).max(1);
                self.screen.move_cursor_up(n as u32);
                self.screen.set_cursor_column(0);
            }
            'G' | '`' => {
                let col = first_param(params, 1).saturating_sub(1) as u32;
                self.screen
                    .set_cursor_column(col.min(self.screen.columns() - 1));
            }
            'd' => {
                let row = first_param(params, 1).saturating_sub(1) as u32;
                self.screen.set_cursor_row(row.min(self.screen.rows() - 1));
            }
            'I' => {
                let n = first_param(params, 1).max(1);
                for _ in 0..n {
                    self.screen.tab_forward();
                }
            }
            'Z' => {
                let n = first_param(params, 1).max(1);
                for _ in 0..n {
                    self.screen.tab_backward();
                }
            }

            // Erase commands
            'J' => match first_param(params, 0) {
                0 => self.screen.clear_to_end_of_display(),
                1 => self.clear_to_cursor(),
                2 | 3 => self.clear_all(),
                mode => trace!("Unhandled display erase mode: {}", mode),
            },
            'K' => match first_param(params, 0) {
                0 => self.screen.clear_to_end_of_line(),
                1 => self.screen.clear_to_beginning_of_line(),
                2 => self.clear_line(),
                mode => trace!("Unhandled line erase mode: {}", mode),
            },

            // Scrolling
            'S' => {
                let n = first_param(params, 1).max(1);
                self.screen.scroll_forward(n as u32);
            }
            'T' => {
                let n = first_param(params, 1).max(1);
                self.screen.scroll_backward(n as u32);
            }

            // Line and character editing
            'L' => {
                let n = first_param(params, 1).max(1);
                self.screen.insert_lines(n as u32);
            }
            'M' => {
                let n = first_param(params, 1).max(1);
                self.screen.delete_lines(n as u32);
            }
            '@' => {
                let n = first_param(params, 1).max(1);
                self.screen.insert_characters(n as u32);
            }
            'P' => {
                let n = first_param(params, 1).max(1);
                self.screen.delete_characters(n as u32);
            }
            'X' => {
                let n = first_param(params, 1).max(1);
                self.screen.erase_characters(n as u32);
            }

            // Set scroll region (DECSTBM) - CSI top;bottom r
            'r' => {
                let rows = self.screen.rows();
                let top = first_param(params, 1).max(1) as u32;
                let mut bottom = second_param(params, 0) as u32;
                if bottom == 0 {
                    bottom = rows;
                }
                if top < bottom && bottom <= rows {
                    self.screen.set_scroll_region(top - 1, bottom - 1);
                    self.screen.set_cursor_position(0, 0);
                } else {
                    trace!("Rejecting scroll region {};{}", top, bottom);
                }
            }

            'm' => self.select_graphic_rendition(params),

            // Device status report - the application expects a reply
            'n' => match first_param(params, 0) {
                5 => self.responses.push(b"\x1b[0n".to_vec()),
                6 => {
                    let (row, column) = self.screen.cursor();
                    self.responses
                        .push(format!("\x1b[{};{}R", row + 1, column + 1).into_bytes());
                }
                code => trace!("Unhandled status report: {}", code),
            },

            's' => self.screen.save_cursor_position(),
            'u' => self.screen.restore_cursor_position(),

            _ => {
                trace!("Unhandled CSI: {} with {:?}", action, params);
            }
        }
    }

    fn dispatch_private_mode(&mut self, params: &vte::Params, enable: bool) {
        for group in params.iter() {
            match group.first().copied().unwrap_or(0) {
                25 => self.screen.set_cursor_visibility(enable),
                // Autowrap is managed internally and stays on.
                7 => trace!("Ignoring autowrap mode change"),
                mode => trace!("Unhandled private mode ?{} ({})", mode, enable),
            }
        }
    }
}

impl<'a> Perform for EnginePerformer<'a> {
    fn print(&mut self, c: char) {
        self.screen.add_character(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\x08' => self.screen.move_cursor_left(1),
            b'\t' => self.screen.tab_forward(),
            b'\n' | b'\x0b' | b'\x0c' => self.screen.move_down_1(),
            b'\r' => self.screen.set_cursor_column(0),
            b'\x07' => {}
            _ => {
                trace!("Unhandled execute: 0x{:02x}", byte);
            }
        }
    }

    fn csi_dispatch(
        &mut self,
        params: &vte::Params,
        intermediates: &[u8],
        _ignore: bool,
        action: char,
    ) {
        match (intermediates.first(), action) {
            (None, action) => self.dispatch_csi(params, action),
            (Some(b'?'), 'h') => self.dispatch_private_mode(params, true),
            (Some(b'?'), 'l') => self.dispatch_private_mode(params, false),
            (Some(_), _) => {
                trace!("Unhandled CSI {:?} {}", intermediates, action);
            }
        }
    }

    fn hook(&mut self, _params: &vte::Params, _intermediates: &[u8], _ignore: bool, _action: char) {
    }
    fn put(&mut self, _byte: u8) {}
    fn unhook(&mut self) {}
    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    /// Handle ESC sequences
    ///
    /// - ESC 7 (DECSC): Save cursor position
    /// - ESC 8 (DECRC): Restore cursor position
    /// - ESC M: Reverse index (move up, scroll backward at region top)
    /// - ESC D: Index (move down, scroll forward at region bottom)
    /// - ESC E: Next line (CR + LF)
    /// - ESC c: Full reset
    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        // Sequences with intermediates (like ESC # 8 for DECALN) are
        // not supported.
        if !intermediates.is_empty() {
            trace!("ESC with intermediates {:?} byte {}", intermediates, byte);
            return;
        }

        match byte {
            b'7' => self.screen.save_cursor_position(),
            b'8' => self.screen.restore_cursor_position(),
            b'M' => self.screen.move_up_1(),
            b'D' => self.screen.move_down_1(),
            b'E' => {
                self.screen.set_cursor_column(0);
                self.screen.move_down_1();
            }
            b'c' => self.reset(),
            _ => {
                trace!("Unhandled ESC: 0x{:02x} ('{}')", byte, byte as char);
            }
        }
    }
}
