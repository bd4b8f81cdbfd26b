//! Terminal screen engine
//!
//! Applies decoded terminal operations to two targets at once: the host
//! terminal, through a [`TermDriver`], and the shared screen segment
//! that accessibility clients read. Every cursor move, scroll and cell
//! write goes to both, so the segment always matches what the host
//! shows.

use unicode_width::UnicodeWidthChar;

use crate::error::Result;
use crate::segment::{ScreenCell, ScreenSegment, COLOR_LEVEL_BRIGHT, COLOR_LEVEL_NORMAL};
use crate::terminal::attrs::{CellAttrs, PaletteColor};
use crate::terminal::driver::TermDriver;

/// Hardware tab stop width.
const TAB_WIDTH: u32 = 8;

/// Colors in effect when the application has not selected any.
pub const DEFAULT_FOREGROUND: PaletteColor = PaletteColor::White;
pub const DEFAULT_BACKGROUND: PaletteColor = PaletteColor::Black;

/// The emulation engine's screen state.
///
/// The cursor is kept strictly inside the grid at all times; printing
/// at the last column wraps immediately instead of leaving the cursor
/// in a pending-wrap state.
pub struct Screen {
    segment: ScreenSegment,
    driver: Box<dyn TermDriver>,
    columns: u32,
    rows: u32,
    cursor_row: u32,
    cursor_column: u32,
    saved_row: u32,
    saved_column: u32,
    scroll_top: u32,
    scroll_bottom: u32,
    attrs: CellAttrs,
    foreground: Option<PaletteColor>,
    background: Option<PaletteColor>,
}

impl Screen {
    /// Wraps a segment and a driver into an engine. The scroll region
    /// starts out covering the whole grid.
    pub fn new(segment: ScreenSegment, mut driver: Box<dyn TermDriver>) -> Self {
        let columns = segment.columns();
        let rows = segment.rows();
        driver.set_rendition(CellAttrs::empty(), None, None);
        Screen {
            segment,
            driver,
            columns,
            rows,
            cursor_row: 0,
            cursor_column: 0,
            saved_row: 0,
            saved_column: 0,
            scroll_top: 0,
            scroll_bottom: rows - 1,
            attrs: CellAttrs::empty(),
            foreground: None,
            background: None,
        }
    }

    pub fn columns(&self) -> u32 {
        self.columns
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cursor(&self) -> (u32, u32) {
        (self.cursor_row, self.cursor_column)
    }

    pub fn scroll_region(&self) -> (u32, u32) {
        (self.scroll_top, self.scroll_bottom)
    }

    pub fn attributes(&self) -> CellAttrs {
        self.attrs
    }

    pub fn segment(&self) -> &ScreenSegment {
        &self.segment
    }

    /// Flushes queued host output.
    pub fn present(&mut self) -> Result<()> {
        self.driver.present()
    }

    /// Releases the host terminal.
    pub fn end(&mut self) -> Result<()> {
        self.driver.end()
    }

    fn store_cursor(&mut self) {
        self.segment.set_cursor(self.cursor_row, self.cursor_column);
    }

    /// The current rendition applied to a glyph.
    ///
    /// Reverse swaps the color roles first; bold or standout then
    /// brightens whatever ended up as the foreground, and dim halves
    /// both sides.
    fn render_cell(&self, glyph: char) -> ScreenCell {
        let mut fg_color = self.foreground.unwrap_or(DEFAULT_FOREGROUND);
        let mut bg_color = self.background.unwrap_or(DEFAULT_BACKGROUND);
        if self.attrs.contains(CellAttrs::REVERSE) {
            std::mem::swap(&mut fg_color, &mut bg_color);
        }

        let fg_level = if self.attrs.intersects(CellAttrs::BOLD | CellAttrs::STANDOUT) {
            COLOR_LEVEL_BRIGHT
        } else {
            COLOR_LEVEL_NORMAL
        };
        let mut foreground = fg_color.channels(fg_level);
        let mut background = bg_color.channels(COLOR_LEVEL_NORMAL);
        if self.attrs.contains(CellAttrs::DIM) {
            foreground = foreground.dimmed();
            background = background.dimmed();
        }

        ScreenCell {
            glyph,
            foreground,
            background,
            blink: self.attrs.contains(CellAttrs::BLINK),
            underline: self.attrs.contains(CellAttrs::UNDERLINE),
        }
    }

    /// Blank cells inherit the rendition active when they were made,
    /// so clearing under a colored background keeps that background.
    fn blank_cell(&self) -> ScreenCell {
        self.render_cell(' ')
    }

    fn fill_cells(&mut self, from: usize, to: usize) {
        let blank = self.blank_cell();
        self.segment.fill_range(from, to, &blank);
    }

    fn fill_rows(&mut self, row: u32, count: u32) {
        let from = self.segment.row_index(row);
        let to = from + (count * self.columns) as usize;
        self.fill_cells(from, to);
    }

    fn move_rows(&mut self, to: u32, from: u32, count: u32) {
        self.segment.move_range(
            self.segment.row_index(to),
            self.segment.row_index(from),
            (count * self.columns) as usize,
        );
    }

    // Cursor motion

    pub fn set_cursor_position(&mut self, row: u32, column: u32) {
        self.driver.move_to(row, column);
        self.cursor_row = row;
        self.cursor_column = column;
        self.store_cursor();
    }

    pub fn set_cursor_row(&mut self, row: u32) {
        self.set_cursor_position(row, self.cursor_column);
    }

    pub fn set_cursor_column(&mut self, column: u32) {
        self.set_cursor_position(self.cursor_row, column);
    }

    pub fn save_cursor_position(&mut self) {
        self.saved_row = self.cursor_row;
        self.saved_column = self.cursor_column;
    }

    pub fn restore_cursor_position(&mut self) {
        self.set_cursor_position(self.saved_row, self.saved_column);
    }

    pub fn move_cursor_up(&mut self, amount: u32) {
        let amount = amount.min(self.cursor_row);
        if amount > 0 {
            self.set_cursor_row(self.cursor_row - amount);
        }
    }

    pub fn move_cursor_down(&mut self, amount: u32) {
        let row = (self.cursor_row + amount).min(self.rows - 1);
        if row != self.cursor_row {
            self.set_cursor_row(row);
        }
    }

    pub fn move_cursor_left(&mut self, amount: u32) {
        let amount = amount.min(self.cursor_column);
        if amount > 0 {
            self.set_cursor_column(self.cursor_column - amount);
        }
    }

    pub fn move_cursor_right(&mut self, amount: u32) {
        let column = (self.cursor_column + amount).min(self.columns - 1);
        if column != self.cursor_column {
            self.set_cursor_column(column);
        }
    }

    /// Up one row; scrolls backward instead when the cursor sits on
    /// the scroll region's top row.
    pub fn move_up_1(&mut self) {
        if self.cursor_row == self.scroll_top {
            self.scroll_backward(1);
        } else {
            self.move_cursor_up(1);
        }
    }

    /// Down one row; scrolls forward instead when the cursor sits on
    /// the scroll region's bottom row.
    pub fn move_down_1(&mut self) {
        if self.cursor_row == self.scroll_bottom {
            self.scroll_forward(1);
        } else {
            self.move_cursor_down(1);
        }
    }

    pub fn tab_forward(&mut self) {
        let stop = ((self.cursor_column / TAB_WIDTH) + 1) * TAB_WIDTH;
        self.set_cursor_column(stop.min(self.columns - 1));
    }

    pub fn tab_backward(&mut self) {
        let stop = if self.cursor_column == 0 {
            0
        } else {
            ((self.cursor_column - 1) / TAB_WIDTH) * TAB_WIDTH
        };
        self.set_cursor_column(stop);
    }

    // Scrolling

    /// Sets the scroll region to the inclusive row range `top..=bottom`.
    /// The caller validates the bounds; the cursor does not move.
    pub fn set_scroll_region(&mut self, top: u32, bottom: u32) {
        self.driver.set_scroll_region(top, bottom);
        self.scroll_top = top;
        self.scroll_bottom = bottom;
    }

    /// Moves region content up `count` rows; the bottom `count` rows
    /// become blank.
    pub fn scroll_forward(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        let size = self.scroll_bottom - self.scroll_top + 1;
        let count = count.min(size);
        self.driver.scroll_up(count);
        self.move_rows(self.scroll_top, self.scroll_top + count, size - count);
        self.fill_rows(self.scroll_bottom + 1 - count, count);
    }

    /// Moves region content down `count` rows; the top `count` rows
    /// become blank.
    pub fn scroll_backward(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        let size = self.scroll_bottom - self.scroll_top + 1;
        let count = count.min(size);
        self.driver.scroll_down(count);
        self.move_rows(self.scroll_top + count, self.scroll_top, size - count);
        self.fill_rows(self.scroll_top, count);
    }

    // Line editing

    /// Opens `count` blank rows at the cursor, pushing rows below it
    /// toward the region bottom. Ignored when the cursor is outside
    /// the scroll region.
    pub fn insert_lines(&mut self, count: u32) {
        if self.cursor_row >= self.scroll_top && self.cursor_row <= self.scroll_bottom {
            let old_top = self.scroll_top;
            self.set_scroll_region(self.cursor_row, self.scroll_bottom);
            self.scroll_backward(count);
            self.set_scroll_region(old_top, self.scroll_bottom);
        }
    }

    /// Removes `count` rows at the cursor, pulling rows below it up
    /// and opening blanks at the region bottom. Ignored when the
    /// cursor is outside the scroll region.
    pub fn delete_lines(&mut self, count: u32) {
        if self.cursor_row >= self.scroll_top && self.cursor_row <= self.scroll_bottom {
            let old_top = self.scroll_top;
            self.set_scroll_region(self.cursor_row, self.scroll_bottom);
            self.scroll_forward(count);
            self.set_scroll_region(old_top, self.scroll_bottom);
        }
    }

    // Character editing

    /// Shifts the rest of the row right and opens `count` blank cells
    /// at the cursor. Cells pushed past the row end are lost.
    pub fn insert_characters(&mut self, count: u32) {
        let from = self.segment.cell_index(self.cursor_row, self.cursor_column);
        let row_end = self.segment.row_end(self.cursor_row);
        let count = (count as usize).min(row_end - from);
        if count == 0 {
            return;
        }
        self.driver.insert_chars(count as u32);
        self.segment.move_range(from + count, from, row_end - from - count);
        self.fill_cells(from, from + count);
    }

    /// Removes `count` cells at the cursor, pulling the rest of the
    /// row left and blanking the row's tail.
    pub fn delete_characters(&mut self, count: u32) {
        let to = self.segment.cell_index(self.cursor_row, self.cursor_column);
        let row_end = self.segment.row_end(self.cursor_row);
        let count = (count as usize).min(row_end - to);
        if count == 0 {
            return;
        }
        self.driver.delete_chars(count as u32);
        self.segment.move_range(to, to + count, row_end - to - count);
        self.fill_cells(row_end - count, row_end);
    }

    /// Blanks `count` cells starting at the cursor without moving
    /// anything, cursor included.
    pub fn erase_characters(&mut self, count: u32) {
        let from = self.segment.cell_index(self.cursor_row, self.cursor_column);
        let row_end = self.segment.row_end(self.cursor_row);
        let count = (count as usize).min(row_end - from);
        if count == 0 {
            return;
        }
        self.driver.erase_chars(count as u32);
        self.fill_cells(from, from + count);
    }

    /// Writes one glyph at the cursor and advances it, wrapping to the
    /// next row (scrolling at the region bottom) when the row is full.
    pub fn add_character(&mut self, ch: char) {
        let width = ch.width().unwrap_or(1) as u32;
        if width == 0 {
            // Combining mark: the host merges it into the previous
            // glyph; the segment keeps the base character only.
            self.driver.put_char(ch);
            return;
        }

        let row = self.cursor_row;
        let column = self.cursor_column;
        self.driver.put_char(ch);

        let index = self.segment.cell_index(row, column);
        let cell = self.render_cell(ch);
        self.segment.write_cell(index, &cell);
        if width > 1 && column + 1 < self.columns {
            let spacer = self.blank_cell();
            self.segment.write_cell(index + 1, &spacer);
        }

        let next = column + width;
        if next < self.columns {
            self.cursor_column = next;
            self.store_cursor();
        } else {
            self.set_cursor_column(0);
            self.move_down_1();
        }
    }

    // Clearing

    pub fn clear_to_end_of_line(&mut self) {
        self.driver.clear_to_end_of_line();
        let from = self.segment.cell_index(self.cursor_row, self.cursor_column);
        let to = self.segment.row_end(self.cursor_row);
        self.fill_cells(from, to);
    }

    /// Blanks from the start of the row through the cursor cell.
    pub fn clear_to_beginning_of_line(&mut self) {
        self.driver.clear_to_beginning_of_line();
        let from = self.segment.row_index(self.cursor_row);
        let to = self.segment.cell_index(self.cursor_row, self.cursor_column) + 1;
        self.fill_cells(from, to);
    }

    pub fn clear_to_end_of_display(&mut self) {
        self.driver.clear_to_end_of_display();
        let from = self.segment.cell_index(self.cursor_row, self.cursor_column);
        let to = self.segment.end_index();
        self.fill_cells(from, to);
    }

    // Rendition

    fn push_rendition(&mut self) {
        self.driver.set_rendition(self.attrs, self.foreground, self.background);
    }

    pub fn set_attributes(&mut self, attrs: CellAttrs) {
        self.attrs = attrs;
        self.push_rendition();
    }

    pub fn add_attributes(&mut self, attrs: CellAttrs) {
        self.attrs |= attrs;
        self.push_rendition();
    }

    pub fn remove_attributes(&mut self, attrs: CellAttrs) {
        self.attrs -= attrs;
        self.push_rendition();
    }

    /// Selects the foreground color; `None` restores the default.
    pub fn set_foreground_color(&mut self, color: Option<PaletteColor>) {
        self.foreground = color;
        self.push_rendition();
    }

    /// Selects the background color; `None` restores the default.
    pub fn set_background_color(&mut self, color: Option<PaletteColor>) {
        self.background = color;
        self.push_rendition();
    }

    pub fn set_cursor_visibility(&mut self, visible: bool) {
        self.driver.set_cursor_visibility(visible);
    }
}
