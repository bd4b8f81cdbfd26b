//! Engine tests covering both halves of every operation: the calls
//! that reach the host driver and the cells mirrored into the segment.

mod common;

use common::{DriverOp, RecordingDriver};
use ttymirror::segment::{CellColor, ScreenSegment, COLOR_LEVEL_BRIGHT, COLOR_LEVEL_NORMAL};
use ttymirror::terminal::{CellAttrs, PaletteColor, Screen};

fn recorded_screen(
    columns: u32,
    rows: u32,
) -> (Screen, std::sync::Arc<std::sync::Mutex<Vec<DriverOp>>>) {
    let segment = ScreenSegment::private(columns, rows).unwrap();
    let (driver, ops) = RecordingDriver::new();
    let screen = Screen::new(segment, Box::new(driver));
    ops.lock().unwrap().clear();
    (screen, ops)
}

#[test]
fn test_add_character_drives_host_and_segment() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.add_character('A');

    assert_eq!(ops.lock().unwrap().as_slice(), &[DriverOp::PutChar('A')]);
    assert_eq!(screen.segment().row_text(0), "A         ");
    assert_eq!(screen.segment().cursor(), (0, 1));
}

#[test]
fn test_cursor_motion_drives_host_and_segment() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.set_cursor_position(2, 3);
    screen.move_cursor_right(4);

    assert_eq!(
        ops.lock().unwrap().as_slice(),
        &[DriverOp::MoveTo(2, 3), DriverOp::MoveTo(2, 7)]
    );
    assert_eq!(screen.segment().cursor(), (2, 7));
}

#[test]
fn test_move_up_1_on_region_top_scrolls_host_backward() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.move_up_1();

    let recorded = ops.lock().unwrap();
    assert_eq!(recorded.as_slice(), &[DriverOp::ScrollDown(1)]);
}

#[test]
fn test_move_up_1_off_region_top_moves_without_scrolling() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.set_cursor_position(2, 0);
    ops.lock().unwrap().clear();

    screen.move_up_1();

    let recorded = ops.lock().unwrap();
    assert_eq!(recorded.as_slice(), &[DriverOp::MoveTo(1, 0)]);
}

#[test]
fn test_move_down_1_on_region_bottom_scrolls_host_forward() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.set_cursor_position(3, 0);
    ops.lock().unwrap().clear();

    screen.move_down_1();

    let recorded = ops.lock().unwrap();
    assert_eq!(recorded.as_slice(), &[DriverOp::ScrollUp(1)]);
}

#[test]
fn test_insert_lines_narrows_region_and_restores_it() {
    let (mut screen, ops) = recorded_screen(10, 6);
    screen.set_cursor_position(2, 0);
    ops.lock().unwrap().clear();

    screen.insert_lines(2);

    let recorded = ops.lock().unwrap();
    assert_eq!(
        recorded.as_slice(),
        &[
            DriverOp::SetScrollRegion(2, 5),
            DriverOp::ScrollDown(2),
            DriverOp::SetScrollRegion(0, 5),
        ]
    );
    drop(recorded);
    assert_eq!(screen.scroll_region(), (0, 5));
}

#[test]
fn test_character_edits_reach_the_host() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.insert_characters(3);
    screen.delete_characters(2);
    screen.erase_characters(4);

    assert_eq!(
        ops.lock().unwrap().as_slice(),
        &[
            DriverOp::InsertChars(3),
            DriverOp::DeleteChars(2),
            DriverOp::EraseChars(4),
        ]
    );
}

#[test]
fn test_clears_reach_the_host() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.clear_to_end_of_line();
    screen.clear_to_beginning_of_line();
    screen.clear_to_end_of_display();

    assert_eq!(
        ops.lock().unwrap().as_slice(),
        &[
            DriverOp::ClearToEndOfLine,
            DriverOp::ClearToBeginningOfLine,
            DriverOp::ClearToEndOfDisplay,
        ]
    );
}

#[test]
fn test_rendition_changes_reach_the_host() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.add_attributes(CellAttrs::BOLD);
    screen.set_foreground_color(Some(PaletteColor::Green));

    assert_eq!(
        ops.lock().unwrap().as_slice(),
        &[
            DriverOp::SetRendition(CellAttrs::BOLD, None, None),
            DriverOp::SetRendition(CellAttrs::BOLD, Some(PaletteColor::Green), None),
        ]
    );
}

#[test]
fn test_cursor_visibility_passes_through() {
    let (mut screen, ops) = recorded_screen(10, 4);
    screen.set_cursor_visibility(false);
    screen.set_cursor_visibility(true);

    assert_eq!(
        ops.lock().unwrap().as_slice(),
        &[
            DriverOp::SetCursorVisibility(false),
            DriverOp::SetCursorVisibility(true),
        ]
    );
}

#[test]
fn test_wrap_emits_column_reset_then_row_advance() {
    let (mut screen, ops) = recorded_screen(3, 4);
    screen.add_character('a');
    screen.add_character('b');
    ops.lock().unwrap().clear();

    screen.add_character('c');

    let recorded = ops.lock().unwrap();
    assert_eq!(
        recorded.as_slice(),
        &[
            DriverOp::PutChar('c'),
            DriverOp::MoveTo(0, 0),
            DriverOp::MoveTo(1, 0),
        ]
    );
    drop(recorded);
    assert_eq!(screen.segment().row_text(0), "abc");
    assert_eq!(screen.cursor(), (1, 0));
}

#[test]
fn test_reverse_bold_cell_lands_swapped_and_brightened() {
    let (mut screen, _ops) = recorded_screen(80, 24);
    screen.set_foreground_color(Some(PaletteColor::Red));
    screen.set_background_color(Some(PaletteColor::Blue));
    screen.set_attributes(CellAttrs::REVERSE | CellAttrs::BOLD);

    screen.add_character('x');

    // The pre-swap background (blue) took the foreground role and the
    // brightening applies to it; the pre-swap foreground (red) lands
    // in the background field at base intensity.
    let cell = screen.segment().read_cell(0);
    assert_eq!(cell.foreground, CellColor::new(0, 0, COLOR_LEVEL_BRIGHT));
    assert_eq!(cell.background, CellColor::new(COLOR_LEVEL_NORMAL, 0, 0));
}

#[test]
fn test_scroll_forward_mirrors_what_the_host_scrolls() {
    let (mut screen, ops) = recorded_screen(4, 3);
    for ch in "abcd".chars() {
        screen.add_character(ch);
    }
    ops.lock().unwrap().clear();

    screen.scroll_forward(1);

    assert_eq!(ops.lock().unwrap().as_slice(), &[DriverOp::ScrollUp(1)]);
    assert_eq!(screen.segment().row_text(0), "    ");
}
