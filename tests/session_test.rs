//! Capture session end-to-end tests
//!
//! Run a real program inside a PTY with a NullDriver and verify the
//! external contract: the segment appears under the derived key, the
//! program's output lands in the mirrored cells, injected input
//! reaches the program, and teardown removes everything.

use std::time::{Duration, Instant};

use ttymirror::channel::{MessageChannel, MessageKind};
use ttymirror::segment::ScreenSegment;
use ttymirror::session::CaptureSession;
use ttymirror::terminal::{NullDriver, Pty};
use ttymirror::MirrorError;

const COLS: u16 = 40;
const ROWS: u16 = 10;

fn begin(program: Vec<&str>) -> CaptureSession {
    let program = program.into_iter().map(String::from).collect();
    let pty = Pty::new(Some(program), ROWS, COLS).expect("PTY spawn failed");
    CaptureSession::begin(pty, Box::new(NullDriver), COLS, ROWS).expect("session begin failed")
}

/// Pumps captured output through the session until `predicate` holds
/// on the mirrored screen or the deadline passes.
fn pump_until<F>(session: &mut CaptureSession, predicate: F) -> bool
where
    F: Fn(&ScreenSegment) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut buf = [0u8; 4096];
    while Instant::now() < deadline {
        if predicate(session.screen().segment()) {
            return true;
        }
        match session.read_output(&mut buf) {
            Ok(0) => break,
            Ok(n) => session.process_output(&buf[..n]).expect("process failed"),
            // The master reports an error once the child is gone.
            Err(_) => break,
        }
    }
    predicate(session.screen().segment())
}

fn screen_contains(segment: &ScreenSegment, needle: &str) -> bool {
    (0..segment.rows()).any(|row| segment.row_text(row).contains(needle))
}

#[test]
fn test_program_output_reaches_the_segment() {
    let mut session = begin(vec!["/bin/sh", "-c", "printf 'mirrored-ok'"]);
    let key = session.key().clone();

    assert!(
        pump_until(&mut session, |segment| screen_contains(
            segment,
            "mirrored-ok"
        )),
        "program output never appeared in the segment"
    );

    // An independent attach by the same key sees the same content.
    let reader = ScreenSegment::attach(&key).expect("reader attach failed");
    assert!(screen_contains(&reader, "mirrored-ok"));
    drop(reader);

    session.end();
    match ScreenSegment::attach(&key) {
        Err(MirrorError::NotFound(_)) => {}
        other => panic!("segment survived teardown: {:?}", other.err()),
    }
    match MessageChannel::attach(&key) {
        Err(MirrorError::NotFound(_)) => {}
        other => panic!("channel survived teardown: {:?}", other.err()),
    }
}

#[test]
fn test_injected_input_reaches_the_program() {
    // cat copies its input back out, so injected bytes come around
    // through the emulation layer into the segment.
    let mut session = begin(vec!["cat"]);
    let key = session.key().clone();

    let client = MessageChannel::attach(&key).expect("client attach failed");
    client
        .send(MessageKind::Input, b"ping\r")
        .expect("input injection failed");

    assert!(
        pump_until(&mut session, |segment| screen_contains(segment, "ping")),
        "injected input never echoed into the segment"
    );

    drop(client);
    session.end();
}

#[test]
fn test_keyboard_input_reaches_the_program() {
    let mut session = begin(vec!["cat"]);

    session.write_input(b"typed\r").expect("write_input failed");

    assert!(
        pump_until(&mut session, |segment| screen_contains(segment, "typed")),
        "keyboard input never echoed into the segment"
    );

    session.end();
}

#[test]
fn test_session_drop_tears_down() {
    let session = begin(vec!["/bin/sh", "-c", "sleep 30"]);
    let key = session.key().clone();

    ScreenSegment::attach(&key).expect("segment missing while session lives");
    drop(session);

    match ScreenSegment::attach(&key) {
        Err(MirrorError::NotFound(_)) => {}
        other => panic!("segment survived drop: {:?}", other.err()),
    }
}

#[test]
fn test_segment_geometry_matches_the_terminal() {
    let session = begin(vec!["/bin/sh", "-c", "sleep 30"]);
    let reader = ScreenSegment::attach(session.key()).expect("attach failed");
    assert_eq!(reader.columns(), COLS as u32);
    assert_eq!(reader.rows(), ROWS as u32);
    drop(reader);
    session.end();
}
