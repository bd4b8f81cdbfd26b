//! ttymirror main entry point
//!
//! The relay loop monitors three sources:
//! 1. stdin (user keyboard input) - passed to the captured program
//! 2. PTY output (program output) - mirrored into the segment and
//!    replayed on the host terminal
//! 3. Signals (SIGWINCH noted, SIGTERM requests shutdown)

use anyhow::Context;
use log::{debug, error, info, warn};
use mio::{Events, Interest, Poll, Token};
use nix::libc;
use nix::sys::signal::{self, SigHandler, Signal};
use std::io::{self, Read};
use std::os::unix::io::{AsRawFd, RawFd};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use ttymirror::session::CaptureSession;
use ttymirror::terminal::{
    get_terminal_size, is_tty, restore_termios, set_raw_mode, AnsiDriver, NullDriver, Pty,
    TermDriver,
};
use ttymirror::MirrorError;

/// Token for stdin in mio poll
const STDIN: Token = Token(0);
/// Token for PTY in mio poll
const PTY: Token = Token(1);

/// Global flag set by SIGWINCH handler
static RESIZE_PENDING: AtomicBool = AtomicBool::new(false);
/// Global flag set by SIGTERM handler
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigwinch(_: libc::c_int) {
    RESIZE_PENDING.store(true, Ordering::Relaxed);
}

extern "C" fn handle_sigterm(_: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

fn main() {
    // Parse command line arguments: our flags come first, everything
    // after them (or after --) is the program to capture.
    let mut debug_mode = false;
    let mut program: Vec<String> = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--debug" | "-d" if program.is_empty() => debug_mode = true,
            "--" if program.is_empty() => {
                program.extend(args);
                break;
            }
            _ => program.push(arg),
        }
    }

    if debug_mode {
        // Debug mode: write to ttymirror.log. Stderr belongs to the
        // mirrored display, so it cannot carry log output.
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open("ttymirror.log")
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!(
                    "Warning: Failed to open ttymirror.log for debug logging: {}",
                    e
                );
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "ttymirror version {} starting (debug mode, logging to ttymirror.log)",
            ttymirror::VERSION
        );
    } else {
        // Normal mode: minimal logging to stderr, only errors
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Error)
            .init();
    }

    let program = if program.is_empty() { None } else { Some(program) };

    if let Err(e) = run(program) {
        error!("Fatal error: {:#}", e);
        eprintln!("ttymirror: {:#}", e);
        process::exit(1);
    }
}

fn run(program: Option<Vec<String>>) -> anyhow::Result<()> {
    debug!("Initializing ttymirror");

    // The mirror sits on an interactive terminal; nothing to capture
    // otherwise.
    let stdin_fd = io::stdin().as_raw_fd();
    if !is_tty(stdin_fd) {
        eprintln!("Error: ttymirror requires an interactive terminal (stdin is not a TTY)");
        eprintln!("Usage: run ttymirror directly in a terminal, not through pipes or redirects");
        process::exit(1);
    }

    // Raw mode lets every keystroke reach the captured program.
    let original_termios = set_raw_mode(stdin_fd)?;
    let _guard = TermiosGuard {
        fd: stdin_fd,
        termios: original_termios,
    };

    let (cols, rows) = get_terminal_size(stdin_fd)?;
    let (cols, rows) = if cols == 0 || rows == 0 {
        (80, 24)
    } else {
        (cols, rows)
    };
    info!("Terminal size: {}x{}", cols, rows);

    let pty = Pty::new(program, rows, cols).context("starting the captured program")?;

    let stdout_fd = io::stdout().as_raw_fd();
    let driver: Box<dyn TermDriver> = if is_tty(stdout_fd) {
        Box::new(AnsiDriver::stdout())
    } else {
        warn!("stdout is not a terminal; output will not be replayed");
        Box::new(NullDriver)
    };

    let mut session =
        CaptureSession::begin(pty, driver, cols, rows).context("bringing up the capture session")?;
    let pty_fd = session.pty_fd();

    unsafe {
        signal::signal(Signal::SIGWINCH, SigHandler::Handler(handle_sigwinch))
            .context("setting SIGWINCH handler")?;
        signal::signal(Signal::SIGTERM, SigHandler::Handler(handle_sigterm))
            .context("setting SIGTERM handler")?;
    }

    let mut poll = Poll::new()?;
    let mut events = Events::with_capacity(128);

    let mut stdin_source = mio::unix::SourceFd(&stdin_fd);
    poll.registry()
        .register(&mut stdin_source, STDIN, Interest::READABLE)?;
    let mut pty_source = mio::unix::SourceFd(&pty_fd);
    poll.registry()
        .register(&mut pty_source, PTY, Interest::READABLE)?;

    info!("ttymirror ready - entering relay loop");

    let timeout = Some(std::time::Duration::from_millis(100));
    'relay: loop {
        if SHUTDOWN.swap(false, Ordering::Relaxed) {
            info!("Termination requested");
            break;
        }

        if RESIZE_PENDING.swap(false, Ordering::Relaxed) {
            // The mirrored geometry is fixed for the session lifetime;
            // clients attached to the segment rely on it not changing.
            warn!(
                "Host terminal resized; mirrored screen stays at {}x{}",
                cols, rows
            );
        }

        if let Err(e) = poll.poll(&mut events, timeout) {
            if e.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(e.into());
        }

        for event in events.iter() {
            match event.token() {
                STDIN => {
                    if !relay_stdin(&mut session)? {
                        break 'relay;
                    }
                }
                PTY => {
                    if !relay_output(&mut session)? {
                        break 'relay;
                    }
                }
                _ => {}
            }
        }
    }

    session.end();
    info!("ttymirror exiting");
    Ok(())
}

/// Relays one chunk of keyboard input to the captured program.
/// Returns false once the program side is gone.
fn relay_stdin(session: &mut CaptureSession) -> anyhow::Result<bool> {
    let mut buf = [0u8; 4096];
    let n = match io::stdin().read(&mut buf) {
        Ok(n) => n,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(true),
        Err(e) => return Err(e.into()),
    };
    if n == 0 {
        return Ok(true);
    }

    if let Err(e) = session.write_input(&buf[..n]) {
        info!("Input relay stopped: {}", e);
        return Ok(false);
    }
    Ok(true)
}

/// Relays one chunk of program output through the emulation layer.
/// Returns false once the captured program has exited.
fn relay_output(session: &mut CaptureSession) -> anyhow::Result<bool> {
    let mut buf = [0u8; 4096];
    let n = match session.read_output(&mut buf) {
        Ok(0) => {
            info!("PTY closed (captured program exited)");
            return Ok(false);
        }
        Ok(n) => n,
        Err(MirrorError::Io(e)) if e.raw_os_error() == Some(libc::EIO) => {
            // Linux reports EIO on the master once the child is gone.
            info!("PTY closed (captured program exited)");
            return Ok(false);
        }
        Err(MirrorError::Io(e)) if e.kind() == io::ErrorKind::Interrupted => return Ok(true),
        Err(e) => return Err(e.into()),
    };

    session.process_output(&buf[..n])?;
    Ok(true)
}

/// RAII guard to restore terminal on exit
///
/// The host terminal always gets its attributes back, even when the
/// relay unwinds on a panic.
struct TermiosGuard {
    fd: RawFd,
    termios: libc::termios,
}

impl Drop for TermiosGuard {
    fn drop(&mut self) {
        restore_termios(self.fd, &self.termios);
        debug!("Terminal attributes restored");
    }
}
