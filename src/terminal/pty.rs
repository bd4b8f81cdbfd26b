//! Pseudo-terminal (PTY) management
//!
//! The PTY is how the mirror intercepts terminal I/O. We create a
//! pseudo-terminal, spawn the captured program in it, and relay all
//! input and output while the emulation layer watches the stream.

use crate::{MirrorError, Result};
use log::{debug, info};
use nix::unistd::dup;
use portable_pty::{native_pty_system, Child, CommandBuilder, PtySize};
use std::ffi::{CStr, OsStr};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::{FromRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Shared handle to the PTY input side. Input arrives from two places,
/// the user's keyboard and the message channel receiver thread, so the
/// writer lives behind a mutex.
pub type PtyWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Manages a pseudo-terminal running the captured program.
pub struct Pty {
    /// Reader for PTY output
    reader: Box<dyn Read + Send>,

    /// Writer for PTY input, shared with the input receiver thread
    writer: PtyWriter,

    /// The child process running in the PTY
    _child: Box<dyn Child + Send>,

    /// Duplicated file descriptor for the PTY (for event loop
    /// registration). Our own copy stays valid even after the master
    /// is consumed by take_writer().
    _fd_owner: OwnedFd,

    /// Raw file descriptor for mio
    fd: RawFd,

    /// Device path of the terminal side, e.g. /dev/pts/5
    path: PathBuf,
}

impl Pty {
    /// Create a new PTY and spawn a shell or specified program.
    ///
    /// If no program is specified, spawns the user's default shell.
    /// The child sees TERM=linux, matching the escape sequences the
    /// emulation layer understands.
    pub fn new(program: Option<Vec<String>>, rows: u16, cols: u16) -> Result<Self> {
        let pty_system = native_pty_system();

        let size = PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        debug!("Creating PTY with size {}x{}", rows, cols);

        let pair = pty_system
            .openpty(size)
            .map_err(|e| MirrorError::Pty(format!("Failed to open PTY: {}", e)))?;

        let mut cmd = if let Some(prog) = program {
            info!("Spawning specified program: {:?}", prog);
            let mut cmd = CommandBuilder::new(&prog[0]);
            for arg in &prog[1..] {
                cmd.arg(arg);
            }
            cmd
        } else {
            let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
            info!("Spawning default shell: {}", shell);
            CommandBuilder::new(shell)
        };
        cmd.env("TERM", "linux");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| MirrorError::Pty(format!("Failed to spawn child: {}", e)))?;

        let original_fd = pair
            .master
            .as_raw_fd()
            .ok_or_else(|| MirrorError::Pty("Failed to get PTY file descriptor".to_string()))?;

        // The terminal device path identifies this session to clients.
        let name = unsafe { nix::libc::ptsname(original_fd) };
        if name.is_null() {
            return Err(MirrorError::Pty(
                "Failed to resolve the terminal device path".to_string(),
            ));
        }
        let path = PathBuf::from(OsStr::from_bytes(
            unsafe { CStr::from_ptr(name) }.to_bytes(),
        ));

        // Duplicate the file descriptor so we have our own copy that
        // won't be closed when the master is consumed by take_writer()
        let dup_fd = dup(original_fd)
            .map_err(|e| MirrorError::Pty(format!("Failed to duplicate fd: {}", e)))?;
        let fd_owner = unsafe { OwnedFd::from_raw_fd(dup_fd) };
        let fd = fd_owner.as_raw_fd();

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| MirrorError::Pty(format!("Failed to get PTY reader: {}", e)))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| MirrorError::Pty(format!("Failed to get PTY writer: {}", e)))?;

        debug!("PTY created on {} with fd {}", path.display(), fd);

        Ok(Self {
            reader,
            writer: Arc::new(Mutex::new(writer)),
            _child: child,
            _fd_owner: fd_owner,
            fd,
            path,
        })
    }

    /// Get the file descriptor for the PTY master.
    ///
    /// The event loop uses this fd to wait for new output.
    pub fn as_raw_fd(&self) -> RawFd {
        self.fd
    }

    /// Device path of the terminal side.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared handle to the input side, for the channel receiver.
    pub fn writer_handle(&self) -> PtyWriter {
        Arc::clone(&self.writer)
    }

    /// Read output from the PTY.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reader.read(buf).map_err(MirrorError::Io)
    }

    /// Write input to the PTY and flush it through immediately.
    pub fn write(&self, buf: &[u8]) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| MirrorError::Pty("Input writer lock poisoned".to_string()))?;
        writer.write_all(buf).map_err(MirrorError::Io)?;
        writer.flush().map_err(MirrorError::Io)
    }
}
