//! Capture session lifecycle
//!
//! A capture session ties the pieces together: the PTY running the
//! captured program, the host driver, the shared screen segment and
//! the message channel. Begin order matters: the host driver comes up
//! first, and the segment only exists once the driver is live, so a
//! client that can attach always finds a working session behind it.
//! End releases in the reverse direction and is idempotent.

use std::os::unix::io::RawFd;

use log::{debug, info, warn};

use crate::channel::{MessageChannel, MessageKind};
use crate::key::SessionKey;
use crate::segment::ScreenSegment;
use crate::terminal::{Emulator, Pty, Screen, TermDriver};
use crate::Result;

/// One live captured terminal session.
pub struct CaptureSession {
    emulator: Emulator,
    channel: MessageChannel,
    key: SessionKey,
    pty: Pty,
    ended: bool,
}

impl CaptureSession {
    /// Brings up a session on an already-spawned PTY.
    ///
    /// On any failure everything brought up so far is torn down again
    /// before the error is returned.
    pub fn begin(
        pty: Pty,
        mut driver: Box<dyn TermDriver>,
        columns: u16,
        rows: u16,
    ) -> Result<Self> {
        driver.begin()?;

        let key = match SessionKey::from_pty_path(pty.path()) {
            Ok(key) => key,
            Err(e) => {
                let _ = driver.end();
                return Err(e);
            }
        };

        let segment = match ScreenSegment::create(&key, columns as u32, rows as u32) {
            Ok(segment) => segment,
            Err(e) => {
                let _ = driver.end();
                return Err(e);
            }
        };

        let mut channel = match MessageChannel::create(&key) {
            Ok(channel) => channel,
            Err(e) => {
                ScreenSegment::destroy(&key);
                let _ = driver.end();
                return Err(e);
            }
        };

        // Input injected by clients goes straight to the captured
        // program, sharing the writer with the keyboard path.
        let writer = pty.writer_handle();
        let received = channel.register_receiver(MessageKind::Input, move |payload| {
            match writer.lock() {
                Ok(mut w) => {
                    if let Err(e) = w.write_all(payload).and_then(|_| w.flush()) {
                        debug!("Dropping injected input: {}", e);
                    }
                }
                Err(_) => debug!("Dropping injected input: writer lock poisoned"),
            }
        });
        if let Err(e) = received {
            channel.destroy();
            ScreenSegment::destroy(&key);
            let _ = driver.end();
            return Err(e);
        }

        info!(
            "Capture session started for {} ({}x{})",
            pty.path().display(),
            columns,
            rows
        );

        Ok(Self {
            emulator: Emulator::new(Screen::new(segment, driver)),
            channel,
            key,
            pty,
            ended: false,
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// PTY master descriptor, for the event loop.
    pub fn pty_fd(&self) -> RawFd {
        self.pty.as_raw_fd()
    }

    pub fn screen(&self) -> &Screen {
        self.emulator.screen()
    }

    /// Reads a chunk of output from the captured program.
    pub fn read_output(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.pty.read(buf)
    }

    /// Applies a chunk of captured output: updates the segment and the
    /// host terminal, answers status queries, and tells clients the
    /// screen changed. The update notice goes out before the host
    /// flush; delivery is best effort either way.
    pub fn process_output(&mut self, bytes: &[u8]) -> Result<()> {
        self.emulator.process(bytes);

        for response in self.emulator.take_responses() {
            if let Err(e) = self.pty.write(&response) {
                debug!("Dropping status reply: {}", e);
            }
        }

        if let Err(e) = self.channel.send(MessageKind::Updated, &[]) {
            debug!("Screen update notice dropped: {}", e);
        }

        self.emulator.present()
    }

    /// Forwards user keyboard input to the captured program.
    pub fn write_input(&self, bytes: &[u8]) -> Result<()> {
        self.pty.write(bytes)
    }

    /// Ends the session, releasing the channel, the segment and the
    /// host terminal.
    pub fn end(mut self) {
        self.end_internal();
    }

    fn end_internal(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;

        if let Err(e) = self.emulator.screen_mut().end() {
            warn!("Host terminal restore failed: {}", e);
        }
        self.channel.destroy();
        ScreenSegment::destroy(&self.key);
        info!("Capture session ended");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.end_internal();
    }
}
