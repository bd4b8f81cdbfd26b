//! Terminal emulator using vte
//!
//! Feeds captured application output through the vte parser so the
//! performer can apply it to the screen engine.

use log::trace;
use vte::Parser;

use super::performer::EnginePerformer;
use super::screen::Screen;
use crate::Result;

/// Terminal emulator that turns an output byte stream into screen
/// engine operations.
pub struct Emulator {
    screen: Screen,
    parser: Parser,

    /// Replies owed to the application, collected during `process`.
    responses: Vec<Vec<u8>>,
}

impl Emulator {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            parser: Parser::new(),
            responses: Vec::new(),
        }
    }

    /// Processes a chunk of application output. Incomplete escape and
    /// UTF-8 sequences carry over to the next call.
    pub fn process(&mut self, bytes: &[u8]) {
        trace!("Processing {} bytes of output", bytes.len());
        let mut performer = EnginePerformer {
            screen: &mut self.screen,
            responses: &mut self.responses,
        };
        for &byte in bytes {
            self.parser.advance(&mut performer, byte);
        }
    }

    /// Takes the replies generated since the last call. The caller
    /// writes them back to the application.
    pub fn take_responses(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.responses)
    }

    /// Flushes queued host terminal output.
    pub fn present(&mut self) -> Result<()> {
        self.screen.present()
    }

    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }
}
