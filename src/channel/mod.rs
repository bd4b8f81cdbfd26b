//! Inter-process message channel
//!
//! Two message kinds flow between a capture session and its readers:
//! `Updated` (empty payload, fired after each rendered batch) and
//! `Input` (raw bytes a reader injects into the captured program).
//! Each kind gets its own POSIX message queue so receipt order within a
//! kind is FIFO and a receiver drains only the kind it registered for;
//! ordering across kinds is unspecified.
//!
//! Delivery is best-effort. Send handles are opened non-blocking and a
//! full queue is a transient failure the sender logs and drops. A lost
//! update notification is harmless because the segment always holds the
//! latest truth, and a lost input injection is the accepted cost of
//! never applying backpressure to a live terminal.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, warn};
use nix::errno::Errno;
use nix::mqueue::{
    mq_close, mq_getattr, mq_open, mq_receive, mq_send, mq_unlink, MQ_OFlag, MqAttr, MqdT,
};
use nix::sys::stat::Mode;

use crate::error::{MirrorError, Result};
use crate::key::SessionKey;

/// Largest payload one message can carry.
pub const MAX_PAYLOAD: usize = 512;

/// Queue depth. Senders see a full queue as a dropped message.
const MAX_MESSAGES: usize = 10;

/// Priority for ordinary data messages. POSIX delivers FIFO within a
/// priority, which is the channel's per-kind ordering guarantee.
const PRIO_DATA: u32 = 0;

/// Priority for the shutdown sentinel posted to receiver threads. Higher
/// than data so teardown preempts anything still queued.
const PRIO_CONTROL: u32 = 1;

const SENTINEL_RETRIES: u32 = 50;
const SENTINEL_RETRY_DELAY: Duration = Duration::from_millis(10);

/// The two message kinds the channel carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Screen segment content changed; payload is empty.
    Updated,
    /// Bytes to inject into the captured program's input stream.
    Input,
}

impl MessageKind {
    const ALL: [MessageKind; 2] = [MessageKind::Updated, MessageKind::Input];

    fn suffix(self) -> &'static str {
        match self {
            MessageKind::Updated => "updated",
            MessageKind::Input => "input",
        }
    }

    fn index(self) -> usize {
        match self {
            MessageKind::Updated => 0,
            MessageKind::Input => 1,
        }
    }
}

struct Receiver {
    kind: MessageKind,
    thread: Option<JoinHandle<()>>,
}

/// One session's message channel.
///
/// The capture session [`create`](MessageChannel::create)s it; reader
/// processes [`attach`](MessageChannel::attach). Either side may send
/// and may register at most one receiver per kind. Destroying is
/// idempotent; only the creating side removes the underlying queues.
pub struct MessageChannel {
    key: SessionKey,
    owner: bool,
    senders: [Option<MqdT>; 2],
    receivers: Vec<Receiver>,
    destroyed: bool,
}

impl MessageChannel {
    /// Creates the queues for `key`, exclusively.
    ///
    /// Fails with [`MirrorError::Resource`] if they already exist or
    /// cannot be allocated; a partially created pair is removed before
    /// returning the error.
    pub fn create(key: &SessionKey) -> Result<Self> {
        let attr = MqAttr::new(0, MAX_MESSAGES as _, MAX_PAYLOAD as _, 0);
        let mut senders: [Option<MqdT>; 2] = [None, None];
        for kind in MessageKind::ALL {
            let name = key.queue_cname(kind.suffix())?;
            let opened = mq_open(
                name.as_c_str(),
                MQ_OFlag::O_WRONLY | MQ_OFlag::O_CREAT | MQ_OFlag::O_EXCL | MQ_OFlag::O_NONBLOCK,
                Mode::S_IRUSR | Mode::S_IWUSR,
                Some(&attr),
            );
            match opened {
                Ok(mqd) => senders[kind.index()] = Some(mqd),
                Err(e) => {
                    Self::remove_queues(key, &mut senders, true);
                    return Err(match e {
                        Errno::EEXIST => MirrorError::Resource(format!(
                            "message queue {} already exists (stale session?)",
                            key.queue_name(kind.suffix())
                        )),
                        other => MirrorError::Resource(format!(
                            "cannot create message queue {}: {}",
                            key.queue_name(kind.suffix()),
                            other
                        )),
                    });
                }
            }
        }
        debug!("Created message channel for {}", key.segment_name());
        Ok(MessageChannel {
            key: key.clone(),
            owner: true,
            senders,
            receivers: Vec::new(),
            destroyed: false,
        })
    }

    /// Opens an existing channel, reader side.
    ///
    /// Fails with [`MirrorError::NotFound`] when no session owns the key.
    pub fn attach(key: &SessionKey) -> Result<Self> {
        let mut senders: [Option<MqdT>; 2] = [None, None];
        for kind in MessageKind::ALL {
            let name = key.queue_cname(kind.suffix())?;
            let opened = mq_open(
                name.as_c_str(),
                MQ_OFlag::O_WRONLY | MQ_OFlag::O_NONBLOCK,
                Mode::empty(),
                None,
            );
            match opened {
                Ok(mqd) => senders[kind.index()] = Some(mqd),
                Err(e) => {
                    Self::remove_queues(key, &mut senders, false);
                    return Err(match e {
                        Errno::ENOENT => MirrorError::NotFound(format!(
                            "no message channel at {}",
                            key.queue_name(kind.suffix())
                        )),
                        other => MirrorError::Resource(format!(
                            "cannot open message queue {}: {}",
                            key.queue_name(kind.suffix()),
                            other
                        )),
                    });
                }
            }
        }
        Ok(MessageChannel {
            key: key.clone(),
            owner: false,
            senders,
            receivers: Vec::new(),
            destroyed: false,
        })
    }

    /// Sends one message, non-blocking.
    ///
    /// A full queue or oversized payload is a
    /// [`MirrorError::Delivery`]; callers log and move on. At most one
    /// copy of the payload is ever delivered.
    pub fn send(&self, kind: MessageKind, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_PAYLOAD {
            return Err(MirrorError::Delivery(format!(
                "{} payload of {} bytes exceeds the {} byte limit",
                kind.suffix(),
                payload.len(),
                MAX_PAYLOAD
            )));
        }
        let mqd = self.senders[kind.index()]
            .as_ref()
            .ok_or_else(|| MirrorError::Delivery("channel is destroyed".into()))?;
        mq_send(mqd, payload, PRIO_DATA).map_err(|e| match e {
            Errno::EAGAIN => MirrorError::Delivery(format!(
                "{} queue full, message dropped",
                kind.suffix()
            )),
            other => MirrorError::Delivery(format!(
                "cannot send {} message: {}",
                kind.suffix(),
                other
            )),
        })
    }

    /// Registers the receiver for one message kind.
    ///
    /// The handler runs on a dedicated thread, once per received
    /// message, in receipt order. One receiver per kind per channel.
    pub fn register_receiver<F>(&mut self, kind: MessageKind, mut handler: F) -> Result<()>
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        if self.destroyed {
            return Err(MirrorError::Resource("channel is destroyed".into()));
        }
        let name = self.key.queue_cname(kind.suffix())?;
        let mqd = mq_open(name.as_c_str(), MQ_OFlag::O_RDONLY, Mode::empty(), None).map_err(|e| {
            MirrorError::Resource(format!(
                "cannot open {} for receiving: {}",
                self.key.queue_name(kind.suffix()),
                e
            ))
        })?;
        let capacity = mq_getattr(&mqd)
            .map(|attr| attr.msgsize() as usize)
            .unwrap_or(MAX_PAYLOAD);

        let label = format!("{}-receiver", kind.suffix());
        let thread = thread::Builder::new().name(label.clone()).spawn(move || {
            let mut buffer = vec![0u8; capacity];
            loop {
                let mut priority = 0u32;
                match mq_receive(&mqd, &mut buffer, &mut priority) {
                    Ok(_) if priority == PRIO_CONTROL => break,
                    Ok(length) => handler(&buffer[..length]),
                    Err(Errno::EINTR) => continue,
                    Err(e) => {
                        debug!("{} exiting: {}", label, e);
                        break;
                    }
                }
            }
            if let Err(e) = mq_close(mqd) {
                debug!("{} close failed: {}", label, e);
            }
        })?;

        self.receivers.push(Receiver {
            kind,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Tears the channel down: stops receiver threads, closes handles,
    /// and (on the creating side) removes the queues. Idempotent;
    /// calling this twice, or on an already-dropped channel, is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;

        let mut receivers = std::mem::take(&mut self.receivers);
        for receiver in &mut receivers {
            if self.post_shutdown(receiver.kind) {
                if let Some(thread) = receiver.thread.take() {
                    if thread.join().is_err() {
                        warn!("{}-receiver panicked", receiver.kind.suffix());
                    }
                }
            } else {
                // Leave the thread parked on its queue; process exit
                // reclaims it.
                warn!(
                    "could not stop {}-receiver, abandoning it",
                    receiver.kind.suffix()
                );
                receiver.thread.take();
            }
        }

        Self::remove_queues(&self.key, &mut self.senders, self.owner);
        debug!("Destroyed message channel for {}", self.key.segment_name());
    }

    /// Posts the control sentinel that wakes one receiver thread.
    fn post_shutdown(&self, kind: MessageKind) -> bool {
        let mqd = match self.senders[kind.index()].as_ref() {
            Some(mqd) => mqd,
            None => return false,
        };
        for _ in 0..SENTINEL_RETRIES {
            match mq_send(mqd, &[], PRIO_CONTROL) {
                Ok(()) => return true,
                // Queue full: the receiver is alive and draining, give
                // it a moment.
                Err(Errno::EAGAIN) => thread::sleep(SENTINEL_RETRY_DELAY),
                Err(e) => {
                    debug!("cannot post shutdown to {}: {}", kind.suffix(), e);
                    return false;
                }
            }
        }
        false
    }

    fn remove_queues(key: &SessionKey, senders: &mut [Option<MqdT>; 2], unlink: bool) {
        for kind in MessageKind::ALL {
            if let Some(mqd) = senders[kind.index()].take() {
                if let Err(e) = mq_close(mqd) {
                    debug!("closing {} sender failed: {}", kind.suffix(), e);
                }
            }
            if unlink {
                if let Ok(name) = key.queue_cname(kind.suffix()) {
                    match mq_unlink(name.as_c_str()) {
                        Ok(()) | Err(Errno::ENOENT) => {}
                        Err(e) => warn!(
                            "cannot remove message queue {}: {}",
                            key.queue_name(kind.suffix()),
                            e
                        ),
                    }
                }
            }
        }
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        self.destroy();
    }
}
