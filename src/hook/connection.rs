//! Single shared outbound connection with reconnect-and-retry.
//!
//! Writes hold the slot lock only for the duration of one frame; a broken
//! connection is replaced under the same lock once a new dial succeeds.
//! Reconnects are serialised by a second lock that also owns the backoff
//! state, and the slot generation tells a failing writer whether somebody
//! else already replaced the handle it wrote to.

use std::{
    io::{self, Write},
    sync::atomic::{AtomicBool, Ordering},
    thread,
};

use log::{info, warn};
use parking_lot::Mutex;

use crate::handler::SendError;

use super::{
    backoff::BackoffState,
    config::BackoffPolicy,
    transport::{Connect, Connection},
};

/// Observable state of the connection manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Reconnecting,
    Closed,
}

struct Slot {
    conn: Option<Connection>,
    generation: u64,
}

pub struct ConnectionManager {
    connector: Box<dyn Connect>,
    slot: Mutex<Slot>,
    reconnect: Mutex<BackoffState>,
    closed: AtomicBool,
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

/// Errors caused by the frame rather than the link. Redialling cannot help.
fn is_rejected(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData | io::ErrorKind::Unsupported
    )
}

/// How much of the current frame a given connection has accepted.
#[derive(Default)]
struct Progress {
    generation: u64,
    written: usize,
}

impl ConnectionManager {
    /// Dial once and return a connected manager, or the dial error.
    pub fn connect(connector: Box<dyn Connect>, backoff: BackoffPolicy) -> io::Result<Self> {
        let conn = connector.connect()?;
        Ok(Self {
            connector,
            slot: Mutex::new(Slot {
                conn: Some(conn),
                generation: 0,
            }),
            reconnect: Mutex::new(BackoffState::new(backoff)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn state(&self) -> ConnectionState {
        if self.closed.load(Ordering::Acquire) {
            ConnectionState::Closed
        } else if self.slot.lock().conn.is_some() {
            ConnectionState::Connected
        } else {
            ConnectionState::Reconnecting
        }
    }

    pub fn describe(&self) -> String {
        self.connector.describe()
    }

    /// Stop retrying once the current backoff wait completes.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write `frame`, retrying once on timeout and reconnecting on any other
    /// link failure until the frame is written or the manager is closed.
    ///
    /// A timed out write resumes from the last byte the connection accepted,
    /// so a stream peer never sees a partial frame followed by a duplicate.
    pub fn send(&self, frame: &[u8]) -> Result<(), SendError> {
        let mut progress = Progress::default();
        let mut timed_out = false;
        let mut redialled = false;
        loop {
            let Err(err) = self.write(frame, &mut progress) else {
                if redialled {
                    self.reconnect.lock().record_success();
                }
                return Ok(());
            };
            if is_rejected(&err) {
                return Err(SendError::Rejected(err));
            }
            if is_timeout(&err) {
                if timed_out {
                    return Err(SendError::Timeout(err));
                }
                timed_out = true;
                warn!(
                    "failed to send log entry to {}: {err}, resending",
                    self.describe()
                );
                continue;
            }
            if self.is_closed() {
                return Err(SendError::Closed);
            }
            self.reconnect(progress.generation, &err, redialled)?;
            redialled = true;
            timed_out = false;
        }
    }

    fn write(&self, frame: &[u8], progress: &mut Progress) -> io::Result<()> {
        let mut slot = self.slot.lock();
        if slot.generation != progress.generation {
            progress.generation = slot.generation;
            progress.written = 0;
        }
        let Some(conn) = slot.conn.as_mut() else {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        };
        while progress.written < frame.len() {
            match conn.write(&frame[progress.written..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero)),
                Ok(n) => progress.written += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(err),
            }
        }
        conn.flush()
    }

    /// Replace the connection written at `failed_generation`.
    ///
    /// `pause` is set when that connection was itself a fresh redial, so a
    /// peer that accepts and then fails every write is retried at the
    /// backoff pace.
    fn reconnect(
        &self,
        failed_generation: u64,
        cause: &io::Error,
        pause: bool,
    ) -> Result<(), SendError> {
        let mut backoff = self.reconnect.lock();
        {
            let mut slot = self.slot.lock();
            if slot.conn.is_some() && slot.generation != failed_generation {
                return Ok(());
            }
            if slot.conn.is_none() && self.is_closed() {
                return Err(SendError::Closed);
            }
            slot.conn = None;
        }

        if pause {
            let delay = backoff.next_sleep();
            warn!(
                "fresh connection to {} failed: {cause}, reconnecting in {delay:?}",
                self.describe()
            );
            thread::sleep(delay);
            if self.is_closed() {
                return Err(SendError::Closed);
            }
        } else {
            warn!(
                "failed to send log entry to {}: {cause}, reconnecting",
                self.describe()
            );
        }
        loop {
            match self.connector.connect() {
                Ok(conn) => {
                    let mut slot = self.slot.lock();
                    slot.conn = Some(conn);
                    slot.generation = slot.generation.wrapping_add(1);
                    info!(
                        "reconnected to {} after {} attempt(s)",
                        self.describe(),
                        backoff.attempts() + 1
                    );
                    return Ok(());
                }
                Err(err) => {
                    if self.is_closed() {
                        warn!(
                            "giving up reconnecting to {} after close: {err}",
                            self.describe()
                        );
                        return Err(SendError::Closed);
                    }
                    let delay = backoff.next_sleep();
                    warn!(
                        "failed to reconnect to {}: {err} (current attempt {}), retrying in {:?}",
                        self.describe(),
                        backoff.attempts(),
                        delay
                    );
                    thread::sleep(delay);
                }
            }
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.describe())
            .field("state", &self.state())
            .finish()
    }
}
