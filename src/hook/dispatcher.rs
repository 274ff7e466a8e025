//! Delivery channel and the dispatcher thread draining it.

use std::{
    any::Any,
    io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};
use log::{debug, error, warn};

use crate::{
    formatter::LogstashFormatter,
    handler::HookError,
    log_record::LogRecord,
    normalizer::NormalizedRecord,
    rate_limited_warner::RateLimitedWarner,
};

use super::connection::ConnectionManager;

/// Commands processed by the dispatcher thread.
#[derive(Debug)]
pub enum Command {
    Record(LogRecord),
    Flush(Sender<()>),
}

/// Normalize, format, and send: the path shared by the dispatcher and by
/// synchronous callers.
#[derive(Debug)]
pub struct Shipper {
    pub formatter: LogstashFormatter,
    pub connection: ConnectionManager,
    pub warner: RateLimitedWarner,
}

impl Shipper {
    pub fn ship(
        &self,
        record: &LogRecord,
        scratch: &mut NormalizedRecord,
    ) -> Result<(), HookError> {
        let frame = self.formatter.format_into(record, scratch)?;
        self.connection.send(&frame)?;
        Ok(())
    }

    pub fn warn_dropped(&self, reason: &str) {
        self.warner.record_drop();
        self.warner.warn_if_due(|count| {
            warn!("logstash hook dropped {count} records: {reason}");
        });
    }
}

/// Spawn the dispatcher and return the sending half of its channel.
pub fn spawn_dispatcher(
    capacity: usize,
    shipper: Arc<Shipper>,
) -> io::Result<(Sender<Command>, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded(capacity);
    let handle = thread::Builder::new()
        .name("logstash-dispatcher".into())
        .spawn(move || Dispatcher::new(shipper).run(rx))?;
    Ok((tx, handle))
}

struct Dispatcher {
    shipper: Arc<Shipper>,
    scratch: NormalizedRecord,
}

impl Dispatcher {
    fn new(shipper: Arc<Shipper>) -> Self {
        Self {
            shipper,
            scratch: NormalizedRecord::default(),
        }
    }

    /// Runs until every sender is gone; buffered records are drained first.
    fn run(mut self, rx: Receiver<Command>) {
        for command in rx.iter() {
            match command {
                Command::Record(record) => self.deliver(&record),
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
        debug!(
            "logstash dispatcher for {} exiting",
            self.shipper.connection.describe()
        );
    }

    fn deliver(&mut self, record: &LogRecord) {
        let shipper = &self.shipper;
        let scratch = &mut self.scratch;
        match panic::catch_unwind(AssertUnwindSafe(|| shipper.ship(record, scratch))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(
                    "failed to send log to {}, error: {err}",
                    shipper.connection.describe()
                );
                shipper.warn_dropped("delivery failed");
            }
            Err(payload) => {
                error!(
                    "panic while dispatching log record: {}",
                    panic_message(payload.as_ref())
                );
                self.scratch = NormalizedRecord::default();
                self.shipper.warn_dropped("dispatch panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

/// Queue `record`, waiting at most `timeout` for room.
///
/// A zero timeout never blocks. On failure the command is handed back so
/// the caller can fall back to a synchronous send.
pub fn enqueue_record(
    tx: &Sender<Command>,
    record: LogRecord,
    timeout: Duration,
) -> Result<(), TrySendError<Command>> {
    if timeout.is_zero() {
        return tx.try_send(Command::Record(record));
    }
    tx.send_timeout(Command::Record(record), timeout)
        .map_err(|err| match err {
            SendTimeoutError::Timeout(cmd) => TrySendError::Full(cmd),
            SendTimeoutError::Disconnected(cmd) => TrySendError::Disconnected(cmd),
        })
}

/// Ask the dispatcher to acknowledge once everything queued before this
/// call has been processed.
pub fn flush_queue(tx: &Sender<Command>, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    let (ack_tx, ack_rx) = bounded(1);
    if tx.send_timeout(Command::Flush(ack_tx), timeout).is_err() {
        return false;
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    ack_rx.recv_timeout(remaining).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use rstest::rstest;

    #[rstest]
    fn full_channel_hands_record_back() {
        let (tx, _rx) = bounded(1);
        enqueue_record(&tx, LogRecord::new(Level::Info, "first"), Duration::ZERO)
            .expect("room for one");
        let err = enqueue_record(&tx, LogRecord::new(Level::Info, "second"), Duration::ZERO)
            .expect_err("channel is full");
        assert!(err.is_full());
        assert!(matches!(err.into_inner(), Command::Record(r) if r.message == "second"));
    }

    #[rstest]
    fn bounded_wait_gives_up() {
        let (tx, _rx) = bounded(1);
        enqueue_record(&tx, LogRecord::new(Level::Info, "first"), Duration::ZERO)
            .expect("room for one");
        let start = Instant::now();
        let err = enqueue_record(
            &tx,
            LogRecord::new(Level::Info, "second"),
            Duration::from_millis(50),
        )
        .expect_err("channel stays full");
        assert!(err.is_full());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[rstest]
    fn disconnected_channel_is_reported() {
        let (tx, rx) = bounded::<Command>(1);
        drop(rx);
        let err = enqueue_record(&tx, LogRecord::new(Level::Info, "x"), Duration::from_millis(10))
            .expect_err("receiver dropped");
        assert!(err.is_disconnected());
        assert!(!flush_queue(&tx, Duration::from_millis(10)));
    }

    #[rstest]
    fn panic_message_reads_common_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
