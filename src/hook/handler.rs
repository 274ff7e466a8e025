//! Public hook type exported by the crate.

use std::{sync::Arc, thread, time::Duration};

use crossbeam_channel::{Sender, TrySendError};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::{
    formatter::LogstashFormatter,
    handler::{Hook, HookError},
    log_record::LogRecord,
    normalizer::NormalizedRecord,
    rate_limited_warner::RateLimitedWarner,
};

use super::{
    config::{HookOptions, OverflowPolicy},
    connection::{ConnectionManager, ConnectionState},
    dispatcher::{Command, Shipper, enqueue_record, flush_queue, spawn_dispatcher},
    transport::{Connect, Endpoint, Protocol},
};

/// Hook shipping records to a Logstash collector.
///
/// Records are queued for a single dispatcher thread, which normalizes,
/// encodes and writes them in the order they were fired. Without a
/// delivery channel every record is shipped on the calling thread.
pub struct LogstashHook {
    shipper: Arc<Shipper>,
    tx: Option<Sender<Command>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
    overflow: OverflowPolicy,
    enqueue_timeout: Duration,
    flush_timeout: Duration,
}

impl LogstashHook {
    /// Connect to `address` over `protocol` with default options.
    pub fn new(
        protocol: &str,
        address: &str,
        formatter: impl Into<LogstashFormatter>,
    ) -> Result<Self, HookError> {
        Self::with_options(protocol, address, formatter, HookOptions::default())
    }

    /// Connect to `address` over `protocol`.
    ///
    /// Fails with [`HookError::InvalidConfig`] when either string is empty
    /// or the protocol is unknown, and with [`HookError::Connect`] when the
    /// first dial fails.
    pub fn with_options(
        protocol: &str,
        address: &str,
        formatter: impl Into<LogstashFormatter>,
        options: HookOptions,
    ) -> Result<Self, HookError> {
        let endpoint = endpoint_from(protocol, address, &options)?;
        Self::with_connector(Box::new(endpoint), formatter, options)
    }

    /// Build a hook around a custom [`Connect`] implementation.
    pub fn with_connector(
        connector: Box<dyn Connect>,
        formatter: impl Into<LogstashFormatter>,
        options: HookOptions,
    ) -> Result<Self, HookError> {
        if options.capacity == Some(0) {
            return Err(HookError::InvalidConfig(
                "capacity must be greater than zero".into(),
            ));
        }
        let address = connector.describe();
        let connection = ConnectionManager::connect(connector, options.backoff.clone())
            .map_err(|source| HookError::Connect {
                address: address.clone(),
                source,
            })?;
        let shipper = Arc::new(Shipper {
            formatter: formatter.into(),
            connection,
            warner: RateLimitedWarner::new(options.warn_interval),
        });
        let (tx, worker) = match options.capacity {
            Some(capacity) => {
                let (tx, handle) = spawn_dispatcher(capacity, Arc::clone(&shipper))?;
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };
        debug!("logstash hook connected to {address}");
        Ok(Self {
            shipper,
            tx,
            worker: Mutex::new(worker),
            overflow: options.overflow,
            enqueue_timeout: options.enqueue_timeout,
            flush_timeout: options.flush_timeout,
        })
    }

    /// Flush queued records using the configured flush timeout.
    pub fn flush(&self) -> bool {
        <Self as Hook>::flush(self)
    }

    /// Wait up to `timeout` for the dispatcher to process every record
    /// queued before this call.
    ///
    /// Returns `false` once the hook has been closed or when the dispatcher
    /// does not answer in time. A hook without a delivery channel has
    /// nothing pending and returns `true`.
    pub fn flush_within(&self, timeout: Duration) -> bool {
        let Some(tx) = self.tx.as_ref() else {
            return self.connection_state() != ConnectionState::Closed;
        };
        self.shipper.warner.flush(|count| {
            warn!("logstash hook dropped {count} records in the last interval");
        });
        flush_queue(tx, timeout)
    }

    /// Close the delivery channel and wait for the dispatcher to drain it.
    ///
    /// Calling `close` more than once is harmless. Records fired afterwards
    /// are shipped synchronously.
    pub fn close(&mut self) {
        drop(self.tx.take());
        self.shipper.connection.close();
        self.join_worker();
        self.shipper.warner.flush(|count| {
            warn!("logstash hook dropped {count} records before close");
        });
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.shipper.connection.state()
    }

    fn join_worker(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("logstash dispatcher thread panicked");
        }
    }

    fn ship_now(&self, record: &LogRecord) -> Result<(), HookError> {
        self.shipper.ship(record, &mut NormalizedRecord::default())
    }

    fn handle_overflow(&self, record: LogRecord) -> Result<(), HookError> {
        match self.overflow {
            OverflowPolicy::Synchronous => self.ship_now(&record),
            OverflowPolicy::Drop => {
                self.shipper.warn_dropped("delivery channel full");
                Ok(())
            }
        }
    }
}

fn endpoint_from(
    protocol: &str,
    address: &str,
    options: &HookOptions,
) -> Result<Endpoint, HookError> {
    if protocol.trim().is_empty() {
        return Err(HookError::InvalidConfig("protocol must not be empty".into()));
    }
    if address.trim().is_empty() {
        return Err(HookError::InvalidConfig("address must not be empty".into()));
    }
    let protocol: Protocol = protocol.parse().map_err(HookError::InvalidConfig)?;
    if options.tls.is_some() && !protocol.is_tcp() {
        return Err(HookError::InvalidConfig(
            "tls is only supported for tcp protocols".into(),
        ));
    }
    Ok(Endpoint {
        protocol,
        address: address.to_owned(),
        connect_timeout: options.connect_timeout,
        write_timeout: options.write_timeout,
        keep_alive: options.keep_alive,
        tls: options.tls.clone(),
    })
}

impl Hook for LogstashHook {
    fn fire(&self, record: LogRecord) -> Result<(), HookError> {
        let Some(tx) = self.tx.as_ref() else {
            return self.ship_now(&record);
        };
        let (command, full) = match enqueue_record(tx, record, self.enqueue_timeout) {
            Ok(()) => return Ok(()),
            Err(TrySendError::Full(command)) => (command, true),
            Err(TrySendError::Disconnected(command)) => (command, false),
        };
        let Command::Record(record) = command else {
            return Ok(());
        };
        if full {
            self.handle_overflow(record)
        } else {
            self.ship_now(&record)
        }
    }

    fn flush(&self) -> bool {
        self.flush_within(self.flush_timeout)
    }
}

impl Drop for LogstashHook {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LogstashHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogstashHook")
            .field("connection", &self.shipper.connection)
            .field("asynchronous", &self.tx.is_some())
            .field("overflow", &self.overflow)
            .field("flush_timeout", &self.flush_timeout)
            .finish()
    }
}
