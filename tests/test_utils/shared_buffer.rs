//! In-memory collector for integration tests.
//!
//! [`MemoryCollector`] implements [`Connect`] so a hook can ship into a
//! shared byte buffer. The collector can be taken down and brought back to
//! simulate an outage: while it is down every write fails with
//! `BrokenPipe` and every dial with `ConnectionRefused`.

use std::{
    io::{self, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use logstash_hook::{Connect, Connection};
use parking_lot::Mutex;
use serde_json::Value;

#[derive(Default)]
struct State {
    buffer: Mutex<Vec<u8>>,
    down: AtomicBool,
    dials: AtomicUsize,
}

/// Cloneable handle to a shared in-memory collector.
#[derive(Clone, Default)]
pub struct MemoryCollector {
    state: Arc<State>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boxed connector for `LogstashHook::with_connector`.
    pub fn connector(&self) -> Box<dyn Connect> {
        Box::new(self.clone())
    }

    pub fn set_down(&self, down: bool) {
        self.state.down.store(down, Ordering::SeqCst);
    }

    pub fn dials(&self) -> usize {
        self.state.dials.load(Ordering::SeqCst)
    }

    /// Every newline-delimited frame received so far.
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.state.buffer.lock();
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Every frame decoded as JSON.
    #[allow(dead_code)]
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .map(|line| serde_json::from_str(line).expect("frame is json"))
            .collect()
    }
}

impl Connect for MemoryCollector {
    fn connect(&self) -> io::Result<Connection> {
        self.state.dials.fetch_add(1, Ordering::SeqCst);
        if self.state.down.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::ConnectionRefused.into());
        }
        Ok(Box::new(MemoryConnection {
            state: Arc::clone(&self.state),
        }))
    }

    fn describe(&self) -> String {
        "memory://collector".into()
    }
}

struct MemoryConnection {
    state: Arc<State>,
}

impl Write for MemoryConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.state.down.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.state.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
