//! TCP collector accepting any number of connections.

use std::{
    io::{BufRead, BufReader},
    net::{SocketAddr, TcpListener},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rstest::fixture;

/// Listener on an ephemeral loopback port that stores every received line.
pub struct TcpCollector {
    addr: SocketAddr,
    lines: Arc<Mutex<Vec<String>>>,
}

impl TcpCollector {
    pub fn start() -> Self {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral listener");
        let addr = listener.local_addr().expect("listener has address");
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for line in BufReader::new(stream).lines() {
                        let Ok(line) = line else { break };
                        sink.lock().push(line);
                    }
                });
            }
        });
        Self { addr, lines }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Wait until at least `count` lines arrived, returning what was seen.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> Vec<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let lines = self.lines.lock().clone();
            if lines.len() >= count || Instant::now() >= deadline {
                return lines;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

#[fixture]
pub fn tcp_collector() -> TcpCollector {
    TcpCollector::start()
}
