pub mod collector;
pub mod shared_buffer;

#[allow(unused_imports)]
pub use collector::{TcpCollector, tcp_collector};
pub use shared_buffer::MemoryCollector;
