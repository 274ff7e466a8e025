//! Transport primitives for the hook.

use std::{
    fmt,
    io::{self, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    str::FromStr,
    time::Duration,
};

use native_tls::{TlsConnector, TlsStream};
use socket2::{SockRef, TcpKeepalive};

#[cfg(unix)]
use std::os::unix::net::UnixStream;

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;

/// Writable handle owned by the connection manager.
pub type Connection = Box<dyn Write + Send>;

/// Source of fresh connections.
///
/// The connection manager calls [`connect`](Connect::connect) once at
/// construction and again after every broken write. Implementations apply
/// any per-connection socket options themselves.
pub trait Connect: Send + Sync {
    fn connect(&self) -> io::Result<Connection>;

    /// Human readable destination used in diagnostics.
    fn describe(&self) -> String;
}

/// Network protocol named at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Tcp4,
    Tcp6,
    Udp,
    Udp4,
    Udp6,
    Unix,
}

impl Protocol {
    pub fn is_tcp(self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Tcp4 | Protocol::Tcp6)
    }

    fn accepts(self, addr: &SocketAddr) -> bool {
        match self {
            Protocol::Tcp4 | Protocol::Udp4 => addr.is_ipv4(),
            Protocol::Tcp6 | Protocol::Udp6 => addr.is_ipv6(),
            _ => true,
        }
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "tcp4" => Ok(Self::Tcp4),
            "tcp6" => Ok(Self::Tcp6),
            "udp" => Ok(Self::Udp),
            "udp4" => Ok(Self::Udp4),
            "udp6" => Ok(Self::Udp6),
            "unix" => Ok(Self::Unix),
            other => Err(format!("unsupported protocol: {other}")),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Tcp => "tcp",
            Protocol::Tcp4 => "tcp4",
            Protocol::Tcp6 => "tcp6",
            Protocol::Udp => "udp",
            Protocol::Udp4 => "udp4",
            Protocol::Udp6 => "udp6",
            Protocol::Unix => "unix",
        };
        f.write_str(s)
    }
}

/// TLS connection options.
#[derive(Clone, Debug)]
pub struct TlsOptions {
    /// Domain name presented during the TLS handshake.
    pub domain: String,
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> io::Result<TlsConnector> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder.build().map_err(io::Error::other)
    }
}

/// Remote collector address together with the socket options applied to
/// every connection made to it.
#[derive(Clone, Debug)]
pub struct Endpoint {
    pub protocol: Protocol,
    pub address: String,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub keep_alive: Option<Duration>,
    pub tls: Option<TlsOptions>,
}

impl Endpoint {
    fn socket_addrs(&self) -> io::Result<Vec<SocketAddr>> {
        // ":5000" means the local host.
        let address = if self.address.starts_with(':') {
            format!("localhost{}", self.address)
        } else {
            self.address.clone()
        };
        let addrs: Vec<SocketAddr> = address
            .to_socket_addrs()?
            .filter(|addr| self.protocol.accepts(addr))
            .collect();
        if addrs.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {} address for {}", self.protocol, self.address),
            ));
        }
        Ok(addrs)
    }

    /// Dial a TCP stream with keep-alive applied.
    pub(super) fn dial_tcp(&self) -> io::Result<TcpStream> {
        let stream = self.connect_tcp()?;
        self.apply_keep_alive(&stream)?;
        Ok(stream)
    }

    fn connect_tcp(&self) -> io::Result<TcpStream> {
        let mut last_err = None;
        for addr in self.socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    stream.set_nonblocking(false)?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::TimedOut,
                format!("unable to connect to {}", self.address),
            )
        }))
    }

    fn apply_keep_alive(&self, stream: &TcpStream) -> io::Result<()> {
        let Some(period) = self.keep_alive else {
            return Ok(());
        };
        let keepalive = TcpKeepalive::new()
            .with_time(period)
            .with_interval(period);
        SockRef::from(stream).set_tcp_keepalive(&keepalive)
    }

    fn connect_udp(&self) -> io::Result<UdpSocket> {
        let mut last_err = None;
        for addr in self.socket_addrs()? {
            let local: SocketAddr = if addr.is_ipv4() {
                ([0, 0, 0, 0], 0).into()
            } else {
                ([0u16; 8], 0).into()
            };
            let attempt = UdpSocket::bind(local).and_then(|socket| {
                socket.connect(addr)?;
                socket.set_write_timeout(Some(self.write_timeout))?;
                Ok(socket)
            });
            match attempt {
                Ok(socket) => return Ok(socket),
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
    }
}

impl Connect for Endpoint {
    fn connect(&self) -> io::Result<Connection> {
        match self.protocol {
            p if p.is_tcp() => {
                let stream = self.dial_tcp()?;
                if let Some(tls) = &self.tls {
                    let connector = tls.connector()?;
                    stream.set_read_timeout(Some(self.connect_timeout))?;
                    stream.set_write_timeout(Some(self.connect_timeout))?;
                    let stream = connector
                        .connect(&tls.domain, stream)
                        .map_err(io::Error::other)?;
                    let tcp_ref = stream.get_ref();
                    tcp_ref.set_read_timeout(None)?;
                    tcp_ref.set_write_timeout(Some(self.write_timeout))?;
                    Ok(Box::new(ActiveConnection::Tls(Box::new(stream))))
                } else {
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    Ok(Box::new(ActiveConnection::PlainTcp(stream)))
                }
            }
            Protocol::Unix => {
                #[cfg(unix)]
                {
                    let stream = UnixStream::connect(&self.address)?;
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    Ok(Box::new(ActiveConnection::Unix(stream)))
                }
                #[cfg(not(unix))]
                {
                    Err(io::Error::new(
                        io::ErrorKind::Unsupported,
                        "unix domain sockets are not supported on this platform",
                    ))
                }
            }
            _ => Ok(Box::new(ActiveConnection::Udp(self.connect_udp()?))),
        }
    }

    fn describe(&self) -> String {
        format!("{}://{}", self.protocol, self.address)
    }
}

/// Active socket connection state.
pub enum ActiveConnection {
    PlainTcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Udp(UdpSocket),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Write for ActiveConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.write(buf),
            ActiveConnection::Tls(stream) => stream.write(buf),
            ActiveConnection::Udp(socket) => {
                if buf.len() > MAX_DATAGRAM {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{} byte frame exceeds the datagram limit", buf.len()),
                    ));
                }
                socket.send(buf)
            }
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ActiveConnection::PlainTcp(stream) => stream.flush(),
            ActiveConnection::Tls(stream) => stream.flush(),
            ActiveConnection::Udp(_) => Ok(()),
            #[cfg(unix)]
            ActiveConnection::Unix(stream) => stream.flush(),
        }
    }
}
