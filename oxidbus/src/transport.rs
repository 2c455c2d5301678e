//! The byte-stream socket underneath a [`Connection`][crate::Connection]:
//! address resolution, connecting, and SCM_RIGHTS file descriptor passing.

use std::env;
use std::io;
use std::os::fd::RawFd;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd};
use std::path::PathBuf;

use nix::sys::socket::{
    self, ControlMessage, ControlMessageOwned, MsgFlags, UnixAddr,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, Interest};
use tokio::net::{TcpStream, UnixStream};

use crate::error::{Error, ErrorKind, Result};

/// A resolved D-Bus server address, per the address schemes in the D-Bus
/// specification.
#[derive(Debug, Clone)]
pub enum Address {
    /// `unix:path=...`
    UnixPath(PathBuf),
    /// `unix:abstract=...`
    UnixAbstract(Vec<u8>),
    /// `tcp:host=...,port=...`
    Tcp { host: String, port: u16 },
    /// `launchd:env=...`: resolved by asking `launchctl` for the named
    /// environment variable, which holds the socket path.
    Launchd { env: String },
}

/// Parse a single D-Bus address (one `;`-separated alternative) into an
/// [`Address`].
pub(crate) fn parse_address(address: &str) -> Result<Address> {
    let (scheme, rest) = address
        .split_once(':')
        .ok_or_else(|| Error::new(ErrorKind::InvalidAddress(address.to_owned())))?;

    let mut path = None;
    let mut abstract_ = None;
    let mut runtime = None;
    let mut host = None;
    let mut port = None;
    let mut env_name = None;

    for pair in rest.split(',') {
        if pair.is_empty() {
            continue;
        }

        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::new(ErrorKind::InvalidAddress(address.to_owned())))?;

        match key {
            "path" => path = Some(unescape(value)),
            "abstract" => abstract_ = Some(unescape(value)),
            "runtime" => runtime = Some(value == "yes"),
            "host" => host = Some(value.to_owned()),
            "port" => port = Some(value.to_owned()),
            "env" => env_name = Some(value.to_owned()),
            _ => {}
        }
    }

    match scheme {
        "unix" => {
            if let Some(path) = path {
                Ok(Address::UnixPath(PathBuf::from(path)))
            } else if let Some(path) = abstract_ {
                Ok(Address::UnixAbstract(path.into_bytes()))
            } else if runtime == Some(true) {
                let dir = env::var("XDG_RUNTIME_DIR")
                    .map_err(|_| Error::new(ErrorKind::MissingBus))?;
                Ok(Address::UnixPath(PathBuf::from(dir).join("bus")))
            } else {
                Err(Error::new(ErrorKind::InvalidAddress(address.to_owned())))
            }
        }
        "tcp" => {
            let host = host.ok_or_else(|| Error::new(ErrorKind::InvalidAddress(address.to_owned())))?;
            let port: u16 = port
                .ok_or_else(|| Error::new(ErrorKind::InvalidAddress(address.to_owned())))?
                .parse()
                .map_err(|_| Error::new(ErrorKind::InvalidAddress(address.to_owned())))?;
            Ok(Address::Tcp { host, port })
        }
        "launchd" => {
            let env = env_name.ok_or_else(|| Error::new(ErrorKind::InvalidAddress(address.to_owned())))?;
            Ok(Address::Launchd { env })
        }
        _ => Err(Error::new(ErrorKind::InvalidAddress(address.to_owned()))),
    }
}

/// Undo the `%XX` percent-escaping used in D-Bus address key-value pairs.
fn unescape(value: &str) -> String {
    let mut out = Vec::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&value[i + 1..i + 3], 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }

        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

/// Resolve the session bus address: `DBUS_SESSION_BUS_ADDRESS`, falling back
/// to the XDG runtime directory default.
pub(crate) fn session_address() -> Result<Address> {
    if let Ok(address) = env::var("DBUS_SESSION_BUS_ADDRESS") {
        return resolve(&address);
    }

    if let Ok(dir) = env::var("XDG_RUNTIME_DIR") {
        return Ok(Address::UnixPath(PathBuf::from(dir).join("bus")));
    }

    Err(Error::new(ErrorKind::MissingBus))
}

/// Resolve the system bus address: `DBUS_SYSTEM_BUS_ADDRESS`, falling back to
/// the well-known system socket path.
pub(crate) fn system_address() -> Result<Address> {
    if let Ok(address) = env::var("DBUS_SYSTEM_BUS_ADDRESS") {
        return resolve(&address);
    }

    Ok(Address::UnixPath(PathBuf::from("/var/run/dbus/system_bus_socket")))
}

/// Resolve a `;`-separated address string, taking the first alternative this
/// crate knows how to parse.
fn resolve(address: &str) -> Result<Address> {
    let mut last = None;

    for candidate in address.split(';') {
        match parse_address(candidate) {
            Ok(address) => return Ok(address),
            Err(error) => last = Some(error),
        }
    }

    Err(last.unwrap_or_else(|| Error::new(ErrorKind::InvalidAddress(address.to_owned()))))
}

/// Ask `launchctl` for the socket path stored in the named environment
/// variable. Run on the blocking pool since it shells out.
async fn resolve_launchd(env: String) -> Result<PathBuf> {
    let output = tokio::task::spawn_blocking(move || {
        std::process::Command::new("launchctl")
            .args(["getenv", &env])
            .output()
    })
    .await
    .map_err(|error| Error::new(ErrorKind::InvalidAddress(error.to_string())))?
    .map_err(Error::from)?;

    if !output.status.success() {
        return Err(Error::new(ErrorKind::MissingBus));
    }

    let path = String::from_utf8(output.stdout)
        .map_err(|_| Error::new(ErrorKind::MissingBus))?;
    Ok(PathBuf::from(path.trim_end()))
}

enum Io {
    Unix(UnixStream),
    Tcp(TcpStream),
}

impl Io {
    fn as_raw_fd(&self) -> RawFd {
        match self {
            Io::Unix(stream) => stream.as_raw_fd(),
            Io::Tcp(stream) => stream.as_raw_fd(),
        }
    }
}

/// A connected D-Bus transport socket. Byte-oriented before `BEGIN`; framed
/// messages with optional SCM_RIGHTS fd passing after.
pub(crate) struct Transport {
    io: Io,
    /// Whether `NEGOTIATE_UNIX_FD` succeeded during authentication.
    pub(crate) unix_fd_passing: bool,
}

impl Transport {
    /// Connect to `address`, resolving `launchd:` indirection as needed.
    pub(crate) async fn connect(address: &Address) -> Result<Transport> {
        let io = match address {
            Address::UnixPath(path) => Io::Unix(UnixStream::connect(path).await?),
            Address::UnixAbstract(name) => {
                let stream = connect_unix_abstract(name).await?;
                Io::Unix(stream)
            }
            Address::Tcp { host, port } => Io::Tcp(TcpStream::connect((host.as_str(), *port)).await?),
            Address::Launchd { env } => {
                let path = resolve_launchd(env.clone()).await?;
                Io::Unix(UnixStream::connect(path).await?)
            }
        };

        Ok(Transport {
            io,
            unix_fd_passing: false,
        })
    }

    /// Whether this transport's underlying socket is capable of fd passing
    /// at all (only unix-domain sockets are).
    pub(crate) fn supports_unix_fd(&self) -> bool {
        matches!(self.io, Io::Unix(_))
    }

    /// Write the SASL preamble NUL byte.
    pub(crate) async fn send_nul(&mut self) -> Result<()> {
        self.write_all(&[0]).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        match &mut self.io {
            Io::Unix(stream) => stream.write_all(buf).await?,
            Io::Tcp(stream) => stream.write_all(buf).await?,
        }

        Ok(())
    }

    /// Send one SASL line (the caller supplies the trailing `\r\n`).
    pub(crate) async fn send_line(&mut self, line: &[u8]) -> Result<()> {
        self.write_all(line).await
    }

    /// Read one SASL line, stripping the trailing `\r\n`. Reads a single
    /// byte at a time: lines are short and this only runs during the
    /// handshake.
    pub(crate) async fn recv_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::new();

        loop {
            let mut byte = [0u8; 1];

            let n = match &mut self.io {
                Io::Unix(stream) => stream.read(&mut byte).await?,
                Io::Tcp(stream) => stream.read(&mut byte).await?,
            };

            if n == 0 {
                return Err(Error::new(ErrorKind::Disconnected));
            }

            if byte[0] == b'\n' && line.last() == Some(&b'\r') {
                line.pop();
                return Ok(line);
            }

            line.push(byte[0]);
        }
    }

    /// Send a full message frame, passing `fds` as SCM_RIGHTS ancillary data
    /// when the socket supports it and `fds` is non-empty.
    pub(crate) async fn send_message(&mut self, buf: &[u8], fds: &[RawFd]) -> Result<()> {
        if fds.is_empty() || !self.supports_unix_fd() {
            return self.write_all(buf).await;
        }

        let Io::Unix(stream) = &mut self.io else {
            unreachable!("supports_unix_fd implies Io::Unix");
        };

        let mut pos = 0;

        while pos < buf.len() {
            let chunk = &buf[pos..];
            let control = if pos == 0 {
                vec![ControlMessage::ScmRights(fds)]
            } else {
                Vec::new()
            };

            let n = stream
                .async_io(Interest::WRITABLE, || {
                    let iov = [io::IoSlice::new(chunk)];
                    socket::sendmsg::<UnixAddr>(
                        stream.as_raw_fd(),
                        &iov,
                        &control,
                        MsgFlags::empty(),
                        None,
                    )
                    .map_err(io::Error::from)
                })
                .await?;

            pos += n;
        }

        Ok(())
    }

    /// Receive up to `buf.len()` bytes, appending any fds carried alongside
    /// them to `fds`. Returns the number of bytes read (`0` on EOF).
    pub(crate) async fn recv_message(&mut self, buf: &mut [u8], fds: &mut Vec<RawFd>) -> Result<usize> {
        if !self.supports_unix_fd() {
            let n = match &mut self.io {
                Io::Unix(stream) => stream.read(buf).await?,
                Io::Tcp(stream) => stream.read(buf).await?,
            };
            return Ok(n);
        }

        let Io::Unix(stream) = &mut self.io else {
            unreachable!("supports_unix_fd implies Io::Unix");
        };

        let mut space = nix::cmsg_space!([RawFd; 16]);

        let n = stream
            .async_io(Interest::READABLE, || {
                let mut iov = [io::IoSliceMut::new(buf)];
                let message = socket::recvmsg::<UnixAddr>(
                    stream.as_raw_fd(),
                    &mut iov,
                    Some(&mut space),
                    MsgFlags::empty(),
                )
                .map_err(io::Error::from)?;

                for cmsg in message.cmsgs().map_err(io::Error::from)? {
                    if let ControlMessageOwned::ScmRights(received) = cmsg {
                        fds.extend(received);
                    }
                }

                Ok(message.bytes)
            })
            .await?;

        Ok(n)
    }
}

/// Connect to an abstract unix socket (Linux only): `UnixAddr::new_abstract`
/// then a manual connect via `nix`, since `tokio::net::UnixStream` only
/// connects to filesystem paths.
async fn connect_unix_abstract(name: &[u8]) -> Result<UnixStream> {
    let name = name.to_vec();

    let std_stream = tokio::task::spawn_blocking(move || -> Result<std::os::unix::net::UnixStream> {
        let addr = UnixAddr::new_abstract(&name)
            .map_err(|error| Error::new(ErrorKind::InvalidAddress(error.to_string())))?;
        let socket = socket::socket(
            socket::AddressFamily::Unix,
            socket::SockType::Stream,
            socket::SockFlag::empty(),
            None,
        )
        .map_err(io::Error::from)?;
        socket::connect(socket.as_raw_fd(), &addr).map_err(io::Error::from)?;

        // SAFETY: `socket` was just created by `socket::socket` above and is
        // an open, connected file descriptor owned by nobody else yet.
        Ok(unsafe { std::os::unix::net::UnixStream::from_raw_fd(socket.into_raw_fd()) })
    })
    .await
    .map_err(|error| Error::new(ErrorKind::InvalidAddress(error.to_string())))??;

    std_stream.set_nonblocking(true)?;
    Ok(UnixStream::from_std(std_stream)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_path_address() {
        let address = parse_address("unix:path=/run/dbus/system_bus_socket").unwrap();
        assert!(matches!(address, Address::UnixPath(path) if path == PathBuf::from("/run/dbus/system_bus_socket")));
    }

    #[test]
    fn parses_unix_abstract_address_with_percent_escapes() {
        let address = parse_address("unix:abstract=/tmp/dbus-%2ftest").unwrap();
        let Address::UnixAbstract(bytes) = address else {
            panic!("expected an abstract address");
        };
        assert_eq!(bytes, b"/tmp/dbus-/test");
    }

    #[test]
    fn parses_tcp_address() {
        let address = parse_address("tcp:host=127.0.0.1,port=1234").unwrap();
        assert!(matches!(address, Address::Tcp { host, port } if host == "127.0.0.1" && port == 1234));
    }

    #[test]
    fn rejects_unknown_scheme() {
        assert!(parse_address("quic:host=x").is_err());
    }

    #[test]
    fn rejects_address_with_no_scheme_separator() {
        assert!(parse_address("not-an-address").is_err());
    }

    #[test]
    fn resolve_picks_first_parseable_alternative() {
        let address = resolve("bogus:whatever;unix:path=/tmp/bus").unwrap();
        assert!(matches!(address, Address::UnixPath(path) if path == PathBuf::from("/tmp/bus")));
    }
}
