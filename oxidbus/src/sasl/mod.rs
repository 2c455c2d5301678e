//! The SASL line-protocol handshake performed before a connection is ready
//! to carry D-Bus frames.

use crate::error::{Error, ErrorKind, Result};
use crate::transport::Transport;

#[cfg(test)]
mod tests;

/// The outcome of a successful handshake.
pub(crate) struct Authenticated {
    /// Whether `NEGOTIATE_UNIX_FD` was agreed to by the peer.
    pub(crate) unix_fd_passing: bool,
}

/// Mechanisms attempted, in the order the D-Bus specification recommends.
const MECHANISMS: &[&str] = &["EXTERNAL", "ANONYMOUS"];

/// Run the handshake: the credential-passing NUL byte, then each mechanism
/// in turn until one is accepted, then `NEGOTIATE_UNIX_FD` (if requested)
/// and `BEGIN`.
pub(crate) async fn authenticate(
    transport: &mut Transport,
    negotiate_unix_fd: bool,
) -> Result<Authenticated> {
    transport.send_nul().await?;

    let mut accepted = false;

    for mechanism in MECHANISMS {
        let line = match *mechanism {
            "EXTERNAL" => format!("AUTH EXTERNAL {}\r\n", hex_encode(current_uid_ascii().as_bytes())),
            "ANONYMOUS" => format!("AUTH ANONYMOUS {}\r\n", hex_encode(b"oxidbus")),
            _ => unreachable!("MECHANISMS only lists EXTERNAL and ANONYMOUS"),
        };

        transport.send_line(line.as_bytes()).await?;
        let reply = transport.recv_line().await?;

        if reply.starts_with(b"OK ") {
            accepted = true;
            break;
        }

        if reply.starts_with(b"REJECTED") {
            continue;
        }

        return Err(Error::new(ErrorKind::AuthFailed));
    }

    if !accepted {
        return Err(Error::new(ErrorKind::AuthFailed));
    }

    let mut unix_fd_passing = false;

    if negotiate_unix_fd && transport.supports_unix_fd() {
        transport.send_line(b"NEGOTIATE_UNIX_FD\r\n").await?;
        let reply = transport.recv_line().await?;
        unix_fd_passing = reply.starts_with(b"AGREE_UNIX_FD");
    }

    transport.send_line(b"BEGIN\r\n").await?;

    Ok(Authenticated { unix_fd_passing })
}

/// The current user's UID as ASCII decimal digits, per the `EXTERNAL`
/// mechanism's payload convention.
fn current_uid_ascii() -> String {
    #[cfg(all(unix, feature = "libc"))]
    {
        // SAFETY: `getuid` takes no arguments and always succeeds.
        unsafe { libc::getuid() }.to_string()
    }

    #[cfg(not(all(unix, feature = "libc")))]
    {
        0.to_string()
    }
}

/// Hex-encode `bytes` as lowercase ASCII, per the SASL line protocol's data
/// encoding.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: [u8; 16] = *b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);

    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0xf) as usize] as char);
    }

    out
}
