//! Length-prefixed request/response channel to a Passenger control socket.
//!
//! Every call to [`communicate`] opens a fresh Unix stream connection, sends one
//! command and reads one response. Nothing is pooled between calls.
//!
//! ```text
//! request:  [len: u16 BE][command bytes][0x00]          len = command + NUL
//! response: [reserved: 2 bytes][size: u16 BE][size bytes of payload]
//! ```
//!
//! The peer may flush a response in several chunks, so both the header and the
//! payload are accumulated until the announced length is satisfied. A peer that
//! hangs up mid-frame produces [`ChannelError::ConnectionClosed`], never a
//! truncated payload.

use crate::error::ChannelError;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

/// Size of the response header (2 reserved bytes + 2 size bytes).
pub const RESPONSE_HEADER_LEN: usize = 4;

/// Offset of the big-endian size field within the response header.
const RESPONSE_SIZE_OFFSET: usize = 2;

/// Command terminator appended to every request payload.
pub const COMMAND_TERMINATOR: u8 = 0;

/// Largest request payload (command + terminator) the length prefix can carry.
pub const MAX_COMMAND_PAYLOAD: usize = u16::MAX as usize;

/// Build the outbound frame for `command`.
///
/// # Errors
///
/// Returns [`ChannelError::CommandTooLong`] when the command plus terminator
/// does not fit in a `u16` length.
pub fn encode_request(command: &str) -> Result<Vec<u8>, ChannelError> {
    let payload_len = command.len() + 1;
    if payload_len > MAX_COMMAND_PAYLOAD {
        return Err(ChannelError::CommandTooLong {
            len: payload_len,
            max: MAX_COMMAND_PAYLOAD,
        });
    }

    let mut frame = Vec::with_capacity(2 + payload_len);
    frame.extend_from_slice(&(payload_len as u16).to_be_bytes());
    frame.extend_from_slice(command.as_bytes());
    frame.push(COMMAND_TERMINATOR);
    Ok(frame)
}

/// Split an outbound frame back into its payload (command bytes plus terminator).
pub fn decode_request(frame: &[u8]) -> Result<&[u8], ChannelError> {
    if frame.len() < 2 {
        return Err(ChannelError::MalformedFrame {
            message: format!("request frame of {} bytes has no length prefix", frame.len()),
        });
    }
    let len = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let payload = &frame[2..];
    if payload.len() != len {
        return Err(ChannelError::MalformedFrame {
            message: format!("length prefix says {len} bytes, frame carries {}", payload.len()),
        });
    }
    if payload.last() != Some(&COMMAND_TERMINATOR) {
        return Err(ChannelError::MalformedFrame {
            message: "request payload is not NUL-terminated".to_string(),
        });
    }
    Ok(payload)
}

/// Build an inbound response frame carrying `payload`, with zeroed reserved bytes.
pub fn encode_response(payload: &[u8]) -> Result<Vec<u8>, ChannelError> {
    let size = u16::try_from(payload.len()).map_err(|_| ChannelError::MalformedFrame {
        message: format!("response payload of {} bytes exceeds u16 size", payload.len()),
    })?;

    let mut frame = Vec::with_capacity(RESPONSE_HEADER_LEN + payload.len());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&size.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Decode the payload size from a response header; reserved bytes are ignored.
pub fn decode_response_size(header: &[u8; RESPONSE_HEADER_LEN]) -> usize {
    u16::from_be_bytes([header[RESPONSE_SIZE_OFFSET], header[RESPONSE_SIZE_OFFSET + 1]]) as usize
}

/// Read one request frame from `reader` and return the command without its terminator.
///
/// This is the peer side of the protocol and is used by in-process test servers.
pub fn read_request<R: Read>(reader: &mut R) -> Result<String, ChannelError> {
    let mut prefix = [0u8; 2];
    read_full(reader, &mut prefix)?;
    let len = u16::from_be_bytes(prefix) as usize;

    let mut payload = vec![0u8; len];
    read_full(reader, &mut payload)?;
    if payload.pop() != Some(COMMAND_TERMINATOR) {
        return Err(ChannelError::MalformedFrame {
            message: "request payload is not NUL-terminated".to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

/// Perform one exchange over an already-connected stream.
pub fn exchange<S: Read + Write>(stream: &mut S, command: &str) -> Result<Vec<u8>, ChannelError> {
    let frame = encode_request(command)?;
    // write_all loops until every byte is accepted
    stream.write_all(&frame).map_err(ChannelError::from_io)?;
    stream.flush().map_err(ChannelError::from_io)?;

    let mut header = [0u8; RESPONSE_HEADER_LEN];
    read_full(stream, &mut header)?;

    let size = decode_response_size(&header);
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut payload = vec![0u8; size];
    read_full(stream, &mut payload)?;
    Ok(payload)
}

/// Fill `buf` completely, looping over short reads.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<(), ChannelError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ChannelError::ConnectionClosed {
                    expected: buf.len(),
                    received: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(ChannelError::from_io(e)),
        }
    }
    Ok(())
}

/// Connect to `endpoint`, send `command` and return the response payload.
///
/// `timeout` is one deadline covering the connect and the whole exchange, so a
/// peer trickling bytes cannot stretch a call past it. The stream is closed
/// when this function returns, on every path.
///
/// # Errors
///
/// - [`ChannelError::Connect`] when nothing is listening at `endpoint`
/// - [`ChannelError::Timeout`] when the peer stops accepting or responding
/// - [`ChannelError::ConnectionClosed`] when the peer hangs up mid-frame
#[cfg(unix)]
pub fn communicate(
    endpoint: &Path,
    command: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ChannelError> {
    let deadline = std::time::Instant::now() + timeout;
    let stream = connect(endpoint, timeout)?;
    exchange_before(&stream, command, deadline)
}

#[cfg(not(unix))]
pub fn communicate(
    endpoint: &Path,
    command: &str,
    timeout: Duration,
) -> Result<Vec<u8>, ChannelError> {
    let _ = (endpoint, command, timeout);
    Err(ChannelError::Unsupported)
}

/// Open a stream connection to `endpoint`, giving up after `timeout`.
///
/// A peer whose accept backlog is full makes a plain `connect(2)` block
/// indefinitely. The send timeout is installed before connecting because the
/// kernel bounds a blocking Unix-domain connect by `SO_SNDTIMEO`.
#[cfg(unix)]
pub fn connect(
    endpoint: &Path,
    timeout: Duration,
) -> Result<std::os::unix::net::UnixStream, ChannelError> {
    use std::os::fd::{AsRawFd, FromRawFd};
    use std::os::unix::net::UnixStream;

    let connect_error = |source: std::io::Error| ChannelError::Connect {
        path: endpoint.to_path_buf(),
        source,
    };

    let (addr, addr_len) = unix_sockaddr(endpoint).map_err(connect_error)?;

    // SAFETY: plain socket(2) call; the descriptor is owned by `stream` below.
    let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(connect_error(std::io::Error::last_os_error()));
    }
    // SAFETY: `fd` is a freshly created, valid socket nobody else owns.
    let stream = unsafe { UnixStream::from_raw_fd(fd) };
    stream
        .set_write_timeout(Some(timeout))
        .map_err(ChannelError::Io)?;

    loop {
        // SAFETY: `addr` is an initialized sockaddr_un of `addr_len` bytes.
        let rc = unsafe {
            libc::connect(
                stream.as_raw_fd(),
                (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>(),
                addr_len,
            )
        };
        if rc == 0 {
            return Ok(stream);
        }

        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            Some(libc::EISCONN) => return Ok(stream),
            Some(libc::EAGAIN | libc::EINPROGRESS | libc::ETIMEDOUT) => {
                return Err(ChannelError::Timeout);
            }
            _ => return Err(connect_error(err)),
        }
    }
}

/// Build a `sockaddr_un` for `path`.
#[cfg(unix)]
pub(crate) fn unix_sockaddr(
    path: &Path,
) -> std::io::Result<(libc::sockaddr_un, libc::socklen_t)> {
    use std::os::unix::ffi::OsStrExt;

    // SAFETY: sockaddr_un is plain old data; all-zero is a valid value.
    let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
    addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

    let bytes = path.as_os_str().as_bytes();
    // One byte stays zero as the terminator.
    if bytes.len() >= addr.sun_path.len() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("socket path is longer than {} bytes", addr.sun_path.len() - 1),
        ));
    }
    for (dst, src) in addr.sun_path.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }

    Ok((addr, std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t))
}

/// Run one exchange on `stream`, failing with `Timeout` once `deadline` passes.
#[cfg(unix)]
fn exchange_before(
    stream: &std::os::unix::net::UnixStream,
    command: &str,
    deadline: std::time::Instant,
) -> Result<Vec<u8>, ChannelError> {
    exchange(&mut DeadlineStream { stream, deadline }, command)
}

/// Shrinks the socket timeouts to the time left before `deadline` ahead of every call.
#[cfg(unix)]
struct DeadlineStream<'a> {
    stream: &'a std::os::unix::net::UnixStream,
    deadline: std::time::Instant,
}

#[cfg(unix)]
impl DeadlineStream<'_> {
    fn remaining(&self) -> std::io::Result<Duration> {
        let left = self
            .deadline
            .saturating_duration_since(std::time::Instant::now());
        if left.is_zero() {
            return Err(std::io::Error::from(std::io::ErrorKind::TimedOut));
        }
        Ok(left)
    }
}

#[cfg(unix)]
impl Read for DeadlineStream<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.set_read_timeout(Some(self.remaining()?))?;
        let mut stream = self.stream;
        stream.read(buf)
    }
}

#[cfg(unix)]
impl Write for DeadlineStream<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.set_write_timeout(Some(self.remaining()?))?;
        let mut stream = self.stream;
        stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut stream = self.stream;
        stream.flush()
    }
}
