//! In-process fake Passenger instance for tests.
//!
//! Creates `<root>/passenger.<pid>/info/status.socket`, binds a Unix listener
//! there and answers a fixed number of connections from a background thread.
//! [`StalledListener`] stands in for a wedged instance that never accepts.

use crate::channel::{connect, encode_response, read_request, unix_sockaddr};
use std::io::Write;
use std::os::fd::{AsRawFd, FromRawFd};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

/// Produces the raw response bytes (header included) for a received command.
pub type Responder = Box<dyn Fn(&str) -> Vec<u8> + Send + 'static>;

/// Background listener standing in for a Passenger status server.
pub struct FakePassenger {
    socket_path: PathBuf,
    handle: Option<JoinHandle<Vec<String>>>,
}

impl FakePassenger {
    /// Serve `connections` exchanges, answering each with `respond`.
    pub fn spawn(
        root: &Path,
        pid: u32,
        connections: usize,
        respond: Responder,
    ) -> std::io::Result<Self> {
        let info_dir = root.join(format!("passenger.{pid}")).join("info");
        std::fs::create_dir_all(&info_dir)?;
        let socket_path = info_dir.join("status.socket");
        let listener = UnixListener::bind(&socket_path)?;

        let handle = std::thread::spawn(move || {
            let mut commands = Vec::new();
            for _ in 0..connections {
                let Ok((mut stream, _)) = listener.accept() else {
                    break;
                };
                let Ok(command) = read_request(&mut stream) else {
                    continue;
                };
                let response = respond(&command);
                commands.push(command);
                // Write in small pieces so the client sees partial reads.
                for chunk in response.chunks(3) {
                    if stream.write_all(chunk).is_err() {
                        break;
                    }
                    let _ = stream.flush();
                }
            }
            commands
        });

        Ok(Self {
            socket_path,
            handle: Some(handle),
        })
    }

    /// Serve `connections` exchanges, answering every command with `body` as a framed payload.
    pub fn with_body(
        root: &Path,
        pid: u32,
        connections: usize,
        body: &str,
    ) -> std::io::Result<Self> {
        let framed = encode_response(body.as_bytes()).map_err(std::io::Error::other)?;
        Self::spawn(root, pid, connections, Box::new(move |_: &str| framed.clone()))
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Wait for the listener thread and return the commands it received.
    pub fn join(mut self) -> Vec<String> {
        self.handle
            .take()
            .map(|h| h.join().unwrap_or_default())
            .unwrap_or_default()
    }
}

/// Listener that never accepts, bound with a zero backlog.
pub struct StalledListener {
    _listener: UnixListener,
    path: PathBuf,
}

impl StalledListener {
    pub fn bind(path: &Path) -> std::io::Result<Self> {
        let (addr, addr_len) = unix_sockaddr(path)?;

        // SAFETY: plain socket(2) call; ownership moves into `listener`.
        let fd = unsafe { libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: `fd` is a freshly created socket nobody else owns.
        let listener = unsafe { UnixListener::from_raw_fd(fd) };

        // SAFETY: `addr` is an initialized sockaddr_un of `addr_len` bytes.
        let rc = unsafe {
            libc::bind(
                listener.as_raw_fd(),
                (&addr as *const libc::sockaddr_un).cast::<libc::sockaddr>(),
                addr_len,
            )
        };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        // SAFETY: `listener` owns a bound stream socket.
        if unsafe { libc::listen(listener.as_raw_fd(), 0) } != 0 {
            return Err(std::io::Error::last_os_error());
        }

        Ok(Self {
            _listener: listener,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connect until the backlog stops taking connections; returns the ones it took.
    pub fn fill_backlog(&self) -> Vec<UnixStream> {
        let mut held = Vec::new();
        for _ in 0..256 {
            match connect(&self.path, Duration::from_millis(50)) {
                Ok(stream) => held.push(stream),
                Err(_) => break,
            }
        }
        held
    }
}
