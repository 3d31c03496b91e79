//! TTY helper bridge
//!
//! The process that grabs the keyboard may daemonise and lose its
//! controlling terminal, so text injection into a console shell is delegated
//! to a helper: this binary re-executed with `HANFE_TTY_HELPER=1`. The
//! helper inherits one end of a socketpair on fd 3, keeps the real TTY open
//! read-write, and pushes bytes into its input queue with TIOCSTI (direct
//! write when the ioctl is unavailable).
//!
//! Wire protocol, strictly request-only, big-endian:
//! - `'T'` + u32 length + UTF-8 payload: type the payload
//! - `'B'` + u32 count: push that many backspace (0x08) bytes
//!
//! The parent-side descriptor number travels in `HANFE_TTY_BRIDGE_FD` so it
//! survives fork/exec; closing the socket terminates the helper cleanly.

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info, warn};
use nix::sys::socket::{socketpair, AddressFamily, SockFlag, SockType};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, ErrorKind, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd};
use std::os::unix::process::CommandExt;
use std::process::Command;
use std::sync::Mutex;

/// Set to `1` in the helper child so the re-executed binary serves the TTY
/// instead of running the engine.
pub const HELPER_ENV: &str = "HANFE_TTY_HELPER";
const BRIDGE_FD_ENV: &str = "HANFE_TTY_BRIDGE_FD";
const CHILD_FD_ENV: &str = "HANFE_TTY_CHILD_FD";
const PATH_ENV: &str = "HANFE_TTY_PATH";

const CHILD_FD: i32 = 3;

const OP_TEXT: u8 = b'T';
const OP_BACKSPACE: u8 = b'B';

// Parent side of the socketpair, retained so Attach can reuse it in-process
// instead of re-wrapping the raw descriptor number from the environment.
static RETAINED_PARENT: Mutex<Option<OwnedFd>> = Mutex::new(None);

/// Whether this process was launched as the TTY helper.
pub fn in_helper_mode() -> bool {
    std::env::var(HELPER_ENV).map(|v| v == "1").unwrap_or(false)
}

/// Persist the resolved TTY path in the environment so it survives re-exec.
pub fn remember_tty_path(path: &str) {
    if !path.is_empty() {
        std::env::set_var(PATH_ENV, path);
    }
}

/// A TTY path remembered by an earlier invocation, if any.
pub fn tty_path_hint() -> Option<String> {
    std::env::var(PATH_ENV).ok().filter(|p| !p.is_empty())
}

/// Resolve the controlling terminal by probing stdin/stdout/stderr and
/// reading the `/proc/self/fd` link of the first descriptor that is a TTY.
pub fn detect_tty_path() -> Result<String> {
    for fd in 0..3 {
        if unsafe { libc::isatty(fd) } != 1 {
            continue;
        }
        let link = format!("/proc/self/fd/{}", fd);
        if let Ok(target) = std::fs::read_link(&link) {
            let path = target.to_string_lossy().into_owned();
            if !path.is_empty() {
                return Ok(path);
            }
        }
    }
    Err(anyhow!("no controlling tty detected"))
}

/// Fork the helper process for the given TTY path. A no-op when a helper is
/// already advertised through the environment.
pub fn spawn_helper(tty_path: &str) -> Result<()> {
    if tty_path.is_empty() {
        return Ok(());
    }
    if std::env::var(BRIDGE_FD_ENV).is_ok() {
        // Helper already spawned in this environment.
        return Ok(());
    }

    let (parent, child) = socketpair(
        AddressFamily::Unix,
        SockType::Stream,
        None,
        SockFlag::empty(),
    )
    .context("socketpair for tty helper")?;

    let exe = std::env::current_exe().context("resolve executable for tty helper")?;
    let child_raw = child.as_raw_fd();

    let mut command = Command::new(exe);
    command
        .env(HELPER_ENV, "1")
        .env(PATH_ENV, tty_path)
        .env(CHILD_FD_ENV, CHILD_FD.to_string());
    unsafe {
        command.pre_exec(move || {
            // Move the inherited socket onto the advertised descriptor.
            if libc::dup2(child_raw, CHILD_FD) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
    let handle = command.spawn().context("start tty helper")?;
    drop(child);
    info!("tty helper spawned for {} (pid {})", tty_path, handle.id());

    std::env::set_var(BRIDGE_FD_ENV, parent.as_raw_fd().to_string());
    *RETAINED_PARENT.lock().unwrap_or_else(|e| e.into_inner()) = Some(parent);
    Ok(())
}

/// Client side of the helper socket.
pub struct Client {
    file: File,
}

/// Connect to the helper advertised in the environment. `Ok(None)` when no
/// helper was spawned.
pub fn attach() -> Result<Option<Client>> {
    let Ok(fd_str) = std::env::var(BRIDGE_FD_ENV) else {
        return Ok(None);
    };
    let fd: i32 = fd_str
        .parse()
        .with_context(|| format!("parse {}", BRIDGE_FD_ENV))?;

    let retained = RETAINED_PARENT
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();
    let file = match retained {
        Some(owned) if owned.as_raw_fd() == fd => File::from(owned),
        other => {
            *RETAINED_PARENT.lock().unwrap_or_else(|e| e.into_inner()) = other;
            // Inherited across exec; adopt the raw descriptor.
            unsafe { File::from_raw_fd(fd) }
        }
    };
    Ok(Some(Client { file }))
}

impl Client {
    /// Forward committed text to the helper as one `'T'` frame.
    pub fn write_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let payload = text.as_bytes();
        let mut frame = Vec::with_capacity(5 + payload.len());
        frame.push(OP_TEXT);
        frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        frame.extend_from_slice(payload);
        self.file.write_all(&frame).context("write to tty helper")
    }

    /// Ask the helper to push backspace bytes into the TTY.
    pub fn send_backspace(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let mut frame = [0u8; 5];
        frame[0] = OP_BACKSPACE;
        frame[1..].copy_from_slice(&(count as u32).to_be_bytes());
        self.file
            .write_all(&frame)
            .context("write backspace to tty helper")
    }
}

/// Serve the helper loop: read frames from the inherited socket and inject
/// them into the controlling terminal. Returns when the parent closes the
/// socket.
pub fn run_helper() -> Result<()> {
    let fd: i32 = std::env::var(CHILD_FD_ENV)
        .unwrap_or_else(|_| CHILD_FD.to_string())
        .parse()
        .with_context(|| format!("parse {}", CHILD_FD_ENV))?;
    let conn = unsafe { File::from_raw_fd(fd) };

    let tty_path =
        std::env::var(PATH_ENV).map_err(|_| anyhow!("{} not provided", PATH_ENV))?;
    let tty = OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_CLOEXEC)
        .open(&tty_path)
        .with_context(|| format!("open tty {}", tty_path))?;
    info!("tty helper serving {}", tty_path);

    serve(BufReader::new(conn), tty.as_raw_fd())
}

fn serve<R: Read>(mut reader: R, tty_fd: i32) -> Result<()> {
    loop {
        let mut opcode = [0u8; 1];
        match reader.read_exact(&mut opcode) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
                debug!("tty helper socket closed");
                return Ok(());
            }
            Err(err) => return Err(err).context("read helper command"),
        }
        let count = read_length(&mut reader)?;
        match opcode[0] {
            OP_TEXT => {
                let mut payload = vec![0u8; count as usize];
                reader.read_exact(&mut payload).context("read helper payload")?;
                for byte in payload {
                    tty_push_byte(tty_fd, byte)?;
                }
            }
            OP_BACKSPACE => {
                for _ in 0..count {
                    tty_push_byte(tty_fd, 0x08)?;
                }
            }
            other => bail!("unknown helper command {:#x}", other),
        }
    }
}

fn read_length<R: Read>(reader: &mut R) -> Result<u32> {
    let mut header = [0u8; 4];
    reader.read_exact(&mut header).context("read helper length")?;
    Ok(u32::from_be_bytes(header))
}

/// Push one byte into the TTY input queue, falling back to a direct write
/// when TIOCSTI is denied (e.g. kernels with legacy_tiocsti disabled).
fn tty_push_byte(fd: i32, byte: u8) -> Result<()> {
    let ret = unsafe { libc::ioctl(fd, libc::TIOCSTI, &byte as *const u8) };
    if ret == 0 {
        return Ok(());
    }
    let mut buf = [byte];
    loop {
        let written = unsafe { libc::write(fd, buf.as_ptr().cast(), 1) };
        if written == 1 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != ErrorKind::Interrupted {
            warn!("tty write fallback failed: {}", err);
            return Err(err).context("push byte into tty");
        }
        buf[0] = byte;
    }
}
