//! Exclusive-grab evdev reader
//!
//! Opens a keyboard device read-only, non-blocking, close-on-exec, claims it
//! with EVIOCGRAB so no other reader sees its events, and reads fixed-size
//! event records. Transient errors are absorbed here (EINTR retries, EAGAIN
//! parks on poll); device loss surfaces as end-of-stream or a device-gone
//! error depending on whether shutdown was requested.
//!
//! Also hosts keyboard auto-detection: candidates from /dev/input/by-id and
//! /dev/input/by-path symlinks plus the raw event nodes, qualified by their
//! EVIOCGBIT key capabilities.

use anyhow::{anyhow, Context, Result};
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsFd, AsRawFd};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::constants::{
    eviocgbit, eviocgname, EVIOCGRAB, EV_KEY, EV_MAX, KEY_A, KEY_ENTER, KEY_LEFTSHIFT, KEY_MAX,
    KEY_SPACE, KEY_Z,
};
use crate::input::event::{InputEvent, EVENT_SIZE};
use crate::ioctl::{ioctl_read_buf, ioctl_set_int};

// ============================================================================
// Shutdown Signalling
// ============================================================================

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::SeqCst);
}

/// Install SIGINT/SIGTERM/SIGQUIT handlers that request a clean shutdown.
///
/// SA_RESTART is deliberately not set so the blocking poll in the event
/// loop wakes with EINTR and observes the flag.
pub fn install_signal_handlers() {
    for sig in [libc::SIGINT, libc::SIGTERM, libc::SIGQUIT] {
        unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = handle_signal as extern "C" fn(libc::c_int) as usize;
            libc::sigemptyset(&mut action.sa_mask);
            action.sa_flags = 0;
            libc::sigaction(sig, &action, std::ptr::null_mut());
        }
    }
}

/// True once a termination signal has been delivered.
pub fn shutdown_requested() -> bool {
    SHUTDOWN.load(Ordering::SeqCst)
}

// ============================================================================
// Device Reader
// ============================================================================

/// A grabbed evdev keyboard device
pub struct EvdevDevice {
    file: File,
    path: String,
    grabbed: bool,
}

impl EvdevDevice {
    /// Open an evdev node read-only, non-blocking, close-on-exec.
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)
            .with_context(|| format!("open input device {}", path))?;
        info!("input device opened: {}", path);
        Ok(Self {
            file,
            path: path.to_string(),
            grabbed: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Claim the device exclusively so no other reader sees its events.
    pub fn grab(&mut self) -> Result<()> {
        ioctl_set_int(self.file.as_raw_fd(), EVIOCGRAB, 1, "EVIOCGRAB")
            .with_context(|| format!("grab input device {}", self.path))?;
        self.grabbed = true;
        info!("input device grabbed: {}", self.path);
        Ok(())
    }

    /// Release the exclusive grab. Safe to call repeatedly.
    pub fn ungrab(&mut self) {
        if self.grabbed {
            if let Err(err) = ioctl_set_int(self.file.as_raw_fd(), EVIOCGRAB, 0, "EVIOCGRAB") {
                warn!("release grab on {}: {}", self.path, err);
            }
            self.grabbed = false;
        }
    }

    /// Read the next event record.
    ///
    /// Returns `Ok(None)` on clean end-of-stream: EOF, a requested shutdown,
    /// or the descriptor going away after one (EBADF/ENODEV). Short reads
    /// that are not a full record are discarded.
    pub fn read_event(&self) -> Result<Option<InputEvent>> {
        let mut event = InputEvent::syn();
        loop {
            if shutdown_requested() {
                return Ok(None);
            }
            match nix::unistd::read(self.file.as_raw_fd(), event.as_bytes_mut()) {
                Ok(0) => return Ok(None),
                Ok(n) if n != EVENT_SIZE => {
                    debug!("discarding short read of {} bytes from {}", n, self.path);
                }
                Ok(_) => return Ok(Some(event)),
                Err(Errno::EINTR) => {}
                Err(Errno::EAGAIN) => {
                    if !self.wait_readable()? {
                        return Ok(None);
                    }
                }
                Err(Errno::EBADF) | Err(Errno::ENODEV) => return Ok(None),
                Err(err) => {
                    return Err(anyhow!("read input event from {}: {}", self.path, err));
                }
            }
        }
    }

    /// Block until the device is readable. Returns `false` when shutdown was
    /// requested while waiting.
    fn wait_readable(&self) -> Result<bool> {
        loop {
            let fd = self.file.as_fd();
            let mut fds = [PollFd::new(
                &fd,
                PollFlags::POLLIN | PollFlags::POLLPRI,
            )];
            match poll(&mut fds, -1) {
                Err(Errno::EINTR) => {
                    if shutdown_requested() {
                        return Ok(false);
                    }
                    continue;
                }
                Err(err) => return Err(anyhow!("poll input device {}: {}", self.path, err)),
                Ok(0) => continue,
                Ok(_) => {}
            }
            let revents = fds[0].revents().unwrap_or(PollFlags::empty());
            if revents.intersects(PollFlags::POLLERR | PollFlags::POLLHUP | PollFlags::POLLNVAL) {
                if shutdown_requested() {
                    return Ok(false);
                }
                return Err(anyhow!("input device {} disappeared", self.path));
            }
            if revents.intersects(PollFlags::POLLIN | PollFlags::POLLPRI) {
                return Ok(true);
            }
        }
    }
}

impl Drop for EvdevDevice {
    fn drop(&mut self) {
        self.ungrab();
    }
}

// ============================================================================
// Keyboard Detection
// ============================================================================

/// A qualified keyboard candidate
#[derive(Debug, Clone)]
pub struct DetectedDevice {
    pub path: String,
    pub name: String,
}

/// Probe /dev/input and return every node that looks like a real keyboard.
pub fn list_keyboard_devices() -> Result<Vec<DetectedDevice>> {
    let candidates = gather_candidates();
    let mut devices = Vec::new();
    let mut permission_denied = false;
    let mut last_error: Option<String> = None;

    for path in &candidates {
        let file = match OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path)
        {
            Ok(file) => file,
            Err(err) => {
                if err.kind() == std::io::ErrorKind::PermissionDenied {
                    permission_denied = true;
                }
                last_error = Some(format!("{}: {}", path, err));
                continue;
            }
        };
        let fd = file.as_raw_fd();
        if is_keyboard_fd(fd) {
            devices.push(DetectedDevice {
                path: path.clone(),
                name: read_device_name(fd),
            });
        }
    }

    if devices.is_empty() {
        if permission_denied {
            return Err(anyhow!(
                "permission denied while probing input devices; run as root or adjust udev permissions"
            ));
        }
        if candidates.is_empty() {
            return Err(anyhow!("no evdev devices found under /dev/input"));
        }
        if let Some(err) = last_error {
            return Err(anyhow!("no keyboard-like device found (last error: {})", err));
        }
        return Err(anyhow!("no keyboard-like device found"));
    }

    devices.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(devices)
}

/// First qualified keyboard, in stable path order.
pub fn detect_keyboard_device() -> Result<DetectedDevice> {
    let devices = list_keyboard_devices()?;
    devices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("no keyboard-like device found"))
}

fn gather_candidates() -> Vec<String> {
    let mut candidates = Vec::new();
    candidates.extend(collect_keyboard_symlinks("/dev/input/by-id"));
    candidates.extend(collect_keyboard_symlinks("/dev/input/by-path"));
    candidates.extend(collect_event_nodes());
    candidates.sort();
    candidates.dedup();
    candidates
}

fn collect_keyboard_symlinks(dir: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let Ok(dir_entries) = std::fs::read_dir(dir) else {
        return entries;
    };
    for entry in dir_entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.contains("kbd") || name.contains("keyboard") {
            entries.push(entry.path().to_string_lossy().into_owned());
        }
    }
    entries
}

fn collect_event_nodes() -> Vec<String> {
    let mut entries = Vec::new();
    let Ok(dir_entries) = std::fs::read_dir("/dev/input") else {
        return entries;
    };
    for entry in dir_entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("event") {
            entries.push(
                Path::new("/dev/input")
                    .join(name.as_ref())
                    .to_string_lossy()
                    .into_owned(),
            );
        }
    }
    entries
}

/// A node qualifies as a keyboard when it advertises EV_KEY and the plain
/// letter/space/enter/shift codes a real keyboard always carries.
fn is_keyboard_fd(fd: i32) -> bool {
    let mut ev_bits = vec![0u8; bits_to_bytes(EV_MAX as usize + 1)];
    if ioctl_read_buf(fd, eviocgbit(0, ev_bits.len()), &mut ev_bits, "EVIOCGBIT").is_err() {
        return false;
    }
    if !test_bit(&ev_bits, EV_KEY as usize) {
        return false;
    }

    let mut key_bits = vec![0u8; bits_to_bytes(KEY_MAX as usize + 1)];
    if ioctl_read_buf(
        fd,
        eviocgbit(EV_KEY, key_bits.len()),
        &mut key_bits,
        "EVIOCGBIT(EV_KEY)",
    )
    .is_err()
    {
        return false;
    }

    [KEY_A, KEY_Z, KEY_SPACE, KEY_ENTER, KEY_LEFTSHIFT]
        .iter()
        .all(|&code| test_bit(&key_bits, code as usize))
}

fn read_device_name(fd: i32) -> String {
    let mut buf = [0u8; 256];
    if ioctl_read_buf(fd, eviocgname(buf.len()), &mut buf, "EVIOCGNAME").is_err() {
        return String::new();
    }
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8_lossy(&buf[..end]).into_owned()
}

fn bits_to_bytes(bits: usize) -> usize {
    (bits + 7) / 8
}

fn test_bit(bits: &[u8], bit: usize) -> bool {
    bits.get(bit / 8)
        .map(|byte| byte & (1 << (bit % 8)) != 0)
        .unwrap_or(false)
}
