//! Safe wrappers for ioctl system calls
//!
//! Provides error-handling wrappers around the ioctl operations used for
//! evdev grabbing and uinput device setup, to reduce unsafe boilerplate in
//! the device and emitter modules.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::os::unix::io::RawFd;

/// Execute an ioctl command that takes no argument.
///
/// # Arguments
/// * `fd` - File descriptor
/// * `cmd` - ioctl command number
/// * `cmd_name` - Human-readable name for error messages
pub fn ioctl_no_arg(fd: RawFd, cmd: libc::c_ulong, cmd_name: &str) -> Result<()> {
    let ret = unsafe { libc::ioctl(fd, cmd) };
    if ret < 0 {
        Err(anyhow!(
            "{} failed on fd {}: {}",
            cmd_name,
            fd,
            std::io::Error::last_os_error()
        ))
    } else {
        Ok(())
    }
}

/// Execute an ioctl command with an integer argument.
/// Retries on EINTR.
///
/// # Arguments
/// * `fd` - File descriptor
/// * `cmd` - ioctl command number
/// * `arg` - Integer argument
/// * `cmd_name` - Human-readable name for error messages
pub fn ioctl_set_int(fd: RawFd, cmd: libc::c_ulong, arg: libc::c_int, cmd_name: &str) -> Result<()> {
    loop {
        let ret = unsafe { libc::ioctl(fd, cmd, arg) };
        if ret >= 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(anyhow!("{} failed on fd {}: {}", cmd_name, fd, err));
        }
        // EINTR: retry the ioctl
    }
}

/// Execute an ioctl command that fills a caller-provided byte buffer.
///
/// # Arguments
/// * `fd` - File descriptor
/// * `cmd` - ioctl command number
/// * `buf` - Buffer the kernel writes into
/// * `cmd_name` - Human-readable name for error messages
pub fn ioctl_read_buf(fd: RawFd, cmd: libc::c_ulong, buf: &mut [u8], cmd_name: &str) -> Result<()> {
    if buf.is_empty() {
        return Ok(());
    }
    let ret = unsafe { libc::ioctl(fd, cmd, buf.as_mut_ptr()) };
    if ret < 0 {
        Err(anyhow!(
            "{} failed on fd {}: {}",
            cmd_name,
            fd,
            std::io::Error::last_os_error()
        ))
    } else {
        Ok(())
    }
}
