//! uinput virtual keyboard emitter
//!
//! Creates a virtual device ("hanfe-fallback") with every key code
//! registered, forwards raw events verbatim, and commits text by typing the
//! IBus/GTK Unicode sequence: Ctrl+Shift+U, the lowercase hex digits of the
//! code point, then Ctrl+Shift+Enter.
//!
//! Preedit is not round-tripped through the display in this mode: erasing
//! hex-injected characters is unreliable, so the engine keeps preedit as
//! internal state and only the final commit is typed.

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use crate::constants::{
    BUS_USB, EV_KEY, EV_SYN, KEY_BACKSPACE, KEY_ENTER, KEY_LEFTCTRL, KEY_LEFTSHIFT, KEY_MAX,
    KEY_U, UINPUT_MAX_NAME_SIZE, UI_DEV_CREATE, UI_DEV_DESTROY, UI_SET_EVBIT, UI_SET_KEYBIT,
};
use crate::emitter::Emitter;
use crate::input::InputEvent;
use crate::ioctl::{ioctl_no_arg, ioctl_set_int};
use crate::layout::unicode_hex_keycodes;

const DEVICE_NAME: &[u8] = b"hanfe-fallback";

const ABS_CNT: usize = 0x40;

#[repr(C)]
struct InputId {
    bustype: u16,
    vendor: u16,
    product: u16,
    version: u16,
}

/// Legacy uinput setup record written before UI_DEV_CREATE.
#[repr(C)]
struct UinputUserDev {
    name: [u8; UINPUT_MAX_NAME_SIZE],
    id: InputId,
    ff_effects_max: u32,
    absmax: [i32; ABS_CNT],
    absmin: [i32; ABS_CNT],
    absfuzz: [i32; ABS_CNT],
    absflat: [i32; ABS_CNT],
}

/// Virtual keyboard backed by /dev/uinput.
pub struct UinputEmitter {
    device: Option<File>,
    hex_keycodes: [u16; 16],
}

impl UinputEmitter {
    /// Open /dev/uinput, register EV_SYN/EV_KEY and all key codes, and
    /// create the virtual device.
    pub fn open() -> Result<Self> {
        let device = OpenOptions::new()
            .write(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open("/dev/uinput")
            .context("open /dev/uinput")?;
        let fd = device.as_raw_fd();

        ioctl_set_int(fd, UI_SET_EVBIT, EV_SYN as libc::c_int, "UI_SET_EVBIT(EV_SYN)")?;
        ioctl_set_int(fd, UI_SET_EVBIT, EV_KEY as libc::c_int, "UI_SET_EVBIT(EV_KEY)")?;
        for code in 0..=KEY_MAX {
            // Some codes are rejected by older kernels; that is fine.
            let _ = ioctl_set_int(fd, UI_SET_KEYBIT, code as libc::c_int, "UI_SET_KEYBIT");
        }

        let mut setup: UinputUserDev = unsafe { std::mem::zeroed() };
        setup.name[..DEVICE_NAME.len()].copy_from_slice(DEVICE_NAME);
        setup.id = InputId {
            bustype: BUS_USB,
            vendor: 0x1,
            product: 0x1,
            version: 1,
        };
        let setup_bytes = unsafe {
            std::slice::from_raw_parts(
                (&setup as *const UinputUserDev).cast::<u8>(),
                std::mem::size_of::<UinputUserDev>(),
            )
        };
        write_all_fd(fd, setup_bytes).context("write uinput setup")?;

        ioctl_no_arg(fd, UI_DEV_CREATE, "UI_DEV_CREATE")?;
        info!("uinput virtual keyboard created");

        Ok(Self {
            device: Some(device),
            hex_keycodes: unicode_hex_keycodes(),
        })
    }

    fn fd(&self) -> Result<i32> {
        self.device
            .as_ref()
            .map(|f| f.as_raw_fd())
            .ok_or_else(|| anyhow!("uinput emitter already closed"))
    }

    fn write_event(&mut self, event: &InputEvent) -> Result<()> {
        let fd = self.fd()?;
        write_all_fd(fd, event.as_bytes()).context("write uinput event")
    }

    fn emit_sync(&mut self) -> Result<()> {
        self.write_event(&InputEvent::syn())
    }

    /// Type one code point with the Ctrl+Shift+U hex sequence.
    fn type_unicode(&mut self, ch: char) -> Result<()> {
        self.send_key_state(KEY_LEFTCTRL, true)?;
        self.send_key_state(KEY_LEFTSHIFT, true)?;
        self.tap_key(KEY_U)?;
        self.send_key_state(KEY_LEFTSHIFT, false)?;
        self.send_key_state(KEY_LEFTCTRL, false)?;

        for digit in format!("{:x}", ch as u32).chars() {
            let index = digit.to_digit(16).map(|d| d as usize);
            if let Some(code) = index.and_then(|i| self.hex_keycodes.get(i).copied()) {
                self.tap_key(code)?;
            }
        }

        self.send_key_state(KEY_LEFTCTRL, true)?;
        self.send_key_state(KEY_LEFTSHIFT, true)?;
        self.tap_key(KEY_ENTER)?;
        self.send_key_state(KEY_LEFTSHIFT, false)?;
        self.send_key_state(KEY_LEFTCTRL, false)
    }
}

impl Emitter for UinputEmitter {
    fn forward_event(&mut self, event: &InputEvent) -> Result<()> {
        self.write_event(event)?;
        self.emit_sync()
    }

    fn send_key_state(&mut self, code: u16, pressed: bool) -> Result<()> {
        let value = if pressed { 1 } else { 0 };
        self.write_event(&InputEvent::key(code, value))?;
        self.emit_sync()
    }

    fn send_backspace(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            self.tap_key(KEY_BACKSPACE)?;
        }
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        for ch in text.chars() {
            self.type_unicode(ch)?;
        }
        Ok(())
    }

    fn supports_preedit(&self) -> bool {
        false
    }

    fn close(&mut self) -> Result<()> {
        if let Some(device) = self.device.take() {
            if let Err(err) = ioctl_no_arg(device.as_raw_fd(), UI_DEV_DESTROY, "UI_DEV_DESTROY") {
                warn!("destroy uinput device: {}", err);
            }
        }
        Ok(())
    }
}

impl Drop for UinputEmitter {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Full write with EINTR retry; uinput accepts whole records only.
fn write_all_fd(fd: i32, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let written = unsafe { libc::write(fd, buf.as_ptr().cast(), buf.len()) };
        if written < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        buf = &buf[written as usize..];
    }
    Ok(())
}
