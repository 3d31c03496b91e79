//! Linux input event record
//!
//! Binary-compatible with `struct input_event` from <linux/input.h>:
//! a timeval followed by type, code, and value. The same layout is read
//! from the grabbed device and written to the uinput virtual device.

use crate::constants::{EV_KEY, EV_SYN, SYN_REPORT};

/// Size in bytes of one event record (24 on 64-bit kernels)
pub const EVENT_SIZE: usize = std::mem::size_of::<InputEvent>();

/// Key event value: release
pub const VALUE_RELEASE: i32 = 0;

/// Key event value: press
pub const VALUE_PRESS: i32 = 1;

/// Key event value: autorepeat
pub const VALUE_REPEAT: i32 = 2;

/// One evdev event record
#[repr(C)]
#[derive(Clone, Copy)]
pub struct InputEvent {
    /// Kernel timestamp (ignored on input, zeroed on synthesis)
    pub time: libc::timeval,
    /// Event type (EV_KEY, EV_SYN, ...)
    pub kind: u16,
    /// Key code for EV_KEY events
    pub code: u16,
    /// 0 = release, 1 = press, 2 = autorepeat
    pub value: i32,
}

impl InputEvent {
    /// Synthesise a key event with a zeroed timestamp.
    pub fn key(code: u16, value: i32) -> Self {
        Self {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            kind: EV_KEY,
            code,
            value,
        }
    }

    /// Synthesise a SYN_REPORT event.
    pub fn syn() -> Self {
        Self {
            time: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            kind: EV_SYN,
            code: SYN_REPORT,
            value: 0,
        }
    }

    pub fn is_key(&self) -> bool {
        self.kind == EV_KEY
    }

    pub fn is_press(&self) -> bool {
        self.value == VALUE_PRESS || self.value == VALUE_REPEAT
    }

    pub fn is_release(&self) -> bool {
        self.value == VALUE_RELEASE
    }

    /// View the record as raw bytes for device I/O.
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts((self as *const Self).cast::<u8>(), EVENT_SIZE) }
    }

    /// Mutable raw-byte view used when reading directly into the record.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut((self as *mut Self).cast::<u8>(), EVENT_SIZE) }
    }
}

impl std::fmt::Debug for InputEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputEvent")
            .field("kind", &self.kind)
            .field("code", &self.code)
            .field("value", &self.value)
            .finish()
    }
}
