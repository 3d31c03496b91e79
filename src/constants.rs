//! evdev and uinput constants
//!
//! Consolidates the Linux input event codes, uinput device parameters, and
//! ioctl request numbers used throughout hanfe. Key codes are from
//! <linux/input-event-codes.h>.

#![allow(dead_code)]

// ============================================================================
// Event Types
// ============================================================================

/// Synchronisation event type
pub const EV_SYN: u16 = 0x00;

/// Key event type
pub const EV_KEY: u16 = 0x01;

/// SYN_REPORT code (end of event batch)
pub const SYN_REPORT: u16 = 0;

/// Highest key code a device may advertise
pub const KEY_MAX: u16 = 0x2ff;

/// Highest event type
pub const EV_MAX: u16 = 0x1f;

// ============================================================================
// Modifier Keys
// ============================================================================

/// Left Control key
pub const KEY_LEFTCTRL: u16 = 29;

/// Right Control key
pub const KEY_RIGHTCTRL: u16 = 97;

/// Left Shift key
pub const KEY_LEFTSHIFT: u16 = 42;

/// Right Shift key
pub const KEY_RIGHTSHIFT: u16 = 54;

/// Left Alt key
pub const KEY_LEFTALT: u16 = 56;

/// Right Alt key (AltGr on some keyboards)
pub const KEY_RIGHTALT: u16 = 100;

/// Left Meta (Super) key
pub const KEY_LEFTMETA: u16 = 125;

/// Right Meta (Super) key
pub const KEY_RIGHTMETA: u16 = 126;

// ============================================================================
// Main Block
// ============================================================================

pub const KEY_ESC: u16 = 1;
pub const KEY_1: u16 = 2;
pub const KEY_2: u16 = 3;
pub const KEY_3: u16 = 4;
pub const KEY_4: u16 = 5;
pub const KEY_5: u16 = 6;
pub const KEY_6: u16 = 7;
pub const KEY_7: u16 = 8;
pub const KEY_8: u16 = 9;
pub const KEY_9: u16 = 10;
pub const KEY_0: u16 = 11;
pub const KEY_MINUS: u16 = 12;
pub const KEY_EQUAL: u16 = 13;
pub const KEY_BACKSPACE: u16 = 14;
pub const KEY_TAB: u16 = 15;
pub const KEY_Q: u16 = 16;
pub const KEY_W: u16 = 17;
pub const KEY_E: u16 = 18;
pub const KEY_R: u16 = 19;
pub const KEY_T: u16 = 20;
pub const KEY_Y: u16 = 21;
pub const KEY_U: u16 = 22;
pub const KEY_I: u16 = 23;
pub const KEY_O: u16 = 24;
pub const KEY_P: u16 = 25;
pub const KEY_LEFTBRACE: u16 = 26;
pub const KEY_RIGHTBRACE: u16 = 27;
pub const KEY_ENTER: u16 = 28;
pub const KEY_A: u16 = 30;
pub const KEY_S: u16 = 31;
pub const KEY_D: u16 = 32;
pub const KEY_F: u16 = 33;
pub const KEY_G: u16 = 34;
pub const KEY_H: u16 = 35;
pub const KEY_J: u16 = 36;
pub const KEY_K: u16 = 37;
pub const KEY_L: u16 = 38;
pub const KEY_SEMICOLON: u16 = 39;
pub const KEY_APOSTROPHE: u16 = 40;
pub const KEY_GRAVE: u16 = 41;
pub const KEY_BACKSLASH: u16 = 43;
pub const KEY_Z: u16 = 44;
pub const KEY_X: u16 = 45;
pub const KEY_C: u16 = 46;
pub const KEY_V: u16 = 47;
pub const KEY_B: u16 = 48;
pub const KEY_N: u16 = 49;
pub const KEY_M: u16 = 50;
pub const KEY_COMMA: u16 = 51;
pub const KEY_DOT: u16 = 52;
pub const KEY_SLASH: u16 = 53;
pub const KEY_SPACE: u16 = 57;
pub const KEY_CAPSLOCK: u16 = 58;

// ============================================================================
// Function Keys
// ============================================================================

pub const KEY_F1: u16 = 59;
pub const KEY_F2: u16 = 60;
pub const KEY_F3: u16 = 61;
pub const KEY_F4: u16 = 62;
pub const KEY_F5: u16 = 63;
pub const KEY_F6: u16 = 64;
pub const KEY_F7: u16 = 65;
pub const KEY_F8: u16 = 66;
pub const KEY_F9: u16 = 67;
pub const KEY_F10: u16 = 68;
pub const KEY_F11: u16 = 87;
pub const KEY_F12: u16 = 88;

// ============================================================================
// Korean Keyboard Keys
// ============================================================================

/// Hangul/English toggle key on Korean keyboards
pub const KEY_HANGEUL: u16 = 122;

/// Hanja conversion key on Korean keyboards
pub const KEY_HANJA: u16 = 123;

// ============================================================================
// uinput Device Parameters
// ============================================================================

/// USB bus type for the virtual device identity
pub const BUS_USB: u16 = 0x03;

/// Fixed size of the uinput device name field
pub const UINPUT_MAX_NAME_SIZE: usize = 80;

// ============================================================================
// ioctl Request Numbers
// ============================================================================

const IOC_NRBITS: u64 = 8;
const IOC_TYPEBITS: u64 = 8;
const IOC_SIZEBITS: u64 = 14;

const IOC_NRSHIFT: u64 = 0;
const IOC_TYPESHIFT: u64 = IOC_NRSHIFT + IOC_NRBITS;
const IOC_SIZESHIFT: u64 = IOC_TYPESHIFT + IOC_TYPEBITS;
const IOC_DIRSHIFT: u64 = IOC_SIZESHIFT + IOC_SIZEBITS;

const IOC_NONE: u64 = 0;
const IOC_WRITE: u64 = 1;
const IOC_READ: u64 = 2;

const fn ioc(dir: u64, ty: u8, nr: u64, size: u64) -> libc::c_ulong {
    ((dir << IOC_DIRSHIFT)
        | ((ty as u64) << IOC_TYPESHIFT)
        | (nr << IOC_NRSHIFT)
        | (size << IOC_SIZESHIFT)) as libc::c_ulong
}

const fn iow(ty: u8, nr: u64, size: u64) -> libc::c_ulong {
    ioc(IOC_WRITE, ty, nr, size)
}

const fn io(ty: u8, nr: u64) -> libc::c_ulong {
    ioc(IOC_NONE, ty, nr, 0)
}

const INT_SIZE: u64 = 4;

/// Exclusive grab / release of an evdev device (int argument: 1 grab, 0 release)
pub const EVIOCGRAB: libc::c_ulong = iow(b'E', 0x90, INT_SIZE);

/// Register an event type on a uinput device
pub const UI_SET_EVBIT: libc::c_ulong = iow(b'U', 100, INT_SIZE);

/// Register a key code on a uinput device
pub const UI_SET_KEYBIT: libc::c_ulong = iow(b'U', 101, INT_SIZE);

/// Create the configured uinput device
pub const UI_DEV_CREATE: libc::c_ulong = io(b'U', 1);

/// Destroy the uinput device
pub const UI_DEV_DESTROY: libc::c_ulong = io(b'U', 2);

/// Read the event-type or per-type capability bitmap of an evdev device
pub const fn eviocgbit(ev: u16, len: usize) -> libc::c_ulong {
    ioc(IOC_READ, b'E', 0x20 + ev as u64, len as u64)
}

/// Read the human-readable name of an evdev device
pub const fn eviocgname(len: usize) -> libc::c_ulong {
    ioc(IOC_READ, b'E', 0x06, len as u64)
}

// ============================================================================
// Key Name Resolution
// ============================================================================

/// Resolve a canonical key name (`KEY_Q`, `KEY_SPACE`), a shorthand
/// (`ALT_R`, `HANGUL`), or a bare letter/digit to its evdev key code.
/// Names are case-insensitive.
pub fn keycode_from_name(name: &str) -> Option<u16> {
    let mut normalized = name.trim().to_uppercase();
    if normalized.is_empty() {
        return None;
    }

    normalized = match normalized.as_str() {
        "ALT_R" | "RIGHTALT" => "KEY_RIGHTALT".to_string(),
        "ALT_L" | "LEFTALT" => "KEY_LEFTALT".to_string(),
        "CTRL_R" | "CONTROL_R" | "RIGHTCTRL" => "KEY_RIGHTCTRL".to_string(),
        "CTRL_L" | "CONTROL_L" | "LEFTCTRL" => "KEY_LEFTCTRL".to_string(),
        "SHIFT_R" | "RIGHTSHIFT" => "KEY_RIGHTSHIFT".to_string(),
        "SHIFT_L" | "LEFTSHIFT" => "KEY_LEFTSHIFT".to_string(),
        "META_R" | "RIGHTMETA" => "KEY_RIGHTMETA".to_string(),
        "META_L" | "LEFTMETA" => "KEY_LEFTMETA".to_string(),
        "HANGUL" | "HANGEUL" => "KEY_HANGEUL".to_string(),
        "HANJA" => "KEY_HANJA".to_string(),
        _ => normalized,
    };

    if !normalized.starts_with("KEY_") {
        normalized = format!("KEY_{}", normalized);
    }

    // Letters and digits resolve by position instead of one arm each.
    if let Some(rest) = normalized.strip_prefix("KEY_") {
        let mut chars = rest.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if ch.is_ascii_uppercase() {
                return letter_keycode(ch);
            }
            if let Some(digit) = ch.to_digit(10) {
                return Some(if digit == 0 {
                    KEY_0
                } else {
                    KEY_1 + digit as u16 - 1
                });
            }
        }
    }

    let code = match normalized.as_str() {
        "KEY_MINUS" => KEY_MINUS,
        "KEY_EQUAL" => KEY_EQUAL,
        "KEY_LEFTBRACE" => KEY_LEFTBRACE,
        "KEY_RIGHTBRACE" => KEY_RIGHTBRACE,
        "KEY_BACKSLASH" => KEY_BACKSLASH,
        "KEY_SEMICOLON" => KEY_SEMICOLON,
        "KEY_APOSTROPHE" => KEY_APOSTROPHE,
        "KEY_GRAVE" => KEY_GRAVE,
        "KEY_COMMA" => KEY_COMMA,
        "KEY_DOT" => KEY_DOT,
        "KEY_SLASH" => KEY_SLASH,
        "KEY_SPACE" => KEY_SPACE,
        "KEY_TAB" => KEY_TAB,
        "KEY_ENTER" => KEY_ENTER,
        "KEY_ESC" => KEY_ESC,
        "KEY_BACKSPACE" => KEY_BACKSPACE,
        "KEY_CAPSLOCK" => KEY_CAPSLOCK,
        "KEY_LEFTSHIFT" => KEY_LEFTSHIFT,
        "KEY_RIGHTSHIFT" => KEY_RIGHTSHIFT,
        "KEY_LEFTCTRL" => KEY_LEFTCTRL,
        "KEY_RIGHTCTRL" => KEY_RIGHTCTRL,
        "KEY_LEFTALT" => KEY_LEFTALT,
        "KEY_RIGHTALT" => KEY_RIGHTALT,
        "KEY_LEFTMETA" => KEY_LEFTMETA,
        "KEY_RIGHTMETA" => KEY_RIGHTMETA,
        "KEY_HANGEUL" => KEY_HANGEUL,
        "KEY_HANJA" => KEY_HANJA,
        "KEY_F1" => KEY_F1,
        "KEY_F2" => KEY_F2,
        "KEY_F3" => KEY_F3,
        "KEY_F4" => KEY_F4,
        "KEY_F5" => KEY_F5,
        "KEY_F6" => KEY_F6,
        "KEY_F7" => KEY_F7,
        "KEY_F8" => KEY_F8,
        "KEY_F9" => KEY_F9,
        "KEY_F10" => KEY_F10,
        "KEY_F11" => KEY_F11,
        "KEY_F12" => KEY_F12,
        _ => return None,
    };
    Some(code)
}

fn letter_keycode(ch: char) -> Option<u16> {
    let code = match ch {
        'A' => KEY_A,
        'B' => KEY_B,
        'C' => KEY_C,
        'D' => KEY_D,
        'E' => KEY_E,
        'F' => KEY_F,
        'G' => KEY_G,
        'H' => KEY_H,
        'I' => KEY_I,
        'J' => KEY_J,
        'K' => KEY_K,
        'L' => KEY_L,
        'M' => KEY_M,
        'N' => KEY_N,
        'O' => KEY_O,
        'P' => KEY_P,
        'Q' => KEY_Q,
        'R' => KEY_R,
        'S' => KEY_S,
        'T' => KEY_T,
        'U' => KEY_U,
        'V' => KEY_V,
        'W' => KEY_W,
        'X' => KEY_X,
        'Y' => KEY_Y,
        'Z' => KEY_Z,
        _ => return None,
    };
    Some(code)
}
