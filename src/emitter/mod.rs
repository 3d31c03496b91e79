//! Output emitters
//!
//! The engine talks to the host application through the `Emitter` capability
//! set. Two implementations exist: a uinput virtual keyboard that commits
//! text through the Ctrl+Shift+U Unicode-hex convention (graphical
//! sessions), and a direct-commit emitter that routes bytes through the TTY
//! helper bridge and an optional PTY mirror (text consoles).

use anyhow::Result;

use crate::input::InputEvent;

pub mod direct;
pub mod uinput;

pub use direct::DirectEmitter;
pub use uinput::UinputEmitter;

/// Operations the engine requires to emit characters, update preedit text,
/// and forward raw input events.
pub trait Emitter {
    /// Forward a raw event unchanged (no-op for the direct-commit backend).
    fn forward_event(&mut self, event: &InputEvent) -> Result<()>;

    /// Press or release a single key on the output device.
    fn send_key_state(&mut self, code: u16, pressed: bool) -> Result<()>;

    /// Press and release a key.
    fn tap_key(&mut self, code: u16) -> Result<()> {
        self.send_key_state(code, true)?;
        self.send_key_state(code, false)
    }

    /// Erase `count` characters before the cursor.
    fn send_backspace(&mut self, count: usize) -> Result<()>;

    /// Deliver literal text to the application.
    fn send_text(&mut self, text: &str) -> Result<()>;

    /// Whether preedit text can be cheaply erased and replaced on screen.
    fn supports_preedit(&self) -> bool;

    /// Tear down the output channel. Safe to call repeatedly.
    fn close(&mut self) -> Result<()>;
}
