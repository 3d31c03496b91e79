//! Direct-commit emitter
//!
//! Console path: text and backspaces go through the TTY helper bridge and
//! are optionally mirrored into a caller-supplied PTY. No virtual keyboard
//! exists, so raw event forwarding and synthetic key states are no-ops; the
//! engine's modifier bookkeeping still runs, it just has nothing to press.
//!
//! Preedit is supported here: erasing is a single backspace byte, so the
//! engine round-trips every preedit change to the terminal.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;

use crate::bridge;
use crate::emitter::Emitter;
use crate::input::InputEvent;

/// Bridge-backed emitter for text consoles.
pub struct DirectEmitter {
    client: Option<bridge::Client>,
    pty: Option<File>,
}

impl DirectEmitter {
    /// Wrap an attached bridge client and optionally open a PTY to mirror
    /// output into (write-only, close-on-exec).
    pub fn new(client: Option<bridge::Client>, pty_path: Option<&str>) -> Result<Self> {
        let pty = match pty_path {
            Some(path) if !path.is_empty() => Some(
                OpenOptions::new()
                    .write(true)
                    .custom_flags(libc::O_CLOEXEC)
                    .open(path)
                    .with_context(|| format!("open pty {}", path))?,
            ),
            _ => None,
        };
        Ok(Self { client, pty })
    }

    fn mirror_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if let Some(pty) = &mut self.pty {
            pty.write_all(bytes).context("write to pty mirror")?;
        }
        Ok(())
    }
}

impl Emitter for DirectEmitter {
    fn forward_event(&mut self, _event: &InputEvent) -> Result<()> {
        Ok(())
    }

    fn send_key_state(&mut self, _code: u16, _pressed: bool) -> Result<()> {
        Ok(())
    }

    fn send_backspace(&mut self, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        if let Some(client) = &mut self.client {
            client.send_backspace(count)?;
        }
        self.mirror_bytes(&vec![0x08; count])
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(client) = &mut self.client {
            client.write_text(text)?;
        }
        self.mirror_bytes(text.as_bytes())
    }

    fn supports_preedit(&self) -> bool {
        true
    }

    fn close(&mut self) -> Result<()> {
        self.client = None;
        self.pty = None;
        Ok(())
    }
}
