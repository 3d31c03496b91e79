//! Input handling
//!
//! Manage the physical keyboard.
//! - Binary-compatible evdev event records
//! - Exclusive-grab device reader with keyboard auto-detection
//! - Modifier press/release tracking for chords and shift lookup

pub mod device;
pub mod event;
pub mod modifiers;

pub use device::EvdevDevice;
pub use event::InputEvent;
pub use modifiers::ModifierTracker;
