//! Mode engine
//!
//! Serialises every state transition of the interceptor: reads grabbed
//! events, tracks modifiers, detects toggle chords, routes keys through the
//! current mode (Latin passthrough, Hangul composition, kana text, database
//! session), and drives the emitter.
//!
//! Preedit discipline: the characters visible at the host cursor always
//! equal the stored preedit string. `replace_preedit` erases the old
//! rendering with one backspace per character and types the new one, with
//! forwarded modifiers suspended around the exchange so the host does not
//! see shifted/ctrl'd phantom input. Emitters without preedit support only
//! update the stored string.

use anyhow::{bail, Result};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::{ToggleChord, ToggleConfig};
use crate::constants::{KEY_BACKSPACE, KEY_ENTER, KEY_SPACE, KEY_TAB};
use crate::dict::{Dictionary, Session};
use crate::emitter::Emitter;
use crate::hangul::HangulComposer;
use crate::input::device::EvdevDevice;
use crate::input::modifiers::{ModifierTracker, ALWAYS_FORWARD, SHIFT_KEYS};
use crate::input::InputEvent;
use crate::layout::{Layout, Symbol};

/// How keys are interpreted while a mode is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Hangul,
    Latin,
    Kana,
    Database,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputMode::Hangul => "hangul",
            InputMode::Latin => "latin",
            InputMode::Kana => "kana",
            InputMode::Database => "database",
        };
        f.write_str(name)
    }
}

/// One entry of the mode cycle.
pub struct ModeSpec {
    pub name: String,
    pub kind: InputMode,
    pub layout: Option<Layout>,
    pub dictionary: Option<Dictionary>,
}

/// The single-threaded event-driven core.
pub struct Engine {
    modes: Vec<ModeSpec>,
    mode_index: usize,
    chords: Vec<ToggleChord>,
    emitter: Box<dyn Emitter>,
    composers: HashMap<usize, HangulComposer>,
    sessions: HashMap<usize, Session>,
    tracker: ModifierTracker,
    forwarded_modifiers: HashMap<u16, bool>,
    forwarded_keys: HashSet<u16>,
    preedit: String,
}

impl Engine {
    pub fn new(
        modes: Vec<ModeSpec>,
        toggle: &ToggleConfig,
        emitter: Box<dyn Emitter>,
    ) -> Result<Self> {
        if modes.is_empty() {
            bail!("no input modes configured");
        }

        let mut tracker = ModifierTracker::new();
        let mut forwarded_modifiers = HashMap::new();
        for code in crate::input::modifiers::MODIFIER_KEYS {
            forwarded_modifiers.insert(code, false);
        }
        for chord in &toggle.chords {
            for group in &chord.modifier_groups {
                for &code in group {
                    tracker.track(code);
                    forwarded_modifiers.entry(code).or_insert(false);
                }
            }
        }

        let mode_index = modes
            .iter()
            .position(|mode| mode.name.eq_ignore_ascii_case(&toggle.default_mode))
            .unwrap_or(0);

        let mut composers = HashMap::new();
        let mut sessions = HashMap::new();
        for (index, mode) in modes.iter().enumerate() {
            match mode.kind {
                InputMode::Hangul => {
                    composers.insert(index, HangulComposer::new());
                }
                InputMode::Database => {
                    sessions.insert(index, Session::new());
                }
                _ => {}
            }
        }

        Ok(Self {
            modes,
            mode_index,
            chords: toggle.chords.clone(),
            emitter,
            composers,
            sessions,
            tracker,
            forwarded_modifiers,
            forwarded_keys: HashSet::new(),
            preedit: String::new(),
        })
    }

    /// Grab the device and run the event loop until end-of-stream or a
    /// fatal error. The grab is released and forwarded state is drained on
    /// every exit path.
    pub fn run(&mut self, device: &mut EvdevDevice) -> Result<()> {
        device.grab()?;
        let result = self.event_loop(device);
        self.release_forwarded_state();
        device.ungrab();
        if let Err(err) = self.emitter.close() {
            warn!("close emitter: {}", err);
        }
        result
    }

    fn event_loop(&mut self, device: &mut EvdevDevice) -> Result<()> {
        info!("engine running in mode '{}'", self.modes[self.mode_index].name);
        while let Some(event) = device.read_event()? {
            self.process_event(&event)?;
        }
        info!("input stream ended, shutting down");
        Ok(())
    }

    fn process_event(&mut self, event: &InputEvent) -> Result<()> {
        if !event.is_key() {
            // Non-key traffic (sync, LEDs) only makes sense when the host
            // receives the raw key stream too.
            if self.current_kind() == InputMode::Latin {
                return self.forward_key_event(event);
            }
            return Ok(());
        }

        if self.should_toggle(event) {
            return self.toggle_mode();
        }

        let code = event.code;
        if self.tracker.is_tracked(code) {
            return self.handle_modifier(event);
        }

        if self.current_kind() == InputMode::Latin {
            return self.forward_key_event(event);
        }

        if code == KEY_BACKSPACE {
            return self.handle_backspace(event);
        }

        if event.is_release() {
            return self.handle_key_release(event);
        }

        self.handle_key_press(event)
    }

    fn handle_modifier(&mut self, event: &InputEvent) -> Result<()> {
        let code = event.code;
        let press = event.is_press();
        self.tracker.set(code, press);

        if self.current_kind() == InputMode::Latin || ALWAYS_FORWARD.contains(&code) {
            self.forward_key_event(event)?;
            self.forwarded_modifiers.insert(code, press);
            return Ok(());
        }

        // Composing mode: swallow the modifier, but synthesise the release
        // of one that was forwarded earlier so the host is not left with a
        // stuck key.
        if event.is_release() && self.forwarded_modifiers.get(&code).copied().unwrap_or(false) {
            self.set_forwarded_modifier(code, false)?;
        }
        Ok(())
    }

    fn handle_backspace(&mut self, event: &InputEvent) -> Result<()> {
        match self.current_kind() {
            InputMode::Latin | InputMode::Kana => return self.forward_key_event(event),
            InputMode::Database => return self.handle_database_backspace(event),
            InputMode::Hangul => {}
        }

        if event.is_release() {
            if self.forwarded_keys.contains(&event.code) {
                return self.forward_key_event(event);
            }
            return Ok(());
        }

        let consumed = self
            .composers
            .entry(self.mode_index)
            .or_default()
            .backspace();
        if let Some(new_preedit) = consumed {
            return self.replace_preedit(&new_preedit);
        }

        // Nothing composing: delete the preceding committed character.
        self.commit_preedit()?;
        self.forward_key_event(event)
    }

    fn handle_database_backspace(&mut self, event: &InputEvent) -> Result<()> {
        if event.is_release() {
            if self.forwarded_keys.contains(&event.code) {
                return self.forward_key_event(event);
            }
            return Ok(());
        }
        let popped = self.sessions.entry(self.mode_index).or_default().backspace();
        if let Some(preedit) = popped {
            return self.replace_preedit(&preedit);
        }
        self.forward_key_event(event)
    }

    fn handle_key_release(&mut self, event: &InputEvent) -> Result<()> {
        if self.forwarded_keys.contains(&event.code) {
            return self.forward_key_event(event);
        }
        Ok(())
    }

    fn handle_key_press(&mut self, event: &InputEvent) -> Result<()> {
        if self.current_kind() == InputMode::Database {
            return self.handle_database_key_press(event);
        }

        if self.tracker.is_any_down(&ALWAYS_FORWARD) {
            // Shortcut chord: hand the raw event to the host, shift state
            // included, so Ctrl+C and friends keep working.
            self.commit_preedit()?;
            self.ensure_shift_forwarded()?;
            return self.forward_key_event(event);
        }

        let shift = self.tracker.is_any_down(&SHIFT_KEYS);
        let Some(layout) = self.modes[self.mode_index].layout.as_ref() else {
            self.commit_preedit()?;
            return self.forward_key_event(event);
        };
        let symbol = layout.translate(event.code, shift).cloned();

        let Some(symbol) = symbol else {
            self.commit_preedit()?;
            self.ensure_shift_forwarded()?;
            return self.forward_key_event(event);
        };

        match symbol {
            Symbol::Passthrough { commit_before } => {
                if commit_before {
                    self.commit_preedit()?;
                }
                self.ensure_shift_forwarded()?;
                self.forward_key_event(event)
            }
            Symbol::Text {
                value,
                commit_before,
            } => {
                if commit_before {
                    self.commit_preedit()?;
                }
                self.send_text(&value)
            }
            Symbol::Jamo { ch, role } => {
                let result = self
                    .composers
                    .entry(self.mode_index)
                    .or_default()
                    .feed(ch, role);
                if !result.commit.is_empty() {
                    self.commit_text(&result.commit)?;
                }
                if result.preedit != self.preedit {
                    self.replace_preedit(&result.preedit)?;
                }
                Ok(())
            }
        }
    }

    fn handle_database_key_press(&mut self, event: &InputEvent) -> Result<()> {
        if self.tracker.is_any_down(&ALWAYS_FORWARD) {
            self.commit_session()?;
            self.ensure_shift_forwarded()?;
            return self.forward_key_event(event);
        }

        let code = event.code;
        if let Some(ch) = database_char(code) {
            let preedit = self.sessions.entry(self.mode_index).or_default().push(ch);
            return self.replace_preedit(&preedit);
        }

        self.commit_session()?;
        if !matches!(code, KEY_SPACE | KEY_ENTER | KEY_TAB) {
            self.ensure_shift_forwarded()?;
        }
        self.forward_key_event(event)
    }

    fn commit_session(&mut self) -> Result<()> {
        let index = self.mode_index;
        if self.sessions.entry(index).or_default().is_empty() {
            if !self.preedit.is_empty() {
                return self.replace_preedit("");
            }
            return Ok(());
        }
        let dictionary = self.modes[index].dictionary.as_ref();
        let text = self.sessions.entry(index).or_default().commit(dictionary);
        self.replace_preedit("")?;
        self.send_text(&text)
    }

    fn should_toggle(&self, event: &InputEvent) -> bool {
        if !event.is_press() {
            return false;
        }
        self.chords.iter().any(|chord| {
            chord.key == event.code
                && (chord.modifier_groups.is_empty()
                    || self.tracker.groups_all_satisfied(&chord.modifier_groups))
        })
    }

    fn toggle_mode(&mut self) -> Result<()> {
        self.commit_preedit()?;
        self.mode_index = (self.mode_index + 1) % self.modes.len();
        if let Some(session) = self.sessions.get_mut(&self.mode_index) {
            session.reset();
        }
        info!("mode switched to '{}'", self.modes[self.mode_index].name);
        self.replace_preedit("")
    }

    fn current_kind(&self) -> InputMode {
        self.modes[self.mode_index].kind
    }

    /// Flush whatever the current mode is composing out to the host.
    fn commit_preedit(&mut self) -> Result<()> {
        match self.current_kind() {
            InputMode::Hangul => {
                let commit = self.composers.entry(self.mode_index).or_default().flush();
                if commit.is_empty() && self.preedit.is_empty() {
                    return Ok(());
                }
                self.replace_preedit("")?;
                if !commit.is_empty() {
                    self.send_text(&commit)?;
                }
                Ok(())
            }
            InputMode::Database => self.commit_session(),
            _ => {
                if self.preedit.is_empty() {
                    Ok(())
                } else {
                    self.replace_preedit("")
                }
            }
        }
    }

    fn commit_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.replace_preedit("")?;
        self.send_text(text)
    }

    /// Atomically swap the visible preedit for `new_text`.
    fn replace_preedit(&mut self, new_text: &str) -> Result<()> {
        if new_text == self.preedit {
            return Ok(());
        }
        if !self.emitter.supports_preedit() {
            // Unicode-hex mode: the display diverges deliberately, but the
            // internal state stays correct for backspace and toggles.
            self.preedit = new_text.to_string();
            return Ok(());
        }

        let suspended = self.suspend_forwarded_modifiers()?;
        let old_count = self.preedit.chars().count();
        if old_count > 0 {
            if let Err(err) = self.emitter.send_backspace(old_count) {
                self.restore_forwarded_modifiers(&suspended);
                return Err(err);
            }
        }
        if !new_text.is_empty() {
            if let Err(err) = self.emitter.send_text(new_text) {
                self.restore_forwarded_modifiers(&suspended);
                return Err(err);
            }
        }
        self.preedit = new_text.to_string();
        self.restore_forwarded_modifiers(&suspended);
        Ok(())
    }

    fn send_text(&mut self, text: &str) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let suspended = self.suspend_forwarded_modifiers()?;
        let result = self.emitter.send_text(text);
        self.restore_forwarded_modifiers(&suspended);
        result
    }

    fn forward_key_event(&mut self, event: &InputEvent) -> Result<()> {
        self.emitter.forward_event(event)?;
        if event.is_key() {
            if event.is_press() {
                self.forwarded_keys.insert(event.code);
            } else if event.is_release() {
                self.forwarded_keys.remove(&event.code);
            }
        }
        Ok(())
    }

    fn ensure_shift_forwarded(&mut self) -> Result<()> {
        for code in SHIFT_KEYS {
            if self.tracker.is_down(code)
                && !self.forwarded_modifiers.get(&code).copied().unwrap_or(false)
            {
                self.set_forwarded_modifier(code, true)?;
            }
        }
        Ok(())
    }

    fn set_forwarded_modifier(&mut self, code: u16, pressed: bool) -> Result<()> {
        if self.forwarded_modifiers.get(&code).copied().unwrap_or(false) == pressed {
            return Ok(());
        }
        self.emitter.send_key_state(code, pressed)?;
        self.forwarded_modifiers.insert(code, pressed);
        Ok(())
    }

    fn suspend_forwarded_modifiers(&mut self) -> Result<Vec<u16>> {
        let held: Vec<u16> = self
            .forwarded_modifiers
            .iter()
            .filter(|&(_, &forwarded)| forwarded)
            .map(|(&code, _)| code)
            .collect();
        let mut suspended = Vec::new();
        for code in held {
            if let Err(err) = self.set_forwarded_modifier(code, false) {
                self.restore_forwarded_modifiers(&suspended);
                return Err(err);
            }
            suspended.push(code);
        }
        Ok(suspended)
    }

    fn restore_forwarded_modifiers(&mut self, codes: &[u16]) {
        for &code in codes {
            if self.tracker.is_down(code) {
                let _ = self.set_forwarded_modifier(code, true);
            }
        }
    }

    /// Release every key and modifier still forwarded so the host does not
    /// observe stuck keys after shutdown.
    fn release_forwarded_state(&mut self) {
        let keys: Vec<u16> = self.forwarded_keys.drain().collect();
        for code in keys {
            if let Err(err) = self.emitter.send_key_state(code, false) {
                warn!("release forwarded key {}: {}", code, err);
            }
        }
        let held: Vec<u16> = self
            .forwarded_modifiers
            .iter()
            .filter(|&(_, &forwarded)| forwarded)
            .map(|(&code, _)| code)
            .collect();
        for code in held {
            if let Err(err) = self.emitter.send_key_state(code, false) {
                warn!("release forwarded modifier {}: {}", code, err);
            }
            self.forwarded_modifiers.insert(code, false);
        }
    }
}

/// Database mode drives its buffer from letter, tone-digit, and apostrophe
/// keys; everything else commits first and is forwarded.
fn database_char(code: u16) -> Option<char> {
    use crate::constants::*;
    let ch = match code {
        KEY_A => 'a',
        KEY_B => 'b',
        KEY_C => 'c',
        KEY_D => 'd',
        KEY_E => 'e',
        KEY_F => 'f',
        KEY_G => 'g',
        KEY_H => 'h',
        KEY_I => 'i',
        KEY_J => 'j',
        KEY_K => 'k',
        KEY_L => 'l',
        KEY_M => 'm',
        KEY_N => 'n',
        KEY_O => 'o',
        KEY_P => 'p',
        KEY_Q => 'q',
        KEY_R => 'r',
        KEY_S => 's',
        KEY_T => 't',
        KEY_U => 'u',
        KEY_V => 'v',
        KEY_W => 'w',
        KEY_X => 'x',
        KEY_Y => 'y',
        KEY_Z => 'z',
        KEY_1 => '1',
        KEY_2 => '2',
        KEY_3 => '3',
        KEY_4 => '4',
        KEY_5 => '5',
        KEY_APOSTROPHE => '\'',
        _ => return None,
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use crate::input::event::{VALUE_PRESS, VALUE_RELEASE};
    use crate::layout;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Forward { code: u16, value: i32 },
        KeyState { code: u16, pressed: bool },
        Backspace(usize),
        Text(String),
    }

    struct RecordingEmitter {
        ops: Rc<RefCell<Vec<Op>>>,
        preedit_support: bool,
    }

    impl Emitter for RecordingEmitter {
        fn forward_event(&mut self, event: &InputEvent) -> Result<()> {
            self.ops.borrow_mut().push(Op::Forward {
                code: event.code,
                value: event.value,
            });
            Ok(())
        }

        fn send_key_state(&mut self, code: u16, pressed: bool) -> Result<()> {
            self.ops.borrow_mut().push(Op::KeyState { code, pressed });
            Ok(())
        }

        fn send_backspace(&mut self, count: usize) -> Result<()> {
            self.ops.borrow_mut().push(Op::Backspace(count));
            Ok(())
        }

        fn send_text(&mut self, text: &str) -> Result<()> {
            self.ops.borrow_mut().push(Op::Text(text.to_string()));
            Ok(())
        }

        fn supports_preedit(&self) -> bool {
            self.preedit_support
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    /// What the host terminal would display after the recorded operations.
    fn render(ops: &[Op]) -> String {
        let mut screen: Vec<char> = Vec::new();
        for op in ops {
            match op {
                Op::Text(text) => screen.extend(text.chars()),
                Op::Backspace(count) => {
                    for _ in 0..*count {
                        screen.pop();
                    }
                }
                _ => {}
            }
        }
        screen.into_iter().collect()
    }

    fn toggle_config() -> ToggleConfig {
        ToggleConfig {
            chords: vec![ToggleChord {
                key: KEY_HANGEUL,
                modifier_groups: Vec::new(),
            }],
            default_mode: String::new(),
            mode_cycle: Vec::new(),
        }
    }

    fn engine_with_modes(
        modes: Vec<ModeSpec>,
        preedit_support: bool,
    ) -> (Engine, Rc<RefCell<Vec<Op>>>) {
        let ops = Rc::new(RefCell::new(Vec::new()));
        let emitter = RecordingEmitter {
            ops: ops.clone(),
            preedit_support,
        };
        let engine = Engine::new(modes, &toggle_config(), Box::new(emitter)).unwrap();
        (engine, ops)
    }

    fn hangul_engine(preedit_support: bool) -> (Engine, Rc<RefCell<Vec<Op>>>) {
        let modes = vec![
            ModeSpec {
                name: "dubeolsik".to_string(),
                kind: InputMode::Hangul,
                layout: Some(layout::load("dubeolsik").unwrap()),
                dictionary: None,
            },
            ModeSpec {
                name: "latin".to_string(),
                kind: InputMode::Latin,
                layout: None,
                dictionary: None,
            },
        ];
        engine_with_modes(modes, preedit_support)
    }

    fn database_engine() -> (Engine, Rc<RefCell<Vec<Op>>>) {
        let modes = vec![ModeSpec {
            name: "pinyin".to_string(),
            kind: InputMode::Database,
            layout: None,
            dictionary: Some(Dictionary::from_pairs(&[("ni", "你"), ("hao", "好")])),
        }];
        engine_with_modes(modes, true)
    }

    fn tap(engine: &mut Engine, code: u16) {
        engine
            .process_event(&InputEvent::key(code, VALUE_PRESS))
            .unwrap();
        engine
            .process_event(&InputEvent::key(code, VALUE_RELEASE))
            .unwrap();
    }

    #[test]
    fn syllable_split_renders_boja() {
        // q h w k = ㅂㅗㅈㅏ: commit 보, preedit 자
        let (mut engine, ops) = hangul_engine(true);
        for code in [KEY_Q, KEY_H, KEY_W, KEY_K] {
            tap(&mut engine, code);
        }
        assert_eq!(render(&ops.borrow()), "보자");
        assert_eq!(engine.preedit, "자");
    }

    #[test]
    fn compound_medial_renders_single_syllable() {
        // q h k w = ㅂㅗㅏㅈ: everything stays in one preedit syllable
        let (mut engine, ops) = hangul_engine(true);
        for code in [KEY_Q, KEY_H, KEY_K, KEY_W] {
            tap(&mut engine, code);
        }
        assert_eq!(render(&ops.borrow()), "봦");
        assert_eq!(engine.preedit, "봦");
    }

    #[test]
    fn backspace_decomposes_then_forwards() {
        let (mut engine, ops) = hangul_engine(true);
        tap(&mut engine, KEY_R);
        tap(&mut engine, KEY_K);
        assert_eq!(render(&ops.borrow()), "가");

        tap(&mut engine, KEY_BACKSPACE);
        assert_eq!(render(&ops.borrow()), "ㄱ");
        tap(&mut engine, KEY_BACKSPACE);
        assert_eq!(render(&ops.borrow()), "");

        // Composer is empty: the third backspace goes to the host.
        tap(&mut engine, KEY_BACKSPACE);
        let forwarded = ops
            .borrow()
            .iter()
            .any(|op| matches!(op, Op::Forward { code, value } if *code == KEY_BACKSPACE && *value == VALUE_PRESS));
        assert!(forwarded);
    }

    #[test]
    fn unicode_hex_mode_keeps_preedit_internal() {
        let (mut engine, ops) = hangul_engine(false);
        for code in [KEY_Q, KEY_H, KEY_W, KEY_K] {
            tap(&mut engine, code);
        }
        // Only the committed syllable was typed; no erase round-trips.
        assert_eq!(render(&ops.borrow()), "보");
        assert!(ops
            .borrow()
            .iter()
            .all(|op| !matches!(op, Op::Backspace(_))));
        assert_eq!(engine.preedit, "자");

        // Internal preedit still drives backspace decomposition: 자 → ㅈ.
        tap(&mut engine, KEY_BACKSPACE);
        assert_eq!(engine.preedit, "ㅈ");
        let composer = engine.composers.get_mut(&0).unwrap();
        assert_eq!(composer.backspace(), Some(String::new()));
    }

    #[test]
    fn toggle_commits_and_switches_to_latin() {
        let (mut engine, ops) = hangul_engine(true);
        tap(&mut engine, KEY_R);
        tap(&mut engine, KEY_K);
        tap(&mut engine, KEY_HANGEUL);
        assert_eq!(render(&ops.borrow()), "가");
        assert_eq!(engine.mode_index, 1);
        assert_eq!(engine.preedit, "");

        // Latin mode forwards raw events.
        tap(&mut engine, KEY_Q);
        let forwarded = ops
            .borrow()
            .iter()
            .any(|op| matches!(op, Op::Forward { code, value } if *code == KEY_Q && *value == VALUE_PRESS));
        assert!(forwarded);

        // A full cycle returns to the starting mode.
        tap(&mut engine, KEY_HANGEUL);
        assert_eq!(engine.mode_index, 0);
    }

    #[test]
    fn ctrl_chord_flushes_and_forwards() {
        let (mut engine, ops) = hangul_engine(true);
        tap(&mut engine, KEY_R);
        engine
            .process_event(&InputEvent::key(KEY_LEFTCTRL, VALUE_PRESS))
            .unwrap();
        tap(&mut engine, KEY_C);
        engine
            .process_event(&InputEvent::key(KEY_LEFTCTRL, VALUE_RELEASE))
            .unwrap();

        let ops = ops.borrow();
        // ㄱ was flushed before the shortcut reached the host.
        assert!(ops.contains(&Op::Text("ㄱ".to_string())));
        assert!(ops.contains(&Op::Forward {
            code: KEY_LEFTCTRL,
            value: VALUE_PRESS
        }));
        assert!(ops.contains(&Op::Forward {
            code: KEY_C,
            value: VALUE_PRESS
        }));
    }

    #[test]
    fn shift_is_swallowed_while_composing() {
        let (mut engine, ops) = hangul_engine(true);
        engine
            .process_event(&InputEvent::key(KEY_LEFTSHIFT, VALUE_PRESS))
            .unwrap();
        tap(&mut engine, KEY_Q); // shifted ㅂ → ㅃ
        engine
            .process_event(&InputEvent::key(KEY_LEFTSHIFT, VALUE_RELEASE))
            .unwrap();

        let ops = ops.borrow();
        assert!(ops.contains(&Op::Text("ㅃ".to_string())));
        assert!(!ops
            .iter()
            .any(|op| matches!(op, Op::Forward { code, .. } if *code == KEY_LEFTSHIFT)));
    }

    #[test]
    fn shift_is_forwarded_around_passthrough_and_suspended_for_preedit() {
        let (mut engine, ops) = hangul_engine(true);
        engine
            .process_event(&InputEvent::key(KEY_LEFTSHIFT, VALUE_PRESS))
            .unwrap();
        tap(&mut engine, KEY_1); // passthrough: host needs the shift state
        tap(&mut engine, KEY_Q); // back to composing with shift still held
        engine
            .process_event(&InputEvent::key(KEY_LEFTSHIFT, VALUE_RELEASE))
            .unwrap();

        let ops = ops.borrow();
        let shift_down = Op::KeyState {
            code: KEY_LEFTSHIFT,
            pressed: true,
        };
        let shift_up = Op::KeyState {
            code: KEY_LEFTSHIFT,
            pressed: false,
        };
        assert!(ops.contains(&shift_down));
        // The preedit write happened inside a suspend/restore pair.
        let text_at = ops
            .iter()
            .position(|op| *op == Op::Text("ㅃ".to_string()))
            .unwrap();
        let up_before = ops[..text_at].iter().filter(|&op| *op == shift_up).count();
        let down_after = ops[text_at..]
            .iter()
            .filter(|&op| *op == shift_down)
            .count();
        assert!(up_before >= 1, "shift not suspended before preedit write");
        assert!(down_after >= 1, "shift not restored after preedit write");
    }

    #[test]
    fn sebeolsik_forced_trailing() {
        let modes = vec![ModeSpec {
            name: "sebeolsik-390".to_string(),
            kind: InputMode::Hangul,
            layout: Some(layout::load("sebeolsik-390").unwrap()),
            dictionary: None,
        }];
        let (mut engine, ops) = engine_with_modes(modes, true);
        tap(&mut engine, KEY_R); // ㄱ
        tap(&mut engine, KEY_K); // ㅏ
        engine
            .process_event(&InputEvent::key(KEY_LEFTSHIFT, VALUE_PRESS))
            .unwrap();
        tap(&mut engine, KEY_Y); // shifted Y carries trailing ㅅ
        engine
            .process_event(&InputEvent::key(KEY_LEFTSHIFT, VALUE_RELEASE))
            .unwrap();
        assert_eq!(render(&ops.borrow()), "갓");
    }

    #[test]
    fn database_mode_commits_through_dictionary() {
        let (mut engine, ops) = database_engine();
        tap(&mut engine, KEY_N);
        tap(&mut engine, KEY_I);
        assert_eq!(render(&ops.borrow()), "ni");
        tap(&mut engine, KEY_SPACE);
        assert_eq!(render(&ops.borrow()), "你");
        // Erasing the two-character preedit took exactly two backspaces.
        assert!(ops.borrow().contains(&Op::Backspace(2)));
        let forwarded_space = ops
            .borrow()
            .iter()
            .any(|op| matches!(op, Op::Forward { code, value } if *code == KEY_SPACE && *value == VALUE_PRESS));
        assert!(forwarded_space);
    }

    #[test]
    fn database_mode_commits_raw_buffer_on_miss() {
        let (mut engine, ops) = database_engine();
        tap(&mut engine, KEY_X);
        tap(&mut engine, KEY_SPACE);
        assert_eq!(render(&ops.borrow()), "x");
    }

    #[test]
    fn database_backspace_edits_buffer_then_forwards() {
        let (mut engine, ops) = database_engine();
        tap(&mut engine, KEY_N);
        tap(&mut engine, KEY_BACKSPACE);
        assert_eq!(render(&ops.borrow()), "");
        // Buffer empty now: the next backspace reaches the host, and its
        // release is forwarded too.
        tap(&mut engine, KEY_BACKSPACE);
        let ops = ops.borrow();
        assert!(ops.contains(&Op::Forward {
            code: KEY_BACKSPACE,
            value: VALUE_PRESS
        }));
        assert!(ops.contains(&Op::Forward {
            code: KEY_BACKSPACE,
            value: VALUE_RELEASE
        }));
    }

    #[test]
    fn forwarded_keys_drain_between_events() {
        let (mut engine, _ops) = hangul_engine(true);
        tap(&mut engine, KEY_1); // passthrough press + release
        assert!(engine.forwarded_keys.is_empty());

        tap(&mut engine, KEY_HANGEUL); // latin mode
        tap(&mut engine, KEY_Q);
        assert!(engine.forwarded_keys.is_empty());
    }

    #[test]
    fn releases_of_unforwarded_keys_are_swallowed() {
        let (mut engine, ops) = hangul_engine(true);
        tap(&mut engine, KEY_R); // jamo: press swallowed, composed instead
        let ops = ops.borrow();
        assert!(!ops
            .iter()
            .any(|op| matches!(op, Op::Forward { code, .. } if *code == KEY_R)));
    }

    #[test]
    fn autorepeat_feeds_the_composer() {
        let (mut engine, _ops) = hangul_engine(true);
        engine
            .process_event(&InputEvent::key(KEY_R, VALUE_PRESS))
            .unwrap();
        engine
            .process_event(&InputEvent::key(KEY_R, 2))
            .unwrap();
        assert_eq!(engine.preedit, "ㄲ");
    }

    #[test]
    fn empty_mode_list_is_rejected() {
        let ops = Rc::new(RefCell::new(Vec::new()));
        let emitter = RecordingEmitter {
            ops,
            preedit_support: true,
        };
        assert!(Engine::new(Vec::new(), &toggle_config(), Box::new(emitter)).is_err());
    }
}
