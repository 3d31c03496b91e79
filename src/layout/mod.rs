//! Keyboard layout tables
//!
//! A layout maps an evdev key code to a normal and an optional shifted
//! symbol. Symbols either pass the raw event through, emit literal text, or
//! feed a jamo (with a role hint) into the Hangul composer. Navigation and
//! punctuation keys carry passthrough entries so Enter/Tab/digits behave
//! normally even while composing.

use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::constants::*;
use crate::hangul::JamoRole;

pub mod custom;

/// Translation result for one (key code, shift) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    /// Forward the raw event; optionally flush the preedit first.
    Passthrough { commit_before: bool },
    /// Emit literal characters.
    Text {
        value: String,
        commit_before: bool,
    },
    /// Feed the Hangul composer.
    Jamo { ch: char, role: JamoRole },
}

impl Symbol {
    fn passthrough(commit_before: bool) -> Self {
        Symbol::Passthrough { commit_before }
    }

    fn text(value: &str, commit_before: bool) -> Self {
        Symbol::Text {
            value: value.to_string(),
            commit_before,
        }
    }

    fn jamo(ch: char) -> Self {
        Symbol::Jamo {
            ch,
            role: JamoRole::Auto,
        }
    }

    fn jamo_with_role(ch: char, role: JamoRole) -> Self {
        Symbol::Jamo { ch, role }
    }
}

/// Normal and shifted symbol for one key; either side may be absent.
#[derive(Debug, Clone, Default)]
pub struct LayoutEntry {
    pub normal: Option<Symbol>,
    pub shifted: Option<Symbol>,
}

/// Script family of a layout, used to pick the engine mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Hangul,
    Kana,
}

/// An immutable keycode → symbol mapping.
#[derive(Debug, Clone)]
pub struct Layout {
    name: &'static str,
    category: Category,
    mapping: HashMap<u16, LayoutEntry>,
}

impl Layout {
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Shifted symbol if shift is held and one exists, else the normal
    /// symbol, else the shifted one, else nothing.
    pub fn translate(&self, code: u16, shift: bool) -> Option<&Symbol> {
        let entry = self.mapping.get(&code)?;
        if shift {
            if let Some(symbol) = &entry.shifted {
                return Some(symbol);
            }
        }
        entry.normal.as_ref().or(entry.shifted.as_ref())
    }

    fn entry_mut(&mut self, code: u16) -> &mut LayoutEntry {
        self.mapping.entry(code).or_default()
    }
}

fn add_entry(
    mapping: &mut HashMap<u16, LayoutEntry>,
    code: u16,
    normal: Option<Symbol>,
    shifted: Option<Symbol>,
) {
    mapping.insert(code, LayoutEntry { normal, shifted });
}

fn add_jamo(mapping: &mut HashMap<u16, LayoutEntry>, code: u16, normal: char, shifted: Option<char>) {
    add_entry(
        mapping,
        code,
        Some(Symbol::jamo(normal)),
        shifted.map(Symbol::jamo),
    );
}

fn add_passthrough_pairs(mapping: &mut HashMap<u16, LayoutEntry>, codes: &[u16]) {
    for &code in codes {
        add_entry(
            mapping,
            code,
            Some(Symbol::passthrough(true)),
            Some(Symbol::passthrough(true)),
        );
    }
}

fn add_special_keys(mapping: &mut HashMap<u16, LayoutEntry>, codes: &[u16]) {
    for &code in codes {
        add_entry(mapping, code, Some(Symbol::passthrough(true)), None);
    }
}

const DIGIT_ROW: [u16; 16] = [
    KEY_1,
    KEY_2,
    KEY_3,
    KEY_4,
    KEY_5,
    KEY_6,
    KEY_7,
    KEY_8,
    KEY_9,
    KEY_0,
    KEY_MINUS,
    KEY_EQUAL,
    KEY_LEFTBRACE,
    KEY_RIGHTBRACE,
    KEY_BACKSLASH,
    KEY_GRAVE,
];

fn build_dubeolsik() -> Layout {
    let mut mapping = HashMap::new();

    add_jamo(&mut mapping, KEY_Q, 'ㅂ', Some('ㅃ'));
    add_jamo(&mut mapping, KEY_W, 'ㅈ', Some('ㅉ'));
    add_jamo(&mut mapping, KEY_E, 'ㄷ', Some('ㄸ'));
    add_jamo(&mut mapping, KEY_R, 'ㄱ', Some('ㄲ'));
    add_jamo(&mut mapping, KEY_T, 'ㅅ', Some('ㅆ'));
    add_jamo(&mut mapping, KEY_Y, 'ㅛ', None);
    add_jamo(&mut mapping, KEY_U, 'ㅕ', None);
    add_jamo(&mut mapping, KEY_I, 'ㅑ', None);
    add_jamo(&mut mapping, KEY_O, 'ㅐ', Some('ㅒ'));
    add_jamo(&mut mapping, KEY_P, 'ㅔ', Some('ㅖ'));

    add_jamo(&mut mapping, KEY_A, 'ㅁ', None);
    add_jamo(&mut mapping, KEY_S, 'ㄴ', None);
    add_jamo(&mut mapping, KEY_D, 'ㅇ', None);
    add_jamo(&mut mapping, KEY_F, 'ㄹ', None);
    add_jamo(&mut mapping, KEY_G, 'ㅎ', None);
    add_jamo(&mut mapping, KEY_H, 'ㅗ', None);
    add_jamo(&mut mapping, KEY_J, 'ㅓ', None);
    add_jamo(&mut mapping, KEY_K, 'ㅏ', None);
    add_jamo(&mut mapping, KEY_L, 'ㅣ', None);

    add_jamo(&mut mapping, KEY_Z, 'ㅋ', None);
    add_jamo(&mut mapping, KEY_X, 'ㅌ', None);
    add_jamo(&mut mapping, KEY_C, 'ㅊ', None);
    add_jamo(&mut mapping, KEY_V, 'ㅍ', None);
    add_jamo(&mut mapping, KEY_B, 'ㅠ', None);
    add_jamo(&mut mapping, KEY_N, 'ㅜ', None);
    add_jamo(&mut mapping, KEY_M, 'ㅡ', None);

    add_passthrough_pairs(
        &mut mapping,
        &[KEY_SEMICOLON, KEY_APOSTROPHE, KEY_COMMA, KEY_DOT, KEY_SLASH],
    );
    add_passthrough_pairs(&mut mapping, &DIGIT_ROW);
    add_special_keys(
        &mut mapping,
        &[KEY_SPACE, KEY_TAB, KEY_ENTER, KEY_ESC, KEY_BACKSPACE],
    );

    Layout {
        name: "dubeolsik",
        category: Category::Hangul,
        mapping,
    }
}

fn build_sebeolsik_390() -> Layout {
    let mut mapping = HashMap::new();
    let trailing = |ch| Some(Symbol::jamo_with_role(ch, JamoRole::Trailing));

    add_passthrough_pairs(
        &mut mapping,
        &[
            KEY_GRAVE, KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8, KEY_9, KEY_0,
            KEY_MINUS, KEY_EQUAL,
        ],
    );

    add_jamo(&mut mapping, KEY_Q, 'ㅂ', Some('ㅃ'));
    add_jamo(&mut mapping, KEY_W, 'ㅈ', Some('ㅉ'));
    add_jamo(&mut mapping, KEY_E, 'ㄷ', Some('ㄸ'));
    add_jamo(&mut mapping, KEY_R, 'ㄱ', Some('ㄲ'));
    add_jamo(&mut mapping, KEY_T, 'ㅅ', Some('ㅆ'));
    add_entry(&mut mapping, KEY_Y, Some(Symbol::jamo('ㅛ')), trailing('ㅅ'));
    add_entry(&mut mapping, KEY_U, Some(Symbol::jamo('ㅕ')), trailing('ㅈ'));
    add_entry(&mut mapping, KEY_I, Some(Symbol::jamo('ㅑ')), trailing('ㅊ'));
    add_entry(&mut mapping, KEY_O, Some(Symbol::jamo('ㅐ')), trailing('ㅋ'));
    add_entry(&mut mapping, KEY_P, Some(Symbol::jamo('ㅔ')), trailing('ㅌ'));
    add_entry(
        &mut mapping,
        KEY_LEFTBRACE,
        Some(Symbol::jamo('ㅒ')),
        trailing('ㅍ'),
    );
    add_entry(
        &mut mapping,
        KEY_RIGHTBRACE,
        Some(Symbol::jamo('ㅖ')),
        trailing('ㅎ'),
    );
    add_entry(
        &mut mapping,
        KEY_BACKSLASH,
        Some(Symbol::jamo('ㅢ')),
        Some(Symbol::passthrough(true)),
    );

    add_jamo(&mut mapping, KEY_A, 'ㅁ', Some('ㅁ'));
    add_jamo(&mut mapping, KEY_S, 'ㄴ', Some('ㄴ'));
    add_jamo(&mut mapping, KEY_D, 'ㅇ', Some('ㅇ'));
    add_jamo(&mut mapping, KEY_F, 'ㄹ', Some('ㄹ'));
    add_jamo(&mut mapping, KEY_G, 'ㅎ', Some('ㅎ'));
    add_entry(&mut mapping, KEY_H, Some(Symbol::jamo('ㅗ')), trailing('ㄱ'));
    add_entry(&mut mapping, KEY_J, Some(Symbol::jamo('ㅓ')), trailing('ㄴ'));
    add_entry(&mut mapping, KEY_K, Some(Symbol::jamo('ㅏ')), trailing('ㄷ'));
    add_entry(&mut mapping, KEY_L, Some(Symbol::jamo('ㅣ')), trailing('ㄹ'));
    add_entry(
        &mut mapping,
        KEY_SEMICOLON,
        Some(Symbol::jamo('ㅠ')),
        trailing('ㅁ'),
    );
    add_entry(
        &mut mapping,
        KEY_APOSTROPHE,
        Some(Symbol::jamo('ㅜ')),
        trailing('ㅂ'),
    );

    add_jamo(&mut mapping, KEY_Z, 'ㅋ', Some('ㅋ'));
    add_jamo(&mut mapping, KEY_X, 'ㅌ', Some('ㅌ'));
    add_jamo(&mut mapping, KEY_C, 'ㅊ', Some('ㅊ'));
    add_jamo(&mut mapping, KEY_V, 'ㅍ', Some('ㅍ'));
    add_entry(&mut mapping, KEY_B, Some(Symbol::jamo('ㅠ')), trailing('ㅇ'));
    add_entry(&mut mapping, KEY_N, Some(Symbol::jamo('ㅜ')), trailing('ㅅ'));
    add_entry(&mut mapping, KEY_M, Some(Symbol::jamo('ㅡ')), trailing('ㅎ'));

    add_jamo(&mut mapping, KEY_COMMA, 'ㅘ', Some('ㅙ'));
    add_jamo(&mut mapping, KEY_DOT, 'ㅝ', Some('ㅞ'));
    add_entry(
        &mut mapping,
        KEY_SLASH,
        Some(Symbol::jamo('ㅟ')),
        Some(Symbol::passthrough(true)),
    );

    add_special_keys(
        &mut mapping,
        &[KEY_SPACE, KEY_ENTER, KEY_TAB, KEY_ESC, KEY_BACKSPACE],
    );

    Layout {
        name: "sebeolsik-390",
        category: Category::Hangul,
        mapping,
    }
}

/// Hiragana and katakana blocks are offset by a constant value.
fn hiragana_to_katakana(ch: char) -> char {
    const HIRAGANA_START: u32 = 0x3041;
    const HIRAGANA_END: u32 = 0x3096;
    const KATAKANA_START: u32 = 0x30A1;
    let code = ch as u32;
    if (HIRAGANA_START..=HIRAGANA_END).contains(&code) {
        char::from_u32(code + KATAKANA_START - HIRAGANA_START).unwrap_or(ch)
    } else {
        ch
    }
}

fn build_kana86() -> Layout {
    let mut mapping = HashMap::new();

    let mut add_kana = |code: u16, normal: &str| {
        let shifted: String = normal.chars().map(hiragana_to_katakana).collect();
        add_entry(
            &mut mapping,
            code,
            Some(Symbol::text(normal, false)),
            Some(Symbol::text(&shifted, false)),
        );
    };

    add_kana(KEY_1, "ぬ");
    add_kana(KEY_2, "ふ");
    add_kana(KEY_3, "あ");
    add_kana(KEY_4, "う");
    add_kana(KEY_5, "え");
    add_kana(KEY_6, "お");
    add_kana(KEY_7, "や");
    add_kana(KEY_8, "ゆ");
    add_kana(KEY_9, "よ");
    add_kana(KEY_0, "わ");
    add_kana(KEY_MINUS, "ほ");
    add_kana(KEY_EQUAL, "へ");

    add_kana(KEY_Q, "た");
    add_kana(KEY_W, "て");
    add_kana(KEY_E, "い");
    add_kana(KEY_R, "す");
    add_kana(KEY_T, "か");
    add_kana(KEY_Y, "ん");
    add_kana(KEY_U, "な");
    add_kana(KEY_I, "に");
    add_kana(KEY_O, "ら");
    add_kana(KEY_P, "せ");
    add_kana(KEY_LEFTBRACE, "゛");
    add_kana(KEY_RIGHTBRACE, "゜");

    add_kana(KEY_A, "ち");
    add_kana(KEY_S, "と");
    add_kana(KEY_D, "し");
    add_kana(KEY_F, "は");
    add_kana(KEY_G, "き");
    add_kana(KEY_H, "く");
    add_kana(KEY_J, "ま");
    add_kana(KEY_K, "の");
    add_kana(KEY_L, "り");
    add_kana(KEY_SEMICOLON, "れ");
    add_kana(KEY_APOSTROPHE, "け");
    add_kana(KEY_BACKSLASH, "む");

    add_kana(KEY_Z, "つ");
    add_kana(KEY_X, "さ");
    add_kana(KEY_C, "そ");
    add_kana(KEY_V, "ひ");
    add_kana(KEY_B, "こ");
    add_kana(KEY_N, "み");
    add_kana(KEY_M, "も");
    add_kana(KEY_COMMA, "ね");
    add_kana(KEY_DOT, "る");
    add_kana(KEY_SLASH, "め");

    add_special_keys(
        &mut mapping,
        &[KEY_SPACE, KEY_TAB, KEY_ENTER, KEY_ESC, KEY_BACKSPACE],
    );

    Layout {
        name: "kana86",
        category: Category::Kana,
        mapping,
    }
}

/// Canonical layout names accepted by [`load`].
pub fn available_layouts() -> [&'static str; 3] {
    ["dubeolsik", "kana86", "sebeolsik-390"]
}

/// Construct a layout by name. Unknown names are rejected here, never at
/// runtime.
pub fn load(name: &str) -> Result<Layout> {
    match name {
        "" | "dubeolsik" => Ok(build_dubeolsik()),
        "sebeolsik-390" => Ok(build_sebeolsik_390()),
        "kana86" | "kana-86" => Ok(build_kana86()),
        other => Err(anyhow!("unknown layout: {}", other)),
    }
}

/// Key codes for the lowercase hex digits 0-f, indexed by digit value.
/// Used by the emitter to type Unicode code points.
pub fn unicode_hex_keycodes() -> [u16; 16] {
    [
        KEY_0, KEY_1, KEY_2, KEY_3, KEY_4, KEY_5, KEY_6, KEY_7, KEY_8, KEY_9, KEY_A, KEY_B,
        KEY_C, KEY_D, KEY_E, KEY_F,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dubeolsik_shift_falls_back_to_normal() {
        let layout = load("dubeolsik").unwrap();
        // KEY_K has no shifted entry; shift lookup returns the normal jamo.
        match layout.translate(KEY_K, true) {
            Some(Symbol::Jamo { ch, .. }) => assert_eq!(*ch, 'ㅏ'),
            other => panic!("unexpected symbol: {:?}", other),
        }
        match layout.translate(KEY_Q, true) {
            Some(Symbol::Jamo { ch, .. }) => assert_eq!(*ch, 'ㅃ'),
            other => panic!("unexpected symbol: {:?}", other),
        }
    }

    #[test]
    fn dubeolsik_forwards_navigation_keys() {
        let layout = load("dubeolsik").unwrap();
        for code in [KEY_ENTER, KEY_TAB, KEY_SPACE, KEY_1] {
            match layout.translate(code, false) {
                Some(Symbol::Passthrough { commit_before }) => assert!(commit_before),
                other => panic!("expected passthrough for {}: {:?}", code, other),
            }
        }
    }

    #[test]
    fn sebeolsik_shifted_keys_carry_trailing_roles() {
        let layout = load("sebeolsik-390").unwrap();
        match layout.translate(KEY_Y, true) {
            Some(Symbol::Jamo { ch, role }) => {
                assert_eq!(*ch, 'ㅅ');
                assert_eq!(*role, JamoRole::Trailing);
            }
            other => panic!("unexpected symbol: {:?}", other),
        }
        // Every trailing-role jamo must be a legal final.
        for code in 0..=KEY_MAX {
            for shift in [false, true] {
                if let Some(Symbol::Jamo { ch, role }) = layout.translate(code, shift) {
                    if *role == JamoRole::Trailing {
                        assert!(
                            crate::hangul::is_jongseong(*ch),
                            "{} is not a legal final",
                            ch
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn kana_shift_produces_katakana() {
        let layout = load("kana86").unwrap();
        match layout.translate(KEY_T, false) {
            Some(Symbol::Text { value, .. }) => assert_eq!(value, "か"),
            other => panic!("unexpected symbol: {:?}", other),
        }
        match layout.translate(KEY_T, true) {
            Some(Symbol::Text { value, .. }) => assert_eq!(value, "カ"),
            other => panic!("unexpected symbol: {:?}", other),
        }
        // Combining marks sit outside the hiragana block and stay as-is.
        match layout.translate(KEY_LEFTBRACE, true) {
            Some(Symbol::Text { value, .. }) => assert_eq!(value, "゛"),
            other => panic!("unexpected symbol: {:?}", other),
        }
    }

    #[test]
    fn unknown_layout_is_rejected() {
        assert!(load("qwerty").is_err());
    }

    #[test]
    fn kana_86_alias_resolves() {
        assert_eq!(load("kana-86").unwrap().name(), "kana86");
    }
}
