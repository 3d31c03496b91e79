//! Configuration file management
//!
//! Loads the TOML configuration file and resolves the toggle settings the
//! engine consumes. Default config path: ~/.config/hanfe/config.toml
//! (missing file falls back to built-in defaults; an explicitly named file
//! must exist).
//!
//! Toggle chords are written as `+`-separated expressions whose last token
//! is the trigger key: `hangul`, `alt_r`, `shift+space`. A modifier token
//! like `shift` expands to the left/right alternative set; the chord fires
//! when every group has at least one member held.

use anyhow::{anyhow, Context, Result};
use log::info;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants::{keycode_from_name, KEY_HANGEUL, KEY_RIGHTALT};
use crate::input::modifiers::{ALT_KEYS, CTRL_KEYS, META_KEYS, SHIFT_KEYS};

/// Application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Mode toggling
    pub toggle: ToggleSection,
    /// Input device and layout
    pub input: InputSection,
    /// Output backend selection
    pub output: OutputSection,
    /// Database-mode dictionary
    pub dictionary: DictionarySection,
}

/// Mode toggling settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToggleSection {
    /// Chord expressions, e.g. "hangul", "alt_r", "shift+space"
    pub keys: Vec<String>,
    /// Mode active at startup
    pub default_mode: String,
    /// Cycle order; "latin" is always appended when missing
    pub mode_cycle: Vec<String>,
}

/// Input device and layout settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InputSection {
    /// Keyboard device path (auto-detected when empty)
    pub device: String,
    /// Layout name: dubeolsik, sebeolsik-390, kana86, latin
    pub layout: String,
    /// Optional custom key-pair overlay (JSON)
    pub custom_pairs: String,
}

/// Output backend settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Force direct commit instead of the uinput Unicode-hex keyboard
    pub no_hex: bool,
    /// Optional PTY to mirror committed text into
    pub pty: String,
}

/// Dictionary settings for database mode
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DictionarySection {
    /// Tab-separated dictionary file
    pub path: String,
}

/// ~/.config/hanfe/config.toml, honouring XDG_CONFIG_HOME.
pub fn default_path() -> Option<PathBuf> {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var("HOME").ok().map(|home| Path::new(&home).join(".config")))?;
    Some(base.join("hanfe").join("config.toml"))
}

/// Load the configuration. An explicit path must exist; the default path is
/// optional and silently falls back to defaults.
pub fn load(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => read_config(path),
        None => match default_path() {
            Some(path) if path.exists() => read_config(&path),
            _ => Ok(Config::default()),
        },
    }
}

fn read_config(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open config file {}", path.display()))?;
    let config: Config = toml::from_str(&text)
        .with_context(|| format!("parse config file {}", path.display()))?;
    info!("config loaded: {}", path.display());
    Ok(config)
}

// ============================================================================
// Toggle Resolution
// ============================================================================

/// A toggle chord: the trigger key plus modifier alternative-sets that must
/// all be satisfied. No groups means the bare key triggers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleChord {
    pub key: u16,
    pub modifier_groups: Vec<Vec<u16>>,
}

/// Resolved toggle settings consumed by the engine.
#[derive(Debug, Clone, Default)]
pub struct ToggleConfig {
    pub chords: Vec<ToggleChord>,
    pub default_mode: String,
    pub mode_cycle: Vec<String>,
}

/// Built-in toggle: the Hangul key or bare right alt, dubeolsik↔latin.
pub fn default_chords() -> Vec<ToggleChord> {
    vec![
        ToggleChord {
            key: KEY_RIGHTALT,
            modifier_groups: Vec::new(),
        },
        ToggleChord {
            key: KEY_HANGEUL,
            modifier_groups: Vec::new(),
        },
    ]
}

/// Parse one chord expression (`shift+space`). Every token but the last is
/// a modifier group; the last must resolve to exactly one key.
pub fn parse_toggle_expression(expr: &str) -> Result<ToggleChord> {
    let segments: Vec<&str> = expr.split('+').collect();
    let mut chord = ToggleChord {
        key: 0,
        modifier_groups: Vec::new(),
    };
    for (index, segment) in segments.iter().enumerate() {
        let codes = parse_key_token(segment)?;
        if index == segments.len() - 1 {
            if codes.len() != 1 {
                return Err(anyhow!(
                    "toggle trigger '{}' must resolve to a single key",
                    segment
                ));
            }
            chord.key = codes[0];
        } else {
            chord.modifier_groups.push(codes);
        }
    }
    Ok(chord)
}

fn parse_key_token(token: &str) -> Result<Vec<u16>> {
    let normalized = token.trim().to_uppercase();
    if normalized.is_empty() {
        return Err(anyhow!("empty key name in toggle expression"));
    }
    let codes = match normalized.as_str() {
        "SHIFT" => SHIFT_KEYS.to_vec(),
        "CTRL" | "CONTROL" => CTRL_KEYS.to_vec(),
        "ALT" => ALT_KEYS.to_vec(),
        "META" => META_KEYS.to_vec(),
        name => {
            let code = keycode_from_name(name)
                .ok_or_else(|| anyhow!("unknown key code '{}'", token))?;
            vec![code]
        }
    };
    Ok(codes)
}

/// Turn the config section into the resolved toggle settings: parse chords
/// (built-in defaults when none are given) and normalise the mode cycle.
pub fn resolve_toggle(
    section: &ToggleSection,
    hangul_name: &str,
    have_hangul: bool,
) -> Result<ToggleConfig> {
    let mut chords = Vec::new();
    for expr in &section.keys {
        chords.push(parse_toggle_expression(expr)?);
    }
    if chords.is_empty() {
        chords = default_chords();
    }

    let mut default_mode = normalize_mode_name(&section.default_mode, hangul_name, have_hangul);
    if default_mode.is_empty() {
        default_mode = if have_hangul && !hangul_name.is_empty() {
            hangul_name.to_string()
        } else {
            "latin".to_string()
        };
    }

    let mut cycle: Vec<String> = section
        .mode_cycle
        .iter()
        .map(|name| normalize_mode_name(name, hangul_name, have_hangul))
        .filter(|name| !name.is_empty())
        .collect();
    if have_hangul && !hangul_name.is_empty() && !cycle.iter().any(|n| n == hangul_name) {
        cycle.insert(0, hangul_name.to_string());
    }
    if !cycle.iter().any(|n| n == "latin") {
        cycle.push("latin".to_string());
    }
    if !cycle.iter().any(|n| n == &default_mode) {
        cycle.insert(0, default_mode.clone());
    }
    dedupe(&mut cycle);

    Ok(ToggleConfig {
        chords,
        default_mode,
        mode_cycle: cycle,
    })
}

fn normalize_mode_name(value: &str, hangul_name: &str, have_hangul: bool) -> String {
    match value.trim().to_lowercase().as_str() {
        "" | "hangul" | "korean" => {
            if have_hangul && !hangul_name.is_empty() {
                hangul_name.to_string()
            } else {
                String::new()
            }
        }
        "latin" | "english" | "default" => "latin".to_string(),
        "kana" | "kana86" | "kana-86" | "hiragana" | "katakana" | "japanese" => {
            "kana86".to_string()
        }
        "pinyin" | "zhuyin" | "ime" | "database" => "pinyin".to_string(),
        "none" | "off" => String::new(),
        other => other.to_string(),
    }
}

fn dedupe(names: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    names.retain(|name| seen.insert(name.clone()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{KEY_LEFTSHIFT, KEY_RIGHTSHIFT, KEY_SPACE};

    #[test]
    fn parses_bare_trigger() {
        let chord = parse_toggle_expression("hangul").unwrap();
        assert_eq!(chord.key, KEY_HANGEUL);
        assert!(chord.modifier_groups.is_empty());
    }

    #[test]
    fn parses_modifier_chord() {
        let chord = parse_toggle_expression("shift+space").unwrap();
        assert_eq!(chord.key, KEY_SPACE);
        assert_eq!(
            chord.modifier_groups,
            vec![vec![KEY_LEFTSHIFT, KEY_RIGHTSHIFT]]
        );
    }

    #[test]
    fn rejects_multi_key_trigger() {
        assert!(parse_toggle_expression("space+shift").is_err());
        assert!(parse_toggle_expression("nosuchkey").is_err());
    }

    #[test]
    fn resolve_defaults_to_hangul_latin_cycle() {
        let toggle = resolve_toggle(&ToggleSection::default(), "dubeolsik", true).unwrap();
        assert_eq!(toggle.default_mode, "dubeolsik");
        assert_eq!(toggle.mode_cycle, vec!["dubeolsik", "latin"]);
        assert_eq!(toggle.chords, default_chords());
    }

    #[test]
    fn resolve_normalises_aliases_and_dedupes() {
        let section = ToggleSection {
            keys: vec!["hangul".to_string()],
            default_mode: "korean".to_string(),
            mode_cycle: vec![
                "korean".to_string(),
                "english".to_string(),
                "japanese".to_string(),
                "english".to_string(),
            ],
        };
        let toggle = resolve_toggle(&section, "dubeolsik", true).unwrap();
        assert_eq!(toggle.default_mode, "dubeolsik");
        assert_eq!(toggle.mode_cycle, vec!["dubeolsik", "latin", "kana86"]);
    }

    #[test]
    fn resolve_without_hangul_falls_back_to_latin() {
        let toggle = resolve_toggle(&ToggleSection::default(), "", false).unwrap();
        assert_eq!(toggle.default_mode, "latin");
        assert_eq!(toggle.mode_cycle, vec!["latin"]);
    }

    #[test]
    fn toml_sections_deserialize() {
        let config: Config = toml::from_str(
            r#"
            [toggle]
            keys = ["shift+space", "hangul"]
            default_mode = "dubeolsik"
            mode_cycle = ["dubeolsik", "latin", "pinyin"]

            [input]
            device = "/dev/input/event3"
            layout = "dubeolsik"

            [output]
            no_hex = true

            [dictionary]
            path = "/etc/hanfe/pinyin.tsv"
            "#,
        )
        .unwrap();
        assert_eq!(config.toggle.keys.len(), 2);
        assert_eq!(config.input.device, "/dev/input/event3");
        assert!(config.output.no_hex);
        assert_eq!(config.dictionary.path, "/etc/hanfe/pinyin.tsv");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.toggle.keys.is_empty());
        assert!(!config.output.no_hex);
    }
}
