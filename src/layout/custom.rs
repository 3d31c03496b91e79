//! Custom key-pair overlay
//!
//! A JSON list of per-key overrides applied on top of a built-in layout.
//! Key names resolve through the shared table in `constants` (canonical
//! `KEY_*` names, shorthands, bare letters/digits).
//!
//! Overlay semantics for a text override without a shifted payload: the
//! shifted side is replaced with the same text, so a remapped key behaves
//! identically with shift held rather than keeping the stale builtin entry.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use crate::constants::keycode_from_name;
use crate::hangul::JamoRole;
use crate::layout::{Layout, Symbol};

/// One override entry from the overlay file.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomPair {
    pub key: String,
    pub kind: String,
    #[serde(default)]
    pub normal: String,
    #[serde(default)]
    pub shifted: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub commit_before: bool,
}

/// Load an overlay file (a JSON array of [`CustomPair`]).
pub fn load_custom_pairs(path: &Path) -> Result<Vec<CustomPair>> {
    let file = File::open(path)
        .with_context(|| format!("open custom keypair file {}", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parse custom keypair file {}", path.display()))
}

/// Apply the overrides to a layout. Unknown key names or kinds are rejected
/// at construction time.
pub fn apply_custom_pairs(mut layout: Layout, pairs: &[CustomPair]) -> Result<Layout> {
    for pair in pairs {
        let code = keycode_from_name(&pair.key)
            .ok_or_else(|| anyhow!("unknown key name '{}'", pair.key))?;
        let entry = layout.entry_mut(code);

        match pair.kind.to_lowercase().as_str() {
            "passthrough" => {
                let symbol = Symbol::Passthrough {
                    commit_before: pair.commit_before,
                };
                entry.normal = Some(symbol.clone());
                entry.shifted = Some(symbol);
            }
            "text" => {
                entry.normal = Some(Symbol::Text {
                    value: pair.normal.clone(),
                    commit_before: pair.commit_before,
                });
                if !pair.shifted.is_empty() {
                    entry.shifted = Some(Symbol::Text {
                        value: pair.shifted.clone(),
                        commit_before: pair.commit_before,
                    });
                } else if entry.shifted.is_some() {
                    entry.shifted = Some(Symbol::Text {
                        value: pair.normal.clone(),
                        commit_before: pair.commit_before,
                    });
                }
            }
            "jamo" => {
                let role = parse_role(&pair.role);
                entry.normal = jamo_symbol(&pair.normal, role)
                    .with_context(|| format!("invalid normal jamo for key '{}'", pair.key))?;
                entry.shifted = jamo_symbol(&pair.shifted, role)
                    .with_context(|| format!("invalid shifted jamo for key '{}'", pair.key))?;
            }
            other => return Err(anyhow!("unsupported custom keypair kind '{}'", other)),
        }
    }
    Ok(layout)
}

fn jamo_symbol(value: &str, role: JamoRole) -> Result<Option<Symbol>> {
    if value.is_empty() {
        return Ok(None);
    }
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Ok(Some(Symbol::Jamo { ch, role })),
        _ => Err(anyhow!("jamo value must be a single character, got '{}'", value)),
    }
}

fn parse_role(role: &str) -> JamoRole {
    match role.trim().to_lowercase().as_str() {
        "leading" => JamoRole::Leading,
        "trailing" => JamoRole::Trailing,
        _ => JamoRole::Auto,
    }
}
