//! Dictionary-backed input
//!
//! A direct-map dictionary (`key<TAB>value` lines) plus the session buffer
//! used by database mode: keys accumulate lowercased into a preedit buffer
//! and the first dictionary value replaces it on commit. No candidate
//! selection; a miss commits the raw buffer.

use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::path::Path;

/// Case-insensitive direct-map dictionary.
#[derive(Debug, Default)]
pub struct Dictionary {
    entries: HashMap<String, Vec<String>>,
}

impl Dictionary {
    /// Load a dictionary file: one `key<TAB>value` pair per line, `#` / `;`
    /// comments and blank lines ignored, keys lowercased. Malformed lines
    /// are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("open dictionary {}", path.display()))?;
        let mut dict = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            let Some((key, value)) = line.split_once('\t') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() || value.is_empty() {
                continue;
            }
            dict.entries
                .entry(key.to_lowercase())
                .or_default()
                .push(value.to_string());
        }
        info!(
            "dictionary loaded: {} ({} keys)",
            path.display(),
            dict.entries.len()
        );
        Ok(dict)
    }

    #[cfg(test)]
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut dict = Self::default();
        for (key, value) in pairs {
            dict.entries
                .entry(key.to_lowercase())
                .or_default()
                .push(value.to_string());
        }
        dict
    }

    /// First value for the key, case-insensitive.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.entries
            .get(&key.to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Phonetic key accumulator for database mode.
#[derive(Debug, Default)]
pub struct Session {
    buffer: Vec<char>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one lowercased character; returns the new preedit.
    pub fn push(&mut self, ch: char) -> String {
        self.buffer.extend(ch.to_lowercase());
        self.preedit()
    }

    /// Pop one character. `None` when the buffer was already empty, which
    /// the engine treats as a pass-through backspace.
    pub fn backspace(&mut self) -> Option<String> {
        self.buffer.pop()?;
        Some(self.preedit())
    }

    /// Resolve the buffer through the dictionary (raw buffer on a miss) and
    /// clear it. Empty buffer commits nothing.
    pub fn commit(&mut self, dict: Option<&Dictionary>) -> String {
        if self.buffer.is_empty() {
            return String::new();
        }
        let key: String = self.buffer.drain(..).collect();
        match dict.and_then(|d| d.lookup(&key)) {
            Some(value) => value.to_string(),
            None => key,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn preedit(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_first_value_wins() {
        let dict = Dictionary::from_pairs(&[("ni", "你"), ("ni", "尼"), ("hao", "好")]);
        assert_eq!(dict.lookup("ni"), Some("你"));
        assert_eq!(dict.lookup("NI"), Some("你"));
        assert_eq!(dict.lookup("hao"), Some("好"));
        assert_eq!(dict.lookup("missing"), None);
    }

    #[test]
    fn session_accumulates_and_commits_through_dictionary() {
        let dict = Dictionary::from_pairs(&[("ni", "你")]);
        let mut session = Session::new();
        assert_eq!(session.push('N'), "n");
        assert_eq!(session.push('i'), "ni");
        assert_eq!(session.commit(Some(&dict)), "你");
        assert!(session.is_empty());
    }

    #[test]
    fn session_commits_raw_buffer_on_miss() {
        let dict = Dictionary::from_pairs(&[("ni", "你")]);
        let mut session = Session::new();
        session.push('x');
        assert_eq!(session.commit(Some(&dict)), "x");
        assert_eq!(session.commit(Some(&dict)), "");
    }

    #[test]
    fn session_backspace_pops_one() {
        let mut session = Session::new();
        session.push('n');
        session.push('i');
        assert_eq!(session.backspace(), Some("n".to_string()));
        assert_eq!(session.backspace(), Some(String::new()));
        assert_eq!(session.backspace(), None);
    }

    #[test]
    fn dictionary_parses_comments_and_blank_lines() {
        let dir = std::env::temp_dir().join("hanfe-dict-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pinyin.tsv");
        std::fs::write(&path, "# comment\n; also comment\n\nni\t你\nbad line\nHAO\t好\n")
            .unwrap();
        let dict = Dictionary::load(&path).unwrap();
        assert_eq!(dict.len(), 2);
        assert_eq!(dict.lookup("ni"), Some("你"));
        assert_eq!(dict.lookup("hao"), Some("好"));
        std::fs::remove_file(&path).ok();
    }
}
