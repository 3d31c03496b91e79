//! Hangul composition automaton
//!
//! Assembles leading/medial/trailing jamo into precomposed syllables. The
//! state is a flat record of three optional compatibility jamo; every step
//! yields the text to commit (often empty) plus the current preedit.
//!
//! Compound jamo are driven by three pair tables (double initials, double
//! medials, double finals); each also defines the reverse decomposition used
//! by backspace and by the syllable split that moves a trailing consonant
//! forward when a vowel follows.

/// Position hint attached to a jamo by the layout.
///
/// `Auto` lets the automaton decide, `Trailing` forces attachment as a final
/// (sebeolsik shifted keys), `Leading` forces a fresh syllable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JamoRole {
    #[default]
    Auto,
    Leading,
    Trailing,
}

/// One step of composition: text to commit plus the new preedit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompositionResult {
    pub commit: String,
    pub preedit: String,
}

/// The composition state machine.
#[derive(Debug, Default)]
pub struct HangulComposer {
    leading: Option<char>,
    vowel: Option<char>,
    trailing: Option<char>,
}

const CHOSEONG: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ',
    'ㅋ', 'ㅌ', 'ㅍ', 'ㅎ',
];

const JUNGSEONG: [char; 21] = [
    'ㅏ', 'ㅐ', 'ㅑ', 'ㅒ', 'ㅓ', 'ㅔ', 'ㅕ', 'ㅖ', 'ㅗ', 'ㅘ', 'ㅙ', 'ㅚ', 'ㅛ', 'ㅜ', 'ㅝ',
    'ㅞ', 'ㅟ', 'ㅠ', 'ㅡ', 'ㅢ', 'ㅣ',
];

// Index 0 is the empty final.
const JONGSEONG: [char; 28] = [
    '\0', 'ㄱ', 'ㄲ', 'ㄳ', 'ㄴ', 'ㄵ', 'ㄶ', 'ㄷ', 'ㄹ', 'ㄺ', 'ㄻ', 'ㄼ', 'ㄽ', 'ㄾ', 'ㄿ',
    'ㅀ', 'ㅁ', 'ㅂ', 'ㅄ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅊ', 'ㅋ', 'ㅌ', 'ㅍ', 'ㅎ',
];

/// Base of the precomposed syllable block (U+AC00 '가')
const SYLLABLE_BASE: u32 = 0xAC00;

fn choseong_index(ch: char) -> Option<u32> {
    CHOSEONG.iter().position(|&c| c == ch).map(|i| i as u32)
}

fn jungseong_index(ch: char) -> Option<u32> {
    JUNGSEONG.iter().position(|&c| c == ch).map(|i| i as u32)
}

fn jongseong_index(ch: char) -> Option<u32> {
    JONGSEONG.iter().position(|&c| c == ch).map(|i| i as u32)
}

pub fn is_choseong(ch: char) -> bool {
    choseong_index(ch).is_some()
}

pub fn is_vowel(ch: char) -> bool {
    jungseong_index(ch).is_some()
}

/// One of the 27 legal finals.
pub fn is_jongseong(ch: char) -> bool {
    ch != '\0' && jongseong_index(ch).is_some()
}

pub fn is_consonant(ch: char) -> bool {
    is_choseong(ch) || is_jongseong(ch)
}

fn combine_initial(first: char, second: char) -> Option<char> {
    match (first, second) {
        ('ㄱ', 'ㄱ') => Some('ㄲ'),
        ('ㄷ', 'ㄷ') => Some('ㄸ'),
        ('ㅂ', 'ㅂ') => Some('ㅃ'),
        ('ㅈ', 'ㅈ') => Some('ㅉ'),
        ('ㅅ', 'ㅅ') => Some('ㅆ'),
        _ => None,
    }
}

fn split_initial(ch: char) -> Option<(char, char)> {
    match ch {
        'ㄲ' => Some(('ㄱ', 'ㄱ')),
        'ㄸ' => Some(('ㄷ', 'ㄷ')),
        'ㅃ' => Some(('ㅂ', 'ㅂ')),
        'ㅉ' => Some(('ㅈ', 'ㅈ')),
        'ㅆ' => Some(('ㅅ', 'ㅅ')),
        _ => None,
    }
}

fn combine_medial(first: char, second: char) -> Option<char> {
    match (first, second) {
        ('ㅗ', 'ㅏ') => Some('ㅘ'),
        ('ㅗ', 'ㅐ') => Some('ㅙ'),
        ('ㅗ', 'ㅣ') => Some('ㅚ'),
        ('ㅜ', 'ㅓ') => Some('ㅝ'),
        ('ㅜ', 'ㅔ') => Some('ㅞ'),
        ('ㅜ', 'ㅣ') => Some('ㅟ'),
        ('ㅡ', 'ㅣ') => Some('ㅢ'),
        _ => None,
    }
}

fn split_medial(ch: char) -> Option<(char, char)> {
    match ch {
        'ㅘ' => Some(('ㅗ', 'ㅏ')),
        'ㅙ' => Some(('ㅗ', 'ㅐ')),
        'ㅚ' => Some(('ㅗ', 'ㅣ')),
        'ㅝ' => Some(('ㅜ', 'ㅓ')),
        'ㅞ' => Some(('ㅜ', 'ㅔ')),
        'ㅟ' => Some(('ㅜ', 'ㅣ')),
        'ㅢ' => Some(('ㅡ', 'ㅣ')),
        _ => None,
    }
}

fn combine_final(first: char, second: char) -> Option<char> {
    match (first, second) {
        ('ㄱ', 'ㄱ') => Some('ㄲ'),
        ('ㄱ', 'ㅅ') => Some('ㄳ'),
        ('ㄴ', 'ㅈ') => Some('ㄵ'),
        ('ㄴ', 'ㅎ') => Some('ㄶ'),
        ('ㄹ', 'ㄱ') => Some('ㄺ'),
        ('ㄹ', 'ㅁ') => Some('ㄻ'),
        ('ㄹ', 'ㅂ') => Some('ㄼ'),
        ('ㄹ', 'ㅅ') => Some('ㄽ'),
        ('ㄹ', 'ㅌ') => Some('ㄾ'),
        ('ㄹ', 'ㅍ') => Some('ㄿ'),
        ('ㄹ', 'ㅎ') => Some('ㅀ'),
        ('ㅂ', 'ㅅ') => Some('ㅄ'),
        ('ㅅ', 'ㅅ') => Some('ㅆ'),
        _ => None,
    }
}

fn split_final(ch: char) -> Option<(char, char)> {
    match ch {
        'ㄲ' => Some(('ㄱ', 'ㄱ')),
        'ㄳ' => Some(('ㄱ', 'ㅅ')),
        'ㄵ' => Some(('ㄴ', 'ㅈ')),
        'ㄶ' => Some(('ㄴ', 'ㅎ')),
        'ㄺ' => Some(('ㄹ', 'ㄱ')),
        'ㄻ' => Some(('ㄹ', 'ㅁ')),
        'ㄼ' => Some(('ㄹ', 'ㅂ')),
        'ㄽ' => Some(('ㄹ', 'ㅅ')),
        'ㄾ' => Some(('ㄹ', 'ㅌ')),
        'ㄿ' => Some(('ㄹ', 'ㅍ')),
        'ㅀ' => Some(('ㄹ', 'ㅎ')),
        'ㅄ' => Some(('ㅂ', 'ㅅ')),
        'ㅆ' => Some(('ㅅ', 'ㅅ')),
        _ => None,
    }
}

impl HangulComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one jamo. Vowels ignore the role hint.
    pub fn feed(&mut self, ch: char, role: JamoRole) -> CompositionResult {
        let commit = if is_vowel(ch) {
            self.handle_vowel(ch)
        } else {
            self.handle_consonant(ch, role)
        };
        CompositionResult {
            commit,
            preedit: self.compose(),
        }
    }

    /// Undo one input step. Compound jamo shrink to their first half before
    /// the slot empties. Returns the new preedit, or `None` when there was
    /// nothing to consume (the engine then forwards backspace to the host).
    pub fn backspace(&mut self) -> Option<String> {
        if let Some(tail) = self.trailing {
            self.trailing = split_final(tail).map(|(kept, _)| kept);
            return Some(self.compose());
        }
        if let Some(vowel) = self.vowel {
            match split_medial(vowel) {
                Some((kept, _)) => self.vowel = Some(kept),
                None => {
                    self.vowel = None;
                    // Drop the silent ㅇ introduced for a bare vowel.
                    if self.leading == Some('ㅇ') {
                        self.leading = None;
                    }
                }
            }
            return Some(self.compose());
        }
        if let Some(lead) = self.leading {
            self.leading = split_initial(lead).map(|(kept, _)| kept);
            return Some(self.compose());
        }
        None
    }

    /// Render the current state as commit text and clear it.
    pub fn flush(&mut self) -> String {
        self.take_compose()
    }

    /// Current rendering: empty, a bare jamo, or a precomposed syllable.
    fn compose(&self) -> String {
        match (self.leading, self.vowel) {
            (Some(lead), Some(vowel)) => {
                let indices = (
                    choseong_index(lead),
                    jungseong_index(vowel),
                    self.trailing.map_or(Some(0), jongseong_index),
                );
                if let (Some(l), Some(v), Some(t)) = indices {
                    let code = SYLLABLE_BASE + (l * 21 + v) * 28 + t;
                    char::from_u32(code).map(String::from).unwrap_or_default()
                } else {
                    // Not composable as a syllable; render the raw jamo.
                    let mut raw = String::new();
                    raw.push(lead);
                    raw.push(vowel);
                    if let Some(tail) = self.trailing {
                        raw.push(tail);
                    }
                    raw
                }
            }
            (Some(lead), None) => lead.to_string(),
            (None, Some(vowel)) => vowel.to_string(),
            (None, None) => String::new(),
        }
    }

    fn take_compose(&mut self) -> String {
        let text = self.compose();
        self.leading = None;
        self.vowel = None;
        self.trailing = None;
        text
    }

    fn handle_consonant(&mut self, ch: char, role: JamoRole) -> String {
        let mut commit = String::new();

        if !is_consonant(ch) {
            // Not composable at all: flush and pass the character through.
            commit.push_str(&self.take_compose());
            commit.push(ch);
            return commit;
        }

        let lead = match self.leading {
            None => {
                if self.vowel.is_some() {
                    // A vowel standing alone is complete; start over.
                    commit.push_str(&self.take_compose());
                }
                self.leading = Some(ch);
                self.trailing = None;
                return commit;
            }
            Some(lead) => lead,
        };

        if role == JamoRole::Leading {
            commit.push_str(&self.take_compose());
            self.leading = Some(ch);
            return commit;
        }

        if self.vowel.is_none() {
            if let Some(combined) = combine_initial(lead, ch) {
                self.leading = Some(combined);
            } else {
                commit.push(lead);
                self.leading = Some(ch);
            }
            return commit;
        }

        if role == JamoRole::Trailing {
            return self.attach_trailing(ch);
        }

        match self.trailing {
            None => {
                if is_jongseong(ch) {
                    self.trailing = Some(ch);
                } else {
                    // ㄸ/ㅃ/ㅉ cannot close a syllable.
                    commit.push_str(&self.take_compose());
                    self.leading = Some(ch);
                }
            }
            Some(tail) => {
                if let Some(combined) = combine_final(tail, ch) {
                    self.trailing = Some(combined);
                } else {
                    commit.push_str(&self.take_compose());
                    self.leading = Some(ch);
                }
            }
        }
        commit
    }

    fn attach_trailing(&mut self, ch: char) -> String {
        let mut commit = String::new();
        match self.trailing {
            None => {
                if is_jongseong(ch) {
                    self.trailing = Some(ch);
                } else {
                    commit.push_str(&self.take_compose());
                    self.leading = Some(ch);
                }
            }
            Some(tail) => {
                if let Some(combined) = combine_final(tail, ch) {
                    self.trailing = Some(combined);
                } else {
                    commit.push_str(&self.take_compose());
                    self.leading = Some(ch);
                }
            }
        }
        commit
    }

    fn handle_vowel(&mut self, ch: char) -> String {
        let mut commit = String::new();

        if self.leading.is_none() {
            // Silent leading so the bare vowel composes a syllable.
            self.leading = Some('ㅇ');
        }

        let vowel = match self.vowel {
            None => {
                self.vowel = Some(ch);
                return commit;
            }
            Some(vowel) => vowel,
        };

        if let Some(tail) = self.trailing {
            // Syllable split: the (last half of the) trailing consonant
            // becomes the leading of the next syllable. Runs before any
            // medial combining; a closed syllable never reopens its vowel
            // (ㅂㅗㅈ + ㅏ is 보 + 자, not 봦).
            let carry = match split_final(tail) {
                Some((kept, moved)) => {
                    self.trailing = Some(kept);
                    moved
                }
                None => {
                    self.trailing = None;
                    tail
                }
            };
            commit.push_str(&self.compose());
            self.leading = Some(carry);
            self.vowel = Some(ch);
            self.trailing = None;
            return commit;
        }

        if let Some(combined) = combine_medial(vowel, ch) {
            self.vowel = Some(combined);
            return commit;
        }

        commit.push_str(&self.compose());
        self.leading = Some('ㅇ');
        self.vowel = Some(ch);
        self.trailing = None;
        commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(composer: &mut HangulComposer, jamo: &str) -> (String, String) {
        let mut commits = String::new();
        let mut preedit = String::new();
        for ch in jamo.chars() {
            let result = composer.feed(ch, JamoRole::Auto);
            commits.push_str(&result.commit);
            preedit = result.preedit;
        }
        (commits, preedit)
    }

    #[test]
    fn trailing_moves_forward_on_vowel() {
        // ㅂㅗㅈㅏ: the ㅈ became a trailing, then ㅏ pulls it forward.
        let mut composer = HangulComposer::new();
        let (commits, preedit) = feed_all(&mut composer, "ㅂㅗㅈㅏ");
        assert_eq!(commits, "보");
        assert_eq!(preedit, "자");
    }

    #[test]
    fn compound_medial_keeps_trailing() {
        // ㅂㅗㅏㅈ: ㅗ+ㅏ combine to ㅘ, then ㅈ closes the syllable.
        let mut composer = HangulComposer::new();
        let (commits, preedit) = feed_all(&mut composer, "ㅂㅗㅏㅈ");
        assert_eq!(commits, "");
        assert_eq!(preedit, "봦");
    }

    #[test]
    fn preedit_progression_with_double_final() {
        let mut composer = HangulComposer::new();
        assert_eq!(composer.feed('ㄱ', JamoRole::Auto).preedit, "ㄱ");
        assert_eq!(composer.feed('ㅏ', JamoRole::Auto).preedit, "가");
        assert_eq!(composer.feed('ㅂ', JamoRole::Auto).preedit, "갑");
        assert_eq!(composer.feed('ㅅ', JamoRole::Auto).preedit, "값");
        assert_eq!(composer.flush(), "값");
        assert_eq!(composer.flush(), "");
    }

    #[test]
    fn double_final_splits_across_syllables() {
        // 값 + ㅣ → 갑시
        let mut composer = HangulComposer::new();
        let (commits, preedit) = feed_all(&mut composer, "ㄱㅏㅂㅅㅣ");
        assert_eq!(commits, "갑");
        assert_eq!(preedit, "시");
    }

    #[test]
    fn forced_trailing_role_attaches_final() {
        let mut composer = HangulComposer::new();
        composer.feed('ㄱ', JamoRole::Auto);
        composer.feed('ㅏ', JamoRole::Auto);
        let result = composer.feed('ㅅ', JamoRole::Trailing);
        assert_eq!(result.preedit, "갓");
    }

    #[test]
    fn forced_leading_role_starts_new_syllable() {
        let mut composer = HangulComposer::new();
        composer.feed('ㄱ', JamoRole::Auto);
        composer.feed('ㅏ', JamoRole::Auto);
        let result = composer.feed('ㄱ', JamoRole::Leading);
        assert_eq!(result.commit, "가");
        assert_eq!(result.preedit, "ㄱ");
    }

    #[test]
    fn double_initial_combines_and_commits_otherwise() {
        let mut composer = HangulComposer::new();
        assert_eq!(composer.feed('ㄱ', JamoRole::Auto).preedit, "ㄱ");
        assert_eq!(composer.feed('ㄱ', JamoRole::Auto).preedit, "ㄲ");
        let result = composer.feed('ㄴ', JamoRole::Auto);
        assert_eq!(result.commit, "ㄲ");
        assert_eq!(result.preedit, "ㄴ");
    }

    #[test]
    fn illegal_final_starts_new_syllable() {
        // ㄸ cannot close a syllable, so 가 commits and ㄸ leads the next.
        let mut composer = HangulComposer::new();
        composer.feed('ㄱ', JamoRole::Auto);
        composer.feed('ㅏ', JamoRole::Auto);
        let result = composer.feed('ㄸ', JamoRole::Auto);
        assert_eq!(result.commit, "가");
        assert_eq!(result.preedit, "ㄸ");
    }

    #[test]
    fn bare_vowel_composes_with_silent_leading() {
        let mut composer = HangulComposer::new();
        assert_eq!(composer.feed('ㅏ', JamoRole::Auto).preedit, "아");
        let result = composer.feed('ㅏ', JamoRole::Auto);
        assert_eq!(result.commit, "아");
        assert_eq!(result.preedit, "아");
    }

    #[test]
    fn backspace_peels_in_reverse_priority() {
        let mut composer = HangulComposer::new();
        feed_all(&mut composer, "ㄱㅏ");
        assert_eq!(composer.backspace(), Some("ㄱ".to_string()));
        assert_eq!(composer.backspace(), Some(String::new()));
        assert_eq!(composer.backspace(), None);
    }

    #[test]
    fn backspace_shrinks_compound_jamo() {
        let mut composer = HangulComposer::new();
        feed_all(&mut composer, "ㄱㅏㅂㅅ");
        assert_eq!(composer.backspace(), Some("갑".to_string()));
        assert_eq!(composer.backspace(), Some("가".to_string()));

        let mut composer = HangulComposer::new();
        feed_all(&mut composer, "ㅂㅗㅏ");
        assert_eq!(composer.backspace(), Some("보".to_string()));
    }

    #[test]
    fn backspace_drops_silent_leading() {
        let mut composer = HangulComposer::new();
        composer.feed('ㅏ', JamoRole::Auto);
        assert_eq!(composer.backspace(), Some(String::new()));
        assert_eq!(composer.backspace(), None);
    }

    #[test]
    fn backspace_is_left_inverse_of_feed() {
        let mut composer = HangulComposer::new();
        composer.feed('ㄱ', JamoRole::Auto);
        let before = composer.feed('ㅏ', JamoRole::Auto).preedit;
        composer.feed('ㅁ', JamoRole::Auto);
        assert_eq!(composer.backspace(), Some(before));
    }

    #[test]
    fn commits_plus_preedit_equal_flushed_total() {
        let inputs = ["ㅂㅗㅈㅏ", "ㄱㅏㅂㅅㅣ", "ㅇㅏㄴㄴㅕㅇ", "ㄲㅗㅊ"];
        for input in inputs {
            let mut composer = HangulComposer::new();
            let (commits, preedit) = feed_all(&mut composer, input);
            let mut total = commits;
            total.push_str(&preedit);

            let mut fresh = HangulComposer::new();
            let (mut replay, _) = feed_all(&mut fresh, input);
            replay.push_str(&fresh.flush());
            assert_eq!(total, replay, "mismatch for {}", input);
        }
    }

    #[test]
    fn non_jamo_input_flushes_and_passes_through() {
        let mut composer = HangulComposer::new();
        feed_all(&mut composer, "ㄱㅏ");
        let result = composer.feed('x', JamoRole::Auto);
        assert_eq!(result.commit, "가x");
        assert_eq!(result.preedit, "");
    }

    #[test]
    fn full_word_annyeong() {
        // ㅇㅏㄴㄴㅕㅇ → 안녕
        let mut composer = HangulComposer::new();
        let (mut commits, _) = feed_all(&mut composer, "ㅇㅏㄴㄴㅕㅇ");
        commits.push_str(&composer.flush());
        assert_eq!(commits, "안녕");
    }
}
