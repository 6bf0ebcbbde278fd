use std::hash::{Hash, Hasher};

/// One record: a repetition count followed by `count * entry_size` payload words.
///
/// Records are compared by value. Two records built independently from
/// different artifacts or lines are the same key as long as their words match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Record {
    words: Vec<i16>,
}

impl Record {
    /// Builds a record from its words, header first. Callers guarantee the
    /// length matches the header; see [`Record::expected_len`].
    ///
    /// # Panics
    ///
    /// Panics if `words` is empty: every record has a header word.
    pub fn from_words(words: Vec<i16>) -> Self {
        assert!(!words.is_empty(), "record needs a header word");
        Self { words }
    }

    /// Total word count for a record whose header is `count`, or `None` if it
    /// does not fit in a `usize`.
    pub fn expected_len(count: usize, entry_size: usize) -> Option<usize> {
        count.checked_mul(entry_size)?.checked_add(1)
    }

    pub fn header(&self) -> i16 {
        self.words[0]
    }

    pub fn payload(&self) -> &[i16] {
        &self.words[1..]
    }

    pub fn words(&self) -> &[i16] {
        &self.words
    }

    /// Folds the words into 32 bits, alternating between the low and high
    /// half so that a word's position parity affects the result.
    pub fn fingerprint(&self) -> u32 {
        let mut acc: i32 = 0;
        let mut high = false;
        for &word in &self.words {
            let word = i32::from(word);
            acc ^= if high { word << 16 } else { word };
            high = !high;
        }
        acc as u32
    }
}

impl Hash for Record {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.words.len());
        state.write_u32(self.fingerprint());
    }
}

impl From<Vec<i16>> for Record {
    fn from(words: Vec<i16>) -> Self {
        Self::from_words(words)
    }
}
