use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Word ↔ id table that grows in order of first appearance.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Vocab {
    pub encode: HashMap<String, usize>,
    words: Vec<String>,
}

impl Vocab {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `word`, assigning the next free id if it is new.
    pub fn insert(&mut self, word: &str) -> usize {
        if let Some(&id) = self.encode.get(word) {
            return id;
        }
        let id = self.words.len();
        self.words.push(word.to_string());
        self.encode.insert(word.to_string(), id);
        id
    }

    /// Convert a word to its token index
    #[inline]
    pub fn encode(&self, word: &str) -> Option<usize> {
        self.encode.get(word).copied()
    }

    /// Convert a token index back to a word
    #[inline]
    pub fn decode(&self, token_id: usize) -> Option<&str> {
        self.words.get(token_id).map(String::as_str)
    }

    pub fn size(&self) -> usize {
        self.words.len()
    }

    pub fn words(&self) -> Vec<&str> {
        self.words.iter().map(String::as_str).collect()
    }
}
