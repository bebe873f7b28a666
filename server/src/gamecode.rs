//! Game codes and the mnemonics that make them easy to read out loud
//!
//! A code is four random uppercase letters. Its mnemonic picks one word per
//! letter from a word list, so `FROG` might be shown as
//! "Fancy Red Orange Giraffe".

use rand::seq::SliceRandom;
use rand::Rng;
use shared::GAME_CODE_LEN;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    /// Candidate words keyed by their uppercase first letter
    words: HashMap<char, Vec<String>>,
}

impl CodeGenerator {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_letter: HashMap<char, Vec<String>> = HashMap::new();
        for word in words {
            let word = word.as_ref().trim();
            let Some(first) = word.chars().next() else {
                continue;
            };
            if !first.is_ascii_alphabetic() {
                continue;
            }
            by_letter
                .entry(first.to_ascii_uppercase())
                .or_default()
                .push(capitalize(word));
        }
        Self { words: by_letter }
    }

    /// Loads a word list with one word per line
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::new(contents.lines()))
    }

    pub fn word_count(&self) -> usize {
        self.words.values().map(Vec::len).sum()
    }

    pub fn code<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        (0..GAME_CODE_LEN)
            .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
            .collect()
    }

    /// One word per letter of `code`, the letter itself where no word fits
    pub fn mnemonic<R: Rng + ?Sized>(&self, code: &str, rng: &mut R) -> String {
        code.chars()
            .map(|letter| {
                self.words
                    .get(&letter.to_ascii_uppercase())
                    .and_then(|candidates| candidates.choose(rng))
                    .cloned()
                    .unwrap_or_else(|| letter.to_string())
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
