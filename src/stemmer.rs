//! Surface-form stemming.
//!
//! A thin wrapper around the English Snowball stemmer, constructed once and
//! passed by reference into the parser and query layers. Keeping it a value
//! (rather than a process-wide singleton) keeps parsing a pure function of
//! its inputs.

use rust_stemmers::{Algorithm, Stemmer as Snowball};

pub struct Stemmer {
    inner: Snowball,
}

impl Stemmer {
    pub fn new() -> Self {
        Self { inner: Snowball::create(Algorithm::English) }
    }

    /// Lowercase then stem. Deterministic: equal inputs always produce
    /// equal stems.
    pub fn stem(&self, word: &str) -> String {
        let lowered = word.to_lowercase();
        self.inner.stem(&lowered).into_owned()
    }
}

impl Default for Stemmer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_collapses_inflections() {
        let stemmer = Stemmer::new();
        assert_eq!(stemmer.stem("running"), stemmer.stem("runs"));
        assert_eq!(stemmer.stem("addresses"), stemmer.stem("address"));
    }

    #[test]
    fn test_stem_is_case_insensitive() {
        let stemmer = Stemmer::new();
        assert_eq!(stemmer.stem("Routing"), stemmer.stem("routing"));
    }

    #[test]
    fn test_stem_is_deterministic() {
        let stemmer = Stemmer::new();
        assert_eq!(stemmer.stem("protocols"), stemmer.stem("protocols"));
    }
}
