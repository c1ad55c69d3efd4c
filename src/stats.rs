//! Per-line distribution statistics over raw document text.
//!
//! Four views of the same line scan: word counts, word-character counts,
//! non-whitespace character counts, and total character counts. Useful for
//! sizing up a document before or after ingestion.

use crate::parser::tokenize_words;

/// Distribution of per-line item counts for one way of splitting lines.
#[derive(Debug, Clone, PartialEq)]
pub struct LineStatistics {
    pub total: u64,
    pub max: u64,
    pub min: u64,
    pub mean: f64,
    pub line_count: u64,
}

impl LineStatistics {
    fn from_counts(counts: impl Iterator<Item = u64>) -> Self {
        let mut total = 0u64;
        let mut max = 0u64;
        let mut min = u64::MAX;
        let mut line_count = 0u64;

        for count in counts {
            total += count;
            max = max.max(count);
            min = min.min(count);
            line_count += 1;
        }

        if line_count == 0 {
            min = 0;
        }
        let mean = if line_count > 0 {
            total as f64 / line_count as f64
        } else {
            0.0
        };

        Self { total, max, min, mean, line_count }
    }
}

/// All four per-line distributions for one text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStatistics {
    pub words: LineStatistics,
    pub word_chars: LineStatistics,
    pub non_whitespace_chars: LineStatistics,
    pub all_chars: LineStatistics,
}

/// Compute per-line statistics for a raw text.
pub fn analyze(text: &str) -> TextStatistics {
    let lines: Vec<&str> = text.lines().collect();

    TextStatistics {
        words: LineStatistics::from_counts(
            lines.iter().map(|l| tokenize_words(l).len() as u64),
        ),
        word_chars: LineStatistics::from_counts(lines.iter().map(|l| {
            tokenize_words(l)
                .iter()
                .map(|w| w.chars().count() as u64)
                .sum()
        })),
        non_whitespace_chars: LineStatistics::from_counts(
            lines
                .iter()
                .map(|l| l.chars().filter(|c| !c.is_whitespace()).count() as u64),
        ),
        all_chars: LineStatistics::from_counts(
            lines.iter().map(|l| l.chars().count() as u64),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_counts_per_line() {
        let stats = analyze("one two three\nfour five\n\nsix");
        assert_eq!(stats.words.total, 6);
        assert_eq!(stats.words.max, 3);
        assert_eq!(stats.words.min, 0);
        assert_eq!(stats.words.line_count, 4);
        assert!((stats.words.mean - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_char_counts_ignore_or_include_whitespace() {
        let stats = analyze("ab cd");
        assert_eq!(stats.non_whitespace_chars.total, 4);
        assert_eq!(stats.all_chars.total, 5);
        assert_eq!(stats.word_chars.total, 4);
    }

    #[test]
    fn test_empty_text() {
        let stats = analyze("");
        assert_eq!(stats.words.line_count, 0);
        assert_eq!(stats.words.min, 0);
        assert_eq!(stats.words.mean, 0.0);
    }
}
