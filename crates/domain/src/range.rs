//! Range-addressed spans of a text, used to request incremental
//! generation from a backend.
//!
//! The compact textual encoding follows the RFC 7233 `Range` header shape
//! (`words=0-50`, `chars=120-`, `words=-50,100-150`), with the unit drawn
//! from [`RangeUnit`] instead of `bytes`. Starts and ends are inclusive
//! and either side of a span may be omitted.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Units
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The unit a range is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeUnit {
    Words,
    Chars,
    Sentences,
}

impl RangeUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeUnit::Words => "words",
            RangeUnit::Chars => "chars",
            RangeUnit::Sentences => "sentences",
        }
    }

    /// Count how many of this unit `text` contains.
    ///
    /// Words are counted with a simple word/punctuation tokenizer, chars
    /// as NFC-normalized codepoints, and sentences with the boundary
    /// heuristic in [`sentence_boundaries`]. Sentence counting mirrors a
    /// split: a text with no boundary still counts as one sentence.
    pub fn count(&self, text: &str) -> u64 {
        match self {
            RangeUnit::Words => WORD_RE.find_iter(text).count() as u64,
            RangeUnit::Chars => text.nfc().count() as u64,
            RangeUnit::Sentences => sentence_boundaries(text).len() as u64 + 1,
        }
    }
}

impl fmt::Display for RangeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "words" => Ok(RangeUnit::Words),
            "chars" => Ok(RangeUnit::Chars),
            "sentences" => Ok(RangeUnit::Sentences),
            other => Err(Error::Format(format!("unknown range unit '{other}'"))),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Range
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One span of a range. Both ends are inclusive; either may be open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subrange {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// A requested or consumed span of a text in a chosen unit.
///
/// Ephemeral: computed fresh each generation round and sent as a request
/// header, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub unit: RangeUnit,
    pub spans: Vec<Subrange>,
}

impl Range {
    /// An empty range: nothing more is needed.
    pub fn empty(unit: RangeUnit) -> Self {
        Self {
            unit,
            spans: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Whether the range is a single fully-bounded span.
    pub fn is_finite(&self) -> bool {
        match self.spans.as_slice() {
            [span] => span.start.is_some() && span.end.is_some(),
            _ => false,
        }
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.unit)?;
        for (i, span) in self.spans.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if let Some(start) = span.start {
                write!(f, "{start}")?;
            }
            f.write_str("-")?;
            if let Some(end) = span.end {
                write!(f, "{end}")?;
            }
        }
        Ok(())
    }
}

impl FromStr for Range {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (unit_str, spans_str) = s
            .split_once('=')
            .ok_or_else(|| Error::Format(format!("missing '=' in range '{s}'")))?;
        let unit: RangeUnit = unit_str.parse()?;

        if spans_str.is_empty() {
            return Err(Error::Format(format!("empty span list in range '{s}'")));
        }

        let mut spans = Vec::new();
        for part in spans_str.split(',') {
            let (start, end) = part
                .split_once('-')
                .ok_or_else(|| Error::Format(format!("malformed span '{part}'")))?;
            if start.is_empty() && end.is_empty() {
                return Err(Error::Format(format!("dangling span in range '{s}'")));
            }
            let start = parse_bound(start)?;
            let end = parse_bound(end)?;
            spans.push(Subrange { start, end });
        }

        Ok(Range { unit, spans })
    }
}

fn parse_bound(s: &str) -> Result<Option<u64>> {
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<u64>()
        .map(Some)
        .map_err(|_| Error::Format(format!("invalid span bound '{s}'")))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Span arithmetic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Compute the next span to request, given the text generated so far.
///
/// Returns an empty range once `text` has reached `max_length`. When the
/// remainder fits in one chunk, the span is fully bounded
/// (`[len, max_length]`) to signal the final round; otherwise it is
/// open-ended (`[-, chunk_size]`): "give me up to `chunk_size` more,
/// starting wherever you left off".
pub fn next_span(text: &str, unit: RangeUnit, max_length: u64, chunk_size: u64) -> Range {
    let len = unit.count(text);
    if len >= max_length {
        return Range::empty(unit);
    }

    let remaining = max_length - len;
    let span = if remaining <= chunk_size {
        Subrange {
            start: Some(len),
            end: Some(len + remaining),
        }
    } else {
        Subrange {
            start: None,
            end: Some(chunk_size),
        }
    };

    Range {
        unit,
        spans: vec![span],
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tokenization & trimming
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

// Contiguous word characters or contiguous punctuation.
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w+|[^\w\s]+").unwrap());

// Candidate sentence boundary: a terminal punctuation run followed by
// whitespace. Neighbor context is checked separately since the regex
// crate has no lookaround.
static SENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.?!]+\s+").unwrap());

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Sentence boundaries as `(sentence_end, next_start)` byte offsets.
///
/// A boundary is a run of `.?!` preceded (possibly through other
/// punctuation) by at least two word characters, followed by whitespace
/// and an optional opening quote plus an uppercase letter. Heuristic, not
/// grammatical.
pub fn sentence_boundaries(text: &str) -> Vec<(usize, usize)> {
    let mut boundaries = Vec::new();
    for m in SENT_RE.find_iter(text) {
        let run = m.as_str();
        let ws_offset = run
            .find(|c: char| c.is_whitespace())
            .expect("match always contains whitespace");
        let sentence_end = m.start() + ws_offset;

        // Behind: skip punctuation, then require two word characters.
        let mut behind = text[..m.start()]
            .chars()
            .rev()
            .skip_while(|c| c.is_ascii_punctuation());
        let two_words = matches!(
            (behind.next(), behind.next()),
            (Some(a), Some(b)) if is_word_char(a) && is_word_char(b)
        );

        // Ahead: optional opening quote, then an uppercase letter.
        let mut ahead = text[m.end()..].chars();
        let capitalized = match ahead.next() {
            Some('"') => ahead.next().is_some_and(|c| c.is_ascii_uppercase()),
            Some(c) => c.is_ascii_uppercase(),
            None => false,
        };

        if two_words && capitalized {
            boundaries.push((sentence_end, m.end()));
        }
    }
    boundaries
}

/// Truncate `text` to at most `max_length` units.
///
/// The cut happens at a unit boundary of the original text; a generator
/// that over-produces is clipped rather than rejected.
pub fn trim(text: &str, max_length: u64, unit: RangeUnit) -> String {
    if unit.count(text) <= max_length {
        return text.to_string();
    }

    match unit {
        RangeUnit::Words => {
            let end = WORD_RE
                .find_iter(text)
                .take(max_length as usize)
                .last()
                .map_or(0, |m| m.end());
            text[..end].to_string()
        }
        RangeUnit::Chars => text.chars().take(max_length as usize).collect(),
        RangeUnit::Sentences => {
            if max_length == 0 {
                return String::new();
            }
            let boundaries = sentence_boundaries(text);
            match boundaries.get(max_length as usize - 1) {
                Some(&(sentence_end, _)) => text[..sentence_end].to_string(),
                None => text.to_string(),
            }
        }
    }
}

/// Drop a trailing sentence fragment, leaving only complete sentences.
///
/// Used on the final generation round so a capped suggestion does not end
/// mid-sentence. A text that is entirely a fragment collapses to empty.
pub fn strip_trailing_fragment(text: &str) -> &str {
    let tail_start = sentence_boundaries(text)
        .last()
        .map_or(0, |&(_, next_start)| next_start);

    let tail = text[tail_start..]
        .trim_end()
        .trim_end_matches(['"', '\'', ')', ']']);
    if tail.ends_with(['.', '?', '!']) {
        text
    } else {
        text[..tail_start].trim_end()
    }
}
