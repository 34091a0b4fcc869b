//! Bounded-alphabet string prefixes as an ordered integer domain.
//!
//! Every string over a contiguous alphabet, cut to at most `prefix_length`
//! characters, maps to a unique integer such that lexicographic order is
//! preserved and neighbouring strings map to neighbouring integers. The
//! empty string encodes to 0. A string shorter than the prefix length sorts
//! (and encodes) before every longer string sharing it as a prefix.
//!
//! With an alphabet of size `A` and prefix length `L`, the first character
//! contributes `index * (1 + A + ... + A^(L-1)) + 1`, the remaining
//! characters recurse with `L - 1`. Construction rejects configurations
//! where `(A + 1)^L` does not fit below `2^63`.
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use super::domain::{LikePattern, OrderedDomain};
use crate::types::{Result, StatsError};

/// Wildcard matching any run of characters in `LIKE` patterns.
pub const MULTI_CHAR_WILDCARD: char = '%';
/// Wildcard matching exactly one character in `LIKE` patterns.
pub const SINGLE_CHAR_WILDCARD: char = '_';

/// First character of the default alphabet (printable ASCII).
pub const DEFAULT_FIRST_CHAR: char = ' ';
/// Last character of the default alphabet (printable ASCII).
pub const DEFAULT_LAST_CHAR: char = '~';
/// Prefix length used with the default alphabet.
pub const DEFAULT_PREFIX_LENGTH: usize = 9;

const ENCODING_LIMIT: u64 = 1 << 63;

/// String domain over a contiguous character range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StringDomainSpec", into = "StringDomainSpec")]
pub struct StringDomain {
    alphabet: String,
    first: u32,
    size: u64,
    prefix_length: usize,
    /// `bases[l] = 1 + A + ... + A^(l-1)`, the encoded span of all strings
    /// of length below `l` that share one leading character.
    bases: Vec<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StringDomainSpec {
    alphabet: String,
    prefix_length: usize,
}

impl TryFrom<StringDomainSpec> for StringDomain {
    type Error = StatsError;

    fn try_from(raw: StringDomainSpec) -> Result<Self> {
        StringDomain::new(&raw.alphabet, raw.prefix_length)
    }
}

impl From<StringDomain> for StringDomainSpec {
    fn from(domain: StringDomain) -> Self {
        StringDomainSpec {
            alphabet: domain.alphabet,
            prefix_length: domain.prefix_length,
        }
    }
}

impl StringDomain {
    /// Creates a domain from an explicit alphabet.
    ///
    /// The alphabet must hold at least two characters, each exactly one
    /// code point above its predecessor.
    pub fn new(alphabet: &str, prefix_length: usize) -> Result<Self> {
        let chars: Vec<char> = alphabet.chars().collect();
        if prefix_length == 0 {
            return Err(StatsError::config("string prefix length must be positive"));
        }
        if chars.len() < 2 {
            return Err(StatsError::config(
                "string alphabet must contain at least two characters",
            ));
        }
        let first = chars[0] as u32;
        for (offset, ch) in chars.iter().enumerate() {
            if *ch as u32 != first + offset as u32 {
                return Err(StatsError::config(format!(
                    "string alphabet '{alphabet}' is not a contiguous increasing character range"
                )));
            }
        }
        let size = chars.len() as u64;
        if !fits_encoding(size, prefix_length) {
            return Err(StatsError::config(format!(
                "prefix length {prefix_length} overflows the encoding for an alphabet of {size} characters"
            )));
        }
        Ok(Self::assemble(alphabet.to_owned(), first, size, prefix_length))
    }

    /// Creates a domain over the inclusive character range `first..=last`.
    pub fn from_range(first: char, last: char, prefix_length: usize) -> Result<Self> {
        let alphabet: String = (first..=last).collect();
        Self::new(&alphabet, prefix_length)
    }

    /// Largest prefix length the overflow guard accepts for `alphabet_size`.
    pub fn default_prefix_length(alphabet_size: usize) -> usize {
        let mut length = 0;
        while fits_encoding(alphabet_size as u64, length + 1) {
            length += 1;
        }
        length
    }

    fn assemble(alphabet: String, first: u32, size: u64, prefix_length: usize) -> Self {
        let mut bases = Vec::with_capacity(prefix_length + 1);
        bases.push(0u64);
        for length in 1..=prefix_length {
            bases.push(bases[length - 1] * size + 1);
        }
        Self {
            alphabet,
            first,
            size,
            prefix_length,
            bases,
        }
    }

    /// Characters accepted by the domain.
    pub fn alphabet(&self) -> &str {
        &self.alphabet
    }

    /// Number of leading characters that take part in ordering.
    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    fn first_char(&self) -> char {
        self.char_at(0)
    }

    fn last_char(&self) -> char {
        self.char_at(self.size - 1)
    }

    fn char_at(&self, index: u64) -> char {
        let index = index.min(self.size - 1) as u32;
        char::from_u32(self.first + index).unwrap_or(char::REPLACEMENT_CHARACTER)
    }

    fn index_of(&self, ch: char) -> u64 {
        u64::from((ch as u32).saturating_sub(self.first)).min(self.size - 1)
    }

    fn contains(&self, ch: char) -> bool {
        let code = ch as u32;
        code >= self.first && u64::from(code - self.first) < self.size
    }

    /// Whether every character of `value` belongs to the alphabet. Pattern
    /// wildcards are accepted when `allow_wildcards` is set.
    pub fn supports(&self, value: &str, allow_wildcards: bool) -> bool {
        value.chars().all(|ch| {
            self.contains(ch)
                || (allow_wildcards && (ch == MULTI_CHAR_WILDCARD || ch == SINGLE_CHAR_WILDCARD))
        })
    }

    /// Cuts `value` down to the prefix length.
    pub fn truncate(&self, value: &str) -> String {
        value.chars().take(self.prefix_length).collect()
    }

    /// Integer code of `value` (truncated to the prefix length first).
    pub fn encode(&self, value: &str) -> u64 {
        let mut code = 0;
        let mut remaining = self.prefix_length;
        for ch in value.chars().take(self.prefix_length) {
            code += self.index_of(ch) * self.bases[remaining] + 1;
            remaining -= 1;
        }
        code
    }

    /// Inverse of [`encode`](Self::encode) on `[0, max_encoded()]`.
    pub fn decode(&self, code: u64) -> String {
        let mut value = String::new();
        let mut remaining = code;
        let mut length = self.prefix_length;
        while remaining > 0 && length > 0 {
            remaining -= 1;
            let base = self.bases[length];
            value.push(self.char_at(remaining / base));
            remaining %= base;
            length -= 1;
        }
        value
    }

    /// Code of the largest representable string.
    pub fn max_encoded(&self) -> u64 {
        self.encode(&self.max_string())
    }

    fn max_string(&self) -> String {
        std::iter::repeat(self.last_char())
            .take(self.prefix_length)
            .collect()
    }

    /// Next string in encoding order.
    ///
    /// The largest string of full prefix length is its own successor.
    pub fn next_string(&self, value: &str) -> String {
        self.next_string_with_length(value, self.prefix_length)
    }

    /// Next string when ordering is restricted to `length` characters.
    pub fn next_string_with_length(&self, value: &str, length: usize) -> String {
        let mut chars: Vec<char> = value.chars().take(length).collect();
        if chars.len() < length {
            chars.push(self.first_char());
            return chars.into_iter().collect();
        }
        let last = self.last_char();
        if chars.iter().all(|ch| *ch == last) {
            return chars.into_iter().collect();
        }
        while chars.last() == Some(&last) {
            chars.pop();
        }
        if let Some(tail) = chars.last_mut() {
            *tail = self.char_at(self.index_of(*tail) + 1);
        }
        chars.into_iter().collect()
    }

    /// Previous string in encoding order; the empty string is its own predecessor.
    pub fn previous_string(&self, value: &str) -> String {
        self.decode(self.encode(value).saturating_sub(1))
    }

    fn parse_like(&self, pattern: &str) -> LikePattern<String> {
        let is_wildcard = |ch: char| ch == MULTI_CHAR_WILDCARD || ch == SINGLE_CHAR_WILDCARD;
        if pattern.is_empty() || !pattern.chars().any(is_wildcard) {
            return LikePattern::Exact(self.truncate(pattern));
        }
        if pattern.chars().all(|ch| ch == MULTI_CHAR_WILDCARD) {
            return LikePattern::MatchAll;
        }
        let literal_len = pattern.find(is_wildcard).unwrap_or(pattern.len());
        let literal = &pattern[..literal_len];
        let range = (!literal.is_empty()).then(|| self.prefix_range(literal));
        let rest = &pattern[literal_len..];
        if rest.chars().eq([MULTI_CHAR_WILDCARD]) {
            if let Some((prefix, upper)) = range {
                return LikePattern::Prefix { prefix, upper };
            }
        }
        LikePattern::Complex {
            literal_prefix: range,
        }
    }

    fn prefix_range(&self, literal: &str) -> (String, Option<String>) {
        let prefix = self.truncate(literal);
        let length = prefix.chars().count();
        let upper = self.next_string_with_length(&prefix, length);
        let upper = (upper != prefix).then_some(upper);
        (prefix, upper)
    }
}

impl Default for StringDomain {
    fn default() -> Self {
        let first = DEFAULT_FIRST_CHAR as u32;
        let alphabet: String = (DEFAULT_FIRST_CHAR..=DEFAULT_LAST_CHAR).collect();
        let size = alphabet.chars().count() as u64;
        Self::assemble(alphabet, first, size, DEFAULT_PREFIX_LENGTH)
    }
}

fn fits_encoding(alphabet_size: u64, prefix_length: usize) -> bool {
    let Ok(exponent) = u32::try_from(prefix_length) else {
        return false;
    };
    alphabet_size
        .checked_add(1)
        .and_then(|radix| radix.checked_pow(exponent))
        .is_some_and(|span| span < ENCODING_LIMIT)
}

impl OrderedDomain for StringDomain {
    type Value = String;

    fn type_name(&self) -> &'static str {
        "string"
    }

    fn canonicalize(&self, value: &String) -> String {
        self.truncate(value)
    }

    fn check_value(&self, value: &String, allow_wildcards: bool) -> Result<()> {
        if self.supports(value, allow_wildcards) {
            Ok(())
        } else {
            Err(StatsError::UnsupportedCharacters {
                value: value.clone(),
                alphabet: self.alphabet.clone(),
            })
        }
    }

    fn successor(&self, value: &String) -> String {
        self.next_string(value)
    }

    fn predecessor(&self, value: &String) -> String {
        self.previous_string(value)
    }

    fn bin_width(&self, min: &String, max: &String) -> f64 {
        (self.encode(max) as f64) - (self.encode(min) as f64) + 1.0
    }

    fn distance(&self, from: &String, to: &String) -> f64 {
        (self.encode(to) as f64) - (self.encode(from) as f64)
    }

    fn equal_width_minima(&self, min: &String, max: &String, max_bins: usize) -> (Vec<String>, usize) {
        let lower = self.encode(min);
        let span = self.encode(max).saturating_sub(lower) + 1;
        let bins = (max_bins.max(1) as u64).min(span);
        let base = span / bins;
        let larger = span % bins;
        let minima = (0..bins)
            .map(|bin| self.decode(lower + bin * base + bin.min(larger)))
            .collect();
        (minima, larger as usize)
    }

    fn repr(&self, value: &String) -> String {
        self.encode(value).to_string()
    }

    fn is_truncated(&self, value: &String) -> bool {
        value.chars().count() >= self.prefix_length
    }

    fn has_prefix(&self, value: &String, prefix: &String) -> bool {
        value.starts_with(prefix.as_str())
    }

    fn supports_patterns(&self) -> bool {
        true
    }

    fn like_pattern(&self, pattern: &String) -> Option<LikePattern<String>> {
        Some(self.parse_like(pattern))
    }
}
