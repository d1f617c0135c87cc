//! Country codes and the per-code value table
//!
//! Range records tag every address range with a two-letter ISO country
//! code, packed into an integer code-word so the trees and the on-disk
//! records never handle strings. The table-generation front-end filters by
//! a user-supplied list of codes, each optionally carrying a numeric value
//! (`US:CA:DE=10100`); [`CodeTable`] holds that list as 676 hash buckets of
//! exact-key trees, reusing the range engine in its degenerate
//! point-interval form.

use crate::error::{Error, Result};
use crate::range_tree::{RangeKey, RangeTree};
use std::fmt;
use std::str::FromStr;

/// Number of buckets in a [`CodeTable`].
///
/// One bucket per possible two-letter code: the canonical index is a
/// perfect hash, so each bucket tree is a single node in practice.
pub const BUCKET_COUNT: usize = 676;

/// A two-letter uppercase country code packed into an integer.
///
/// The first letter occupies the high byte, so code-words order the same
/// way the codes do alphabetically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodeWord(u16);

impl CodeWord {
    /// Pack two ASCII letters, folding to uppercase.
    pub fn new(letters: [u8; 2]) -> Result<Self> {
        if !letters.iter().all(|b| b.is_ascii_alphabetic()) {
            return Err(Error::InvalidCode(format!(
                "'{}' is not a two-letter code",
                String::from_utf8_lossy(&letters)
            )));
        }
        let a = letters[0].to_ascii_uppercase();
        let b = letters[1].to_ascii_uppercase();
        Ok(CodeWord(((a as u16) << 8) | b as u16))
    }

    /// Reinterpret a raw code-word read from a range record.
    ///
    /// Persisted tables are trusted to carry well-formed codes; no letter
    /// validation happens here.
    #[inline]
    pub const fn from_raw(raw: u16) -> Self {
        CodeWord(raw)
    }

    /// The packed representation, as written into range records.
    #[inline]
    pub const fn as_raw(self) -> u16 {
        self.0
    }

    /// The two letters of the code.
    #[inline]
    pub const fn letters(self) -> [u8; 2] {
        [(self.0 >> 8) as u8, self.0 as u8]
    }

    /// Canonical numeric index: `(C1 - 'A') * 26 + (C2 - 'A')`, in
    /// `[0, 675]` for well-formed codes ("AA" is 0, "ZZ" is 675).
    #[inline]
    pub const fn index(self) -> u32 {
        let [a, b] = self.letters();
        (a as u32).wrapping_sub('A' as u32) * 26 + (b as u32).wrapping_sub('A' as u32)
    }
}

impl FromStr for CodeWord {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return Err(Error::InvalidCode(format!(
                "'{}' is not a two-letter code",
                s
            )));
        }
        CodeWord::new([bytes[0], bytes[1]])
    }
}

impl fmt::Display for CodeWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.letters();
        write!(f, "{}{}", a as char, b as char)
    }
}

impl RangeKey for CodeWord {
    #[inline]
    fn checked_incr(self) -> Option<Self> {
        self.0.checked_add(1).map(CodeWord)
    }
    #[inline]
    fn checked_decr(self) -> Option<Self> {
        self.0.checked_sub(1).map(CodeWord)
    }
}

/// Country filter: a fixed array of bucket trees mapping code-words to
/// their assigned 32-bit table values (0 means "no value assigned").
///
/// An empty table is how consumers express "match any country".
pub struct CodeTable {
    buckets: Vec<RangeTree<CodeWord, u32>>,
    len: usize,
}

impl CodeTable {
    /// Create a table with all buckets empty.
    pub fn new() -> Self {
        CodeTable {
            buckets: (0..BUCKET_COUNT).map(|_| RangeTree::new()).collect(),
            len: 0,
        }
    }

    /// Number of distinct codes stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no codes are stored ("match any country").
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Store one filter token of the shape `CODE` or `CODE=value`.
    ///
    /// The value defaults to 0 when absent; values outside `(0, 2^32-1)`
    /// are stored as 0, matching the historical tools. A duplicate code is
    /// silently ignored (first occurrence wins).
    ///
    /// Unlike the historical tools, a malformed token is an error rather
    /// than a silent skip: a typo'd filter that matches nothing is worse
    /// than a diagnostic.
    pub fn store(&mut self, token: &str) -> Result<()> {
        let token = token.trim();
        let (code_text, value_text) = match token.split_once('=') {
            Some((code, value)) => (code, Some(value)),
            None => (token, None),
        };
        let code: CodeWord = code_text.trim().parse()?;
        let value = match value_text {
            None => 0,
            Some(text) => {
                let parsed: u64 = text.trim().parse().map_err(|_| {
                    Error::InvalidCode(format!("bad value in filter token '{}'", token))
                })?;
                if parsed > 0 && parsed < u32::MAX as u64 {
                    parsed as u32
                } else {
                    0
                }
            }
        };
        if self.bucket_mut(code).insert(code, code, value) {
            self.len += 1;
        }
        Ok(())
    }

    /// Look up the value assigned to a code.
    ///
    /// `Some(0)` means the code is listed without a value; `None` means it
    /// is not listed at all.
    pub fn find(&self, code: CodeWord) -> Option<u32> {
        self.buckets[Self::bucket_index(code)]
            .find(code)
            .map(|entry| entry.value)
    }

    /// Parse a colon-separated filter list (`US:CA:DE=10100`).
    ///
    /// An empty string yields an empty table, which consumers read as
    /// "match any country".
    pub fn parse_list(list: &str) -> Result<Self> {
        let mut table = CodeTable::new();
        if list.is_empty() {
            return Ok(table);
        }
        for token in list.split(':') {
            table.store(token)?;
        }
        Ok(table)
    }

    fn bucket_index(code: CodeWord) -> usize {
        code.index() as usize % BUCKET_COUNT
    }

    fn bucket_mut(&mut self, code: CodeWord) -> &mut RangeTree<CodeWord, u32> {
        &mut self.buckets[Self::bucket_index(code)]
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Fallback table value for a code: `offset + index() * 10`, clamped to 0
/// when the sum leaves the u32 range.
pub fn offset_value(code: CodeWord, offset: i32) -> u32 {
    let value = offset as i64 + code.index() as i64 * 10;
    if (0..=u32::MAX as i64).contains(&value) {
        value as u32
    } else {
        0
    }
}
