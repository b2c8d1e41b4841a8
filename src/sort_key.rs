//! Ordering of chapters within a group, derived from their titles.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

static VOLUME_OR_CHAPTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"第(\d+(?:\.\d+)?)(?:话|卷)").expect("chapter pattern should compile")
});
static NUMBERED_EXTRA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"番外篇(\d+)").expect("extra pattern should compile"));
static ANY_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("number pattern should compile"));
static DECIMAL_DIGIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{Nd}$").expect("digit pattern should compile"));

const EXTRA_MARKER: &str = "番外篇";

/// Tiered sort key; variants are declared in tier order.
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    /// `第N话` / `第N卷`; `N` may be fractional.
    Numbered(f64),
    /// `番外篇N`.
    NumberedExtra(u64),
    /// Mentions `番外篇` without a number right after it. Titles with no
    /// number at all sort after every numbered one.
    Extra(Option<u64>),
    /// Any other title containing a number.
    OtherNumber(u64),
    /// No number anywhere; lowercase title.
    Title(String),
}

impl SortKey {
    pub fn from_title(title: &str) -> Self {
        let digits = ascii_digits(title);
        if let Some(caps) = VOLUME_OR_CHAPTER.captures(&digits)
            && let Ok(n) = caps[1].parse::<f64>()
        {
            return SortKey::Numbered(n);
        }
        if let Some(caps) = NUMBERED_EXTRA.captures(&digits) {
            return SortKey::NumberedExtra(saturating_number(&caps[1]));
        }
        if digits.contains(EXTRA_MARKER) {
            return SortKey::Extra(first_number(&digits));
        }
        if let Some(n) = first_number(&digits) {
            return SortKey::OtherNumber(n);
        }
        SortKey::Title(title.to_lowercase())
    }

    fn tier(&self) -> u8 {
        match self {
            SortKey::Numbered(_) => 0,
            SortKey::NumberedExtra(_) => 1,
            SortKey::Extra(_) => 2,
            SortKey::OtherNumber(_) => 3,
            SortKey::Title(_) => 4,
        }
    }
}

fn first_number(title: &str) -> Option<u64> {
    ANY_NUMBER
        .find(title)
        .map(|m| saturating_number(m.as_str()))
}

fn saturating_number(digits: &str) -> u64 {
    digits.parse().unwrap_or(u64::MAX)
}

/// Rewrites every Unicode decimal digit (`１`, `٣`, ...) as its ASCII form so
/// the numeric parsers see plain `0-9`.
fn ascii_digits(title: &str) -> String {
    title
        .chars()
        .map(|c| match decimal_value(c) {
            Some(value) => char::from(b'0' + value),
            None => c,
        })
        .collect()
}

fn is_decimal_digit(c: char) -> bool {
    let mut buf = [0; 4];
    DECIMAL_DIGIT.is_match(c.encode_utf8(&mut buf))
}

/// Decimal digits are assigned in contiguous runs of whole `0..=9` blocks,
/// so a digit's value is its offset from the start of its run, modulo ten.
fn decimal_value(c: char) -> Option<u8> {
    if c.is_ascii_digit() {
        return Some(c as u8 - b'0');
    }
    if !is_decimal_digit(c) {
        return None;
    }
    let mut start = c as u32;
    while let Some(prev) = start.checked_sub(1).and_then(char::from_u32)
        && is_decimal_digit(prev)
    {
        start -= 1;
    }
    u8::try_from((c as u32 - start) % 10).ok()
}

impl Eq for SortKey {}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (SortKey::Numbered(a), SortKey::Numbered(b)) => a.total_cmp(b),
            (SortKey::NumberedExtra(a), SortKey::NumberedExtra(b))
            | (SortKey::OtherNumber(a), SortKey::OtherNumber(b)) => a.cmp(b),
            (SortKey::Extra(a), SortKey::Extra(b)) => match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            (SortKey::Title(a), SortKey::Title(b)) => a.cmp(b),
            _ => self.tier().cmp(&other.tier()),
        }
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
