use std::sync::atomic::{AtomicU64, Ordering};
use crate::models::StylesheetRef;

/// Hands out value prefixes that are unique for the lifetime of a run, so a
/// generated value found in some output can be traced to exactly one
/// document.
pub trait PrefixSelector: Send + Sync {
    /// Returns `(prefix, value_length)`.
    fn select_prefix(&self, stylesheet: &StylesheetRef) -> (String, usize);
}

/// Prefixes of the form `<stem><letters>`: `xpaa`, `xpab`, ... Letters never
/// collide with the zero-padded digits that follow them.
pub struct SequentialPrefixSelector {
    stem: String,
    value_length: usize,
    next: AtomicU64,
}

impl SequentialPrefixSelector {
    pub fn new(stem: impl Into<String>, value_length: usize) -> Self {
        Self {
            stem: stem.into(),
            value_length,
            next: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialPrefixSelector {
    fn default() -> Self {
        Self::new("xp", 6)
    }
}

impl PrefixSelector for SequentialPrefixSelector {
    fn select_prefix(&self, _stylesheet: &StylesheetRef) -> (String, usize) {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        (format!("{}{}", self.stem, letters(n)), self.value_length)
    }
}

/// Bijective base-26 over `a..z`, offset so the first prefix is `aa`.
fn letters(n: u64) -> String {
    let mut m = n + 27;
    let mut out = Vec::new();
    while m > 0 {
        m -= 1;
        out.push(b'a' + (m % 26) as u8);
        m /= 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
