//! Monotonic, sortable, type-prefixed identifiers.
//!
//! An identifier is a 4-character type prefix, an underscore, and a
//! 22-character body encoding a millisecond timestamp plus a process-local
//! monotonic counter. The body uses the RFC 4648 "extended hex" alphabet
//! (`0-9A-V`) rather than standard base32, because its ASCII order matches
//! numeric order — a plain byte-wise string comparison of two bodies
//! therefore agrees with the numeric order of the values they encode.
//!
//! Ascending identifiers sort in creation order. Descending identifiers
//! invert the encoded value so the newest identifier sorts first under a
//! lexicographic listing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";
const BODY_CHARS: usize = 22;
const BODY_BITS: u32 = (BODY_CHARS as u32) * 5; // 110 bits
const COUNTER_BITS: u32 = 62;
const COUNTER_MASK: u128 = (1u128 << COUNTER_BITS) - 1;
const MAX_BODY_VALUE: u128 = (1u128 << BODY_BITS) - 1;

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_counter() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn encode_body(value: u128) -> String {
    let mut out = vec![0u8; BODY_CHARS];
    let mut v = value & MAX_BODY_VALUE;
    for i in (0..BODY_CHARS).rev() {
        out[i] = ALPHABET[(v & 0x1f) as usize];
        v >>= 5;
    }
    // SAFETY: every byte comes from ALPHABET, which is ASCII.
    String::from_utf8(out).expect("alphabet is ASCII")
}

fn raw_value(millis: u64, counter: u64) -> u128 {
    let counter = (counter as u128) & COUNTER_MASK;
    ((millis as u128) << COUNTER_BITS) | counter
}

/// Generate an ascending identifier with the given 4-character type prefix.
///
/// Panics if `prefix` is not exactly 4 ASCII characters — this is a
/// programmer error (a hard-coded constant at each call site), not a
/// runtime condition to recover from.
pub fn generate(prefix: &str) -> String {
    assert_eq!(prefix.len(), 4, "identifier prefix must be 4 characters");
    let value = raw_value(now_millis(), next_counter());
    format!("{prefix}_{}", encode_body(value))
}

/// Generate a descending identifier: the newest identifier sorts first
/// under lexicographic listing.
pub fn generate_desc(prefix: &str) -> String {
    assert_eq!(prefix.len(), 4, "identifier prefix must be 4 characters");
    let value = raw_value(now_millis(), next_counter());
    let inverted = MAX_BODY_VALUE - (value & MAX_BODY_VALUE);
    format!("{prefix}_{}", encode_body(inverted))
}

/// Type prefixes used throughout the core.
pub mod prefix {
    pub const SESSION: &str = "ses_";
    pub const MESSAGE: &str = "msg_";
    pub const PART: &str = "prt_";
    pub const PERMISSION: &str = "perm";
    pub const QUESTION: &str = "ques";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_has_expected_shape() {
        let id = generate(prefix::SESSION);
        assert_eq!(id.len(), 4 + 1 + BODY_CHARS);
        assert!(id.starts_with("ses_"));
    }

    #[test]
    fn ascending_ids_sort_in_creation_order() {
        let mut ids = Vec::new();
        for _ in 0..50 {
            ids.push(generate(prefix::MESSAGE));
        }
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted, "ascending ids must sort in creation order");
    }

    #[test]
    fn descending_ids_sort_newest_first() {
        let mut ids = Vec::new();
        for _ in 0..50 {
            ids.push(generate_desc(prefix::PART));
        }
        let mut sorted = ids.clone();
        sorted.sort();
        let mut reversed = ids.clone();
        reversed.reverse();
        assert_eq!(
            sorted, reversed,
            "descending ids sorted lexicographically must equal creation order reversed"
        );
    }

    #[test]
    fn distinct_calls_never_collide() {
        use std::collections::HashSet;
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(generate(prefix::SESSION)));
        }
    }

    #[test]
    #[should_panic]
    fn rejects_wrong_length_prefix() {
        generate("toolong");
    }

    #[test]
    fn body_alphabet_ascii_order_matches_value_order() {
        // The alphabet itself must already be in ascending ASCII order for
        // the lexicographic-equals-numeric guarantee to hold.
        let mut sorted = ALPHABET.to_vec();
        sorted.sort();
        assert_eq!(ALPHABET.to_vec(), sorted);
    }
}
