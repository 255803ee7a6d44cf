//! # Fuzzy Matching
//!
//! Case-insensitive subsequence matching that tolerates one adjacent
//! transposition per step: after each hit, the character just before the
//! hit stays available for the next query character.

/// True when `query` fuzzily matches `text`; an empty query matches anything
pub fn fuzzy_match(text: &str, query: &str) -> bool {
    let mut remaining: Vec<char> = text.to_lowercase().chars().collect();

    for wanted in query.to_lowercase().chars() {
        let Some(index) = remaining.iter().position(|&c| c == wanted) else {
            return false;
        };
        let mut next = Vec::with_capacity(remaining.len() - index);
        if index > 0 {
            next.push(remaining[index - 1]);
        }
        next.extend_from_slice(&remaining[index + 1..]);
        remaining = next;
    }
    true
}
