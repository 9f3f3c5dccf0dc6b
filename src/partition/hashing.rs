use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::ops::Range;

/// Worker responsible for `word` during the initial shuffle.
///
/// `DefaultHasher::new()` uses fixed keys, so every process running the same
/// binary agrees on the target.
pub fn word_target(word: &str, num_workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    word.hash(&mut hasher);
    (hasher.finish() % num_workers as u64) as usize
}

/// Cuts `text` into exactly `num_parts` contiguous byte ranges.
///
/// Every range is `len / num_parts` bytes except the last, which absorbs the
/// remainder. A cut landing inside a multi-byte character moves forward to the
/// next character boundary. Ranges may be empty.
pub fn split_ranges(text: &str, num_parts: usize) -> Vec<Range<usize>> {
    if num_parts == 0 {
        return Vec::new();
    }

    let total = text.len();
    let part_size = total / num_parts;

    let mut ranges = Vec::with_capacity(num_parts);
    let mut start = 0;
    for i in 0..num_parts {
        let end = if i == num_parts - 1 {
            total
        } else {
            ceil_char_boundary(text, (i + 1) * part_size).max(start)
        };
        ranges.push(start..end);
        start = end;
    }

    ranges
}

/// Slices of `text` for each range from [`split_ranges`].
pub fn split_document(text: &str, num_parts: usize) -> Vec<&str> {
    split_ranges(text, num_parts)
        .into_iter()
        .map(|range| &text[range])
        .collect()
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(index) {
        index += 1;
    }
    index
}
