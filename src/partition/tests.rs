//! Partition Module Tests
//!
//! ## Test Scopes
//! - **Tokenizer**: normalization and empty-token filtering.
//! - **Hashing**: determinism and range of the shuffle target.
//! - **Splitting**: contiguity, coverage and UTF-8 safety of document ranges.
//! - **Thresholds**: count, ordering, tie-break and totality of bucket routing.

#[cfg(test)]
mod tests {
    use crate::partition::hashing::{split_document, split_ranges, word_target};
    use crate::partition::thresholds::{bucket_for, compute_thresholds, min_max};
    use crate::partition::tokenizer::{normalize_token, tokenize};

    // ============================================================
    // TOKENIZER TESTS
    // ============================================================

    #[test]
    fn test_normalize_lowercases_and_strips_punctuation() {
        assert_eq!(normalize_token("Hello,"), "hello");
        assert_eq!(normalize_token("don't"), "dont");
        assert_eq!(normalize_token("snake_case"), "snake_case");
        assert_eq!(normalize_token("--"), "");
    }

    #[test]
    fn test_tokenize_drops_empty_tokens() {
        let words = tokenize("  The cat -- sat.\n\tOn THE mat!  ");
        assert_eq!(words, vec!["the", "cat", "sat", "on", "the", "mat"]);
    }

    #[test]
    fn test_tokenize_empty_text() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \n  ").is_empty());
    }

    // ============================================================
    // HASHING TESTS
    // ============================================================

    #[test]
    fn test_word_target_is_deterministic() {
        for n in 1..8 {
            let first = word_target("whale", n);
            for _ in 0..10 {
                assert_eq!(word_target("whale", n), first);
            }
        }
    }

    #[test]
    fn test_word_target_within_range() {
        for i in 0..1000 {
            let word = format!("word{}", i);
            assert!(word_target(&word, 7) < 7);
        }
        assert_eq!(word_target("anything", 1), 0);
    }

    #[test]
    fn test_word_target_spreads_words() {
        let mut hits = [0usize; 4];
        for i in 0..1000 {
            hits[word_target(&format!("w{}", i), 4)] += 1;
        }
        assert!(hits.iter().all(|&h| h > 0), "every worker should get words: {:?}", hits);
    }

    // ============================================================
    // SPLITTING TESTS
    // ============================================================

    #[test]
    fn test_split_example_into_three() {
        let parts = split_document("a a b c c c", 3);
        assert_eq!(parts, vec!["a a", " b ", "c c c"]);
    }

    #[test]
    fn test_split_ranges_are_contiguous_and_cover_text() {
        let text = "the quick brown fox jumps over the lazy dog";
        for n in 1..10 {
            let ranges = split_ranges(text, n);
            assert_eq!(ranges.len(), n);
            assert_eq!(ranges[0].start, 0);
            assert_eq!(ranges[n - 1].end, text.len());
            for pair in ranges.windows(2) {
                assert_eq!(pair[0].end, pair[1].start);
            }
        }
    }

    #[test]
    fn test_last_range_absorbs_remainder() {
        let ranges = split_ranges("abcdefghij", 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);
    }

    #[test]
    fn test_short_text_gives_empty_leading_parts() {
        let parts = split_document("ab", 4);
        assert_eq!(parts, vec!["", "", "", "ab"]);
    }

    #[test]
    fn test_split_respects_char_boundaries() {
        let text = "ééééé";
        let parts = split_document(text, 3);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts.concat(), text);
        for part in parts {
            assert!(part.chars().all(|c| c == 'é'));
        }
    }

    // ============================================================
    // THRESHOLD TESTS
    // ============================================================

    #[test]
    fn test_threshold_count_matches_workers() {
        for n in 1..12 {
            assert_eq!(compute_thresholds(1, 10_000, n).len(), n - 1);
        }
    }

    #[test]
    fn test_thresholds_are_non_decreasing() {
        for (min, max) in [(0, 1), (0, 3), (1, 1), (2, 50), (1, 1_000_000), (7, 7)] {
            for n in 2..10 {
                let thresholds = compute_thresholds(min, max, n);
                for pair in thresholds.windows(2) {
                    assert!(pair[0] <= pair[1], "{:?} for ({}, {}, {})", thresholds, min, max, n);
                }
            }
        }
    }

    #[test]
    fn test_thresholds_skew_toward_low_end() {
        let thresholds = compute_thresholds(1, 1_000_000, 4);

        // ratio_1 = 0.25^10, ratio_2 = 0.5^10, ratio_3 = 0.75^10
        assert_eq!(thresholds[0], 1);
        assert_eq!(thresholds[1], (0.5f64.powi(10) * 1_000_000f64.ln()).exp().round() as u64);
        assert!(thresholds[2] < 1_000_000 / 10);
    }

    #[test]
    fn test_thresholds_for_example_input() {
        assert_eq!(compute_thresholds(0, 3, 3), vec![1, 1]);
    }

    #[test]
    fn test_thresholds_with_no_words() {
        assert_eq!(compute_thresholds(0, 0, 3), vec![1, 1]);
    }

    #[test]
    fn test_single_worker_has_no_thresholds() {
        assert!(compute_thresholds(1, 100, 1).is_empty());
    }

    #[test]
    fn test_bucket_tie_stays_low() {
        let thresholds = [2, 5, 9];

        assert_eq!(bucket_for(1, &thresholds), 0);
        assert_eq!(bucket_for(2, &thresholds), 0);
        assert_eq!(bucket_for(3, &thresholds), 1);
        assert_eq!(bucket_for(5, &thresholds), 1);
        assert_eq!(bucket_for(9, &thresholds), 2);
        assert_eq!(bucket_for(10, &thresholds), 3);
    }

    #[test]
    fn test_bucket_routing_is_total() {
        for n in 1..8 {
            let thresholds = compute_thresholds(1, 500, n);
            for count in 0..600 {
                assert!(bucket_for(count, &thresholds) < n);
            }
        }
    }

    #[test]
    fn test_max_count_lands_in_last_bucket() {
        let thresholds = compute_thresholds(0, 3, 3);
        assert_eq!(bucket_for(3, &thresholds), 2);
    }

    #[test]
    fn test_min_max() {
        assert_eq!(min_max(vec![4, 1, 9, 3]), (1, 9));
        assert_eq!(min_max(vec![5]), (5, 5));
        assert_eq!(min_max(Vec::<u64>::new()), (0, 0));
    }
}
