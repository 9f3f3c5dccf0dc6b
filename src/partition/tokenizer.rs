use regex::Regex;
use std::sync::LazyLock;

static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W").expect("non-word pattern is valid"));

/// Lower-cases `token` and strips every non-word character.
pub fn normalize_token(token: &str) -> String {
    NON_WORD.replace_all(&token.to_lowercase(), "").into_owned()
}

/// Splits on whitespace and normalizes; tokens that end up empty are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(normalize_token)
        .filter(|word| !word.is_empty())
        .collect()
}
