// src/exec/progress.rs

use std::sync::LazyLock;

use regex::Regex;

static PERCENT_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)%$").expect("progress pattern is a valid regex"));

/// Extract a percent-complete value from one completed stdout line.
///
/// Candidates are whitespace-delimited tokens of digits directly followed by
/// `%`, with at least one token before them. The right-most candidate in
/// 0..=100 wins, so `"Download [=====   ]  45%   12288 bytes"` gives 45 and
/// `"a 50% b 200% c"` gives 50.
pub fn extract_progress(line: &str) -> Option<u8> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens
        .iter()
        .skip(1)
        .rev()
        .filter_map(|token| PERCENT_TOKEN.captures(token))
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find(|value| *value <= 100)
        .and_then(|value| u8::try_from(value).ok())
}
