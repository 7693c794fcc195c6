//! Post-processing of the comma-separated lists the model returns.

use crate::stage::prompt::{INSUFFICIENT_DIAGNOSIS, INSUFFICIENT_SOLUTIONS};

/// Upper-case the first letter of each space-separated word and lower-case
/// the rest. Spacing is kept as given; only `' '` separates words.
pub fn proper_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split raw model text on commas into proper-cased labels.
///
/// Order is preserved, empty tokens are dropped, duplicates are kept.
pub fn parse_label_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|token| proper_case(token.trim()))
        .filter(|label| !label.is_empty())
        .collect()
}

/// Join labels the way the response prompt and the wire format expect.
pub fn join_labels(labels: &[String]) -> String {
    labels.join(", ")
}

/// Whether the model answered with one of its "insufficient information"
/// sentinels. Such text is a valid result, not an error.
pub fn is_insufficient_information(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.eq_ignore_ascii_case(INSUFFICIENT_DIAGNOSIS)
        || trimmed.eq_ignore_ascii_case(INSUFFICIENT_SOLUTIONS)
        || trimmed
            .to_lowercase()
            .starts_with("insufficient information to")
}
