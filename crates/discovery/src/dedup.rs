//! Canonical name+city keys for recognizing the same business across searches.
//!
//! Keys are persisted alongside leads and compared against results found months
//! later, so the normalization must never change meaning between releases. Case
//! folding uses Unicode lowercase, which doesn't depend on the process locale.

/// Joins the normalized name and city.
pub const DEDUP_SEPARATOR: &str = "::";

/// Apostrophe variants the place source emits interchangeably.
const APOSTROPHES: [char; 5] = ['\'', '\u{2019}', '\u{2018}', '\u{02BC}', '`'];

/// Punctuation that separates words the same way a space does.
const SEPARATORS: [char; 10] = [',', ';', ':', '!', '?', '"', '(', ')', '\u{201C}', '\u{201D}'];

/// Abbreviations expanded when they make up a whole word (with or without the
/// trailing period).
const ABBREVIATIONS: [(&str, &str); 5] = [
    ("st", "street"),
    ("rd", "road"),
    ("ave", "avenue"),
    ("hwy", "highway"),
    ("&", "and"),
];

pub fn dedup_key(name: &str, city: &str) -> String {
    format!(
        "{}{DEDUP_SEPARATOR}{}",
        normalize_name(name),
        normalize_city(city)
    )
}

/// Lowercased words with apostrophes removed, separators split on and
/// trailing periods dropped. Empty words are skipped.
fn words(text: &str) -> Vec<String> {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !APOSTROPHES.contains(c))
        .map(|c| if SEPARATORS.contains(&c) { ' ' } else { c })
        .collect();
    lowered
        .split_whitespace()
        .map(|word| word.trim_end_matches('.'))
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn normalize_name(name: &str) -> String {
    words(name)
        .into_iter()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(abbr, _)| *abbr == word)
                .map(|(_, full)| full.to_string())
                .unwrap_or(word)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn normalize_city(city: &str) -> String {
    words(city).join(" ")
}
