//! Name tokenization and string similarity shared by the analyzers.

use std::collections::BTreeSet;

/// Splits a folder name into lowercase words.
///
/// Boundaries are any non-alphanumeric character, a lower-to-upper case
/// change (`camelCase`), the end of an acronym (`PDFFiles` -> `pdf`, `files`)
/// and letter/digit changes (`Photos2021` -> `photos`, `2021`).
pub fn tokenize(name: &str) -> Vec<String> {
    split_words(name)
        .into_iter()
        .map(|w| w.to_lowercase())
        .collect()
}

/// Like [`tokenize`] but keeps the original casing of every word.
pub fn split_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if let Some(prev) = current.chars().last() {
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_alphabetic() != c.is_alphabetic())
                || (prev.is_uppercase()
                    && c.is_uppercase()
                    && next.is_some_and(|n| n.is_lowercase()));
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Lowercase form with every separator removed, used for edit distance so that
/// `Photos_2021` and `Photos2021` compare equal.
pub fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Minimum number of single-character edits turning `a` into `b`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for i in 1..=a.len() {
        current[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

/// `1 - distance / max_len` over the normalized names, in [0, 1].
pub fn edit_ratio(a: &str, b: &str) -> f64 {
    let (a, b) = (normalize(a), normalize(b));
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Jaccard index of the two names' token sets, in [0, 1].
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let a: BTreeSet<String> = tokenize(a).into_iter().collect();
    let b: BTreeSet<String> = tokenize(b).into_iter().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let shared = a.intersection(&b).count();
    let union = a.union(&b).count();
    shared as f64 / union as f64
}

/// Blended name similarity: 70% normalized edit ratio, 30% token overlap.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    (0.7 * edit_ratio(a, b) + 0.3 * token_jaccard(a, b)).clamp(0.0, 1.0)
}

/// Tokens that carry meaning for relatedness: at least `min_len` characters
/// and not purely numeric.
pub fn significant_tokens(name: &str, min_len: usize) -> BTreeSet<String> {
    tokenize(name)
        .into_iter()
        .filter(|t| t.chars().count() >= min_len && !t.chars().all(|c| c.is_ascii_digit()))
        .collect()
}

/// Uppercases the first character and lowercases the rest.
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
