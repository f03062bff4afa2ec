//! Rename suggestions for folders that break their siblings' naming convention.
//!
//! Two independent axes are voted on per sibling group:
//! - the case/separator convention of the name (snake_case, PascalCase, ...)
//! - whether names carry a numbered prefix (`01_intro`, `02 - setup`)
//!
//! A convention is dominant when a strict majority of siblings are compatible
//! with it. Confidence is `majority_count / total_siblings`.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

use crate::error::AnalysisError;
use crate::naming::{capitalize, split_words};
use crate::suggestion::{Analyzer, Suggestion, SuggestionKind};
use crate::tree::{DirTree, NodeId};

fn pattern(source: &str) -> Regex {
    Regex::new(source).expect("static naming pattern")
}

static SNAKE: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-z0-9]+(_[a-z0-9]+)*$"));
static KEBAB: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-z0-9]+(-[a-z0-9]+)*$"));
static PASCAL: LazyLock<Regex> = LazyLock::new(|| pattern(r"^([A-Z][a-z0-9]*)+$"));
static CAMEL: LazyLock<Regex> = LazyLock::new(|| pattern(r"^[a-z][a-z0-9]*([A-Z][a-z0-9]*)*$"));
static SPACED: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"^([A-Z]?[a-z0-9]+|[A-Z0-9]+)( ([A-Z]?[a-z0-9]+|[A-Z0-9]+))*$")
});
static NUMBERED: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(\d+)([ _.\-]+)(.+)$"));

/// Case and separator style of a folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Convention {
    SnakeCase,
    KebabCase,
    PascalCase,
    SpaceSeparated,
    CamelCase,
}

impl Convention {
    /// Tie-break order when two conventions are equally common.
    const ALL: [Convention; 5] = [
        Convention::SnakeCase,
        Convention::KebabCase,
        Convention::PascalCase,
        Convention::SpaceSeparated,
        Convention::CamelCase,
    ];

    pub fn matches(&self, name: &str) -> bool {
        match self {
            Convention::SnakeCase => SNAKE.is_match(name),
            Convention::KebabCase => KEBAB.is_match(name),
            Convention::PascalCase => PASCAL.is_match(name),
            Convention::SpaceSeparated => SPACED.is_match(name),
            Convention::CamelCase => CAMEL.is_match(name),
        }
    }

    /// Rewrites `name` in this convention. Word boundaries come from
    /// [`split_words`].
    pub fn apply(&self, name: &str) -> String {
        let words = split_words(name);
        match self {
            Convention::SnakeCase => join_lower(&words, "_"),
            Convention::KebabCase => join_lower(&words, "-"),
            Convention::PascalCase => words.iter().map(|w| capitalize(w)).collect(),
            Convention::SpaceSeparated => words
                .iter()
                .map(|w| {
                    if w.chars().all(|c| c.is_uppercase() || c.is_ascii_digit()) {
                        w.clone()
                    } else {
                        capitalize(w)
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            Convention::CamelCase => words
                .iter()
                .enumerate()
                .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
                .collect(),
        }
    }
}

impl fmt::Display for Convention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Convention::SnakeCase => "snake_case",
            Convention::KebabCase => "kebab-case",
            Convention::PascalCase => "PascalCase",
            Convention::SpaceSeparated => "space separated",
            Convention::CamelCase => "camelCase",
        })
    }
}

fn join_lower(words: &[String], sep: &str) -> String {
    words
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(sep)
}

/// A name split into its optional numbered prefix and the rest.
struct ParsedName<'a> {
    number: Option<(&'a str, &'a str)>,
    stem: &'a str,
}

fn parse(name: &str) -> ParsedName<'_> {
    match NUMBERED.captures(name) {
        Some(caps) => {
            let (digits, sep, stem) = (
                caps.get(1).map_or("", |m| m.as_str()),
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str()),
            );
            ParsedName {
                number: Some((digits, sep)),
                stem,
            }
        }
        None => ParsedName { number: None, stem: name },
    }
}

pub struct PatternDetector {
    min_siblings: usize,
}

impl PatternDetector {
    pub fn new(min_siblings: usize) -> Self {
        Self { min_siblings }
    }

    /// Dominant case convention over the sibling stems, with its support.
    fn dominant_convention(stems: &[&str]) -> Option<(Convention, usize)> {
        let total = stems.len();
        let mut best: Option<(Convention, usize)> = None;
        for convention in Convention::ALL {
            let count = stems.iter().filter(|s| convention.matches(s)).count();
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((convention, count));
            }
        }
        best.filter(|&(_, count)| count * 2 > total)
    }

    fn analyze_group(&self, tree: &DirTree, siblings: &[NodeId]) -> Vec<Suggestion> {
        let total = siblings.len();
        let parsed: Vec<ParsedName<'_>> = siblings.iter().map(|&id| parse(tree.name(id))).collect();
        let stems: Vec<&str> = parsed.iter().map(|p| p.stem).collect();

        let case_axis = Self::dominant_convention(&stems);

        // Numbered-prefix axis: most common width and separator, next free number.
        let numbered: Vec<(&str, &str)> = parsed.iter().filter_map(|p| p.number).collect();
        let numbering = if numbered.len() * 2 > total && numbered.len() < total {
            let mut widths: BTreeMap<usize, usize> = BTreeMap::new();
            let mut seps: BTreeMap<&str, usize> = BTreeMap::new();
            for (digits, sep) in &numbered {
                *widths.entry(digits.len()).or_default() += 1;
                *seps.entry(*sep).or_default() += 1;
            }
            let width = most_common(&widths).unwrap_or(2);
            let sep = most_common(&seps).unwrap_or("_");
            let next = numbered
                .iter()
                .filter_map(|(d, _)| d.parse::<u64>().ok())
                .max()
                .unwrap_or(0)
                .checked_add(1);
            match next {
                Some(next) => Some((width, sep.to_string(), next, numbered.len())),
                None => {
                    debug!("numbered prefixes already at the largest number");
                    None
                }
            }
        } else {
            None
        };

        if case_axis.is_none() && numbering.is_none() {
            return Vec::new();
        }

        let mut taken: HashSet<String> = siblings
            .iter()
            .map(|&id| tree.name(id).to_lowercase())
            .collect();
        let files: HashSet<String> = siblings
            .first()
            .and_then(|&id| tree.parent(id))
            .map(|parent| tree.files_in(parent).map(|f| f.name.to_lowercase()).collect())
            .unwrap_or_default();
        let mut next_number = numbering.as_ref().map(|n| n.2);
        let mut suggestions = Vec::new();

        for (idx, &id) in siblings.iter().enumerate() {
            let name = tree.name(id);
            let parts = &parsed[idx];
            let mut ratios: Vec<f64> = Vec::new();
            let mut reasons: Vec<String> = Vec::new();

            let mut stem = parts.stem.to_string();
            if let Some((convention, count)) = case_axis
                && !convention.matches(parts.stem)
            {
                let rewritten = convention.apply(parts.stem);
                if rewritten.is_empty() || !convention.matches(&rewritten) {
                    debug!(name, %convention, "cannot express name in sibling convention");
                    continue;
                }
                stem = rewritten;
                ratios.push(count as f64 / total as f64);
                reasons.push(format!("{} siblings use {}", count, convention));
            }

            let prefix = match (&numbering, parts.number) {
                (_, Some((digits, sep))) => format!("{}{}", digits, sep),
                (Some((width, sep, _, count)), None) => {
                    let Some(number) = next_number else {
                        debug!(name, "no free number left for prefix");
                        continue;
                    };
                    let assigned = format!("{:0width$}{}", number, sep, width = *width);
                    next_number = number.checked_add(1);
                    ratios.push(*count as f64 / total as f64);
                    reasons.push(format!("{} siblings carry a numbered prefix", count));
                    assigned
                }
                (None, None) => String::new(),
            };

            if ratios.is_empty() {
                continue;
            }
            let new_name = format!("{}{}", prefix, stem);
            if new_name == name {
                continue;
            }

            let parent_path = tree.path(id).parent().unwrap_or(tree.root_path());
            let key = new_name.to_lowercase();
            if files.contains(&key) || (!taken.insert(key.clone()) && key != name.to_lowercase()) {
                let err = AnalysisError::NameCollision {
                    kind: SuggestionKind::Rename,
                    target: parent_path.to_path_buf(),
                    name: new_name,
                };
                debug!("{}", err);
                continue;
            }

            let confidence = ratios.iter().copied().fold(1.0, f64::min);
            suggestions.push(Suggestion::new(
                SuggestionKind::Rename,
                vec![tree.path(id).to_path_buf()],
                parent_path.join(&new_name),
                confidence,
                format!(
                    "'{}' breaks the naming used by its {} siblings ({}); rename to '{}'",
                    name,
                    total,
                    reasons.join(", "),
                    new_name
                ),
            ));
        }

        suggestions
    }
}

fn most_common<K: Copy + Ord>(counts: &BTreeMap<K, usize>) -> Option<K> {
    let mut best: Option<(K, usize)> = None;
    for (&key, &count) in counts {
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(k, _)| k)
}

impl Analyzer for PatternDetector {
    fn name(&self) -> &'static str {
        "patterns"
    }

    fn analyze(&self, tree: &DirTree) -> Vec<Suggestion> {
        tree.ids()
            .into_iter()
            .filter(|&id| tree.children(id).len() >= self.min_siblings)
            .flat_map(|id| self.analyze_group(tree, tree.children(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::TreeBuilder;
    use chrono::Utc;
    use std::path::PathBuf;

    fn tree_with(names: &[&str]) -> DirTree {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        for name in names {
            b.add_dir(0, name, now, now);
        }
        b.build()
    }

    #[test]
    fn test_convention_matching() {
        assert!(Convention::SnakeCase.matches("tax_returns"));
        assert!(!Convention::SnakeCase.matches("TaxReturns"));
        assert!(Convention::PascalCase.matches("TaxReturns"));
        assert!(Convention::SpaceSeparated.matches("Tax Returns"));
        assert!(!Convention::SpaceSeparated.matches("TaxReturns"));
        assert!(Convention::CamelCase.matches("taxReturns"));
        assert!(Convention::KebabCase.matches("tax-returns"));
    }

    #[test]
    fn test_convention_apply() {
        assert_eq!(Convention::SnakeCase.apply("Tax Returns"), "tax_returns");
        assert_eq!(Convention::PascalCase.apply("tax-returns"), "TaxReturns");
        assert_eq!(Convention::SpaceSeparated.apply("tax_returns"), "Tax Returns");
        assert_eq!(Convention::CamelCase.apply("Tax Returns"), "taxReturns");
        assert_eq!(Convention::KebabCase.apply("TaxReturns"), "tax-returns");
    }

    #[test]
    fn test_snake_majority_renames_deviant() {
        let tree = tree_with(&["old_projects", "tax_returns", "Work Stuff", "home_videos"]);
        let suggestions = PatternDetector::new(3).analyze(&tree);
        assert_eq!(suggestions.len(), 1);
        let rename = &suggestions[0];
        assert_eq!(rename.sources, vec![PathBuf::from("/r/Work Stuff")]);
        assert_eq!(rename.target, PathBuf::from("/r/work_stuff"));
        assert!((rename.confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_small_groups_skipped() {
        let tree = tree_with(&["old_projects", "Work Stuff"]);
        assert!(PatternDetector::new(3).analyze(&tree).is_empty());
    }

    #[test]
    fn test_consistent_group_yields_nothing() {
        let tree = tree_with(&["music", "photos", "videos"]);
        assert!(PatternDetector::new(3).analyze(&tree).is_empty());
    }

    #[test]
    fn test_no_majority_yields_nothing() {
        let tree = tree_with(&["TaxReturns", "work_stuff", "my-music", "Old Photos"]);
        assert!(PatternDetector::new(3).analyze(&tree).is_empty());
    }

    #[test]
    fn test_numbered_prefix_assigned() {
        let tree = tree_with(&["01_intro", "02_setup", "03_usage", "appendix"]);
        let suggestions = PatternDetector::new(3).analyze(&tree);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].target, PathBuf::from("/r/04_appendix"));
        assert!((suggestions[0].confidence - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_largest_number_prefix_does_not_wrap() {
        let tree = tree_with(&["18446744073709551615_x", "02_setup", "03_usage", "appendix"]);
        let suggestions = PatternDetector::new(3).analyze(&tree);
        assert!(suggestions.is_empty());
    }

    #[test]
    fn test_rename_onto_existing_file_dropped() {
        let now = Utc::now();
        let mut b = TreeBuilder::new("/r", now, now);
        for name in ["old_projects", "tax_returns", "Work Stuff", "home_videos"] {
            b.add_dir(0, name, now, now);
        }
        b.add_file(0, "work_stuff", now);
        let tree = b.build();

        assert!(PatternDetector::new(3).analyze(&tree).is_empty());
    }

    #[test]
    fn test_collision_with_existing_sibling_dropped() {
        let tree = tree_with(&["work_stuff", "Work Stuff", "tax_returns", "home_videos"]);
        let suggestions = PatternDetector::new(3).analyze(&tree);
        assert!(suggestions.is_empty());
    }
}
