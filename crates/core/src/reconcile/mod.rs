//! Cross-system record reconciliation.
//!
//! Links records from a sales system and a tracking board that describe the
//! same commercial entity when no reliable shared key exists. Matching runs
//! a cascade of strategies in strictly descending confidence order and stops
//! at the first hit. Deal-level (secondary) names are checked before
//! account-level (primary) names on purpose: two engagements under the same
//! parent account must be able to resolve to different target records.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::facts::decimal_to_f64;

/// Legal and trade suffixes stripped during name normalization.
const NAME_SUFFIXES: &[&str] = &[
    ", inc.", ", inc", " inc.", " inc", ", llc", " llc", ", ltd", " ltd",
    " corporation", " corp.", " corp", " company", " co.", ", city of", " city of",
    ", town of", " town of", " department", " dept", " utilities", " utility",
    " water district", " water division", " water works", " waterworks",
    " water & sewer", " water and sewer", " renewal", " license",
];

/// Generic business words that carry no identity on their own.
const STOPWORDS: &[&str] = &[
    "water", "city", "county", "services", "company", "district", "department",
    "utility", "utilities", "authority", "municipal", "town", "village",
];

/// Names shorter than this never participate in substring matching.
const CONTAINS_MIN_NAME_LEN: usize = 3;
/// Minimum token length for the word-overlap strategy.
const OVERLAP_MIN_TOKEN_LEN: usize = 3;
/// Overlapping tokens required for a word-overlap match.
const OVERLAP_MIN_TOKENS: usize = 2;
/// Minimum token length for the single-word strategy.
const SINGLE_WORD_MIN_TOKEN_LEN: usize = 4;

/// One record from the source system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Stable shared identifier, when the source system carries one.
    #[serde(default)]
    pub id: Option<String>,
    /// Account-level name.
    pub name: String,
    /// Deal- or engagement-level name, more specific than the account name.
    #[serde(default)]
    pub secondary_name: Option<String>,
    #[serde(default)]
    pub value: Option<Decimal>,
}

/// One record from the target system.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub value: Option<Decimal>,
}

/// Match strategies, declared in descending confidence order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactId,
    ExactName,
    Contains,
    WordOverlap,
    SingleWord,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub source_id: Option<String>,
    pub source_name: String,
    pub matched_target_id: Option<String>,
    pub match_type: MatchType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TargetEntry {
    pub id: String,
    pub name: String,
    pub normalized_name: String,
    pub value: Option<Decimal>,
}

/// Prebuilt lookup structure over the target record set.
#[derive(Clone, Debug, Default)]
pub struct TargetIndex {
    by_id: HashMap<String, usize>,
    by_lower_name: HashMap<String, usize>,
    entries: Vec<TargetEntry>,
}

impl TargetIndex {
    pub fn build(records: Vec<TargetRecord>) -> Self {
        let mut index = Self::default();
        for record in records {
            let position = index.entries.len();
            index.by_id.entry(record.id.clone()).or_insert(position);
            index
                .by_lower_name
                .entry(record.name.to_lowercase())
                .or_insert(position);
            index.entries.push(TargetEntry {
                normalized_name: normalize_name(&record.name),
                id: record.id,
                name: record.name,
                value: record.value,
            });
        }
        index
    }

    pub fn entries(&self) -> &[TargetEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, position: usize) -> &TargetEntry {
        &self.entries[position]
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconcilerSettings {
    /// Matched pairs whose values differ by more than this percentage are
    /// reported as mismatches.
    pub value_tolerance_pct: f64,
    /// Dataset-specific stopwords merged with the built-in list.
    pub extra_stopwords: Vec<String>,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self { value_tolerance_pct: 5.0, extra_stopwords: Vec::new() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct FuzzyReconciler {
    settings: ReconcilerSettings,
}

impl FuzzyReconciler {
    pub fn new(settings: ReconcilerSettings) -> Self {
        Self { settings }
    }

    /// Match one source record against the target index. Returns the first
    /// hit in confidence order; `MatchType::None` is a normal terminal
    /// outcome, not an error.
    pub fn match_source(&self, source: &SourceRecord, index: &TargetIndex) -> MatchResult {
        let result = |target: Option<&TargetEntry>, match_type: MatchType| MatchResult {
            source_id: source.id.clone(),
            source_name: source.name.clone(),
            matched_target_id: target.map(|entry| entry.id.clone()),
            match_type,
        };

        if let Some(id) = &source.id {
            if let Some(position) = index.by_id.get(id) {
                return result(Some(index.entry(*position)), MatchType::ExactId);
            }
        }

        let secondary = source.secondary_name.as_deref();
        let primary = source.name.as_str();

        // Deal-level name first, at both confidence levels, before falling
        // back to the account-level name.
        for name in secondary.iter().copied().chain(std::iter::once(primary)) {
            if let Some(entry) = exact_name_match(name, index) {
                return result(Some(entry), MatchType::ExactName);
            }
            if let Some(entry) = contains_match(name, index) {
                return result(Some(entry), MatchType::Contains);
            }
        }

        for name in secondary.iter().copied().chain(std::iter::once(primary)) {
            if let Some(entry) = word_overlap_match(name, index) {
                return result(Some(entry), MatchType::WordOverlap);
            }
        }

        for name in secondary.iter().copied().chain(std::iter::once(primary)) {
            if let Some(entry) = self.single_word_match(name, index) {
                return result(Some(entry), MatchType::SingleWord);
            }
        }

        result(None, MatchType::None)
    }

    /// Reconcile a whole source batch and account for both sides. The set of
    /// claimed targets is an explicit accumulator local to this call; the
    /// reconciler itself holds no mutable state between runs.
    pub fn reconcile_batch(
        &self,
        sources: &[SourceRecord],
        index: &TargetIndex,
    ) -> ReconciliationReport {
        let mut matched = Vec::new();
        let mut unmatched_sources = Vec::new();
        let mut claimed_targets: HashSet<String> = HashSet::new();

        for source in sources {
            let outcome = self.match_source(source, index);
            match &outcome.matched_target_id {
                Some(target_id) => {
                    let entry_position = index.by_id[target_id];
                    let entry = index.entry(entry_position);
                    claimed_targets.insert(target_id.clone());
                    matched.push(MatchedPair {
                        source_id: source.id.clone(),
                        source_name: source.name.clone(),
                        target_id: entry.id.clone(),
                        target_name: entry.name.clone(),
                        source_value: source.value,
                        target_value: entry.value,
                        match_type: outcome.match_type,
                    });
                }
                None => unmatched_sources.push(UnmatchedSource {
                    source_id: source.id.clone(),
                    name: source.name.clone(),
                    value: source.value,
                }),
            }
        }

        let unmatched_targets = index
            .entries()
            .iter()
            .filter(|entry| !claimed_targets.contains(&entry.id))
            .map(|entry| UnmatchedTarget {
                target_id: entry.id.clone(),
                name: entry.name.clone(),
                value: entry.value,
            })
            .collect();

        let source_total: Decimal =
            sources.iter().filter_map(|source| source.value).sum();
        let target_total: Decimal =
            index.entries().iter().filter_map(|entry| entry.value).sum();

        let value_mismatches = matched
            .iter()
            .filter_map(|pair| self.value_mismatch(pair))
            .collect();

        ReconciliationReport {
            matched,
            unmatched_sources,
            unmatched_targets,
            source_total,
            target_total,
            value_mismatches,
        }
    }

    fn value_mismatch(&self, pair: &MatchedPair) -> Option<ValueMismatch> {
        let source_value = pair.source_value?;
        let target_value = pair.target_value?;
        if source_value <= Decimal::ZERO || target_value <= Decimal::ZERO {
            return None;
        }
        let source = decimal_to_f64(source_value);
        let target = decimal_to_f64(target_value);
        let difference_pct = (source - target).abs() / source.max(target) * 100.0;
        (difference_pct > self.settings.value_tolerance_pct).then(|| ValueMismatch {
            name: pair.source_name.clone(),
            source_value,
            target_value,
            difference_pct,
        })
    }

    fn single_word_match<'index>(
        &self,
        name: &str,
        index: &'index TargetIndex,
    ) -> Option<&'index TargetEntry> {
        let source_tokens = self.significant_tokens(name);
        if source_tokens.is_empty() {
            return None;
        }
        index.entries().iter().find(|entry| {
            let target_tokens = self.significant_tokens(&entry.name);
            source_tokens.iter().any(|token| target_tokens.contains(token))
        })
    }

    fn significant_tokens(&self, name: &str) -> Vec<String> {
        tokenize(name)
            .into_iter()
            .filter(|token| token.len() >= SINGLE_WORD_MIN_TOKEN_LEN)
            .filter(|token| !STOPWORDS.contains(&token.as_str()))
            .filter(|token| {
                !self.settings.extra_stopwords.iter().any(|stop| stop == token)
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchedPair {
    pub source_id: Option<String>,
    pub source_name: String,
    pub target_id: String,
    pub target_name: String,
    pub source_value: Option<Decimal>,
    pub target_value: Option<Decimal>,
    pub match_type: MatchType,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedSource {
    pub source_id: Option<String>,
    pub name: String,
    pub value: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedTarget {
    pub target_id: String,
    pub name: String,
    pub value: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValueMismatch {
    pub name: String,
    pub source_value: Decimal,
    pub target_value: Decimal,
    pub difference_pct: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub matched: Vec<MatchedPair>,
    pub unmatched_sources: Vec<UnmatchedSource>,
    pub unmatched_targets: Vec<UnmatchedTarget>,
    pub source_total: Decimal,
    pub target_total: Decimal,
    pub value_mismatches: Vec<ValueMismatch>,
}

fn exact_name_match<'index>(name: &str, index: &'index TargetIndex) -> Option<&'index TargetEntry> {
    let lowered = name.to_lowercase();
    if let Some(position) = index.by_lower_name.get(&lowered) {
        return Some(index.entry(*position));
    }
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return None;
    }
    index.entries().iter().find(|entry| entry.normalized_name == normalized)
}

fn contains_match<'index>(name: &str, index: &'index TargetIndex) -> Option<&'index TargetEntry> {
    let lowered = name.to_lowercase();
    if lowered.len() < CONTAINS_MIN_NAME_LEN {
        return None;
    }
    index.entries().iter().find(|entry| {
        let target = entry.name.to_lowercase();
        target.contains(&lowered) || lowered.contains(&target)
    })
}

fn word_overlap_match<'index>(name: &str, index: &'index TargetIndex) -> Option<&'index TargetEntry> {
    let source_tokens = overlap_tokens(name);
    if source_tokens.len() < OVERLAP_MIN_TOKENS {
        return None;
    }
    index.entries().iter().find(|entry| {
        let target_tokens = overlap_tokens(&entry.name);
        let overlapping = source_tokens
            .iter()
            .filter(|source_token| {
                target_tokens.iter().any(|target_token| {
                    source_token.contains(target_token.as_str())
                        || target_token.contains(source_token.as_str())
                })
            })
            .count();
        overlapping >= OVERLAP_MIN_TOKENS
    })
}

fn overlap_tokens(name: &str) -> Vec<String> {
    tokenize(name)
        .into_iter()
        .filter(|token| token.len() >= OVERLAP_MIN_TOKEN_LEN)
        .collect()
}

fn tokenize(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric()).to_owned())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Canonical form of a company name for matching: lowercased, legal suffixes
/// removed, trailing parenthesized or bracketed qualifiers dropped,
/// whitespace collapsed.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();
    for suffix in NAME_SUFFIXES {
        normalized = normalized.replace(suffix, "");
    }
    normalized = strip_trailing_group(&normalized, '(', ')');
    normalized = strip_trailing_group(&normalized, '[', ']');
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Remove a `open ... close` group sitting at the end of the string.
fn strip_trailing_group(value: &str, open: char, close: char) -> String {
    let trimmed = value.trim_end();
    if !trimmed.ends_with(close) {
        return value.to_owned();
    }
    match trimmed.rfind(open) {
        Some(start) => trimmed[..start].trim_end().to_owned(),
        None => value.to_owned(),
    }
}
