//! Study records and fuzzy name matching.
//!
//! The resolver scores each candidate's patient name against a free-text
//! query with a normalized Levenshtein similarity and returns the best
//! matches above a threshold. Positional references ("the second one",
//! "3rd", "두 번째") are resolved against the visible page elsewhere, so the
//! resolver returns nothing for them.

use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Threshold/limit pairs used by the two prompt strategies.
pub const STRICT: ResolveOptions = ResolveOptions {
    threshold: 0.5,
    limit: 5,
};
pub const RELAXED: ResolveOptions = ResolveOptions {
    threshold: 0.4,
    limit: 10,
};

// An ordinal only counts when it points at a row ("second study", "the
// 3rd"); "last week" and "April 8th" are left to name matching.
static ORDINAL_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    let ordinal = r"(?:first|second|third|fourth|fifth|sixth|seventh|eighth|ninth|tenth|last|\d+\s*(?:st|nd|rd|th))";
    Regex::new(&format!(
        r"(?ix)
        \b{ordinal}\s+(?:one|ones|study|studies|exam|scan|case|row|entry|item|result)\b
        | \bthe\s+{ordinal}\s*[.!?]?\s*$
        | \b(?:study|exam|row|item)\s+(?:number|no\.|\#)\s*\d+\b
        | \b(?:number|index)\s*\d+\b
        | (?:첫|두|세|네|다섯|여섯|일곱|여덟|아홉|열|\d+)\s*번\s*째
        "
    ))
    .ok()
});

/// A study as far as this engine is concerned. The data layer owns the
/// full record; only the identifier and display name matter here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Study {
    pub study_instance_uid: String,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Study {
    pub fn new(uid: impl Into<String>, patient_name: impl Into<String>) -> Self {
        Self {
            study_instance_uid: uid.into(),
            patient_name: patient_name.into(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolveOptions {
    /// Minimum similarity (inclusive) for a candidate to be kept.
    pub threshold: f64,
    /// Maximum number of matches returned.
    pub limit: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        STRICT
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    pub study: &'a Study,
    pub score: f64,
}

/// Edit distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    // Single rolling row: prev[j] is the distance between a[..i] and b[..j].
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// `1 - distance / max_len`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(a, b) as f64 / max_len as f64
}

/// Whether the query refers to a study by position rather than by name.
pub fn is_ordinal_query(query: &str) -> bool {
    ORDINAL_PATTERN
        .as_ref()
        .is_some_and(|re| re.is_match(query))
}

/// Rank `candidates` by similarity to `query` using the strict options.
pub fn resolve<'a>(query: &str, candidates: &'a [Study]) -> Vec<Match<'a>> {
    resolve_with(query, candidates, &STRICT)
}

/// Rank `candidates` by patient-name similarity to `query`, most similar
/// first. Ties keep the input order.
pub fn resolve_with<'a>(
    query: &str,
    candidates: &'a [Study],
    options: &ResolveOptions,
) -> Vec<Match<'a>> {
    if is_ordinal_query(query) {
        return Vec::new();
    }

    let query = query.trim().to_lowercase();
    let mut scored: Vec<Match<'a>> = candidates
        .iter()
        .map(|study| Match {
            study,
            score: similarity(&query, &study.patient_name.to_lowercase()),
        })
        .filter(|m| m.score >= options.threshold)
        .collect();

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(options.limit);
    scored
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CatalogInner {
    known: Vec<Study>,
    visible: Vec<Study>,
}

/// Shared snapshot of the studies the host has told us about: every known
/// study (for name matching) and the page currently on screen (for
/// positional references).
#[derive(Debug, Clone, Default)]
pub struct StudyCatalog {
    inner: Arc<RwLock<CatalogInner>>,
}

impl StudyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, known: Vec<Study>, visible: Vec<Study>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.known = known;
        inner.visible = visible;
    }

    pub fn set_visible(&self, visible: Vec<Study>) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        inner.visible = visible;
    }

    pub fn known(&self) -> Vec<Study> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .known
            .clone()
    }

    pub fn visible(&self) -> Vec<Study> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .visible
            .clone()
    }
}
