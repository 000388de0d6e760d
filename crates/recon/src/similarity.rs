//! Fuzzy string matching behind one small interface.
//!
//! Call sites only use [`Similarity::best_match`]; swapping the metric never
//! touches them. The cutoffs used across the engine (0.8 for column names,
//! 0.72 for codebook keys) are calibrated for the gestalt ratio.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Similarity {
    /// Ratcliff/Obershelp "gestalt pattern matching" ratio: 2·M / (|a| + |b|).
    #[default]
    Gestalt,
    /// 1 − edit distance / longer length.
    Levenshtein,
    JaroWinkler,
}

impl Similarity {
    /// Score in [0, 1]; 1 means identical.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        match self {
            Self::Gestalt => gestalt_ratio(a, b),
            Self::Levenshtein => strsim::normalized_levenshtein(a, b),
            Self::JaroWinkler => strsim::jaro_winkler(a, b),
        }
    }

    /// Best-scoring candidate at or above `cutoff`.
    ///
    /// Ties keep the earliest candidate, so the result follows input order.
    /// This differs from `difflib.get_close_matches`, which returns the
    /// lexicographically largest of the tied strings.
    pub fn best_match<'a, I>(&self, target: &str, candidates: I, cutoff: f64) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut best: Option<(&'a str, f64)> = None;
        for cand in candidates {
            let s = self.score(target, cand);
            if s < cutoff {
                continue;
            }
            if best.map_or(true, |(_, b)| s > b) {
                best = Some((cand, s));
            }
        }
        best.map(|(c, _)| c)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gestalt => "gestalt",
            Self::Levenshtein => "levenshtein",
            Self::JaroWinkler => "jaro_winkler",
        }
    }
}

impl fmt::Display for Similarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Similarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gestalt" => Ok(Self::Gestalt),
            "levenshtein" => Ok(Self::Levenshtein),
            "jaro_winkler" | "jaro-winkler" => Ok(Self::JaroWinkler),
            other => Err(format!(
                "unknown similarity '{other}' (expected gestalt, levenshtein or jaro_winkler)"
            )),
        }
    }
}

/// `best_match` with the default metric.
pub fn best_match<'a, I>(target: &str, candidates: I, cutoff: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    Similarity::default().best_match(target, candidates, cutoff)
}

// ---------------------------------------------------------------------------
// Gestalt ratio
// ---------------------------------------------------------------------------

pub fn gestalt_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Sum of matching block sizes: take the longest common block, recurse on both sides.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = pending.pop() {
        let (i, j, k) = longest_block(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            pending.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            pending.push((i + k, ahi, j + k, bhi));
        }
    }
    total
}

/// Longest common run in `a[alo..ahi]` × `b[blo..bhi]`, earliest in `a` then `b`.
fn longest_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    let width = bhi - blo + 1;
    let mut prev = vec![0usize; width];
    let mut cur = vec![0usize; width];
    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[slot - 1] + 1;
                cur[slot] = k;
                if k > best_k {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_k = k;
                }
            } else {
                cur[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    (best_i, best_j, best_k)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn gestalt_known_values() {
        assert!(close(gestalt_ratio("abcd", "bcde"), 0.75));
        assert!(close(gestalt_ratio("", ""), 1.0));
        assert!(close(gestalt_ratio("abc", ""), 0.0));
        assert!(close(gestalt_ratio("construct_name", "construct_name"), 1.0));
        // "construct" (9) vs "construct_name" (14): 2*9/23
        assert!(close(gestalt_ratio("construct", "construct_name"), 18.0 / 23.0));
    }

    #[test]
    fn gestalt_recurses_both_sides() {
        // blocks "ab" and "cd" around a differing middle char
        assert!(close(gestalt_ratio("abXcd", "abYcd"), 0.8));
    }

    #[test]
    fn best_match_respects_cutoff() {
        let cands = ["construct", "Construct Name", "construct_nam", "text"];
        assert_eq!(
            best_match("construct_name", cands.iter().copied(), 0.8),
            Some("construct_nam")
        );
        assert_eq!(best_match("zzz", cands.iter().copied(), 0.8), None);
    }

    #[test]
    fn best_match_tie_keeps_first() {
        let cands = ["abcx", "abcy"];
        assert_eq!(best_match("abc", cands.iter().copied(), 0.5), Some("abcx"));
    }

    #[test]
    fn alternate_metrics() {
        assert!(close(Similarity::Levenshtein.score("kitten", "kitten"), 1.0));
        assert!(Similarity::JaroWinkler.score("if header", "if headr") > 0.9);
        assert_eq!(
            Similarity::Levenshtein.best_match("comment", ["coment", "operator"], 0.8),
            Some("coment")
        );
    }

    #[test]
    fn parse_metric_names() {
        assert_eq!("gestalt".parse::<Similarity>(), Ok(Similarity::Gestalt));
        assert_eq!("jaro-winkler".parse::<Similarity>(), Ok(Similarity::JaroWinkler));
        assert!("cosine".parse::<Similarity>().is_err());
    }
}
