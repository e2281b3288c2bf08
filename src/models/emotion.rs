//! Emotion score mappings returned by the analysis service.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category name -> non-negative score. Names are lower-cased on insert and
/// iteration is in lexical order, which fixes both the tie-break and the
/// neutral-override scan order of the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmotionScores(BTreeMap<String, f64>);

impl EmotionScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a score, returning `false` (and leaving the map untouched) for
    /// negative or non-finite values.
    pub fn insert(&mut self, category: &str, score: f64) -> bool {
        if !score.is_finite() || score < 0.0 {
            return false;
        }
        self.0.insert(category.trim().to_lowercase(), score);
        true
    }

    pub fn get(&self, category: &str) -> Option<f64> {
        self.0.get(category).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(name, score)| (name.as_str(), *score))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Builds scores from an aggregate response body. Accepts a flat object of
    /// numbers, or one nested under `emotions` / `aggregate`.
    pub fn from_json(value: &Value) -> Self {
        let object = match value {
            Value::Object(map) => map,
            _ => return Self::new(),
        };

        for key in ["emotions", "aggregate"] {
            if let Some(nested @ Value::Object(_)) = object.get(key) {
                return Self::from_json(nested);
            }
        }

        let mut scores = Self::new();
        for (name, raw) in object {
            if let Some(score) = raw.as_f64() {
                scores.insert(name, score);
            }
        }
        scores
    }

    /// Per-category mean. A category missing from one mapping counts as zero
    /// for that mapping.
    pub fn mean<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = &'a EmotionScores>,
    {
        let mut totals: BTreeMap<String, f64> = BTreeMap::new();
        let mut count = 0usize;

        for sample in samples {
            count += 1;
            for (name, score) in sample.iter() {
                *totals.entry(name.to_string()).or_insert(0.0) += score;
            }
        }

        if count == 0 {
            return Self::new();
        }

        Self(
            totals
                .into_iter()
                .map(|(name, total)| (name, total / count as f64))
                .collect(),
        )
    }
}

impl<'a> FromIterator<(&'a str, f64)> for EmotionScores {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        let mut scores = Self::new();
        for (name, score) in iter {
            scores.insert(name, score);
        }
        scores
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn insert_rejects_negative_and_non_finite() {
        let mut scores = EmotionScores::new();
        assert!(!scores.insert("happy", -0.1));
        assert!(!scores.insert("happy", f64::NAN));
        assert!(!scores.insert("happy", f64::INFINITY));
        assert!(scores.is_empty());
        assert!(scores.insert("Happy ", 0.4));
        assert_eq!(scores.get("happy"), Some(0.4));
    }

    #[test]
    fn parses_flat_and_nested_bodies() {
        let flat = EmotionScores::from_json(&json!({"Happy": 0.7, "sad": 0.1, "video_id": "abc"}));
        assert_eq!(flat.len(), 2);
        assert_eq!(flat.get("happy"), Some(0.7));

        let nested = EmotionScores::from_json(&json!({"emotions": {"neutral": 0.5}}));
        assert_eq!(nested.get("neutral"), Some(0.5));

        assert!(EmotionScores::from_json(&json!(null)).is_empty());
        assert!(EmotionScores::from_json(&json!([0.1, 0.2])).is_empty());
    }

    #[test]
    fn mean_fills_missing_categories_with_zero() {
        let a: EmotionScores = [("happy", 0.6), ("sad", 0.1)].into_iter().collect();
        let b: EmotionScores = [("happy", 0.4), ("sad", 0.3), ("fear", 0.2)]
            .into_iter()
            .collect();

        let mean = EmotionScores::mean([&a, &b]);
        assert!(approx(mean.get("happy").unwrap_or_default(), 0.5));
        assert!(approx(mean.get("sad").unwrap_or_default(), 0.2));
        assert!(approx(mean.get("fear").unwrap_or_default(), 0.1));
    }

    #[test]
    fn mean_of_nothing_is_empty() {
        assert!(EmotionScores::mean(std::iter::empty()).is_empty());
    }
}
