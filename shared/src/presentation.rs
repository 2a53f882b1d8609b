//! Pure mapping from an analysis to what a result card shows.

use serde::{Deserialize, Serialize};

use crate::model::{Condition, FruitAnalysis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Positive,
    Caution,
    Negative,
    Neutral,
}

impl From<Condition> for Severity {
    fn from(condition: Condition) -> Self {
        match condition {
            Condition::Ripe | Condition::Fresh | Condition::Good => Severity::Positive,
            Condition::Unripe => Severity::Caution,
            Condition::Spoiled | Condition::Bad => Severity::Negative,
            Condition::Unknown => Severity::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RipenessBand {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RipenessBar {
    /// Raw score as the model gave it, e.g. `"8/10"`.
    pub score_label: String,
    /// Fill in 0..=100.
    pub percent: f64,
    pub band: RipenessBand,
}

impl RipenessBar {
    pub fn new(score: f64) -> Self {
        let percent = ripeness_percent(score);
        let band = if percent > 75.0 {
            RipenessBand::High
        } else if percent > 40.0 {
            RipenessBand::Medium
        } else {
            RipenessBand::Low
        };

        Self {
            score_label: format!("{score}/10"),
            percent,
            band,
        }
    }
}

pub fn ripeness_percent(score: f64) -> f64 {
    if !score.is_finite() {
        return 0.0;
    }
    score.clamp(0.0, 10.0) * 10.0
}

/// Percentage with one decimal, rounding half away from zero: 0.8675 → "86.8%".
pub fn format_confidence(confidence: f64) -> String {
    if !confidence.is_finite() {
        return "0.0%".to_string();
    }
    // Scale to percent first so 0.8675 lands on 86.75 exactly before rounding.
    let percent = confidence * 100.0;
    let rounded = (percent * 10.0).round() / 10.0;
    format!("{rounded:.1}%")
}

pub fn capitalize_first(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCard {
    pub fruit_name: String,
    pub condition_label: String,
    pub severity: Severity,
    pub description: String,
    pub ripeness: RipenessBar,
    pub confidence_label: String,
}

impl From<&FruitAnalysis> for ResultCard {
    fn from(analysis: &FruitAnalysis) -> Self {
        Self {
            fruit_name: analysis.fruit_name.clone(),
            condition_label: capitalize_first(&analysis.condition),
            severity: analysis.condition_tag().into(),
            description: analysis.description.clone(),
            ripeness: RipenessBar::new(analysis.ripeness_score),
            confidence_label: format_confidence(analysis.confidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn banana() -> FruitAnalysis {
        FruitAnalysis {
            fruit_name: "Chuối".into(),
            condition: "chín".into(),
            confidence: 0.95,
            description: "Vỏ vàng đều, không có đốm nâu.".into(),
            ripeness_score: 8.0,
        }
    }

    #[test]
    fn banana_card() {
        let card = ResultCard::from(&banana());
        assert_eq!(card.fruit_name, "Chuối");
        assert_eq!(card.condition_label, "Chín");
        assert_eq!(card.severity, Severity::Positive);
        assert_eq!(card.ripeness.score_label, "8/10");
        assert!((card.ripeness.percent - 80.0).abs() < 1e-9);
        assert_eq!(card.ripeness.band, RipenessBand::High);
        assert_eq!(card.confidence_label, "95.0%");
    }

    #[test]
    fn ripeness_is_clamped() {
        assert!((ripeness_percent(-5.0)).abs() < 1e-9);
        assert!((ripeness_percent(15.0) - 100.0).abs() < 1e-9);
        assert!((ripeness_percent(f64::NAN)).abs() < 1e-9);
    }

    #[test]
    fn seven_is_medium() {
        let bar = RipenessBar::new(7.0);
        assert!((bar.percent - 70.0).abs() < 1e-9);
        assert_eq!(bar.band, RipenessBand::Medium);
        assert_eq!(bar.score_label, "7/10");
    }

    #[test]
    fn band_boundaries_are_exclusive() {
        assert_eq!(RipenessBar::new(7.5).band, RipenessBand::Medium);
        assert_eq!(RipenessBar::new(4.0).band, RipenessBand::Low);
        assert_eq!(RipenessBar::new(4.1).band, RipenessBand::Medium);
    }

    #[test]
    fn score_label_keeps_raw_value() {
        assert_eq!(RipenessBar::new(15.0).score_label, "15/10");
        assert_eq!(RipenessBar::new(6.5).score_label, "6.5/10");
    }

    #[test]
    fn confidence_formatting() {
        assert_eq!(format_confidence(0.8675), "86.8%");
        assert_eq!(format_confidence(1.0), "100.0%");
        assert_eq!(format_confidence(0.0), "0.0%");
    }

    #[test]
    fn severity_mapping() {
        let card = |condition: &str| {
            ResultCard::from(&FruitAnalysis {
                condition: condition.into(),
                ..banana()
            })
            .severity
        };
        assert_eq!(card("tươi"), Severity::Positive);
        assert_eq!(card("xanh"), Severity::Caution);
        assert_eq!(card("hỏng"), Severity::Negative);
        assert_eq!(card("xấu"), Severity::Negative);
        assert_eq!(card("không xác định"), Severity::Neutral);
        assert_eq!(card("weird"), Severity::Neutral);
    }

    #[test]
    fn capitalizes_unicode() {
        assert_eq!(capitalize_first("ổn định"), "Ổn định");
        assert_eq!(capitalize_first(""), "");
    }

    proptest! {
        #[test]
        fn percent_always_in_range(score in proptest::num::f64::ANY) {
            let percent = ripeness_percent(score);
            prop_assert!((0.0..=100.0).contains(&percent));
        }

        #[test]
        fn in_range_scores_scale_linearly(score in 0.0f64..=10.0) {
            prop_assert!((ripeness_percent(score) - score * 10.0).abs() < 1e-9);
        }
    }
}
