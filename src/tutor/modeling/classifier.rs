use serde::{Deserialize, Serialize};

use crate::tutor::config::ClassifierParams;
use crate::tutor::types::{ResponsePattern, StudentProfile};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub pattern: ResponsePattern,
    pub confidence: f64,
}

pub fn pattern_confidence(pattern: ResponsePattern) -> f64 {
    match pattern {
        ResponsePattern::QuickCorrect => 0.95,
        ResponsePattern::CompletelyLost => 0.90,
        ResponsePattern::SlowCorrect => 0.85,
        ResponsePattern::ComputationalError => 0.80,
        ResponsePattern::MethodError => 0.75,
        ResponsePattern::HesitantCorrect => 0.70,
        ResponsePattern::PseudoActivity => 0.10,
    }
}

/// Categorizes a single answer event. Stateless: identical inputs always
/// produce the identical classification.
pub struct ResponseClassifier {
    params: ClassifierParams,
}

impl ResponseClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self { params }
    }

    pub fn quick_threshold(&self, profile: &StudentProfile) -> f64 {
        (self.params.quick_ratio * profile.average_response_time)
            .max(self.params.min_quick_threshold_ms)
    }

    pub fn slow_threshold(&self, profile: &StudentProfile) -> f64 {
        self.params.slow_ratio * profile.average_response_time
    }

    pub fn classify(
        &self,
        user_answer: &str,
        expected_answer: &str,
        response_time_ms: f64,
        is_correct: bool,
        profile: &StudentProfile,
    ) -> Classification {
        let pattern =
            self.classify_pattern(user_answer, expected_answer, response_time_ms, is_correct, profile);
        Classification {
            pattern,
            confidence: pattern_confidence(pattern),
        }
    }

    fn classify_pattern(
        &self,
        user_answer: &str,
        expected_answer: &str,
        response_time_ms: f64,
        is_correct: bool,
        profile: &StudentProfile,
    ) -> ResponsePattern {
        let answer = user_answer.trim().to_lowercase();
        let quick = self.quick_threshold(profile);
        let slow = self.slow_threshold(profile);

        if self.is_pseudo_activity(&answer, response_time_ms, quick) {
            return ResponsePattern::PseudoActivity;
        }

        if is_correct {
            if response_time_ms < quick {
                return ResponsePattern::QuickCorrect;
            }
            if response_time_ms > slow {
                return ResponsePattern::SlowCorrect;
            }
            if contains_any(&answer, &self.params.hesitation_markers) {
                return ResponsePattern::HesitantCorrect;
            }
            return ResponsePattern::QuickCorrect;
        }

        if contains_any(&answer, &self.params.lost_markers) {
            return ResponsePattern::CompletelyLost;
        }

        match (extract_number(&answer), extract_number(expected_answer)) {
            (Some(user), Some(expected)) => {
                let error_pct = percent_error(user, expected);
                // the 15-50% band has no category of its own
                if error_pct < self.params.computational_error_pct {
                    ResponsePattern::ComputationalError
                } else {
                    ResponsePattern::MethodError
                }
            }
            _ => ResponsePattern::MethodError,
        }
    }

    fn is_pseudo_activity(&self, answer: &str, response_time_ms: f64, quick: f64) -> bool {
        let len = answer.chars().count();
        if len < self.params.short_answer_len
            && response_time_ms < self.params.short_answer_fraction * quick
        {
            return true;
        }

        let single_digit = len == 1 && answer.chars().all(|c| c.is_ascii_digit());
        if single_digit && response_time_ms < self.params.single_digit_ms {
            return true;
        }

        // An explicit "I don't know" is an honest signal and is classified as lost.
        let is_lost_marker = self.params.lost_markers.iter().any(|m| m == answer);
        !is_lost_marker
            && self.params.give_up_tokens.iter().any(|t| t == answer)
            && response_time_ms < self.params.give_up_fraction * quick
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(ClassifierParams::default())
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}

fn percent_error(user: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-9 {
        return if user.abs() < 1e-9 { 0.0 } else { 100.0 };
    }
    (user - expected).abs() / expected.abs() * 100.0
}

/// Extracts the first number in `text`, accepting a leading sign and either
/// `.` or `,` as the decimal separator.
pub fn extract_number(text: &str) -> Option<f64> {
    let chars: Vec<char> = text.trim().chars().collect();
    let start = chars.iter().position(|c| c.is_ascii_digit())?;

    let negative = start > 0 && chars[start - 1] == '-';
    let mut buf = String::new();
    if negative {
        buf.push('-');
    }

    let mut seen_separator = false;
    let mut i = start;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            buf.push(c);
        } else if (c == '.' || c == ',')
            && !seen_separator
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit())
        {
            seen_separator = true;
            buf.push('.');
        } else {
            break;
        }
        i += 1;
    }

    buf.parse::<f64>().ok()
}
