use serde::{Deserialize, Serialize};

pub const SUMMARY_MIN_CHARS: usize = 50;
pub const SUMMARY_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryMethod {
    Llm,
    RuleBased,
}

/// The one-sentence per-file summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    pub text: String,
    pub method: SummaryMethod,
    pub model_used: Option<String>,
    pub duration_ms: u64,
}

impl FileSummary {
    pub fn rule_based(text: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            text: normalize_summary(&text.into()),
            method: SummaryMethod::RuleBased,
            model_used: None,
            duration_ms,
        }
    }

    pub fn llm(text: impl Into<String>, model: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            text: normalize_summary(&text.into()),
            method: SummaryMethod::Llm,
            model_used: Some(model.into()),
            duration_ms,
        }
    }
}

/// Post-process a raw summary: begins with "This file", ends with a
/// period, and sits within [SUMMARY_MIN_CHARS, SUMMARY_MAX_CHARS].
pub fn normalize_summary(raw: &str) -> String {
    let mut text = raw.trim().replace('\n', " ");

    if !text.starts_with("This file") {
        // Lower-case the original lead-in so the splice reads naturally.
        let mut chars = text.chars();
        let rest = match chars.next() {
            Some(first) => format!("{}{}", first.to_lowercase(), chars.as_str()),
            None => String::new(),
        };
        text = if rest.is_empty() {
            "This file contains source code.".to_string()
        } else {
            format!("This file {}", rest)
        };
    }

    if text.chars().count() > SUMMARY_MAX_CHARS {
        text = text.chars().take(SUMMARY_MAX_CHARS - 1).collect::<String>();
        text.push('…');
    }

    while text.chars().count() < SUMMARY_MIN_CHARS {
        text = text.trim_end_matches('.').to_string();
        text.push_str(" for code organization.");
    }

    if !text.ends_with('.') && !text.ends_with('…') {
        text.push('.');
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_prefix_and_period() {
        let s = normalize_summary("implements the session store used by the auth middleware");
        assert!(s.starts_with("This file"));
        assert!(s.ends_with('.'));
        assert!(s.chars().count() >= SUMMARY_MIN_CHARS);
    }

    #[test]
    fn test_normalize_truncates_long_summaries() {
        let long = format!("This file {}", "does many things ".repeat(30));
        let s = normalize_summary(&long);
        assert!(s.chars().count() <= SUMMARY_MAX_CHARS);
        assert!(s.ends_with('…'));
    }

    #[test]
    fn test_normalize_pads_short_summaries() {
        let s = normalize_summary("This file is small.");
        assert!(s.chars().count() >= SUMMARY_MIN_CHARS);
        assert!(s.contains("for code organization"));
    }

    #[test]
    fn test_already_conforming_summary_is_kept() {
        let good = "This file contains 3 functions and 1 classes for request routing.";
        assert_eq!(normalize_summary(good), good);
    }
}
