use serde::{Deserialize, Serialize};

/// Number of questions in the server questionnaire, used until the server
/// reports its own total.
pub const DEFAULT_TOTAL_QUESTIONS: u32 = 12;

/// Longest accepted free-text answer when the server does not say otherwise.
pub const DEFAULT_MAX_LENGTH: usize = 1000;

/// Input kind requested by the server for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionType {
    Text,
    String,
    Number,
    Range,
    Select,
    Multiselect,
    #[serde(other)]
    Unknown,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::String => "string",
            QuestionType::Number => "number",
            QuestionType::Range => "range",
            QuestionType::Select => "select",
            QuestionType::Multiselect => "multiselect",
            QuestionType::Unknown => "unknown",
        }
    }
}

/// Bounds attached to a question
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    #[serde(default)]
    pub step: Option<f64>,
    #[serde(default)]
    pub max_length: Option<usize>,
}

/// Questions answered versus questions expected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: u32,
    pub total: u32,
}

impl Progress {
    pub fn new(current: u32, total: u32) -> Self {
        Self { current, total }
    }

    pub fn reset(total: u32) -> Self {
        Self::new(0, total)
    }

    /// Advances to `next` without ever moving `current` backwards.
    pub fn advance(self, next: Progress) -> Self {
        Self {
            current: self.current.max(next.current),
            total: next.total,
        }
    }

    /// Completed fraction in `0.0..=1.0`.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (f64::from(self.current) / f64::from(self.total)).clamp(0.0, 1.0)
    }
}

/// A question pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDescriptor {
    #[serde(default)]
    pub id: Option<String>,
    pub prompt: String,
    #[serde(default, rename = "type")]
    pub kind: Option<QuestionType>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default, alias = "moduleTitle")]
    pub module_title: Option<String>,
    #[serde(default)]
    pub progress: Option<Progress>,
}

impl QuestionDescriptor {
    /// A bare prompt with no typed input, answered in free-form chat mode.
    pub fn prompt_only(prompt: impl Into<String>) -> Self {
        Self {
            id: None,
            prompt: prompt.into(),
            kind: None,
            options: Vec::new(),
            constraints: Constraints::default(),
            module: None,
            module_title: None,
            progress: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_descriptor() {
        let q: QuestionDescriptor = serde_json::from_str(
            r#"{
                "id": "salary_expectations",
                "prompt": "Salary expectations?",
                "type": "range",
                "constraints": {"min": 60000, "max": 700000, "step": 20000},
                "module": "goals",
                "module_title": "Goals",
                "progress": {"current": 7, "total": 12}
            }"#,
        )
        .unwrap();
        assert_eq!(q.kind, Some(QuestionType::Range));
        assert_eq!(q.constraints.min, Some(60000.0));
        assert_eq!(q.constraints.step, Some(20000.0));
        assert_eq!(q.progress, Some(Progress::new(7, 12)));
        assert!(q.options.is_empty());
    }

    #[test]
    fn test_unknown_type_and_extra_fields() {
        let q: QuestionDescriptor = serde_json::from_str(
            r#"{"id":"x","prompt":"?","type":"slider","multiple":true}"#,
        )
        .unwrap();
        assert_eq!(q.kind, Some(QuestionType::Unknown));
    }

    #[test]
    fn test_prompt_only_descriptor() {
        let q: QuestionDescriptor = serde_json::from_str(r#"{"prompt":"Hello"}"#).unwrap();
        assert_eq!(q, QuestionDescriptor::prompt_only("Hello"));
    }

    #[test]
    fn test_progress_never_moves_back() {
        let p = Progress::new(5, 12).advance(Progress::new(3, 12));
        assert_eq!(p, Progress::new(5, 12));
        let p = p.advance(Progress::new(6, 13));
        assert_eq!(p, Progress::new(6, 13));
    }

    #[test]
    fn test_progress_ratio() {
        assert_eq!(Progress::reset(12).ratio(), 0.0);
        assert_eq!(Progress::new(6, 12).ratio(), 0.5);
        assert_eq!(Progress::new(3, 0).ratio(), 0.0);
    }
}
