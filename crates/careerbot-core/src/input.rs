//! Question input model
//!
//! Maps a [`QuestionDescriptor`] to the input affordance a front-end should
//! draw and holds the transient editing state for it. Every submission goes
//! through [`QuestionInput::submit`], which validates against the descriptor
//! and only then hands the trimmed answer to the caller.

use thiserror::Error;

use crate::question::{QuestionDescriptor, QuestionType, DEFAULT_MAX_LENGTH};

/// Why an answer was not submitted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputRejection {
    #[error("Answer is empty")]
    Empty,
    #[error("Answer is too long ({len}/{max} characters)")]
    TooLong { len: usize, max: usize },
    #[error("Enter a number")]
    NotANumber,
    #[error("Enter a number {}", describe_bounds(.min, .max))]
    OutOfRange { min: Option<f64>, max: Option<f64> },
    #[error("Choose one of the options")]
    NotAnOption,
    #[error("Check at least one option")]
    NothingChecked,
}

/// The widget a front-end should render for the current question
#[derive(Debug, Clone, PartialEq)]
pub enum Affordance {
    /// No question (or an untyped one): plain chat input.
    FreeText,
    SingleLine { max_length: usize },
    /// Bounded text area with a live character counter.
    MultiLine { max_length: usize },
    Number { min: Option<f64>, max: Option<f64> },
    /// Slider and number field sharing one value.
    Range { min: Option<f64>, max: Option<f64>, step: f64 },
    Select { options: Vec<String> },
    MultiSelect { options: Vec<String> },
}

impl Affordance {
    pub fn for_question(question: Option<&QuestionDescriptor>) -> Self {
        let Some(question) = question else {
            return Affordance::FreeText;
        };
        let c = question.constraints;
        match question.kind {
            Some(QuestionType::Text) => match c.max_length {
                Some(max_length) => Affordance::MultiLine { max_length },
                None => Affordance::SingleLine { max_length: DEFAULT_MAX_LENGTH },
            },
            Some(QuestionType::String) => Affordance::SingleLine {
                max_length: c.max_length.unwrap_or(DEFAULT_MAX_LENGTH),
            },
            Some(QuestionType::Number) => Affordance::Number { min: c.min, max: c.max },
            Some(QuestionType::Range) => Affordance::Range {
                min: c.min,
                max: c.max,
                step: c.step.filter(|s| s.is_finite() && *s > 0.0).unwrap_or(1.0),
            },
            Some(QuestionType::Select) => Affordance::Select { options: question.options.clone() },
            Some(QuestionType::Multiselect) => {
                Affordance::MultiSelect { options: question.options.clone() }
            }
            Some(QuestionType::Unknown) | None => Affordance::FreeText,
        }
    }

    pub fn options(&self) -> &[String] {
        match self {
            Affordance::Select { options } | Affordance::MultiSelect { options } => options,
            _ => &[],
        }
    }

    /// True for affordances edited by typing.
    pub fn is_textual(&self) -> bool {
        !matches!(self, Affordance::Select { .. } | Affordance::MultiSelect { .. })
    }

    pub fn max_length(&self) -> Option<usize> {
        match self {
            Affordance::SingleLine { max_length } | Affordance::MultiLine { max_length } => {
                Some(*max_length)
            }
            _ => None,
        }
    }
}

fn describe_bounds(min: &Option<f64>, max: &Option<f64>) -> String {
    match (*min, *max) {
        (Some(min), Some(max)) => format!("from {} to {}", min, max),
        (Some(min), None) => format!("of at least {}", min),
        (None, Some(max)) => format!("of at most {}", max),
        (None, None) => String::new(),
    }
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Editing state for one question
#[derive(Debug, Clone)]
pub struct QuestionInput {
    affordance: Affordance,
    value: String,
    cursor: usize,
    highlighted: usize,
    chosen: Option<usize>,
    checked: Vec<String>,
}

impl Default for QuestionInput {
    fn default() -> Self {
        Self::new(None)
    }
}

impl QuestionInput {
    pub fn new(question: Option<&QuestionDescriptor>) -> Self {
        Self {
            affordance: Affordance::for_question(question),
            value: String::new(),
            cursor: 0,
            highlighted: 0,
            chosen: None,
            checked: Vec::new(),
        }
    }

    /// Switches to a new descriptor, dropping everything typed or checked.
    pub fn set_question(&mut self, question: Option<&QuestionDescriptor>) {
        *self = Self::new(question);
    }

    pub fn affordance(&self) -> &Affordance {
        &self.affordance
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn char_count(&self) -> usize {
        self.value.chars().count()
    }

    pub fn highlighted(&self) -> usize {
        self.highlighted
    }

    /// The option picked in a select.
    pub fn chosen(&self) -> Option<&str> {
        self.chosen
            .and_then(|i| self.affordance.options().get(i))
            .map(String::as_str)
    }

    /// Checked multiselect options, in the order they were checked.
    pub fn checked(&self) -> &[String] {
        &self.checked
    }

    pub fn is_checked(&self, option: &str) -> bool {
        self.checked.iter().any(|c| c == option)
    }

    // Text editing

    pub fn insert_char(&mut self, c: char) {
        if !self.affordance.is_textual() {
            return;
        }
        if c == '\n' && !matches!(self.affordance, Affordance::MultiLine { .. }) {
            return;
        }
        if let Some(max) = self.affordance.max_length() {
            if self.char_count() >= max {
                return;
            }
        }
        let byte_pos = char_to_byte_index(&self.value, self.cursor);
        self.value.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.char_count() {
            let byte_pos = char_to_byte_index(&self.value, self.cursor);
            self.value.remove(byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.char_count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.char_count();
    }

    /// Replaces the typed value and puts the cursor at its end.
    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
        self.cursor = self.char_count();
    }

    // Range slider

    /// Current slider position; an empty or unparsable field sits at `min`.
    pub fn slider_value(&self) -> Option<f64> {
        let Affordance::Range { min, max, .. } = self.affordance else {
            return None;
        };
        let parsed = parse_number(&self.value).unwrap_or_else(|| min.unwrap_or(0.0));
        Some(clamp(parsed, min, max))
    }

    pub fn step_up(&mut self) {
        self.step_by(1.0);
    }

    pub fn step_down(&mut self) {
        self.step_by(-1.0);
    }

    fn step_by(&mut self, direction: f64) {
        let Affordance::Range { min, max, step } = self.affordance else {
            return;
        };
        let current = match parse_number(&self.value) {
            Some(v) => clamp(v, min, max),
            // The first nudge on an empty field lands on the lower bound.
            None => {
                self.set_value(format_number(min.unwrap_or(0.0)));
                return;
            }
        };
        let next = clamp(current + direction * step, min, max);
        self.set_value(format_number(next));
    }

    /// Slider position as a fraction of the range, for gauges.
    pub fn slider_ratio(&self) -> f64 {
        match (self.slider_value(), &self.affordance) {
            (Some(v), Affordance::Range { min: Some(min), max: Some(max), .. }) if max > min => {
                ((v - min) / (max - min)).clamp(0.0, 1.0)
            }
            _ => 0.0,
        }
    }

    // Option lists

    pub fn highlight_next(&mut self) {
        let len = self.affordance.options().len();
        if len > 0 {
            self.highlighted = (self.highlighted + 1).min(len - 1);
        }
        if matches!(self.affordance, Affordance::Select { .. }) {
            self.choose_highlighted();
        }
    }

    pub fn highlight_prev(&mut self) {
        self.highlighted = self.highlighted.saturating_sub(1);
        if matches!(self.affordance, Affordance::Select { .. }) {
            self.choose_highlighted();
        }
    }

    /// Picks the highlighted option of a select.
    pub fn choose_highlighted(&mut self) {
        if let Affordance::Select { options } = &self.affordance {
            if self.highlighted < options.len() {
                self.chosen = Some(self.highlighted);
            }
        }
    }

    /// Space on a select picks, on a multiselect toggles.
    pub fn toggle_highlighted(&mut self) {
        match &self.affordance {
            Affordance::Select { .. } => self.choose_highlighted(),
            Affordance::MultiSelect { options } => {
                if let Some(option) = options.get(self.highlighted).cloned() {
                    self.toggle(&option);
                }
            }
            _ => {}
        }
    }

    /// Checks or unchecks a multiselect option.
    pub fn toggle(&mut self, option: &str) {
        if !self.affordance.options().iter().any(|o| o == option) {
            return;
        }
        if let Some(pos) = self.checked.iter().position(|c| c == option) {
            self.checked.remove(pos);
        } else {
            self.checked.push(option.to_string());
        }
    }

    // Submission

    /// The value that would be submitted right now, before validation.
    pub fn pending_value(&self) -> String {
        match &self.affordance {
            Affordance::Select { .. } => self.chosen().unwrap_or_default().to_string(),
            Affordance::MultiSelect { .. } => self.checked.join(", "),
            _ => self.value.clone(),
        }
    }

    /// Checks the pending value against the descriptor and returns the
    /// trimmed answer.
    pub fn validate(&self) -> Result<String, InputRejection> {
        let raw = self.pending_value();
        let answer = raw.trim();
        match &self.affordance {
            Affordance::FreeText => {
                if answer.is_empty() {
                    return Err(InputRejection::Empty);
                }
            }
            Affordance::SingleLine { max_length } | Affordance::MultiLine { max_length } => {
                let len = answer.chars().count();
                if len == 0 {
                    return Err(InputRejection::Empty);
                }
                if len > *max_length {
                    return Err(InputRejection::TooLong { len, max: *max_length });
                }
            }
            Affordance::Number { min, max } | Affordance::Range { min, max, .. } => {
                let value = parse_number(answer).ok_or(InputRejection::NotANumber)?;
                if !within(value, *min, *max) {
                    return Err(InputRejection::OutOfRange { min: *min, max: *max });
                }
            }
            Affordance::Select { options } => {
                // Membership is checked on the option as offered, padding included.
                if !options.iter().any(|o| *o == raw) {
                    return Err(InputRejection::NotAnOption);
                }
            }
            Affordance::MultiSelect { .. } => {
                if self.checked.is_empty() {
                    return Err(InputRejection::NothingChecked);
                }
            }
        }
        Ok(answer.to_string())
    }

    /// Validates and, when accepted, passes the trimmed answer to
    /// `on_submit`. Typed text is cleared after an accepted submission.
    pub fn submit<F>(&mut self, on_submit: F) -> Result<(), InputRejection>
    where
        F: FnOnce(String),
    {
        let answer = self.validate()?;
        on_submit(answer);
        if self.affordance.is_textual() {
            self.value.clear();
            self.cursor = 0;
        }
        Ok(())
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

fn clamp(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let value = min.map_or(value, |m| value.max(m));
    max.map_or(value, |m| value.min(m))
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn question(json: &str) -> QuestionDescriptor {
        serde_json::from_str(json).unwrap()
    }

    fn number_question(min: f64, max: f64) -> QuestionDescriptor {
        question(&format!(
            r#"{{"id":"q","prompt":"?","type":"number","constraints":{{"min":{},"max":{}}}}}"#,
            min, max
        ))
    }

    fn submitted(input: &mut QuestionInput) -> (Result<(), InputRejection>, Option<String>) {
        let mut sent = None;
        let result = input.submit(|answer| sent = Some(answer));
        (result, sent)
    }

    #[test]
    fn test_affordance_mapping() {
        assert_eq!(Affordance::for_question(None), Affordance::FreeText);
        assert_eq!(
            Affordance::for_question(Some(&question(r#"{"prompt":"?","type":"text"}"#))),
            Affordance::SingleLine { max_length: 1000 }
        );
        assert_eq!(
            Affordance::for_question(Some(&question(
                r#"{"prompt":"?","type":"text","constraints":{"max_length":500}}"#
            ))),
            Affordance::MultiLine { max_length: 500 }
        );
        assert_eq!(
            Affordance::for_question(Some(&question(
                r#"{"prompt":"?","type":"string","constraints":{"max_length":100}}"#
            ))),
            Affordance::SingleLine { max_length: 100 }
        );
        assert_eq!(
            Affordance::for_question(Some(&question(
                r#"{"prompt":"?","type":"range","constraints":{"min":1,"max":5}}"#
            ))),
            Affordance::Range { min: Some(1.0), max: Some(5.0), step: 1.0 }
        );
        assert_eq!(
            Affordance::for_question(Some(&question(r#"{"prompt":"?"}"#))),
            Affordance::FreeText
        );
    }

    #[test]
    fn test_free_text_rejects_whitespace() {
        let mut input = QuestionInput::new(None);
        input.set_value("   ");
        assert_eq!(submitted(&mut input), (Err(InputRejection::Empty), None));
        input.set_value("  hello ");
        assert_eq!(submitted(&mut input), (Ok(()), Some("hello".to_string())));
        assert_eq!(input.value(), "");
    }

    #[test]
    fn test_text_max_length() {
        let q = question(r#"{"prompt":"?","type":"text","constraints":{"max_length":5}}"#);
        let mut input = QuestionInput::new(Some(&q));
        for c in "abcdefgh".chars() {
            input.insert_char(c);
        }
        // Typing stops at the bound.
        assert_eq!(input.value(), "abcde");
        input.set_value("abcdef");
        assert_eq!(input.validate(), Err(InputRejection::TooLong { len: 6, max: 5 }));
        input.set_value(" abcde ");
        assert_eq!(input.validate(), Ok("abcde".to_string()));
    }

    #[test]
    fn test_newline_only_in_multiline() {
        let mut single = QuestionInput::new(None);
        single.insert_char('a');
        single.insert_newline();
        assert_eq!(single.value(), "a");

        let q = question(r#"{"prompt":"?","type":"text","constraints":{"max_length":50}}"#);
        let mut multi = QuestionInput::new(Some(&q));
        multi.insert_char('a');
        multi.insert_newline();
        multi.insert_char('b');
        assert_eq!(multi.value(), "a\nb");
    }

    #[test]
    fn test_number_scenario() {
        let q = number_question(18.0, 99.0);
        let mut input = QuestionInput::new(Some(&q));
        input.set_value("150");
        assert_eq!(
            submitted(&mut input),
            (Err(InputRejection::OutOfRange { min: Some(18.0), max: Some(99.0) }), None)
        );
        input.set_value("abc");
        assert_eq!(submitted(&mut input), (Err(InputRejection::NotANumber), None));
        input.set_value("25");
        assert_eq!(submitted(&mut input), (Ok(()), Some("25".to_string())));
    }

    #[test]
    fn test_number_rejects_non_finite() {
        let mut input = QuestionInput::new(Some(&question(r#"{"prompt":"?","type":"number"}"#)));
        input.set_value("inf");
        assert_eq!(input.validate(), Err(InputRejection::NotANumber));
        input.set_value("NaN");
        assert_eq!(input.validate(), Err(InputRejection::NotANumber));
        input.set_value("-12.5");
        assert_eq!(input.validate(), Ok("-12.5".to_string()));
    }

    #[test]
    fn test_range_slider_steps_and_clamps() {
        let q = question(
            r#"{"prompt":"?","type":"range","constraints":{"min":60000,"max":100000,"step":20000}}"#,
        );
        let mut input = QuestionInput::new(Some(&q));
        assert_eq!(input.slider_value(), Some(60000.0));
        input.step_up();
        assert_eq!(input.value(), "60000");
        input.step_up();
        input.step_up();
        input.step_up();
        assert_eq!(input.value(), "100000");
        assert_eq!(input.slider_ratio(), 1.0);
        input.step_down();
        assert_eq!(input.value(), "80000");
        assert_eq!(input.validate(), Ok("80000".to_string()));
    }

    #[test]
    fn test_select_requires_member() {
        let q = question(r#"{"prompt":"?","type":"select","options":["A","B"]}"#);
        let mut input = QuestionInput::new(Some(&q));
        assert_eq!(input.validate(), Err(InputRejection::NotAnOption));
        input.highlight_next();
        assert_eq!(input.chosen(), Some("B"));
        input.highlight_prev();
        assert_eq!(submitted(&mut input), (Ok(()), Some("A".to_string())));
    }

    #[test]
    fn test_select_padded_option_is_submittable() {
        let q = question(r#"{"prompt":"?","type":"select","options":["Remote ","Office"]}"#);
        let mut input = QuestionInput::new(Some(&q));
        input.highlight_next();
        input.highlight_prev();
        assert_eq!(input.chosen(), Some("Remote "));
        assert_eq!(input.validate(), Ok("Remote".to_string()));
        assert_eq!(submitted(&mut input), (Ok(()), Some("Remote".to_string())));
    }

    #[test]
    fn test_multiselect_check_order() {
        let q = question(r#"{"prompt":"?","type":"multiselect","options":["Go","Rust","SQL"]}"#);
        let mut input = QuestionInput::new(Some(&q));
        assert_eq!(submitted(&mut input), (Err(InputRejection::NothingChecked), None));
        input.toggle("SQL");
        input.toggle("Go");
        input.toggle("Rust");
        input.toggle("Go");
        input.toggle("Haskell");
        assert_eq!(input.checked(), ["SQL".to_string(), "Rust".to_string()]);
        assert_eq!(submitted(&mut input), (Ok(()), Some("SQL, Rust".to_string())));
    }

    #[test]
    fn test_new_question_resets_state() {
        let q = question(r#"{"prompt":"?","type":"multiselect","options":["A","B"]}"#);
        let mut input = QuestionInput::new(Some(&q));
        input.toggle("A");
        input.set_question(Some(&q));
        assert!(input.checked().is_empty());

        let mut input = QuestionInput::new(None);
        input.set_value("draft");
        input.set_question(Some(&number_question(0.0, 10.0)));
        assert_eq!(input.value(), "");
        assert_eq!(input.cursor(), 0);
    }

    #[test]
    fn test_utf8_editing() {
        let mut input = QuestionInput::new(None);
        for c in "Привет".chars() {
            input.insert_char(c);
        }
        input.move_left();
        input.backspace();
        assert_eq!(input.value(), "Привет".replace('е', ""));
        input.move_home();
        input.delete();
        assert_eq!(input.value(), "ривт");
    }

    proptest! {
        #[test]
        fn prop_number_accepted_iff_in_bounds(
            min in -1000i32..1000,
            span in 0i32..1000,
            value in -3000i32..3000,
        ) {
            let max = min + span;
            let q = number_question(f64::from(min), f64::from(max));
            let mut input = QuestionInput::new(Some(&q));
            input.set_value(value.to_string());
            let (result, sent) = submitted(&mut input);
            let in_bounds = value >= min && value <= max;
            prop_assert_eq!(result.is_ok(), in_bounds);
            prop_assert_eq!(sent.is_some(), in_bounds);
        }

        #[test]
        fn prop_multiselect_joins_in_check_order(
            picks in proptest::sample::subsequence(vec!["a", "b", "c", "d", "e"], 0..=5)
                .prop_shuffle(),
        ) {
            let q = question(r#"{"prompt":"?","type":"multiselect","options":["a","b","c","d","e"]}"#);
            let mut input = QuestionInput::new(Some(&q));
            for p in &picks {
                input.toggle(p);
            }
            let (result, sent) = submitted(&mut input);
            if picks.is_empty() {
                prop_assert_eq!(result, Err(InputRejection::NothingChecked));
                prop_assert!(sent.is_none());
            } else {
                prop_assert_eq!(sent, Some(picks.join(", ")));
            }
        }

        #[test]
        fn prop_select_rejects_non_members(value in "[a-z]{1,6}") {
            let q = question(r#"{"prompt":"?","type":"select","options":["yes","no"]}"#);
            let input = QuestionInput::new(Some(&q));
            // Only the chosen option is ever submitted for a select; an
            // arbitrary string can never become the value.
            prop_assert_eq!(input.validate(), Err(InputRejection::NotAnOption));
            let is_member = value == "yes" || value == "no";
            let mut input = QuestionInput::new(Some(&q));
            if let Some(idx) = ["yes", "no"].iter().position(|o| *o == value) {
                for _ in 0..idx {
                    input.highlight_next();
                }
                input.choose_highlighted();
            }
            prop_assert_eq!(input.validate().is_ok(), is_member);
        }
    }
}
