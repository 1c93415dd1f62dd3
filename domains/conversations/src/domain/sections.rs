//! Labeled answer sections
//!
//! The gateway formats replies as optional `=== FINAL ANSWER ===`,
//! `=== ANALYSIS ===` and `=== CODE ===` blocks. The manager stores content
//! untouched; views use [`AnswerView`] to pick it apart.

use regex::Regex;

lazy_static::lazy_static! {
    // A section runs from its header to the next `==` or end of input.
    static ref FINAL_ANSWER_REGEX: Regex =
        Regex::new(r"(?s)=== FINAL ANSWER ===\s*(.*?)(?:==|\z)").unwrap();
    static ref ANALYSIS_REGEX: Regex =
        Regex::new(r"(?s)=== ANALYSIS ===\s*(.*?)(?:==|\z)").unwrap();
    static ref CODE_REGEX: Regex = Regex::new(r"(?s)=== CODE ===\s*(.*?)(?:==|\z)").unwrap();
}

/// Sections extracted from an assistant reply
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerSections {
    pub final_answer: Option<String>,
    pub analysis: Option<String>,
    pub code: Option<String>,
}

impl AnswerSections {
    pub fn parse(text: &str) -> Self {
        Self {
            final_answer: capture(&FINAL_ANSWER_REGEX, text),
            analysis: capture(&ANALYSIS_REGEX, text),
            code: capture(&CODE_REGEX, text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.final_answer.is_none() && self.analysis.is_none() && self.code.is_none()
    }
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// How a message body should be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerView {
    /// At least one labeled section was found
    Sections(AnswerSections),
    /// No labels; show the content as-is
    Raw(String),
    /// Null or empty content
    Empty,
}

impl AnswerView {
    pub fn from_content(content: Option<&str>) -> Self {
        let Some(text) = content.filter(|t| !t.is_empty()) else {
            return AnswerView::Empty;
        };

        let sections = AnswerSections::parse(text);
        if sections.is_empty() {
            AnswerView::Raw(text.to_string())
        } else {
            AnswerView::Sections(sections)
        }
    }
}
