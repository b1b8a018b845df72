use anyhow::{anyhow, Result};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::models::{Book, BookRecord};

/// What a single-line prompt is collecting, plus the context the submit step
/// needs (for example the book being checked out).
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum PromptKind {
    AddBook,
    RegisterBorrower,
    AddTreeLevel,
    CheckOut { isbn: String, title: String },
    ViewBorrower,
    Search,
}

impl PromptKind {
    pub(crate) fn title(&self) -> String {
        match self {
            PromptKind::AddBook => "Add Book".to_string(),
            PromptKind::RegisterBorrower => "Register Borrower".to_string(),
            PromptKind::AddTreeLevel => "Add Tree Level".to_string(),
            PromptKind::CheckOut { title, .. } => format!("Check Out '{title}'"),
            PromptKind::ViewBorrower => "View Borrower".to_string(),
            PromptKind::Search => "Search".to_string(),
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            PromptKind::AddBook => "ISBN",
            PromptKind::RegisterBorrower
            | PromptKind::CheckOut { .. }
            | PromptKind::ViewBorrower => "Card ID",
            PromptKind::AddTreeLevel => "Name",
            PromptKind::Search => "Title, author or ISBN",
        }
    }

    fn missing_message(&self) -> &'static str {
        match self {
            PromptKind::AddBook => "An ISBN is required.",
            PromptKind::AddTreeLevel => "A tree level name is required.",
            PromptKind::Search => "Enter something to search for.",
            _ => "A card ID is required.",
        }
    }
}

/// Single-field input dialog shared by every operator prompt.
#[derive(Clone)]
pub(crate) struct PromptForm {
    pub(crate) kind: PromptKind,
    pub(crate) value: String,
    pub(crate) error: Option<String>,
}

impl PromptForm {
    pub(crate) fn new(kind: PromptKind) -> Self {
        Self {
            kind,
            value: String::new(),
            error: None,
        }
    }

    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        self.value.push(ch);
        true
    }

    pub(crate) fn backspace(&mut self) {
        self.value.pop();
    }

    /// Trimmed input, or an error when nothing was typed.
    pub(crate) fn parse_input(&self) -> Result<String> {
        let value = self.value.trim();
        if value.is_empty() {
            return Err(anyhow!(self.kind.missing_message()));
        }
        Ok(value.to_string())
    }

    pub(crate) fn prefix(&self) -> String {
        format!("{}: ", self.kind.label())
    }

    pub(crate) fn build_line(&self) -> Line<'static> {
        let (display, style) = if self.value.is_empty() {
            ("<required>".to_string(), Style::default().fg(Color::DarkGray))
        } else {
            (self.value.clone(), Style::default().fg(Color::Yellow))
        };
        Line::from(vec![Span::raw(self.prefix()), Span::styled(display, style)])
    }

    pub(crate) fn value_len(&self) -> usize {
        self.value.chars().count()
    }
}

/// Lookup result waiting for the operator to confirm the first copy.
#[derive(Clone)]
pub(crate) struct BookPreview {
    pub(crate) record: BookRecord,
}

impl BookPreview {
    pub(crate) fn detail_lines(&self) -> Vec<(&'static str, String)> {
        let record = &self.record;
        let text = |value: &Option<String>| value.clone().unwrap_or_default();
        vec![
            ("Title", text(&record.title)),
            ("Authors", record.authors_line()),
            ("Publisher", text(&record.publisher)),
            ("Published Date", text(&record.published_date)),
            ("ISBN", record.preferred_isbn.clone()),
            (
                "Page Count",
                record.page_count.map(|n| n.to_string()).unwrap_or_default(),
            ),
            ("Language", text(&record.language)),
            ("Categories", record.categories_line()),
            ("Description", text(&record.description)),
        ]
    }
}

/// Pending change of a book's reference-only flag.
#[derive(Clone)]
pub(crate) struct ConfirmReference {
    pub(crate) isbn: String,
    pub(crate) title: String,
    pub(crate) current: bool,
}

impl ConfirmReference {
    pub(crate) fn from(book: &Book) -> Self {
        Self {
            isbn: book.isbn.clone(),
            title: book.title.clone(),
            current: book.reference_only,
        }
    }

    pub(crate) fn target(&self) -> bool {
        !self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_prompt_reports_what_is_missing() {
        let mut form = PromptForm::new(PromptKind::AddTreeLevel);
        form.push_char(' ');
        let err = form.parse_input().unwrap_err();
        assert_eq!(err.to_string(), "A tree level name is required.");
    }

    #[test]
    fn prompt_trims_and_ignores_control_characters() {
        let mut form = PromptForm::new(PromptKind::RegisterBorrower);
        for ch in " B001\t".chars() {
            form.push_char(ch);
        }
        assert_eq!(form.value, " B001");
        assert_eq!(form.parse_input().expect("card id"), "B001");
        form.backspace();
        assert_eq!(form.value_len(), 4);
    }

    #[test]
    fn preview_lists_empty_fields_as_blank() {
        let preview = BookPreview {
            record: BookRecord {
                title: Some("Dune".into()),
                preferred_isbn: "9780441013593".into(),
                ..BookRecord::default()
            },
        };
        let lines = preview.detail_lines();
        assert_eq!(lines[0], ("Title", "Dune".to_string()));
        assert_eq!(lines[1], ("Authors", String::new()));
        assert_eq!(lines[5], ("Page Count", String::new()));
    }
}
