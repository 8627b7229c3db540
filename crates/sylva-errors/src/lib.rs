use std::fmt::Display;

pub use annotate_snippets::Renderer;
use annotate_snippets::{Level, Snippet};
pub use text_size::TextRange;

/// Severity attached to a [`Diagnostic`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// A message anchored to a byte range of some source text.
///
/// Syntax trees report their `ERROR` and `MISSING` nodes this way and queries
/// report their compilation failures, so both can be rendered with the same
/// snippet layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    severity: Severity,
    message: String,
    label: String,
    range: TextRange,
}

impl Diagnostic {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn range(&self) -> TextRange {
        self.range
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn error(message: impl Into<String>, range: TextRange) -> Self {
        Self { severity: Severity::Error, message: message.into(), label: "here".into(), range }
    }

    pub fn warning(message: impl Into<String>, range: TextRange) -> Self {
        Self { severity: Severity::Warning, message: message.into(), label: "here".into(), range }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Renders the diagnostic against `text`.
    ///
    /// Ranges are clamped to `text`, so a diagnostic computed for an older
    /// revision of the document still renders.
    pub fn render<'a>(
        &'a self,
        renderer: &'a Renderer,
        path: &'a str,
        text: &'a str,
    ) -> impl Display + 'a {
        let level = match self.severity {
            Severity::Error => Level::Error,
            Severity::Warning => Level::Warning,
        };
        let end = usize::from(self.range.end()).min(text.len());
        let start = usize::from(self.range.start()).min(end);
        let message = level.title(&self.message).snippet(
            Snippet::source(text)
                .origin(path)
                .annotation(level.span(start..end).label(&self.label))
                .fold(true),
        );
        renderer.render(message)
    }
}

#[cfg(test)]
mod tests {
    use text_size::TextSize;

    use super::*;

    #[test]
    fn renders_plain_snippet() {
        let text = "a + \nb";
        let range = TextRange::new(TextSize::new(2), TextSize::new(3));
        let diagnostic = Diagnostic::error("unexpected `+`", range).with_label("not expected");
        let rendered = diagnostic.render(&Renderer::plain(), "input.txt", text).to_string();

        assert!(rendered.starts_with("error: unexpected `+`"), "{rendered}");
        assert!(rendered.contains("input.txt:1:3"), "{rendered}");
        assert!(rendered.contains("^ not expected"), "{rendered}");
    }

    #[test]
    fn clamps_stale_ranges() {
        let range = TextRange::new(TextSize::new(10), TextSize::new(20));
        let diagnostic = Diagnostic::warning("stale", range);
        assert_eq!(diagnostic.severity(), Severity::Warning);
        let rendered = diagnostic.render(&Renderer::plain(), "x", "abc").to_string();
        assert!(rendered.starts_with("warning: stale"));
    }
}
