//! Diagnostics shared by every compiler stage.
//!
//! Every stage collects these instead of failing fast, so one compile reports
//! as many problems as it can find. The serialized shape
//! (`code`, `message`, `line`, `column`, `severity`, optional `suggestion`) is
//! what editor integrations consume for inline markers.

use crate::ast::Position;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

impl Display for Severity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub mod codes {
    pub const UNTERMINATED_STRING: &str = "E1001";
    pub const CURLY_BRACE: &str = "E1002";
    pub const SQUARE_BRACKETS: &str = "E1003";
    pub const EMPTY_PARENS: &str = "E1004";
    pub const INCONSISTENT_INDENT: &str = "E1005";
    pub const UNEXPECTED_CHAR: &str = "E1006";

    pub const UNEXPECTED_TOKEN: &str = "E2001";
    pub const UNKNOWN_STATEMENT: &str = "E2002";
    pub const TOP_LEVEL_STATEMENT: &str = "E2003";
    pub const UNEXPECTED_INDENT: &str = "E2004";
    pub const TOO_DEEP: &str = "E2005";
    pub const ELSE_WITHOUT_IF: &str = "E2006";

    pub const PLACEHOLDER: &str = "E3001";
    pub const TYPE_MISMATCH: &str = "E3002";
    pub const ASSIGN_IN_EXPRESSION: &str = "E3003";
    pub const MISSING_COORDINATE: &str = "E3004";
    pub const UNKNOWN_BLOCK: &str = "E3005";
    pub const UNKNOWN_PROCEDURE: &str = "E3006";
    pub const STAGE_MOTION: &str = "E3007";
    pub const ARITY_MISMATCH: &str = "E3008";
    pub const DUPLICATE_PROCEDURE: &str = "E3009";
    pub const DUPLICATE_PARAMETER: &str = "E3010";
    pub const UNKNOWN_VARIABLE: &str = "E3011";
    pub const UNKNOWN_LIST: &str = "E3012";
    pub const UNKNOWN_KEY: &str = "E3013";
    pub const DUPLICATE_SPRITE: &str = "E3014";
    pub const MULTIPLE_STAGES: &str = "E3015";
    pub const NO_SPRITES: &str = "E3016";

    pub const UNKNOWN_COSTUME: &str = "W3001";
    pub const UNKNOWN_SOUND: &str = "W3002";
    pub const UNREACHABLE_AFTER_FOREVER: &str = "W3003";
    pub const EMPTY_BODY: &str = "W3004";

    pub const EMPTY_SCRIPT: &str = "I3001";
    pub const UNRECEIVED_BROADCAST: &str = "I3002";

    /// Reserved for failures inside the compiler itself.
    pub const INTERNAL: &str = "E9999";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Sprite the diagnostic belongs to in a multi-sprite compile.
    #[serde(skip)]
    pub sprite: Option<String>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &str, message: impl Into<String>, pos: Position) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            line: pos.line.max(1),
            column: pos.column.max(1),
            severity,
            suggestion: None,
            sprite: None,
        }
    }

    pub fn error(code: &str, message: impl Into<String>, pos: Position) -> Self {
        Self::new(Severity::Error, code, message, pos)
    }

    pub fn warning(code: &str, message: impl Into<String>, pos: Position) -> Self {
        Self::new(Severity::Warning, code, message, pos)
    }

    pub fn info(code: &str, message: impl Into<String>, pos: Position) -> Self {
        Self::new(Severity::Info, code, message, pos)
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Tags the diagnostic with its sprite and prefixes the message with `[name] `.
    pub fn for_sprite(mut self, sprite: &str) -> Self {
        self.message = format!("[{}] {}", sprite, self.message);
        self.sprite = Some(sprite.to_string());
        self
    }

    pub fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}[{}]: {} (line {}, column {})",
            self.severity, self.code, self.message, self.line, self.column
        )
    }
}

pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

/// Renders a diagnostic with the offending source line and a caret under the
/// reported column.
pub fn render(diagnostic: &Diagnostic, source: &str, file_label: &str) -> String {
    let mut out = format!(
        "{}[{}]: {}\n  --> {}:{}:{}\n",
        diagnostic.severity,
        diagnostic.code,
        diagnostic.message,
        file_label,
        diagnostic.line,
        diagnostic.column
    );
    if let Some(line_text) = source.lines().nth(diagnostic.line.saturating_sub(1)) {
        let gutter = diagnostic.line.to_string();
        let pad = " ".repeat(gutter.len());
        let caret_offset = line_text
            .chars()
            .take(diagnostic.column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect::<String>();
        out.push_str(&format!("{} |\n", pad));
        out.push_str(&format!("{} | {}\n", gutter, line_text));
        out.push_str(&format!("{} | {}^\n", pad, caret_offset));
    }
    if let Some(suggestion) = &diagnostic.suggestion {
        out.push_str(&format!("  = help: {}\n", suggestion));
    }
    out
}
