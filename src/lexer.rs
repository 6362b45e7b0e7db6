use crate::ast::Position;
use crate::blocks;
use crate::diagnostics::{codes, Diagnostic};
use std::collections::HashSet;

/// Columns a tab counts for when measuring indentation.
const TAB_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Keyword,
    Ident,
    Number,
    String,
    Op,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Colon,
    Comma,
    Indent,
    Dedent,
    Newline,
    Comment,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub typ: TokenType,
    pub value: String,
    pub pos: Position,
}

impl Token {
    fn new(typ: TokenType, value: impl Into<String>, pos: Position) -> Self {
        Self {
            typ,
            value: value.into(),
            pos,
        }
    }

    /// Keywords and identifiers both read as words in block heads.
    pub fn is_word(&self) -> bool {
        matches!(self.typ, TokenType::Keyword | TokenType::Ident)
    }

    fn ends_value(&self) -> bool {
        matches!(
            self.typ,
            TokenType::Number
                | TokenType::String
                | TokenType::Ident
                | TokenType::RParen
                | TokenType::RBracket
        )
    }
}

pub fn tokenize(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(source).tokenize()
}

pub struct Lexer {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    keywords: HashSet<&'static str>,
    word_reporters: Vec<Vec<&'static str>>,
    lead_ins: Vec<Vec<&'static str>>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
    indents: Vec<usize>,
    at_line_start: bool,
    skipped_brackets: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut chars: Vec<char> = source.chars().collect();
        if chars.last() != Some(&'\n') {
            chars.push('\n');
        }
        Self {
            chars,
            index: 0,
            line: 1,
            column: 1,
            keywords: blocks::keyword_set(),
            word_reporters: blocks::word_only_reporters(),
            lead_ins: blocks::slot_lead_ins(),
            tokens: Vec::new(),
            diagnostics: Vec::new(),
            indents: vec![0],
            at_line_start: true,
            skipped_brackets: 0,
        }
    }

    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while !self.at_end() {
            if self.at_line_start {
                self.start_line();
                continue;
            }
            let ch = self.peek();
            if is_ignorable_format_char(ch) || ch == ' ' || ch == '\t' || ch == '\r' {
                self.advance();
                continue;
            }
            if ch == '\n' {
                let pos = self.pos();
                self.advance();
                self.push(TokenType::Newline, "\n", pos);
                self.at_line_start = true;
                self.skipped_brackets = 0;
                continue;
            }
            if ch == '#' || (ch == '/' && self.peek_at(1) == '/') {
                self.read_comment();
                continue;
            }
            if ch == '"' || ch == '\'' {
                self.read_string(ch);
                continue;
            }
            if ch.is_ascii_digit() || (ch == '-' && self.negative_number_ahead()) {
                self.read_number();
                continue;
            }
            if ch.is_ascii_alphabetic() || ch == '_' {
                self.read_identifier();
                continue;
            }
            self.read_symbol(ch);
        }

        let pos = self.pos();
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenType::Dedent, "", pos);
        }
        self.push(TokenType::Eof, "", pos);
        (self.tokens, self.diagnostics)
    }

    /// Measures indentation at the start of a line. Blank and comment-only
    /// lines leave the indent stack alone and emit no NEWLINE.
    fn start_line(&mut self) {
        let pos = self.pos();
        let mut width = 0;
        while !self.at_end() {
            match self.peek() {
                ' ' => width += 1,
                '\t' => width += TAB_WIDTH,
                ch if is_ignorable_format_char(ch) => {}
                _ => break,
            }
            self.advance();
        }
        if self.peek() == '\r' && self.peek_at(1) == '\n' {
            self.advance();
        }
        match self.peek() {
            '\n' => {
                self.advance();
                return;
            }
            '#' => {
                self.read_comment();
                self.skip_newline();
                return;
            }
            '/' if self.peek_at(1) == '/' => {
                self.read_comment();
                self.skip_newline();
                return;
            }
            _ => {}
        }
        self.at_line_start = false;
        self.apply_indent(width, pos);
    }

    fn apply_indent(&mut self, width: usize, pos: Position) {
        let top = self.current_indent();
        if width > top {
            self.indents.push(width);
            self.push(TokenType::Indent, "", pos);
            return;
        }
        while self.indents.len() > 1 && width < self.current_indent() {
            self.indents.pop();
            self.push(TokenType::Dedent, "", pos);
        }
        let level = self.current_indent();
        if width != level {
            self.error(
                codes::INCONSISTENT_INDENT,
                format!(
                    "Inconsistent indentation: {} columns does not match any enclosing block",
                    width
                ),
                Position::new(pos.line, width + 1),
                format!("Indent this line by {} columns to line up with its block", level),
            );
        }
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    fn skip_newline(&mut self) {
        if self.peek() == '\r' {
            self.advance();
        }
        if self.peek() == '\n' {
            self.advance();
        }
    }

    fn read_comment(&mut self) {
        let pos = self.pos();
        let mut text = String::new();
        while !self.at_end() && self.peek() != '\n' {
            text.push(self.advance());
        }
        let body = text
            .trim_start_matches('#')
            .trim_start_matches("//")
            .trim()
            .to_string();
        self.push(TokenType::Comment, body, pos);
    }

    fn read_symbol(&mut self, ch: char) {
        let pos = self.pos();
        match ch {
            '(' => {
                if self.next_non_space_is(')') {
                    while self.advance() != ')' {}
                    self.error(
                        codes::EMPTY_PARENS,
                        "Empty parentheses",
                        pos,
                        "Put a value inside the parentheses or remove them",
                    );
                } else {
                    self.advance();
                    self.push(TokenType::LParen, "(", pos);
                }
            }
            ')' => {
                self.advance();
                self.push(TokenType::RParen, ")", pos);
            }
            '[' => {
                if self.next_non_space_is(']') {
                    while self.advance() != ']' {}
                    self.push(TokenType::LBracket, "[", pos);
                    self.push(TokenType::RBracket, "]", Position::new(pos.line, self.column - 1));
                } else {
                    self.advance();
                    self.skipped_brackets += 1;
                    self.error(
                        codes::SQUARE_BRACKETS,
                        "Square brackets can only hold an empty list `[]`",
                        pos,
                        "Separate list items with commas instead: list name = a, b, c",
                    );
                }
            }
            ']' => {
                self.advance();
                if self.skipped_brackets > 0 {
                    self.skipped_brackets -= 1;
                } else {
                    self.error(
                        codes::UNEXPECTED_CHAR,
                        "Unexpected character ']'",
                        pos,
                        "Remove the unmatched `]`",
                    );
                }
            }
            '{' | '}' => {
                self.advance();
                self.error(
                    codes::CURLY_BRACE,
                    format!("Curly brace '{}' is not part of the language", ch),
                    pos,
                    "Group blocks by indenting them under their header line",
                );
            }
            ':' => {
                self.advance();
                self.push(TokenType::Colon, ":", pos);
            }
            ',' => {
                self.advance();
                self.push(TokenType::Comma, ",", pos);
            }
            '+' | '-' | '*' | '/' | '%' => {
                self.advance();
                self.push(TokenType::Op, ch.to_string(), pos);
            }
            '=' | '<' | '>' => self.read_operator(),
            '!' => {
                if self.peek_at(1) == '=' {
                    self.read_operator();
                } else {
                    self.advance();
                    self.error(
                        codes::UNEXPECTED_CHAR,
                        "Unexpected character '!'",
                        pos,
                        "Use `not` to negate a condition or `!=` for inequality",
                    );
                }
            }
            _ => {
                self.advance();
                self.error(
                    codes::UNEXPECTED_CHAR,
                    format!("Unexpected character {:?}", ch),
                    pos,
                    "Remove this character",
                );
            }
        }
    }

    fn read_operator(&mut self) {
        let pos = self.pos();
        let ch = self.advance();
        let mut value = ch.to_string();
        if self.peek() == '=' {
            value.push(self.advance());
        }
        self.push(TokenType::Op, value, pos);
    }

    fn read_identifier(&mut self) {
        let pos = self.pos();
        let mut text = String::new();
        text.push(self.advance());
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(self.advance());
            } else {
                break;
            }
        }
        if self.peek() == '?' {
            text.push(self.advance());
        }
        while self.peek() == '-' && self.peek_at(1).is_ascii_alphabetic() {
            let mut offset = 1;
            let mut suffix = String::new();
            while self.peek_at(offset).is_ascii_alphanumeric() || self.peek_at(offset) == '_' {
                suffix.push(self.peek_at(offset));
                offset += 1;
            }
            let glued = format!("{}-{}", text, suffix).to_lowercase();
            if !self.keywords.contains(glued.as_str()) {
                break;
            }
            for _ in 0..offset {
                self.advance();
            }
            text = glued;
        }
        let lowered = text.to_lowercase();
        if self.keywords.contains(lowered.as_str()) {
            self.push(TokenType::Keyword, lowered, pos);
        } else {
            self.push(TokenType::Ident, text, pos);
        }
    }

    fn read_number(&mut self) {
        let pos = self.pos();
        let mut text = String::new();
        text.push(self.advance());
        let mut seen_dot = false;
        while !self.at_end() {
            let ch = self.peek();
            if ch.is_ascii_digit() {
                text.push(self.advance());
                continue;
            }
            if ch == '.' && !seen_dot && self.peek_at(1).is_ascii_digit() {
                seen_dot = true;
                text.push(self.advance());
                continue;
            }
            break;
        }
        self.push(TokenType::Number, text, pos);
    }

    fn read_string(&mut self, quote: char) {
        let pos = self.pos();
        self.advance();
        let mut out = String::new();
        while !self.at_end() && self.peek() != '\n' {
            let ch = self.advance();
            if ch == quote {
                self.push(TokenType::String, out, pos);
                return;
            }
            if ch == '\\' {
                if self.at_end() || self.peek() == '\n' {
                    break;
                }
                let esc = self.advance();
                out.push(match esc {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    other => other,
                });
                continue;
            }
            out.push(ch);
        }
        self.error(
            codes::UNTERMINATED_STRING,
            "Unterminated string literal",
            pos,
            format!("Close the text with {} before the end of the line", quote),
        );
        self.push(TokenType::String, out, pos);
    }

    /// A `-` directly followed by a digit starts a negative literal unless it
    /// follows something that ends a value (then it is subtraction).
    fn negative_number_ahead(&self) -> bool {
        if !self.peek_at(1).is_ascii_digit() {
            return false;
        }
        match self.tokens.last() {
            Some(prev) => !prev.ends_value() && !self.after_word_reporter(),
            None => true,
        }
    }

    /// True when the last tokens spell a word-only reporter (`x position`)
    /// that is not also the lead-in of a slot (`point in direction`).
    fn after_word_reporter(&self) -> bool {
        self.word_reporters.iter().any(|words| self.ends_with_words(words))
            && !self.lead_ins.iter().any(|words| self.ends_with_words(words))
    }

    fn ends_with_words(&self, words: &[&str]) -> bool {
        let Some(start) = self.tokens.len().checked_sub(words.len()) else {
            return false;
        };
        self.tokens[start..]
            .iter()
            .zip(words)
            .all(|(token, word)| token.typ == TokenType::Keyword && token.value == *word)
    }

    fn next_non_space_is(&self, expected: char) -> bool {
        let mut offset = 1;
        while matches!(self.peek_at(offset), ' ' | '\t') {
            offset += 1;
        }
        self.peek_at(offset) == expected
    }

    fn push(&mut self, typ: TokenType, value: impl Into<String>, pos: Position) {
        self.tokens.push(Token::new(typ, value, pos));
    }

    fn error(
        &mut self,
        code: &str,
        message: impl Into<String>,
        pos: Position,
        suggestion: impl Into<String>,
    ) {
        self.diagnostics
            .push(Diagnostic::error(code, message, pos).with_suggestion(suggestion));
    }

    fn at_end(&self) -> bool {
        self.index >= self.chars.len()
    }

    fn peek(&self) -> char {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> char {
        self.chars.get(self.index + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let Some(&ch) = self.chars.get(self.index) else {
            return '\0';
        };
        self.index += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    fn pos(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

fn is_ignorable_format_char(ch: char) -> bool {
    matches!(
        ch,
        '\u{feff}' // BOM / zero width no-break space
            | '\u{200b}' // zero width space
            | '\u{200c}' // zero width non-joiner
            | '\u{200d}' // zero width joiner
            | '\u{2060}' // word joiner
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenType> {
        tokenize(source).0.into_iter().map(|t| t.typ).collect()
    }

    fn count(tokens: &[Token], typ: TokenType) -> usize {
        tokens.iter().filter(|t| t.typ == typ).count()
    }

    #[test]
    fn indentation_is_balanced() {
        let source = "when flag clicked\n    repeat 3\n        move 10\n    say \"hi\"\n";
        let (tokens, diagnostics) = tokenize(source);
        assert!(diagnostics.is_empty());
        assert_eq!(count(&tokens, TokenType::Indent), 2);
        assert_eq!(count(&tokens, TokenType::Dedent), 2);
        assert_eq!(tokens.last().map(|t| t.typ), Some(TokenType::Eof));
    }

    #[test]
    fn eof_flushes_open_levels() {
        let (tokens, _) = tokenize("when flag clicked\n  forever\n    move 1");
        assert_eq!(count(&tokens, TokenType::Indent), 2);
        assert_eq!(count(&tokens, TokenType::Dedent), 2);
        let tail = tokens[tokens.len() - 4..]
            .iter()
            .map(|t| t.typ)
            .collect::<Vec<_>>();
        assert_eq!(
            tail,
            vec![
                TokenType::Newline,
                TokenType::Dedent,
                TokenType::Dedent,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn blank_and_comment_lines_do_not_touch_indentation() {
        let source = "when flag clicked\n    move 1\n\n# note\n        \n    move 2\n";
        let (tokens, diagnostics) = tokenize(source);
        assert!(diagnostics.is_empty());
        assert_eq!(count(&tokens, TokenType::Indent), 1);
        assert_eq!(count(&tokens, TokenType::Dedent), 1);
        assert_eq!(count(&tokens, TokenType::Newline), 3);
        assert_eq!(count(&tokens, TokenType::Comment), 1);
    }

    #[test]
    fn tabs_count_as_four_spaces() {
        let (tokens, diagnostics) = tokenize("when flag clicked\n\tmove 1\n    move 2\n");
        assert!(diagnostics.is_empty());
        assert_eq!(count(&tokens, TokenType::Indent), 1);
    }

    #[test]
    fn inconsistent_indentation_is_reported() {
        let source = "when flag clicked\n    repeat 2\n        move 1\n      move 2\n";
        let (tokens, diagnostics) = tokenize(source);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::INCONSISTENT_INDENT);
        assert_eq!(diagnostics[0].line, 4);
        assert_eq!(
            count(&tokens, TokenType::Indent),
            count(&tokens, TokenType::Dedent)
        );
    }

    #[test]
    fn keywords_are_lowercased() {
        let (tokens, _) = tokenize("WHEN Flag Clicked");
        assert_eq!(tokens[0].typ, TokenType::Keyword);
        assert_eq!(tokens[0].value, "when");
        assert_eq!(tokens[1].value, "flag");
    }

    #[test]
    fn identifiers_keep_case_and_trailing_question_mark() {
        let (tokens, _) = tokenize("Score ready?");
        assert_eq!(tokens[0].typ, TokenType::Ident);
        assert_eq!(tokens[0].value, "Score");
        assert_eq!(tokens[1].value, "ready?");
    }

    #[test]
    fn hyphenated_keyword_is_glued() {
        let (tokens, _) = tokenize("touching mouse-pointer");
        assert_eq!(tokens[1].typ, TokenType::Keyword);
        assert_eq!(tokens[1].value, "mouse-pointer");
        let (tokens, _) = tokenize("a-b");
        assert_eq!(tokens[0].value, "a");
        assert_eq!(tokens[1].value, "-");
    }

    #[test]
    fn negative_numbers_only_in_operand_position() {
        let (tokens, _) = tokenize("change x by -10");
        assert_eq!(tokens[3].typ, TokenType::Number);
        assert_eq!(tokens[3].value, "-10");
        let (tokens, _) = tokenize("score -1");
        assert_eq!(tokens[1].typ, TokenType::Op);
        assert_eq!(tokens[2].value, "1");
    }

    #[test]
    fn minus_after_a_word_reporter_is_subtraction() {
        for source in ["x position -1", "timer -1", "answer -1", "mouse y -1"] {
            let (tokens, _) = tokenize(source);
            let minus = tokens.iter().position(|t| t.value == "-");
            assert!(minus.is_some(), "{}", source);
            assert_eq!(tokens[minus.unwrap() + 1].value, "1");
        }
        let (tokens, _) = tokenize("point in direction -90");
        assert_eq!(tokens[3].typ, TokenType::Number);
        assert_eq!(tokens[3].value, "-90");
    }

    #[test]
    fn strings_accept_both_quotes_and_escapes() {
        let (tokens, diagnostics) = tokenize(r#"say 'it\'s' "a\tb""#);
        assert!(diagnostics.is_empty());
        assert_eq!(tokens[1].value, "it's");
        assert_eq!(tokens[2].value, "a\tb");
    }

    #[test]
    fn unterminated_string_still_emits_token() {
        let (tokens, diagnostics) = tokenize("say \"hello\nmove 1\n");
        assert_eq!(diagnostics[0].code, codes::UNTERMINATED_STRING);
        assert_eq!(tokens[1].typ, TokenType::String);
        assert_eq!(tokens[1].value, "hello");
        assert_eq!(tokens[2].typ, TokenType::Newline);
        assert_eq!(tokens[3].value, "move");
    }

    #[test]
    fn empty_parens_are_reported_and_lexing_finishes() {
        let (tokens, diagnostics) = tokenize("when flag clicked\n    move ()\n");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::EMPTY_PARENS);
        assert!(diagnostics[0].suggestion.is_some());
        assert_eq!(tokens.last().map(|t| t.typ), Some(TokenType::Eof));
        assert_eq!(count(&tokens, TokenType::LParen), 0);
    }

    #[test]
    fn empty_list_brackets_are_tokens() {
        assert_eq!(
            kinds("list items = []"),
            vec![
                TokenType::Keyword,
                TokenType::Ident,
                TokenType::Op,
                TokenType::LBracket,
                TokenType::RBracket,
                TokenType::Newline,
                TokenType::Eof
            ]
        );
    }

    #[test]
    fn non_empty_brackets_are_dropped() {
        let (tokens, diagnostics) = tokenize("list items = [1, 2]");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::SQUARE_BRACKETS);
        assert_eq!(count(&tokens, TokenType::LBracket), 0);
        assert_eq!(count(&tokens, TokenType::RBracket), 0);
        assert_eq!(count(&tokens, TokenType::Number), 2);
    }

    #[test]
    fn curly_braces_and_stray_characters() {
        let (_, diagnostics) = tokenize("when flag clicked {\n    move 1 @\n}");
        let found = diagnostics
            .iter()
            .map(|d| d.code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            found,
            vec![codes::CURLY_BRACE, codes::UNEXPECTED_CHAR, codes::CURLY_BRACE]
        );
    }

    #[test]
    fn double_slash_comments() {
        let (tokens, _) = tokenize("move 1 // forward\n");
        assert_eq!(tokens[2].typ, TokenType::Comment);
        assert_eq!(tokens[2].value, "forward");
    }

    #[test]
    fn two_character_operators_merge() {
        let (tokens, _) = tokenize("a == b != c <= d >= e = f");
        let ops = tokens
            .iter()
            .filter(|t| t.typ == TokenType::Op)
            .map(|t| t.value.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ops, vec!["==", "!=", "<=", ">=", "="]);
    }
}
