use crate::ast::{
    link_chain, Arg, Block, Category, ListDecl, Literal, Position, Program, Script, VariableDecl,
};
use crate::blocks::{self, BlockSpec, Part, Shape};
use crate::diagnostics::{codes, Diagnostic};
use crate::lexer::{Token, TokenType};
use crate::semantic::closest_match;
use std::collections::HashSet;
use thiserror::Error;

/// Combined nesting limit for block bodies and expressions.
pub const MAX_DEPTH: usize = 64;

const TOP_LEVEL_KEYWORDS: &[&str] = &["when", "define", "var", "variable", "list"];

#[derive(Debug, Clone, Error)]
#[error("{message} (line {}, column {})", .pos.line, .pos.column)]
pub struct ParseError {
    pub code: &'static str,
    pub message: String,
    pub pos: Position,
    pub suggestion: Option<String>,
}

impl ParseError {
    fn new(code: &'static str, message: impl Into<String>, pos: Position) -> Self {
        Self {
            code,
            message: message.into(),
            pos,
            suggestion: None,
        }
    }

    fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    fn into_diagnostic(self) -> Diagnostic {
        let diagnostic = Diagnostic::error(self.code, self.message, self.pos);
        match self.suggestion {
            Some(suggestion) => diagnostic.with_suggestion(suggestion),
            None => diagnostic,
        }
    }
}

pub fn parse(tokens: Vec<Token>) -> (Program, Vec<Diagnostic>) {
    Parser::new(tokens).parse()
}

pub struct Parser {
    tokens: Vec<Token>,
    index: usize,
    depth: usize,
    list_names: HashSet<String>,
    last_failed: bool,
    program: Program,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.typ != TokenType::Comment)
            .collect();
        if tokens.last().map(|t| t.typ) != Some(TokenType::Eof) {
            let pos = tokens.last().map(|t| t.pos).unwrap_or(Position::new(1, 1));
            tokens.push(Token {
                typ: TokenType::Eof,
                value: String::new(),
                pos,
            });
        }
        let list_names = declared_list_names(&tokens);
        Self {
            tokens,
            index: 0,
            depth: 0,
            list_names,
            last_failed: false,
            program: Program::default(),
            diagnostics: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Program, Vec<Diagnostic>) {
        loop {
            self.skip_newlines();
            if self.at_end() {
                break;
            }
            match self.current().typ {
                TokenType::Indent => {
                    self.orphan_indent();
                    continue;
                }
                TokenType::Dedent => {
                    self.advance();
                    continue;
                }
                _ => {}
            }
            match self.parse_top_level() {
                Ok(()) => self.last_failed = false,
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                    self.last_failed = true;
                }
            }
        }
        (self.program, self.diagnostics)
    }

    fn parse_top_level(&mut self) -> Result<(), ParseError> {
        let token = self.current().clone();
        if token.typ == TokenType::Keyword {
            match token.value.as_str() {
                "when" => {
                    let hat = self.parse_hat()?;
                    self.program.scripts.push(Script { blocks: vec![hat] });
                    return Ok(());
                }
                "define" => {
                    let definition = self.parse_define()?;
                    self.program.scripts.push(Script {
                        blocks: vec![definition],
                    });
                    return Ok(());
                }
                "var" | "variable" => return self.parse_variable_decl(),
                "list" => return self.parse_list_decl(),
                "else" => return Err(else_without_if(token.pos)),
                _ => {}
            }
        }
        let mut err = ParseError::new(
            codes::TOP_LEVEL_STATEMENT,
            "Statements must be inside a `when` block",
            token.pos,
        )
        .with_suggestion("Indent this line under a header such as `when flag clicked`");
        if token.typ == TokenType::Ident {
            if let Some(keyword) = closest_match(&token.value, TOP_LEVEL_KEYWORDS.iter().copied()) {
                err = err.with_suggestion(format!("Did you mean `{}`?", keyword));
            }
        }
        Err(err)
    }

    fn parse_hat(&mut self) -> Result<Block, ParseError> {
        let pos = self.current().pos;
        let candidates = blocks::hat_candidates().collect::<Vec<_>>();
        let (spec, args) = self.match_candidates(&candidates, true)?;
        let mut hat = Block::new(spec.category, spec.name, args, pos);
        hat.next = link_chain(self.parse_body());
        Ok(hat)
    }

    fn parse_define(&mut self) -> Result<Block, ParseError> {
        let pos = self.advance().pos;
        let name = self.parse_name("Expected a procedure name after `define`")?;
        let mut args = vec![Arg::Text(name)];
        while !self.at_line_end() {
            if self.match_type(TokenType::Comma) {
                continue;
            }
            let wrapped = self.match_type(TokenType::LParen);
            let param = self.parse_name("Expected a parameter name")?;
            if wrapped {
                self.consume_type(TokenType::RParen, "Expected ')' after parameter name")?;
            }
            args.push(Arg::Text(param));
        }
        self.expect_line_end("define")?;
        let mut definition = Block::new(Category::Procedure, "defineFunction", args, pos);
        definition.next = link_chain(self.parse_body());
        Ok(definition)
    }

    fn parse_variable_decl(&mut self) -> Result<(), ParseError> {
        let pos = self.advance().pos;
        let name = self.parse_name("Expected a variable name")?;
        let mut value = Literal::Number(0.0);
        if self.match_op("=") {
            value = self.parse_literal()?;
        }
        self.expect_line_end("var")?;
        self.program
            .declare_variable(VariableDecl { pos, name, value });
        Ok(())
    }

    fn parse_list_decl(&mut self) -> Result<(), ParseError> {
        let pos = self.advance().pos;
        let name = self.parse_name("Expected a list name")?;
        let mut items = Vec::new();
        if self.match_op("=") {
            if self.match_type(TokenType::LBracket) {
                self.consume_type(TokenType::RBracket, "Expected ']' to close the empty list")?;
            } else {
                loop {
                    items.push(self.parse_literal()?);
                    if !self.match_type(TokenType::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect_line_end("list")?;
        self.list_names.insert(name.to_lowercase());
        self.program.declare_list(ListDecl { pos, name, items });
        Ok(())
    }

    fn parse_literal(&mut self) -> Result<Literal, ParseError> {
        let token = self.current().clone();
        match token.typ {
            TokenType::Number => {
                self.advance();
                Ok(Literal::Number(parse_number(&token)?))
            }
            TokenType::String | TokenType::Ident | TokenType::Keyword => {
                self.advance();
                Ok(Literal::Text(token.value))
            }
            _ => Err(self.unexpected("Expected a number or text value")),
        }
    }

    /// Parses the indented block under a header, if there is one.
    fn parse_body(&mut self) -> Vec<Block> {
        if self.check_type(TokenType::Indent) {
            self.parse_sequence()
        } else {
            Vec::new()
        }
    }

    fn parse_sequence(&mut self) -> Vec<Block> {
        let indent = self.advance();
        if self.depth >= MAX_DEPTH {
            self.report(too_deep(indent.pos));
            self.skip_indented_block();
            return Vec::new();
        }
        self.depth += 1;
        let mut sequence = Vec::new();
        loop {
            self.skip_newlines();
            match self.current().typ {
                TokenType::Dedent => {
                    self.advance();
                    break;
                }
                TokenType::Eof => break,
                TokenType::Indent => {
                    self.orphan_indent();
                    continue;
                }
                _ => {}
            }
            match self.parse_statement() {
                Ok(block) => {
                    sequence.push(block);
                    self.last_failed = false;
                }
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                    self.last_failed = true;
                }
            }
        }
        self.depth -= 1;
        sequence
    }

    /// Indented lines nothing can own. They are parsed so later lines stay in
    /// step, then dropped. Lines under a header that already failed are not
    /// reported a second time.
    fn orphan_indent(&mut self) {
        let pos = self.current().pos;
        let header_failed = self.last_failed;
        let _ = self.parse_sequence();
        if !header_failed {
            self.diagnostics.push(
                Diagnostic::error(codes::UNEXPECTED_INDENT, "Unexpected indentation", pos)
                    .with_suggestion(
                        "Only `when`, `define`, `repeat`, `forever`, `if` and `else` lines can own an indented body",
                    ),
            );
        }
        self.last_failed = header_failed;
    }

    fn skip_indented_block(&mut self) {
        let mut open = 1usize;
        while !self.at_end() && open > 0 {
            match self.advance().typ {
                TokenType::Indent => open += 1,
                TokenType::Dedent => open -= 1,
                _ => {}
            }
        }
    }

    fn parse_statement(&mut self) -> Result<Block, ParseError> {
        let token = self.current().clone();
        match token.typ {
            TokenType::Keyword => self.parse_keyword_statement(token),
            TokenType::Ident => {
                if self.peek_is_op("=") {
                    return self.parse_assignment();
                }
                self.parse_call(token.pos)
            }
            _ => Err(ParseError::new(
                codes::UNKNOWN_STATEMENT,
                format!("Expected a block, found {}", describe(&token)),
                token.pos,
            )
            .with_suggestion("Start the line with a block such as `move 10` or `say \"hi\"`")),
        }
    }

    fn parse_keyword_statement(&mut self, token: Token) -> Result<Block, ParseError> {
        match token.value.as_str() {
            "else" => return Err(else_without_if(token.pos)),
            "call" => {
                self.advance();
                return self.parse_call(token.pos);
            }
            word if TOP_LEVEL_KEYWORDS.contains(&word) => {
                return Err(ParseError::new(
                    codes::UNEXPECTED_TOKEN,
                    format!("`{}` can only start a line at the top level", word),
                    token.pos,
                )
                .with_suggestion("Move this line to column 1, outside any script"));
            }
            _ => {}
        }

        let candidates = blocks::statement_candidates(&token.value).collect::<Vec<_>>();
        if candidates.is_empty() {
            if self.peek_is_op("=") {
                return self.parse_assignment();
            }
            return self.parse_call(token.pos);
        }
        let start = self.index;
        let (spec, args) = match self.match_candidates(&candidates, true) {
            Ok(matched) => matched,
            Err(err) => {
                self.index = start;
                if self.peek_is_op("=") {
                    return self.parse_assignment();
                }
                return Err(err);
            }
        };
        let mut block = Block::new(spec.category, spec.name, args, token.pos);
        if spec.kind == blocks::BlockKind::CBlock {
            block.body = link_chain(self.parse_body());
        }
        if spec.name == "if" && self.check_keyword("else") {
            self.parse_else(&mut block);
        }
        Ok(block)
    }

    fn parse_else(&mut self, block: &mut Block) {
        self.advance();
        block.name = "ifElse";
        if self.check_keyword("if") {
            match self.parse_statement() {
                Ok(nested) => block.else_body = Some(Box::new(nested)),
                Err(err) => {
                    self.report(err);
                    self.synchronize();
                    self.last_failed = true;
                }
            }
            return;
        }
        if let Err(err) = self.expect_line_end("else") {
            self.report(err);
            self.synchronize();
        }
        block.else_body = link_chain(self.parse_body());
    }

    fn parse_assignment(&mut self) -> Result<Block, ParseError> {
        let target = self.advance();
        self.advance();
        let value = self.parse_slot(Shape::Any, &[])?;
        self.expect_line_end(&target.value)?;
        Ok(Block::new(
            Category::Variable,
            "setVariable",
            vec![Arg::Var(target.value), value],
            target.pos,
        ))
    }

    fn parse_call(&mut self, pos: Position) -> Result<Block, ParseError> {
        let name = self.parse_name("Expected a procedure name after `call`")?;
        let mut args = vec![Arg::Text(name.clone())];
        while !self.at_line_end() {
            if self.match_type(TokenType::Comma) {
                continue;
            }
            args.push(self.parse_expression(0, &[])?);
        }
        self.expect_line_end(&name)?;
        Ok(Block::new(Category::Custom, "call", args, pos))
    }

    /// Tries each candidate from the same starting token and keeps the first
    /// full match. On failure the error from the candidate that got furthest
    /// is returned.
    fn match_candidates(
        &mut self,
        candidates: &[&'static BlockSpec],
        whole_line: bool,
    ) -> Result<(&'static BlockSpec, Vec<Arg>), ParseError> {
        let start = self.index;
        let mut furthest: Option<(usize, ParseError)> = None;
        for &spec in candidates {
            self.index = start;
            let attempt = self.match_spec(spec).and_then(|args| {
                if whole_line {
                    self.expect_line_end(&spec.display_name())?;
                }
                Ok(args)
            });
            match attempt {
                Ok(args) => return Ok((spec, args)),
                Err(err) => {
                    let reached = self.index;
                    if furthest.as_ref().map(|(at, _)| reached > *at).unwrap_or(true) {
                        furthest = Some((reached, err));
                    }
                }
            }
        }
        match furthest {
            Some((reached, err)) => {
                self.index = reached;
                Err(err)
            }
            None => Err(self.unexpected("Expected a block")),
        }
    }

    fn match_spec(&mut self, spec: &BlockSpec) -> Result<Vec<Arg>, ParseError> {
        let parts = spec.parts();
        let mut args = Vec::new();
        for (i, part) in parts.iter().enumerate() {
            match part {
                Part::Word(word) => {
                    if !self.check_word(word) {
                        return Err(self.unexpected(format!(
                            "Expected '{}' in `{}`",
                            word,
                            spec.display_name()
                        )));
                    }
                    self.advance();
                }
                Part::Colon => {
                    self.match_type(TokenType::Colon);
                }
                Part::Optional(word) => {
                    if self.check_word(word) {
                        self.advance();
                    }
                }
                Part::Slot(shape) => {
                    let run = following_words(&parts[i + 1..]);
                    args.push(self.parse_slot(*shape, &run)?);
                }
            }
        }
        Ok(args)
    }

    fn parse_slot(&mut self, shape: Shape, run: &[&'static str]) -> Result<Arg, ParseError> {
        if self.slot_is_empty(run) {
            return Ok(Arg::Missing);
        }
        let token = self.current().clone();
        match shape {
            Shape::Variable => {
                let name = self.parse_name("Expected a variable name")?;
                Ok(Arg::Var(name))
            }
            Shape::List => {
                let name = self.parse_name("Expected a list name")?;
                Ok(Arg::List(name))
            }
            Shape::Message | Shape::TouchTarget if token.is_word() || token.typ == TokenType::String => {
                self.advance();
                Ok(Arg::Text(token.value))
            }
            Shape::Key => {
                if !(token.is_word() || matches!(token.typ, TokenType::String | TokenType::Number)) {
                    return Err(self.unexpected("Expected a key name"));
                }
                self.advance();
                let mut key = token.value.to_lowercase();
                if matches!(key.as_str(), "up" | "down" | "left" | "right") && self.check_word("arrow") {
                    self.advance();
                    key.push_str(" arrow");
                }
                Ok(Arg::Text(key))
            }
            Shape::StopOption => {
                let mut words = Vec::new();
                while self.current().is_word() {
                    words.push(self.advance().value.to_lowercase());
                }
                if words.is_empty() {
                    return Err(self.unexpected("Expected `all`, `this script` or `other scripts`"));
                }
                Ok(Arg::Text(words.join(" ")))
            }
            _ => self.parse_expression(0, run),
        }
    }

    /// A slot is empty at end of line or when the words that follow it in
    /// the template (such as a `y:` label) come next.
    fn slot_is_empty(&self, run: &[&'static str]) -> bool {
        self.at_line_end() || self.check_type(TokenType::Colon) || self.at_run(run)
    }

    fn at_run(&self, run: &[&'static str]) -> bool {
        !run.is_empty()
            && run.iter().enumerate().all(|(offset, word)| {
                self.tokens
                    .get(self.index + offset)
                    .map(|t| token_is_word(t, word))
                    .unwrap_or(false)
            })
    }

    fn parse_expression(&mut self, min_precedence: u8, run: &[&'static str]) -> Result<Arg, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(too_deep(self.current().pos));
        }
        self.depth += 1;
        let result = self.parse_binary(min_precedence, run);
        self.depth -= 1;
        result
    }

    fn parse_binary(&mut self, min_precedence: u8, run: &[&'static str]) -> Result<Arg, ParseError> {
        let mut left = self.parse_unary(run)?;
        loop {
            if self.at_run(run) {
                break;
            }
            let token = self.current().clone();
            let Some((precedence, name)) = binary_operator(&token) else {
                break;
            };
            if precedence < min_precedence {
                break;
            }
            self.advance();
            let right = self.parse_expression(precedence + 1, run)?;
            left = operator_block(name, vec![left, right], token.pos);
        }
        Ok(left)
    }

    fn parse_unary(&mut self, run: &[&'static str]) -> Result<Arg, ParseError> {
        let token = self.current().clone();
        if token.typ == TokenType::Op && token.value == "-" {
            if self.depth >= MAX_DEPTH {
                return Err(too_deep(token.pos));
            }
            self.advance();
            self.depth += 1;
            let operand = self.parse_unary(run);
            self.depth -= 1;
            let operand = operand?;
            return Ok(match operand {
                Arg::Number(value) => Arg::Number(-value),
                other => operator_block("negate", vec![other], token.pos),
            });
        }
        if token.typ == TokenType::Keyword && token.value == "not" {
            self.advance();
            let operand = self.parse_expression(COMPARISON_PRECEDENCE, run)?;
            return Ok(operator_block("not", vec![operand], token.pos));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Arg, ParseError> {
        let token = self.current().clone();
        match token.typ {
            TokenType::Number => {
                self.advance();
                Ok(Arg::Number(parse_number(&token)?))
            }
            TokenType::String => {
                self.advance();
                Ok(Arg::Text(token.value))
            }
            TokenType::LParen => {
                self.advance();
                let inner = self.parse_expression(0, &[])?;
                self.consume_type(TokenType::RParen, "Expected ')' after expression")?;
                Ok(inner)
            }
            TokenType::LBracket => {
                self.advance();
                self.consume_type(TokenType::RBracket, "Expected ']' to close the empty list")?;
                Ok(Arg::ListLiteral(Vec::new()))
            }
            TokenType::Keyword if binary_operator(&token).is_some() => {
                Err(self.unexpected("Expected a value"))
            }
            TokenType::Keyword => {
                if let Some(reporter) = self.parse_reporter(&token)? {
                    return Ok(reporter);
                }
                self.advance();
                Ok(self.reference(token.value))
            }
            TokenType::Ident => {
                self.advance();
                Ok(self.reference(token.value))
            }
            _ => Err(self.unexpected("Expected a value")),
        }
    }

    /// Matches reporter blocks led by `token`. A keyword whose reporter forms
    /// all fail on their second word reads as a plain variable instead, so
    /// `x` alone is a variable while `x position` is the reporter.
    fn parse_reporter(&mut self, token: &Token) -> Result<Option<Arg>, ParseError> {
        let candidates = blocks::reporter_candidates(&token.value).collect::<Vec<_>>();
        if candidates.is_empty() {
            return Ok(None);
        }
        let start = self.index;
        match self.match_candidates(&candidates, false) {
            Ok((spec, args)) => Ok(Some(Arg::Block(Box::new(Block::new(
                spec.category,
                spec.name,
                args,
                token.pos,
            ))))),
            Err(err) => {
                if self.index > start + 1 {
                    return Err(err);
                }
                self.index = start;
                Ok(None)
            }
        }
    }

    fn reference(&self, name: String) -> Arg {
        if self.list_names.contains(&name.to_lowercase()) {
            Arg::List(name)
        } else {
            Arg::Var(name)
        }
    }

    fn parse_name(&mut self, message: &str) -> Result<String, ParseError> {
        let token = self.current().clone();
        if token.is_word() || token.typ == TokenType::String {
            self.advance();
            Ok(token.value)
        } else {
            Err(self.unexpected(message))
        }
    }

    fn expect_line_end(&mut self, after: &str) -> Result<(), ParseError> {
        if self.check_type(TokenType::Colon)
            && matches!(self.peek().typ, TokenType::Newline | TokenType::Eof)
        {
            self.advance();
        }
        match self.current().typ {
            TokenType::Newline => {
                self.advance();
                Ok(())
            }
            TokenType::Eof | TokenType::Dedent => Ok(()),
            _ => {
                let token = self.current().clone();
                Err(ParseError::new(
                    codes::UNEXPECTED_TOKEN,
                    format!("Unexpected {} after `{}`", describe(&token), after),
                    token.pos,
                ))
            }
        }
    }

    fn at_line_end(&self) -> bool {
        match self.current().typ {
            TokenType::Newline | TokenType::Eof | TokenType::Dedent => true,
            TokenType::Colon => matches!(self.peek().typ, TokenType::Newline | TokenType::Eof),
            _ => false,
        }
    }

    /// Skips the rest of the current line.
    fn synchronize(&mut self) {
        while !matches!(
            self.current().typ,
            TokenType::Newline | TokenType::Eof | TokenType::Dedent | TokenType::Indent
        ) {
            self.advance();
        }
        if self.check_type(TokenType::Newline) {
            self.advance();
        }
    }

    fn report(&mut self, err: ParseError) {
        self.diagnostics.push(err.into_diagnostic());
    }

    fn unexpected(&self, message: impl Into<String>) -> ParseError {
        let token = self.current();
        ParseError::new(
            codes::UNEXPECTED_TOKEN,
            format!("{}, found {}", message.into(), describe(token)),
            token.pos,
        )
    }

    fn check_word(&self, word: &str) -> bool {
        token_is_word(self.current(), word)
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        let token = self.current();
        token.typ == TokenType::Keyword && token.value == keyword
    }

    fn peek_is_op(&self, op: &str) -> bool {
        let token = self.peek();
        token.typ == TokenType::Op && token.value == op
    }

    fn match_op(&mut self, op: &str) -> bool {
        let token = self.current();
        if token.typ == TokenType::Op && token.value == op {
            self.advance();
            return true;
        }
        false
    }

    fn consume_type(&mut self, typ: TokenType, message: &str) -> Result<Token, ParseError> {
        if self.check_type(typ) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(message))
        }
    }

    fn match_type(&mut self, typ: TokenType) -> bool {
        if self.check_type(typ) {
            self.advance();
            return true;
        }
        false
    }

    fn check_type(&self, typ: TokenType) -> bool {
        self.current().typ == typ
    }

    fn skip_newlines(&mut self) {
        while self.check_type(TokenType::Newline) {
            self.advance();
        }
    }

    fn at_end(&self) -> bool {
        self.current().typ == TokenType::Eof
    }

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.index.min(last)]
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.index + 1).min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }
}

const COMPARISON_PRECEDENCE: u8 = 4;

fn binary_operator(token: &Token) -> Option<(u8, &'static str)> {
    let op = match token.typ {
        TokenType::Op => token.value.as_str(),
        TokenType::Keyword if matches!(token.value.as_str(), "and" | "or" | "mod" | "contains") => {
            token.value.as_str()
        }
        _ => return None,
    };
    Some(match op {
        "=" => (1, "assign"),
        "or" => (2, "or"),
        "and" => (3, "and"),
        "==" => (COMPARISON_PRECEDENCE, "equals"),
        "!=" => (COMPARISON_PRECEDENCE, "notEquals"),
        "<" => (COMPARISON_PRECEDENCE, "lessThan"),
        "<=" => (COMPARISON_PRECEDENCE, "lessOrEqual"),
        ">" => (COMPARISON_PRECEDENCE, "greaterThan"),
        ">=" => (COMPARISON_PRECEDENCE, "greaterOrEqual"),
        "contains" => (COMPARISON_PRECEDENCE, "contains"),
        "+" => (5, "add"),
        "-" => (5, "subtract"),
        "*" => (6, "multiply"),
        "/" => (6, "divide"),
        "%" | "mod" => (6, "mod"),
        _ => return None,
    })
}

fn operator_block(name: &'static str, args: Vec<Arg>, pos: Position) -> Arg {
    Arg::Block(Box::new(Block::new(Category::Operator, name, args, pos)))
}

fn following_words(parts: &[Part]) -> Vec<&'static str> {
    let mut words = Vec::new();
    for part in parts {
        match part {
            Part::Word(word) | Part::Optional(word) => words.push(*word),
            Part::Colon => {}
            Part::Slot(_) => break,
        }
    }
    words
}

fn token_is_word(token: &Token, word: &str) -> bool {
    match token.typ {
        TokenType::Keyword | TokenType::Ident => {
            let value = token.value.strip_suffix('?').unwrap_or(&token.value);
            value.eq_ignore_ascii_case(word)
        }
        TokenType::Op => token.value == word,
        _ => false,
    }
}

fn parse_number(token: &Token) -> Result<f64, ParseError> {
    token.value.parse::<f64>().map_err(|_| {
        ParseError::new(
            codes::UNEXPECTED_TOKEN,
            format!("Invalid number '{}'", token.value),
            token.pos,
        )
    })
}

fn describe(token: &Token) -> String {
    match token.typ {
        TokenType::Newline => "end of line".to_string(),
        TokenType::Eof => "end of file".to_string(),
        TokenType::Indent => "indentation".to_string(),
        TokenType::Dedent => "end of block".to_string(),
        TokenType::String => format!("\"{}\"", token.value),
        _ => format!("'{}'", token.value),
    }
}

fn else_without_if(pos: Position) -> ParseError {
    ParseError::new(
        codes::ELSE_WITHOUT_IF,
        "`else` without a matching `if`",
        pos,
    )
    .with_suggestion("Put `else` at the same indentation as the `if` it belongs to")
}

fn too_deep(pos: Position) -> ParseError {
    ParseError::new(
        codes::TOO_DEEP,
        format!("Nesting is deeper than {} levels", MAX_DEPTH),
        pos,
    )
    .with_suggestion("Move part of this into a `define` procedure")
}

/// Names declared with `list` anywhere in the file, so references before the
/// declaration still resolve to the list.
fn declared_list_names(tokens: &[Token]) -> HashSet<String> {
    let mut names = HashSet::new();
    for (i, token) in tokens.iter().enumerate() {
        let line_start = i == 0
            || matches!(
                tokens[i - 1].typ,
                TokenType::Newline | TokenType::Indent | TokenType::Dedent
            );
        if line_start && token.typ == TokenType::Keyword && token.value == "list" {
            if let Some(name) = tokens.get(i + 1) {
                if name.is_word() || name.typ == TokenType::String {
                    names.insert(name.value.to_lowercase());
                }
            }
        }
    }
    names
}
