use crate::ast::{Arg, Block, Category, Position, Program};
use crate::blocks::{self, BlockKind, BlockSpec, Shape, ValueKind};
use crate::diagnostics::{codes, Diagnostic};
use regex::Regex;
use std::collections::{HashMap, HashSet};

const PLACEHOLDER_PATTERN: &str =
    r"(?i)<\s*(value|number|text|condition|boolean|reporter|list)\s*>";

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureInfo {
    pub name: String,
    pub params: Vec<String>,
    pub pos: Position,
}

/// Procedures of one sprite keyed by lowercased name.
pub type ProcedureTable = HashMap<String, ProcedureInfo>;

/// Variable and list names visible to a sprite, lowercased.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub variables: HashSet<String>,
    pub lists: HashSet<String>,
}

impl Scope {
    pub fn from_programs<'a>(programs: impl IntoIterator<Item = &'a Program>) -> Self {
        let mut scope = Scope::default();
        for program in programs {
            for decl in &program.variables {
                scope.variables.insert(decl.name.to_lowercase());
            }
            for decl in &program.lists {
                scope.lists.insert(decl.name.to_lowercase());
            }
        }
        scope
    }
}

#[derive(Debug, Clone)]
pub struct SpriteContext<'a> {
    pub name: &'a str,
    pub is_stage: bool,
    pub costume_names: Option<&'a [String]>,
    pub sound_names: Option<&'a [String]>,
    pub scope: &'a Scope,
}

/// Reports unfilled editor placeholders such as `<number>` in raw source.
pub fn scan_placeholders(source: &str) -> Result<Vec<Diagnostic>, regex::Error> {
    let placeholder_re = Regex::new(PLACEHOLDER_PATTERN)?;
    let mut diagnostics = Vec::new();
    for (line_index, line) in source.lines().enumerate() {
        for found in placeholder_re.captures_iter(line) {
            let (Some(whole), Some(kind)) = (found.get(0), found.get(1)) else {
                continue;
            };
            let column = line[..whole.start()].chars().count() + 1;
            let kind = kind.as_str().to_lowercase();
            let wanted = match kind.as_str() {
                "number" => "a number",
                "text" => "some text",
                "condition" | "boolean" => "a condition",
                "list" => "a list name",
                _ => "a value",
            };
            diagnostics.push(
                Diagnostic::error(
                    codes::PLACEHOLDER,
                    format!("Unfilled placeholder `{}`", whole.as_str()),
                    Position::new(line_index + 1, column),
                )
                .with_suggestion(format!("Replace `{}` with {}", whole.as_str(), wanted)),
            );
        }
    }
    Ok(diagnostics)
}

pub fn collect_procedures(program: &Program) -> (ProcedureTable, Vec<Diagnostic>) {
    let mut table = ProcedureTable::new();
    let mut diagnostics = Vec::new();
    for block in program.top_blocks() {
        if block.name != "defineFunction" {
            continue;
        }
        let Some(name) = block.procedure_name() else {
            continue;
        };
        let mut params = Vec::new();
        let mut seen = HashSet::new();
        for param in block.args.iter().skip(1).filter_map(Arg::as_text) {
            if !seen.insert(param.to_lowercase()) {
                diagnostics.push(
                    Diagnostic::error(
                        codes::DUPLICATE_PARAMETER,
                        format!("Parameter '{}' appears twice in procedure '{}'", param, name),
                        block.pos,
                    )
                    .with_suggestion("Give each parameter a different name"),
                );
                continue;
            }
            params.push(param.to_string());
        }
        let lowered = name.to_lowercase();
        if let Some(previous) = table.get(&lowered) {
            diagnostics.push(
                Diagnostic::error(
                    codes::DUPLICATE_PROCEDURE,
                    format!(
                        "Procedure '{}' is already defined at line {}",
                        name, previous.pos.line
                    ),
                    block.pos,
                )
                .with_suggestion("Rename one of the procedures or remove the duplicate"),
            );
            continue;
        }
        table.insert(
            lowered,
            ProcedureInfo {
                name: name.to_string(),
                params,
                pos: block.pos,
            },
        );
    }
    (table, diagnostics)
}

pub fn validate(
    program: &Program,
    source: &str,
    procedures: &ProcedureTable,
    sprite: &SpriteContext<'_>,
) -> Vec<Diagnostic> {
    let mut validator = Validator {
        lines: source.lines().collect(),
        procedures,
        sprite,
        params: HashSet::new(),
        diagnostics: Vec::new(),
    };
    for top in program.top_blocks() {
        validator.check_top(top);
    }
    validator.diagnostics
}

/// Reports broadcasts that no sprite listens for. Each program is paired
/// with its sprite name; diagnostics carry that name.
pub fn check_broadcasts(sprites: &[(&str, &Program)]) -> Vec<Diagnostic> {
    let mut received = HashSet::new();
    for (_, program) in sprites {
        for top in program.top_blocks() {
            if top.name == "whenReceived" {
                if let Some(message) = top.args.first().and_then(Arg::as_text) {
                    received.insert(message.to_lowercase());
                }
            }
        }
    }
    let mut diagnostics = Vec::new();
    for (name, program) in sprites {
        for top in program.top_blocks() {
            crate::ast::walk_blocks(top, &mut |block| {
                if block.name != "broadcast" && block.name != "broadcastAndWait" {
                    return;
                }
                let Some(message) = block.args.first().and_then(Arg::as_text) else {
                    return;
                };
                if !received.contains(&message.to_lowercase()) {
                    let mut diagnostic = Diagnostic::info(
                        codes::UNRECEIVED_BROADCAST,
                        format!("No script receives the broadcast '{}'", message),
                        block.pos,
                    )
                    .with_suggestion(format!("Add `when I receive {}` to a sprite", message));
                    diagnostic.sprite = Some(name.to_string());
                    diagnostics.push(diagnostic);
                }
            });
        }
    }
    diagnostics
}

struct Validator<'a> {
    lines: Vec<&'a str>,
    procedures: &'a ProcedureTable,
    sprite: &'a SpriteContext<'a>,
    params: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Validator<'a> {
    fn check_top(&mut self, top: &Block) {
        self.params.clear();
        if top.name == "defineFunction" {
            for param in top.args.iter().skip(1).filter_map(Arg::as_text) {
                self.params.insert(param.to_lowercase());
            }
        } else {
            if top.next.is_none() {
                let label = blocks::spec_for(top.name)
                    .map(|spec| spec.display_name())
                    .unwrap_or_else(|| top.name.to_string());
                self.diagnostics.push(Diagnostic::info(
                    codes::EMPTY_SCRIPT,
                    format!("`{}` script has no blocks", label),
                    top.pos,
                ));
            }
            if top.name == "whenKeyPressed" {
                self.check_key(top);
            }
        }
        self.check_sequence(top.next.as_deref());
    }

    fn check_sequence(&mut self, first: Option<&Block>) {
        let Some(first) = first else {
            return;
        };
        for block in first.chain() {
            self.check_statement(block);
            if block.name == "forever" {
                if let Some(after) = block.next.as_deref() {
                    self.diagnostics.push(
                        Diagnostic::warning(
                            codes::UNREACHABLE_AFTER_FOREVER,
                            "Blocks after `forever` never run",
                            after.pos,
                        )
                        .with_suggestion("Move these blocks above the `forever` loop"),
                    );
                    break;
                }
            }
        }
    }

    fn check_statement(&mut self, block: &Block) {
        self.check_stage_motion(block);
        if block.name == "call" {
            self.check_call(block);
            return;
        }
        let Some(spec) = blocks::spec_for(block.name) else {
            self.internal(block);
            return;
        };
        self.check_args(block, spec);
        self.check_assets(block);

        if spec.kind == BlockKind::CBlock {
            if block.body.is_none() {
                self.diagnostics.push(
                    Diagnostic::warning(
                        codes::EMPTY_BODY,
                        format!("`{}` has an empty body", spec.display_name()),
                        block.pos,
                    )
                    .with_suggestion("Indent the blocks that belong inside it"),
                );
            }
            self.check_sequence(block.body.as_deref());
            self.check_sequence(block.else_body.as_deref());
        }
    }

    fn check_args(&mut self, block: &Block, spec: &BlockSpec) {
        let shapes = spec.slots();
        let labels = spec.slot_labels();
        let owner = spec.display_name();
        for (index, arg) in block.args.iter().enumerate() {
            let shape = shapes.get(index).copied().unwrap_or(Shape::Any);
            let label = labels.get(index).copied().flatten();
            self.check_value(block, &owner, shape, label, arg);
        }
    }

    fn check_value(
        &mut self,
        owner_block: &Block,
        owner: &str,
        shape: Shape,
        label: Option<&str>,
        arg: &Arg,
    ) {
        let pos = owner_block.pos;
        match arg {
            Arg::Missing => match (label, shape) {
                (Some(label), _) => self.diagnostics.push(
                    Diagnostic::error(
                        codes::MISSING_COORDINATE,
                        format!("`{}` is missing its {}: value", owner, label),
                        pos,
                    )
                    .with_suggestion(format!("Write a number after `{}:`", label)),
                ),
                (None, Shape::Boolean) => self.requires_condition(owner, pos),
                (None, Shape::Number) => self.requires_number(owner, pos),
                (None, _) => self.diagnostics.push(Diagnostic::error(
                    codes::TYPE_MISMATCH,
                    format!("`{}` requires a value", owner),
                    pos,
                )),
            },
            Arg::Number(_) => {
                if shape == Shape::Boolean {
                    self.requires_condition(owner, pos);
                }
            }
            Arg::Text(text) => match shape {
                Shape::Number if text.trim().parse::<f64>().is_err() => {
                    self.requires_number(owner, pos)
                }
                Shape::Boolean => self.requires_condition(owner, pos),
                Shape::StopOption if !blocks::STOP_OPTIONS.contains(&text.as_str()) => {
                    self.unknown_stop_option(text, pos)
                }
                _ => {}
            },
            Arg::Var(name) => self.check_variable(name, pos),
            Arg::List(name) => self.check_list(name, pos),
            Arg::ListLiteral(_) if shape == Shape::Number => self.requires_number(owner, pos),
            Arg::ListLiteral(_) if shape == Shape::Boolean => self.requires_condition(owner, pos),
            Arg::ListLiteral(items) => {
                for item in items {
                    self.check_value(owner_block, owner, Shape::Any, None, item);
                }
            }
            Arg::Block(reporter) => self.check_reporter(reporter, owner, shape),
        }
    }

    fn unknown_stop_option(&mut self, option: &str, pos: Position) {
        let mut diagnostic = Diagnostic::error(
            codes::TYPE_MISMATCH,
            format!("`stop` cannot stop '{}'", option),
            pos,
        );
        diagnostic = match closest_match(option, blocks::STOP_OPTIONS.iter().copied()) {
            Some(fix) => diagnostic.with_suggestion(format!("Did you mean `stop {}`?", fix)),
            None => diagnostic.with_suggestion("Use `stop all`, `stop this script` or `stop other scripts`"),
        };
        self.diagnostics.push(diagnostic);
    }

    fn check_reporter(&mut self, reporter: &Block, owner: &str, shape: Shape) {
        self.check_stage_motion(reporter);
        if reporter.name == "assign" {
            self.diagnostics.push(
                Diagnostic::error(
                    codes::ASSIGN_IN_EXPRESSION,
                    "`=` cannot be used inside an expression",
                    reporter.pos,
                )
                .with_suggestion(
                    "Use `==` to compare values, or put `name = value` on its own line",
                ),
            );
            return;
        }
        let Some(spec) = blocks::spec_for(reporter.name) else {
            self.internal(reporter);
            return;
        };
        match (shape, spec.output()) {
            (Shape::Number, Some(ValueKind::Boolean)) => self.requires_number(owner, reporter.pos),
            (Shape::Boolean, Some(ValueKind::Number | ValueKind::Text)) => {
                self.requires_condition(owner, reporter.pos)
            }
            _ => {}
        }
        if reporter.name == "keyPressed" {
            self.check_key(reporter);
        }
        self.check_args(reporter, spec);
    }

    fn check_call(&mut self, block: &Block) {
        let Some(name) = block.procedure_name() else {
            self.internal(block);
            return;
        };
        let supplied = block.args.len().saturating_sub(1);
        match self.procedures.get(&name.to_lowercase()) {
            Some(info) => {
                if info.params.len() != supplied {
                    self.diagnostics.push(
                        Diagnostic::error(
                            codes::ARITY_MISMATCH,
                            format!(
                                "Procedure '{}' expects {} argument{} but got {}",
                                info.name,
                                info.params.len(),
                                if info.params.len() == 1 { "" } else { "s" },
                                supplied
                            ),
                            block.pos,
                        )
                        .with_suggestion(format!(
                            "Call it as `{}{}`",
                            info.name,
                            info.params
                                .iter()
                                .map(|p| format!(" {}", p))
                                .collect::<String>()
                        )),
                    );
                }
                for arg in block.args.iter().skip(1) {
                    self.check_value(block, name, Shape::Any, None, arg);
                }
            }
            None => self.unknown_block(block, name),
        }
    }

    fn unknown_block(&mut self, block: &Block, name: &str) {
        let procedures = self.procedures;
        let mut candidates: Vec<&str> = blocks::statement_keywords();
        candidates.extend(procedures.values().map(|info| info.name.as_str()));
        if let Some(fix) = closest_match(name, candidates) {
            let mut diagnostic = Diagnostic::error(
                codes::UNKNOWN_BLOCK,
                format!("Unknown block '{}'. Did you mean '{}'?", name, fix),
                block.pos,
            );
            if let Some(line) = self.lines.get(block.pos.line.saturating_sub(1)) {
                diagnostic = diagnostic.with_suggestion(line.trim().replacen(name, fix, 1));
            }
            self.diagnostics.push(diagnostic);
        } else {
            self.diagnostics.push(
                Diagnostic::error(
                    codes::UNKNOWN_PROCEDURE,
                    format!("Unknown procedure '{}'", name),
                    block.pos,
                )
                .with_suggestion(format!(
                    "Define it with `define {}` or check the spelling",
                    name
                )),
            );
        }
    }

    fn check_variable(&mut self, name: &str, pos: Position) {
        let lowered = name.to_lowercase();
        if self.params.contains(&lowered) || self.sprite.scope.variables.contains(&lowered) {
            return;
        }
        let suggestion = if let Some(reporter) = blocks::reporter_candidates(&lowered).next() {
            format!("Did you mean the `{}` reporter?", reporter.display_name())
        } else {
            let known = self
                .sprite
                .scope
                .variables
                .iter()
                .chain(self.params.iter())
                .map(String::as_str);
            match closest_match(&lowered, known) {
                Some(fix) => format!("Did you mean '{}'?", fix),
                None => format!(
                    "Declare it with `var {}` or put text in quotes: \"{}\"",
                    name, name
                ),
            }
        };
        self.diagnostics.push(
            Diagnostic::error(
                codes::UNKNOWN_VARIABLE,
                format!("Unknown variable '{}'", name),
                pos,
            )
            .with_suggestion(suggestion),
        );
    }

    fn check_list(&mut self, name: &str, pos: Position) {
        let lowered = name.to_lowercase();
        if self.sprite.scope.lists.contains(&lowered) {
            return;
        }
        let suggestion = match closest_match(&lowered, self.sprite.scope.lists.iter().map(String::as_str)) {
            Some(fix) => format!("Did you mean '{}'?", fix),
            None => format!("Declare it with `list {}`", name),
        };
        self.diagnostics.push(
            Diagnostic::error(codes::UNKNOWN_LIST, format!("Unknown list '{}'", name), pos)
                .with_suggestion(suggestion),
        );
    }

    fn check_key(&mut self, block: &Block) {
        let Some(key) = block.args.first().and_then(Arg::as_text) else {
            return;
        };
        if blocks::is_known_key(key) {
            return;
        }
        let suggestion = match closest_match(key, blocks::KEY_NAMES.iter().copied()) {
            Some(fix) => format!("Did you mean '{}'?", fix),
            None => "Use space, enter, any, an arrow key, a letter or a digit".to_string(),
        };
        self.diagnostics.push(
            Diagnostic::error(codes::UNKNOWN_KEY, format!("Unknown key '{}'", key), block.pos)
                .with_suggestion(suggestion),
        );
    }

    fn check_assets(&mut self, block: &Block) {
        let (declared, code, kind) = match block.name {
            "switchCostume" | "switchBackdrop" => {
                (self.sprite.costume_names, codes::UNKNOWN_COSTUME, "Costume")
            }
            "playSound" | "playSoundUntilDone" => {
                (self.sprite.sound_names, codes::UNKNOWN_SOUND, "Sound")
            }
            _ => return,
        };
        let (Some(declared), Some(target)) = (declared, block.args.first().and_then(Arg::as_text))
        else {
            return;
        };
        if declared.iter().any(|name| name.eq_ignore_ascii_case(target)) {
            return;
        }
        let suggestion = match closest_match(target, declared.iter().map(String::as_str)) {
            Some(fix) => format!("Did you mean '{}'?", fix),
            None if declared.is_empty() => format!("Sprite '{}' declares none", self.sprite.name),
            None => format!("Available: {}", declared.join(", ")),
        };
        self.diagnostics.push(
            Diagnostic::warning(
                code,
                format!("{} '{}' is not declared for '{}'", kind, target, self.sprite.name),
                block.pos,
            )
            .with_suggestion(suggestion),
        );
    }

    fn check_stage_motion(&mut self, block: &Block) {
        if self.sprite.is_stage && block.category == Category::Motion {
            self.diagnostics.push(
                Diagnostic::error(
                    codes::STAGE_MOTION,
                    "Motion blocks are not allowed on the Stage: the Stage cannot move",
                    block.pos,
                )
                .with_suggestion("Move this block into a sprite"),
            );
        }
    }

    fn requires_number(&mut self, owner: &str, pos: Position) {
        self.diagnostics.push(
            Diagnostic::error(
                codes::TYPE_MISMATCH,
                format!("`{}` requires a number", owner),
                pos,
            )
            .with_suggestion("Use a number, a numeric reporter or a variable"),
        );
    }

    fn requires_condition(&mut self, owner: &str, pos: Position) {
        self.diagnostics.push(
            Diagnostic::error(
                codes::TYPE_MISMATCH,
                format!("`{}` requires a condition", owner),
                pos,
            )
            .with_suggestion("Use a comparison such as `x > 5` or a condition like `touching edge`"),
        );
    }

    fn internal(&mut self, block: &Block) {
        self.diagnostics.push(Diagnostic::error(
            codes::INTERNAL,
            format!("Block '{}' is missing from the block table", block.name),
            block.pos,
        ));
    }
}

/// Nearest candidate within edit distance 2, or 1 for words of three
/// characters or fewer. Comparison is case-insensitive.
pub fn closest_match<'c>(word: &str, candidates: impl IntoIterator<Item = &'c str>) -> Option<&'c str> {
    let lowered = word.to_lowercase();
    let limit = if lowered.chars().count() <= 3 { 1 } else { 2 };
    let mut best: Option<(usize, &'c str)> = None;
    for candidate in candidates {
        let distance = edit_distance(&lowered, &candidate.to_lowercase());
        if distance == 0 || distance > limit {
            continue;
        }
        if best.map(|(d, _)| distance < d).unwrap_or(true) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

pub fn edit_distance(a: &str, b: &str) -> usize {
    let a = a.chars().collect::<Vec<_>>();
    let b = b.chars().collect::<Vec<_>>();
    let mut previous = (0..=b.len()).collect::<Vec<_>>();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j] + cost)
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check(source: &str) -> Vec<Diagnostic> {
        check_as(source, false, None)
    }

    fn check_as(source: &str, is_stage: bool, costumes: Option<&[String]>) -> Vec<Diagnostic> {
        let (tokens, lex) = tokenize(source);
        assert!(lex.is_empty(), "{:?}", lex);
        let (program, parsed) = parse(tokens);
        assert!(parsed.is_empty(), "{:?}", parsed);
        let (procedures, mut diagnostics) = collect_procedures(&program);
        let scope = Scope::from_programs([&program]);
        let sprite = SpriteContext {
            name: "Cat",
            is_stage,
            costume_names: costumes,
            sound_names: None,
            scope: &scope,
        };
        diagnostics.extend(validate(&program, source, &procedures, &sprite));
        diagnostics
    }

    fn codes_of(diagnostics: &[Diagnostic]) -> Vec<&str> {
        diagnostics.iter().map(|d| d.code.as_str()).collect()
    }

    #[test]
    fn clean_program_has_no_diagnostics() {
        let source = "var score = 0\nwhen flag clicked\n    repeat 3\n        move 10\n        change score by 1\n";
        assert!(check(source).is_empty());
    }

    #[test]
    fn stop_options_are_checked() {
        assert!(check("when flag clicked\n    stop other scripts\n    stop this script\n").is_empty());
        let diagnostics = check("when flag clicked\n    stop banana\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::TYPE_MISMATCH]);
        assert!(diagnostics[0].message.contains("banana"));
        let diagnostics = check("when flag clicked\n    stop al\n");
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("Did you mean `stop all`?"));
    }

    #[test]
    fn empty_list_is_not_a_number_or_condition() {
        let diagnostics = check("when flag clicked\n    move []\n    if [] then\n        say 1\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::TYPE_MISMATCH, codes::TYPE_MISMATCH]);
        assert!(diagnostics[0].message.contains("requires a number"));
        assert!(diagnostics[1].message.contains("requires a condition"));
    }

    #[test]
    fn text_in_number_slot() {
        let diagnostics = check("when flag clicked\n    wait \"hello\" seconds\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::TYPE_MISMATCH]);
        assert!(diagnostics[0].message.contains("requires a number"));
    }

    #[test]
    fn numeric_text_is_a_number() {
        assert!(check("when flag clicked\n    wait \"2\"\n").is_empty());
    }

    #[test]
    fn number_in_condition_slot() {
        let diagnostics = check("when flag clicked\n    if 5 then\n        hide\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::TYPE_MISMATCH]);
        assert!(diagnostics[0].message.contains("requires a condition"));
    }

    #[test]
    fn boolean_reporter_in_number_slot() {
        let diagnostics = check("when flag clicked\n    move touching edge\n");
        assert!(diagnostics[0].message.contains("`move` requires a number"));
    }

    #[test]
    fn assignment_inside_condition() {
        let diagnostics = check("var x = 0\nwhen flag clicked\n    if x = 5 then\n        hide\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::ASSIGN_IN_EXPRESSION]);
        assert!(diagnostics[0].suggestion.as_deref().unwrap_or("").contains("=="));
    }

    #[test]
    fn missing_coordinate() {
        let diagnostics = check("when flag clicked\n    go to x: 10 y:\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::MISSING_COORDINATE]);
        assert!(diagnostics[0].message.contains("y:"));
    }

    #[test]
    fn typo_suggests_keyword_and_corrected_line() {
        let diagnostics = check("when flag clicked\n    mvoe 10\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::UNKNOWN_BLOCK]);
        assert_eq!(diagnostics[0].message, "Unknown block 'mvoe'. Did you mean 'move'?");
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("move 10"));
    }

    #[test]
    fn unknown_procedure_without_near_match() {
        let diagnostics = check("when flag clicked\n    celebrate\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::UNKNOWN_PROCEDURE]);
    }

    #[test]
    fn stage_cannot_move() {
        let diagnostics = check_as("when flag clicked\n    move 10\n    say x position\n", true, None);
        assert_eq!(
            codes_of(&diagnostics),
            vec![codes::STAGE_MOTION, codes::STAGE_MOTION]
        );
        assert!(diagnostics[0].message.contains("Stage cannot move"));
    }

    #[test]
    fn procedures_arity_and_duplicates() {
        let source = "define jump h h\n    change y by h\ndefine jump\n    hide\nwhen flag clicked\n    jump 1 2\n";
        let diagnostics = check(source);
        assert_eq!(
            codes_of(&diagnostics),
            vec![
                codes::DUPLICATE_PARAMETER,
                codes::DUPLICATE_PROCEDURE,
                codes::ARITY_MISMATCH
            ]
        );
    }

    #[test]
    fn parameters_are_in_scope_inside_definition() {
        let source = "define jump height\n    change y by height\nwhen flag clicked\n    jump 10\n";
        assert!(check(source).is_empty());
    }

    #[test]
    fn undeclared_variable_and_list() {
        let source = "var score = 0\nwhen flag clicked\n    say scroe\n    add 1 to items\n";
        let diagnostics = check(source);
        assert_eq!(
            codes_of(&diagnostics),
            vec![codes::UNKNOWN_VARIABLE, codes::UNKNOWN_LIST]
        );
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("Did you mean 'score'?"));
    }

    #[test]
    fn bare_reporter_word_points_at_reporter() {
        let diagnostics = check("when flag clicked\n    say x\n");
        assert_eq!(
            diagnostics[0].suggestion.as_deref(),
            Some("Did you mean the `x position` reporter?")
        );
    }

    #[test]
    fn unknown_key() {
        let diagnostics = check("when spce pressed\n    hide\n");
        assert_eq!(codes_of(&diagnostics), vec![codes::UNKNOWN_KEY]);
        assert_eq!(diagnostics[0].suggestion.as_deref(), Some("Did you mean 'space'?"));
    }

    #[test]
    fn undeclared_costume_is_a_warning() {
        let costumes = vec!["cat-a".to_string(), "cat-b".to_string()];
        let diagnostics = check_as(
            "when flag clicked\n    switch costume to \"cat-c\"\n    switch costume to \"CAT-B\"\n",
            false,
            Some(&costumes),
        );
        assert_eq!(codes_of(&diagnostics), vec![codes::UNKNOWN_COSTUME]);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn flow_warnings() {
        let source = "when flag clicked\n    forever\n        move 1\n    hide\nwhen this sprite clicked\nwhen flag clicked\n    repeat 2\n";
        let diagnostics = check(source);
        assert_eq!(
            codes_of(&diagnostics),
            vec![codes::UNREACHABLE_AFTER_FOREVER, codes::EMPTY_SCRIPT, codes::EMPTY_BODY]
        );
    }

    #[test]
    fn placeholders_are_found_with_positions() {
        let diagnostics =
            scan_placeholders("when flag clicked\n    move < Number >\n    if <condition>\n").unwrap();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].code, codes::PLACEHOLDER);
        assert_eq!((diagnostics[0].line, diagnostics[0].column), (2, 10));
        assert_eq!((diagnostics[1].line, diagnostics[1].column), (3, 8));
    }

    #[test]
    fn unreceived_broadcasts() {
        let (tokens, _) = tokenize("when flag clicked\n    broadcast \"go\"\n    broadcast start\n");
        let (sender, _) = parse(tokens);
        let (tokens, _) = tokenize("when I receive \"start\"\n    show\n");
        let (receiver, _) = parse(tokens);
        let diagnostics = check_broadcasts(&[("Cat", &sender), ("Dog", &receiver)]);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, codes::UNRECEIVED_BROADCAST);
        assert_eq!(diagnostics[0].sprite.as_deref(), Some("Cat"));
    }

    #[test]
    fn closest_match_limits() {
        assert_eq!(closest_match("mvoe", ["move", "say"]), Some("move"));
        assert_eq!(closest_match("sy", ["say"]), Some("say"));
        assert_eq!(closest_match("xyz", ["say"]), None);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
    }
}
