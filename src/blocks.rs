//! The block table.
//!
//! Every block the language knows is one row here: its canonical name, its
//! category, what it produces, and a template describing its surface syntax.
//! The parser matches heads against these templates, the validator reads slot
//! shapes and outputs from them, and typo detection draws its vocabulary from
//! their leading words.
//!
//! Template grammar: plain words must appear literally (case-insensitive),
//! `x:` is a word followed by a colon, `?word` is an optional word, and `%`
//! markers are argument slots:
//!
//! | marker | slot |
//! | --- | --- |
//! | `%n` | number |
//! | `%s` | any value |
//! | `%b` | condition |
//! | `%v` | variable name |
//! | `%l` | list name |
//! | `%m` | broadcast message |
//! | `%k` | key name |
//! | `%c` | costume or backdrop |
//! | `%d` | sound |
//! | `%o` | stop option |
//! | `%t` | touch target |

use crate::ast::Category;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Number,
    Any,
    Boolean,
    Variable,
    List,
    Message,
    Key,
    Costume,
    Sound,
    StopOption,
    TouchTarget,
}

impl Shape {
    fn from_marker(marker: char) -> Option<Shape> {
        Some(match marker {
            'n' => Shape::Number,
            's' => Shape::Any,
            'b' => Shape::Boolean,
            'v' => Shape::Variable,
            'l' => Shape::List,
            'm' => Shape::Message,
            'k' => Shape::Key,
            'c' => Shape::Costume,
            'd' => Shape::Sound,
            'o' => Shape::StopOption,
            't' => Shape::TouchTarget,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
    Boolean,
    Any,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Hat,
    Statement,
    CBlock,
    Reporter(ValueKind),
}

impl BlockKind {
    pub fn is_reporter(&self) -> bool {
        matches!(self, BlockKind::Reporter(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Part {
    Word(&'static str),
    Colon,
    Optional(&'static str),
    Slot(Shape),
}

#[derive(Debug, Clone, Copy)]
pub struct BlockSpec {
    pub name: &'static str,
    pub category: Category,
    pub kind: BlockKind,
    pub template: &'static str,
}

impl BlockSpec {
    pub fn parts(&self) -> Vec<Part> {
        let mut parts = Vec::new();
        for piece in self.template.split_whitespace() {
            if let Some(marker) = piece.strip_prefix('%') {
                let shape = marker.chars().next().and_then(Shape::from_marker);
                match shape {
                    Some(shape) => parts.push(Part::Slot(shape)),
                    None => parts.push(Part::Word(piece)),
                }
            } else if let Some(word) = piece.strip_prefix('?') {
                parts.push(Part::Optional(word));
            } else if let Some(word) = piece.strip_suffix(':') {
                parts.push(Part::Word(word));
                parts.push(Part::Colon);
            } else {
                parts.push(Part::Word(piece));
            }
        }
        parts
    }

    pub fn slots(&self) -> Vec<Shape> {
        self.parts()
            .into_iter()
            .filter_map(|part| match part {
                Part::Slot(shape) => Some(shape),
                _ => None,
            })
            .collect()
    }

    /// The `x:`-style label written right before each slot, if any.
    pub fn slot_labels(&self) -> Vec<Option<&'static str>> {
        let parts = self.parts();
        let mut labels = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            if !matches!(part, Part::Slot(_)) {
                continue;
            }
            let label = if index >= 2 {
                match (parts[index - 2], parts[index - 1]) {
                    (Part::Word(word), Part::Colon) => Some(word),
                    _ => None,
                }
            } else {
                None
            };
            labels.push(label);
        }
        labels
    }

    /// The first literal word of the template, when the template starts with one.
    pub fn keyword(&self) -> Option<&'static str> {
        match self.parts().first() {
            Some(Part::Word(word)) => Some(word),
            _ => None,
        }
    }

    /// Human-readable head used in messages, e.g. `go to` or `pick random`.
    pub fn display_name(&self) -> String {
        let parts = self.parts();
        let mut words = Vec::new();
        for (index, part) in parts.iter().enumerate() {
            match part {
                Part::Word(_) if parts.get(index + 1) == Some(&Part::Colon) => break,
                Part::Word(word) => words.push(*word),
                _ => break,
            }
        }
        if words.is_empty() {
            self.name.to_string()
        } else {
            words.join(" ")
        }
    }

    pub fn output(&self) -> Option<ValueKind> {
        match self.kind {
            BlockKind::Reporter(kind) => Some(kind),
            _ => None,
        }
    }
}

const fn spec(
    name: &'static str,
    category: Category,
    kind: BlockKind,
    template: &'static str,
) -> BlockSpec {
    BlockSpec {
        name,
        category,
        kind,
        template,
    }
}

use BlockKind::{CBlock, Hat, Reporter, Statement};
use Category::*;

const NUM: BlockKind = Reporter(ValueKind::Number);
const TEXT: BlockKind = Reporter(ValueKind::Text);
const BOOL: BlockKind = Reporter(ValueKind::Boolean);
const ANY: BlockKind = Reporter(ValueKind::Any);

/// Rows sharing a leading word are tried top to bottom, so longer or more
/// specific forms come first.
pub static BLOCKS: &[BlockSpec] = &[
    // events
    spec("whenFlagClicked", Event, Hat, "when green flag clicked"),
    spec("whenFlagClicked", Event, Hat, "when flag clicked"),
    spec("whenFlagClicked", Event, Hat, "when flagclicked"),
    spec("whenSpriteClicked", Event, Hat, "when this sprite clicked"),
    spec("whenReceived", Event, Hat, "when i receive %m"),
    spec("whenKeyPressed", Event, Hat, "when key %k pressed"),
    spec("whenKeyPressed", Event, Hat, "when %k pressed"),
    spec("broadcastAndWait", Event, Statement, "broadcast %m and wait"),
    spec("broadcast", Event, Statement, "broadcast %m"),
    // motion
    spec("move", Motion, Statement, "move %n ?steps"),
    spec("turnRight", Motion, Statement, "turn right %n ?degrees"),
    spec("turnLeft", Motion, Statement, "turn left %n ?degrees"),
    spec("goTo", Motion, Statement, "go to x: %n y: %n"),
    spec("glideTo", Motion, Statement, "glide %n ?seconds to x: %n y: %n"),
    spec("changeX", Motion, Statement, "change x by %n"),
    spec("setX", Motion, Statement, "set x to %n"),
    spec("changeY", Motion, Statement, "change y by %n"),
    spec("setY", Motion, Statement, "set y to %n"),
    spec("pointInDirection", Motion, Statement, "point in direction %n"),
    spec("bounceOnEdge", Motion, Statement, "if on edge bounce"),
    spec("xPosition", Motion, NUM, "x position"),
    spec("yPosition", Motion, NUM, "y position"),
    spec("direction", Motion, NUM, "direction"),
    // looks
    spec("sayFor", Looks, Statement, "say %s for %n ?seconds"),
    spec("say", Looks, Statement, "say %s"),
    spec("thinkFor", Looks, Statement, "think %s for %n ?seconds"),
    spec("think", Looks, Statement, "think %s"),
    spec("showVariable", Variable, Statement, "show variable %v"),
    spec("hideVariable", Variable, Statement, "hide variable %v"),
    spec("show", Looks, Statement, "show"),
    spec("hide", Looks, Statement, "hide"),
    spec("switchCostume", Looks, Statement, "switch costume to %c"),
    spec("switchBackdrop", Looks, Statement, "switch backdrop to %c"),
    spec("nextCostume", Looks, Statement, "next costume"),
    spec("nextBackdrop", Looks, Statement, "next backdrop"),
    spec("setSize", Looks, Statement, "set size to %n ?%"),
    spec("changeSize", Looks, Statement, "change size by %n"),
    spec("costumeNumber", Looks, NUM, "costume number"),
    spec("size", Looks, NUM, "size"),
    // sound
    spec("playSoundUntilDone", Sound, Statement, "play sound %d until done"),
    spec("playSound", Sound, Statement, "play sound %d"),
    spec("playSound", Sound, Statement, "start sound %d"),
    spec("stopAllSounds", Sound, Statement, "stop all sounds"),
    // control
    spec("waitUntil", Control, Statement, "wait until %b"),
    spec("wait", Control, Statement, "wait %n ?seconds"),
    spec("repeatUntil", Control, CBlock, "repeat until %b"),
    spec("repeat", Control, CBlock, "repeat %n ?times"),
    spec("forever", Control, CBlock, "forever"),
    spec("if", Control, CBlock, "if %b ?then"),
    spec("ifElse", Control, CBlock, "if %b ?then"),
    spec("stop", Control, Statement, "stop %o"),
    // sensing
    spec("ask", Sensing, Statement, "ask %s ?and ?wait"),
    spec("resetTimer", Sensing, Statement, "reset timer"),
    spec("answer", Sensing, TEXT, "answer"),
    spec("timer", Sensing, NUM, "timer"),
    spec("mouseX", Sensing, NUM, "mouse x"),
    spec("mouseY", Sensing, NUM, "mouse y"),
    spec("touching", Sensing, BOOL, "touching %t"),
    spec("keyPressed", Sensing, BOOL, "key %k pressed"),
    // operators
    spec("random", Operator, NUM, "pick random %n to %n"),
    spec("join", Operator, TEXT, "join %s %s"),
    spec("letterOf", Operator, TEXT, "letter %n of %s"),
    spec("length", Operator, NUM, "length of %s"),
    spec("round", Operator, NUM, "round %n"),
    spec("abs", Operator, NUM, "abs %n"),
    spec("sqrt", Operator, NUM, "sqrt %n"),
    spec("floor", Operator, NUM, "floor %n"),
    spec("ceiling", Operator, NUM, "ceiling %n"),
    spec("add", Operator, NUM, "%n + %n"),
    spec("subtract", Operator, NUM, "%n - %n"),
    spec("multiply", Operator, NUM, "%n * %n"),
    spec("divide", Operator, NUM, "%n / %n"),
    spec("mod", Operator, NUM, "%n mod %n"),
    spec("negate", Operator, NUM, "- %n"),
    spec("equals", Operator, BOOL, "%s == %s"),
    spec("notEquals", Operator, BOOL, "%s != %s"),
    spec("lessThan", Operator, BOOL, "%n < %n"),
    spec("lessOrEqual", Operator, BOOL, "%n <= %n"),
    spec("greaterThan", Operator, BOOL, "%n > %n"),
    spec("greaterOrEqual", Operator, BOOL, "%n >= %n"),
    spec("and", Operator, BOOL, "%b and %b"),
    spec("or", Operator, BOOL, "%b or %b"),
    spec("not", Operator, BOOL, "not %b"),
    spec("contains", Operator, BOOL, "%s contains %s"),
    spec("assign", Operator, ANY, "%s = %s"),
    // variables and lists
    spec("setVariable", Variable, Statement, "set %v to %s"),
    spec("changeVariable", Variable, Statement, "change %v by %n"),
    spec("addToList", Variable, Statement, "add %s to %l"),
    spec("deleteAllOfList", Variable, Statement, "delete all of %l"),
    spec("deleteOfList", Variable, Statement, "delete %n of %l"),
    spec("insertAtList", Variable, Statement, "insert %s at %n of %l"),
    spec("replaceItemOfList", Variable, Statement, "replace item %n of %l with %s"),
    spec("itemOf", Variable, ANY, "item %n of %l"),
    // pen
    spec("penDown", Pen, Statement, "pen down"),
    spec("penUp", Pen, Statement, "pen up"),
    spec("penClear", Pen, Statement, "erase all"),
    spec("stamp", Pen, Statement, "stamp"),
    spec("setPenColor", Pen, Statement, "set pen color to %s"),
    spec("setPenSize", Pen, Statement, "set pen size to %n"),
    spec("changePenSize", Pen, Statement, "change pen size by %n"),
    // procedures
    spec("defineFunction", Procedure, Hat, "define"),
    spec("call", Custom, Statement, "call"),
];

/// Declaration and structure words that start lines but are not table rows.
pub const DECLARATION_KEYWORDS: &[&str] = &["var", "variable", "list"];

const EXTRA_KEYWORDS: &[&str] = &[
    "else",
    "and",
    "or",
    "not",
    "mod",
    "contains",
    "mouse-pointer",
    "arrow",
];

pub const KEY_NAMES: &[&str] = &[
    "space",
    "enter",
    "any",
    "up arrow",
    "down arrow",
    "left arrow",
    "right arrow",
];

/// What a `stop` block may stop.
pub const STOP_OPTIONS: &[&str] = &["all", "this script", "other scripts"];

pub fn spec_for(name: &str) -> Option<&'static BlockSpec> {
    BLOCKS.iter().find(|spec| spec.name == name)
}

pub fn hat_candidates() -> impl Iterator<Item = &'static BlockSpec> {
    BLOCKS
        .iter()
        .filter(|spec| spec.kind == BlockKind::Hat && spec.name != "defineFunction")
}

pub fn statement_candidates(word: &str) -> impl Iterator<Item = &'static BlockSpec> + '_ {
    BLOCKS.iter().filter(move |spec| {
        matches!(spec.kind, BlockKind::Statement | BlockKind::CBlock)
            && spec.name != "ifElse"
            && spec.name != "call"
            && spec.keyword() == Some(word)
    })
}

pub fn reporter_candidates(word: &str) -> impl Iterator<Item = &'static BlockSpec> + '_ {
    BLOCKS
        .iter()
        .filter(move |spec| spec.kind.is_reporter() && spec.keyword() == Some(word))
}

pub fn is_reporter(name: &str) -> bool {
    spec_for(name)
        .map(|spec| spec.kind.is_reporter())
        .unwrap_or(false)
}

/// Words that may begin a statement line; the vocabulary for typo suggestions.
pub fn statement_keywords() -> Vec<&'static str> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for spec in BLOCKS {
        if spec.kind.is_reporter() {
            continue;
        }
        if let Some(word) = spec.keyword() {
            if seen.insert(word) {
                out.push(word);
            }
        }
    }
    for &word in DECLARATION_KEYWORDS {
        if seen.insert(word) {
            out.push(word);
        }
    }
    out
}

/// Every reserved word, in lowercase.
pub fn keyword_set() -> HashSet<&'static str> {
    let mut out = HashSet::new();
    for spec in BLOCKS {
        for part in spec.parts() {
            match part {
                Part::Word(word) | Part::Optional(word) => {
                    if word.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
                        out.insert(word);
                    }
                }
                _ => {}
            }
        }
    }
    out.extend(DECLARATION_KEYWORDS.iter().copied());
    out.extend(EXTRA_KEYWORDS.iter().copied());
    out
}

/// Reporters spelled only with words (`x position`, `timer`), split into words.
pub fn word_only_reporters() -> Vec<Vec<&'static str>> {
    BLOCKS
        .iter()
        .filter(|spec| spec.kind.is_reporter())
        .filter_map(|spec| {
            spec.parts()
                .into_iter()
                .map(|part| match part {
                    Part::Word(word) => Some(word),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
        })
        .collect()
}

/// The runs of words that lead straight into an argument slot, such as
/// `point in direction` before its `%n`.
pub fn slot_lead_ins() -> Vec<Vec<&'static str>> {
    let mut out = Vec::new();
    for spec in BLOCKS {
        let mut run = Vec::new();
        for part in spec.parts() {
            match part {
                Part::Word(word) => run.push(word),
                Part::Slot(_) if !run.is_empty() => out.push(std::mem::take(&mut run)),
                _ => run.clear(),
            }
        }
    }
    out
}

pub fn is_known_key(name: &str) -> bool {
    let lowered = name.to_lowercase();
    if KEY_NAMES.contains(&lowered.as_str()) {
        return true;
    }
    let mut chars = lowered.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_only_reporters_and_lead_ins() {
        let reporters = word_only_reporters();
        assert!(reporters.contains(&vec!["x", "position"]));
        assert!(reporters.contains(&vec!["direction"]));
        assert!(!reporters.iter().any(|words| words.first() == Some(&"join")));
        let lead_ins = slot_lead_ins();
        assert!(lead_ins.contains(&vec!["point", "in", "direction"]));
        assert!(!lead_ins.contains(&vec!["direction"]));
    }

    #[test]
    fn go_to_template_has_coordinate_labels() {
        let spec = spec_for("goTo").unwrap();
        assert_eq!(spec.slots(), vec![Shape::Number, Shape::Number]);
        assert_eq!(spec.slot_labels(), vec![Some("x"), Some("y")]);
        assert_eq!(spec.display_name(), "go to");
    }

    #[test]
    fn optional_words_are_not_slots() {
        let spec = spec_for("move").unwrap();
        assert_eq!(
            spec.parts(),
            vec![
                Part::Word("move"),
                Part::Slot(Shape::Number),
                Part::Optional("steps")
            ]
        );
    }

    #[test]
    fn infix_rows_have_no_keyword() {
        assert_eq!(spec_for("add").unwrap().keyword(), None);
        assert_eq!(spec_for("not").unwrap().keyword(), Some("not"));
    }

    #[test]
    fn statement_candidates_keep_table_order() {
        let names = statement_candidates("set")
            .map(|spec| spec.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec!["setX", "setY", "setSize", "setVariable", "setPenColor", "setPenSize"]
        );
    }

    #[test]
    fn keywords_cover_template_words() {
        let keywords = keyword_set();
        for word in ["move", "when", "receive", "flagclicked", "position", "var", "mouse-pointer"] {
            assert!(keywords.contains(word), "missing keyword {word}");
        }
        assert!(!keywords.contains("%n"));
    }

    #[test]
    fn statement_keywords_exclude_reporters() {
        let words = statement_keywords();
        assert!(words.contains(&"move"));
        assert!(words.contains(&"define"));
        assert!(words.contains(&"var"));
        assert!(!words.contains(&"timer"));
    }

    #[test]
    fn key_names() {
        assert!(is_known_key("space"));
        assert!(is_known_key("Up Arrow"));
        assert!(is_known_key("a"));
        assert!(is_known_key("7"));
        assert!(!is_known_key("spce"));
    }
}
