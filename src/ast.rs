use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Event,
    Motion,
    Looks,
    Sound,
    Control,
    Sensing,
    Operator,
    Variable,
    Pen,
    Procedure,
    Custom,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Event => "event",
            Category::Motion => "motion",
            Category::Looks => "looks",
            Category::Sound => "sound",
            Category::Control => "control",
            Category::Sensing => "sensing",
            Category::Operator => "operator",
            Category::Variable => "variable",
            Category::Pen => "pen",
            Category::Procedure => "procedure",
            Category::Custom => "custom",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value sitting in one argument slot of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Number(f64),
    Text(String),
    Var(String),
    List(String),
    ListLiteral(Vec<Arg>),
    Block(Box<Block>),
    /// An empty slot, kept so the validator can say which value is missing.
    Missing,
}

impl Arg {
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            Arg::Block(block) => Some(block),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Arg::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub category: Category,
    pub name: &'static str,
    pub args: Vec<Arg>,
    pub body: Option<Box<Block>>,
    pub else_body: Option<Box<Block>>,
    pub next: Option<Box<Block>>,
    pub pos: Position,
}

impl Block {
    pub fn new(category: Category, name: &'static str, args: Vec<Arg>, pos: Position) -> Self {
        Self {
            category,
            name,
            args,
            body: None,
            else_body: None,
            next: None,
            pos,
        }
    }

    /// Iterates this block and every sibling reachable through `next`.
    pub fn chain(&self) -> Chain<'_> {
        Chain { current: Some(self) }
    }

    pub fn body_chain(&self) -> Chain<'_> {
        Chain {
            current: self.body.as_deref(),
        }
    }

    pub fn else_chain(&self) -> Chain<'_> {
        Chain {
            current: self.else_body.as_deref(),
        }
    }

    pub fn next_chain(&self) -> Chain<'_> {
        Chain {
            current: self.next.as_deref(),
        }
    }

    /// Reporter and boolean blocks nested in the arguments, list literals included.
    pub fn nested_blocks(&self) -> Vec<&Block> {
        let mut out = Vec::new();
        for arg in &self.args {
            collect_arg_blocks(arg, &mut out);
        }
        out
    }

    /// The procedure name of a `call` or `defineFunction` block.
    pub fn procedure_name(&self) -> Option<&str> {
        if self.name != "call" && self.name != "defineFunction" {
            return None;
        }
        self.args.first().and_then(Arg::as_text)
    }
}

// Unlinks `next` iteratively so a long script does not recurse once per sibling.
impl Drop for Block {
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(mut block) = next {
            next = block.next.take();
        }
    }
}

fn collect_arg_blocks<'a>(arg: &'a Arg, out: &mut Vec<&'a Block>) {
    match arg {
        Arg::Block(block) => out.push(block),
        Arg::ListLiteral(items) => {
            for item in items {
                collect_arg_blocks(item, out);
            }
        }
        _ => {}
    }
}

pub struct Chain<'a> {
    current: Option<&'a Block>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.current?;
        self.current = block.next.as_deref();
        Some(block)
    }
}

/// Links `blocks` front to back through `next` and returns the head.
pub fn link_chain(blocks: Vec<Block>) -> Option<Box<Block>> {
    let mut head: Option<Box<Block>> = None;
    for mut block in blocks.into_iter().rev() {
        block.next = head;
        head = Some(Box::new(block));
    }
    head
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub pos: Position,
    pub name: String,
    pub value: Literal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListDecl {
    pub pos: Position,
    pub name: String,
    pub items: Vec<Literal>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Script {
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub scripts: Vec<Script>,
    pub variables: Vec<VariableDecl>,
    pub lists: Vec<ListDecl>,
}

impl Program {
    /// Later declarations overwrite earlier ones but keep the first slot.
    pub fn declare_variable(&mut self, decl: VariableDecl) {
        if let Some(existing) = self
            .variables
            .iter_mut()
            .find(|v| v.name.eq_ignore_ascii_case(&decl.name))
        {
            *existing = decl;
        } else {
            self.variables.push(decl);
        }
    }

    pub fn declare_list(&mut self, decl: ListDecl) {
        if let Some(existing) = self
            .lists
            .iter_mut()
            .find(|l| l.name.eq_ignore_ascii_case(&decl.name))
        {
            *existing = decl;
        } else {
            self.lists.push(decl);
        }
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name.eq_ignore_ascii_case(name))
    }

    pub fn has_list(&self, name: &str) -> bool {
        self.lists.iter().any(|l| l.name.eq_ignore_ascii_case(name))
    }

    /// Every top-level block: hats and procedure definitions.
    pub fn top_blocks(&self) -> impl Iterator<Item = &Block> {
        self.scripts.iter().flat_map(|script| script.blocks.iter())
    }
}

/// Depth-first visit of every block reachable from `root`: its chain, nested
/// bodies and reporter arguments.
pub fn walk_blocks<'a, F>(root: &'a Block, visit: &mut F)
where
    F: FnMut(&'a Block),
{
    let mut stack: Vec<&'a Block> = vec![root];
    while let Some(first) = stack.pop() {
        for block in first.chain() {
            visit(block);
            if let Some(body) = block.body.as_deref() {
                stack.push(body);
            }
            if let Some(else_body) = block.else_body.as_deref() {
                stack.push(else_body);
            }
            for nested in block.nested_blocks() {
                stack.push(nested);
            }
        }
    }
}
