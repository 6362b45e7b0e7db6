use crate::ast::{Arg, Block, Category, Literal, Program};
use crate::runtime::{boot_code, render_html, RuntimeBuilder};
use std::collections::HashMap;
use thiserror::Error;

type CodegenProgressCallback<'a> = dyn FnMut(usize, usize, &str) + 'a;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenOptions {
    pub title: String,
    pub frame_delay_ms: u64,
    pub broadcast_wait_ms: u64,
    pub auto_start: bool,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        Self {
            title: "SBText Project".to_string(),
            frame_delay_ms: 16,
            broadcast_wait_ms: 100,
            auto_start: true,
        }
    }
}

/// One validated sprite handed to the generator.
#[derive(Debug, Clone, Copy)]
pub struct SpriteProgram<'a> {
    pub name: &'a str,
    pub program: &'a Program,
    pub is_stage: bool,
    pub costume_names: &'a [String],
    pub sound_names: &'a [String],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedOutput {
    pub js: String,
    pub html: String,
    pub user_code: String,
}

/// Broken generator invariants. Validated programs never produce these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    #[error("missing value in `{block}` at line {line}")]
    MissingValue { block: &'static str, line: usize },
    #[error("`{block}` cannot be used as a value (line {line})")]
    NotAValue { block: &'static str, line: usize },
    #[error("no {category} emitter for `{block}` (line {line})")]
    Unsupported {
        category: Category,
        block: &'static str,
        line: usize,
    },
    #[error("procedure `{name}` is not defined for sprite `{sprite}`")]
    UnknownProcedure { name: String, sprite: String },
}

type GenResult<T> = Result<T, GenerateError>;

pub fn generate(sprites: &[SpriteProgram<'_>], options: &CodegenOptions) -> GenResult<GeneratedOutput> {
    generate_with_progress(sprites, options, Option::<&mut fn(usize, usize, &str)>::None)
}

pub fn generate_with_progress<F>(
    sprites: &[SpriteProgram<'_>],
    options: &CodegenOptions,
    progress: Option<&mut F>,
) -> GenResult<GeneratedOutput>
where
    F: FnMut(usize, usize, &str),
{
    let mut progress = progress.map(|cb| cb as &mut CodegenProgressCallback<'_>);
    let total = 4 + sprites.len().max(1);
    let mut state = GeneratorState::new(options);

    report_progress(&mut progress, 1, total, "Preparing runtime");
    state.register_names(sprites);
    if sprites.iter().any(|sprite| uses_pen(sprite.program)) {
        state.inject_pen();
    }

    report_progress(&mut progress, 2, total, "Creating sprites");
    state.emit_sprites(sprites);

    report_progress(&mut progress, 3, total, "Initializing lists");
    state.emit_lists(sprites);

    report_progress(&mut progress, 4, total, "Registering procedures");
    state.emit_procedure_stubs(sprites);

    if sprites.is_empty() {
        report_progress(&mut progress, total, total, "Emitting scripts");
    }
    for (index, sprite) in sprites.iter().enumerate() {
        state.emit_scripts(index, sprite)?;
        report_progress(&mut progress, 5 + index, total, "Emitting scripts");
    }

    let user_code = state.out;
    let mut js = state.runtime.render(options.frame_delay_ms);
    js.push('\n');
    js.push_str(&user_code);
    js.push('\n');
    js.push_str(&boot_code(options.auto_start));
    let html = render_html(&options.title, &js);
    Ok(GeneratedOutput {
        js,
        html,
        user_code,
    })
}

fn report_progress(
    progress: &mut Option<&mut CodegenProgressCallback<'_>>,
    step: usize,
    total: usize,
    label: &str,
) {
    if let Some(cb) = progress.as_deref_mut() {
        cb(step, total, label);
    }
}

#[derive(Debug, Clone)]
struct ProcedureStub {
    name: String,
    params: Vec<String>,
}

/// Procedure definitions found along one script chain.
pub fn find_procedures_in_block(block: &Block) -> Vec<(String, Vec<String>)> {
    block
        .chain()
        .filter(|b| b.name == "defineFunction")
        .filter_map(|b| {
            let name = b.procedure_name()?.to_string();
            let params = b.args[1..]
                .iter()
                .filter_map(|arg| arg.as_text().map(str::to_string))
                .collect();
            Some((name, params))
        })
        .collect()
}

fn uses_pen(program: &Program) -> bool {
    let mut found = false;
    for top in program.top_blocks() {
        crate::ast::walk_blocks(top, &mut |block| {
            if block.category == Category::Pen {
                found = true;
            }
        });
    }
    found
}

struct GeneratorState<'o> {
    options: &'o CodegenOptions,
    out: String,
    indent: usize,
    runtime: RuntimeBuilder,
    pen_injected: bool,
    counter: usize,
    /// Keyed by sprite index and lowercased procedure name.
    procedures: HashMap<(usize, String), ProcedureStub>,
    variable_names: HashMap<String, String>,
    list_names: HashMap<String, String>,
    sprite_index: usize,
    sprite_name: String,
    /// Parameters of the procedure being emitted, lowercased name to JS identifier.
    params: HashMap<String, String>,
}

impl<'o> GeneratorState<'o> {
    fn new(options: &'o CodegenOptions) -> Self {
        Self {
            options,
            out: String::new(),
            indent: 0,
            runtime: RuntimeBuilder::new(),
            pen_injected: false,
            counter: 0,
            procedures: HashMap::new(),
            variable_names: HashMap::new(),
            list_names: HashMap::new(),
            sprite_index: 0,
            sprite_name: String::new(),
            params: HashMap::new(),
        }
    }

    fn inject_pen(&mut self) {
        if self.pen_injected {
            return;
        }
        self.pen_injected = self.runtime.enable_pen();
    }

    /// First declaration of a name fixes its spelling in the runtime tables.
    fn register_names(&mut self, sprites: &[SpriteProgram<'_>]) {
        for sprite in sprites {
            for decl in &sprite.program.variables {
                self.variable_names
                    .entry(decl.name.to_lowercase())
                    .or_insert_with(|| decl.name.clone());
            }
            for decl in &sprite.program.lists {
                self.list_names
                    .entry(decl.name.to_lowercase())
                    .or_insert_with(|| decl.name.clone());
            }
        }
    }

    fn next_id(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn frame_wait(&self) -> String {
        format!(
            "await new Promise((resolve) => setTimeout(resolve, {}));",
            self.options.frame_delay_ms
        )
    }

    fn emit_sprites(&mut self, sprites: &[SpriteProgram<'_>]) {
        for (index, sprite) in sprites.iter().enumerate() {
            let kind = if sprite.is_stage { "Stage" } else { "Sprite" };
            self.line(&format!("// {}: {}", kind, sprite.name.replace(['\n', '\r'], " ")));
            self.line(&format!(
                "const {} = scratchRuntime.createSprite({}, {{ isStage: {}, costumes: {}, sounds: {} }});",
                sprite_var(index),
                js_string(sprite.name),
                sprite.is_stage,
                js_string_array(sprite.costume_names),
                js_string_array(sprite.sound_names),
            ));
            for decl in &sprite.program.variables {
                let target = self.variable_ref(&decl.name);
                self.line(&format!("{} = {};", target, literal(&decl.value)));
            }
        }
    }

    fn emit_lists(&mut self, sprites: &[SpriteProgram<'_>]) {
        for sprite in sprites {
            for decl in &sprite.program.lists {
                let items = decl.items.iter().map(literal).collect::<Vec<_>>().join(", ");
                let target = self.list_ref(&decl.name);
                self.line(&format!("{} = [{}];", target, items));
            }
        }
    }

    fn emit_procedure_stubs(&mut self, sprites: &[SpriteProgram<'_>]) {
        for (index, sprite) in sprites.iter().enumerate() {
            let found = sprite
                .program
                .top_blocks()
                .flat_map(find_procedures_in_block)
                .collect::<Vec<_>>();
            if found.is_empty() {
                continue;
            }
            let registry = format!("scratchRuntime.procedures[{}]", js_string(sprite.name));
            self.line(&format!("{} = {} || {{}};", registry, registry));
            for (name, params) in found {
                self.line(&format!("{}[{}] = async () => {{}};", registry, js_string(&name)));
                self.procedures
                    .insert((index, name.to_lowercase()), ProcedureStub { name, params });
            }
        }
    }

    fn emit_scripts(&mut self, index: usize, sprite: &SpriteProgram<'_>) -> GenResult<()> {
        self.sprite_index = index;
        self.sprite_name = sprite.name.to_string();
        for top in sprite.program.top_blocks() {
            self.emit_statement(top)?;
        }
        Ok(())
    }

    fn emit_chain(&mut self, first: Option<&Block>) -> GenResult<()> {
        if let Some(first) = first {
            for block in first.chain() {
                self.emit_statement(block)?;
            }
        }
        Ok(())
    }

    fn emit_nested(&mut self, first: Option<&Block>) -> GenResult<()> {
        self.indent += 1;
        let result = self.emit_chain(first);
        self.indent -= 1;
        result
    }

    fn emit_statement(&mut self, block: &Block) -> GenResult<()> {
        match block.category {
            Category::Event => self.emit_event(block),
            Category::Motion => self.emit_motion(block),
            Category::Looks => self.emit_looks(block),
            Category::Sound => self.emit_sound(block),
            Category::Control => self.emit_control(block),
            Category::Sensing => self.emit_sensing(block),
            Category::Operator => Err(unsupported(block)),
            Category::Variable => self.emit_variable(block),
            Category::Pen => self.emit_pen(block),
            Category::Procedure | Category::Custom => self.emit_custom(block),
        }
    }

    fn emit_handler(&mut self, open: String, block: &Block) -> GenResult<()> {
        self.line(&open);
        self.emit_nested(block.next.as_deref())?;
        self.line("});");
        Ok(())
    }

    fn emit_event(&mut self, block: &Block) -> GenResult<()> {
        let sprite = sprite_var(self.sprite_index);
        match block.name {
            "whenFlagClicked" => {
                self.emit_handler(format!("scratchRuntime.onFlag({}, async (sprite) => {{", sprite), block)
            }
            "whenKeyPressed" => {
                let key = self.arg(block, 0)?;
                self.emit_handler(
                    format!("scratchRuntime.onKey({}, {}, async (sprite) => {{", key, sprite),
                    block,
                )
            }
            "whenReceived" => {
                let message = self.arg(block, 0)?;
                self.emit_handler(
                    format!("scratchRuntime.onReceive({}, {}, async (sprite) => {{", message, sprite),
                    block,
                )
            }
            "whenSpriteClicked" => {
                self.emit_handler(format!("scratchRuntime.onClick({}, async (sprite) => {{", sprite), block)
            }
            "broadcast" => {
                let message = self.arg(block, 0)?;
                self.line(&format!("scratchRuntime.broadcast({});", message));
                Ok(())
            }
            "broadcastAndWait" => {
                let message = self.arg(block, 0)?;
                self.line(&format!("await scratchRuntime.broadcast({});", message));
                self.line(&format!(
                    "await new Promise((resolve) => setTimeout(resolve, {}));",
                    self.options.broadcast_wait_ms
                ));
                Ok(())
            }
            _ => Err(unsupported(block)),
        }
    }

    fn emit_motion(&mut self, block: &Block) -> GenResult<()> {
        let code = match block.name {
            "move" | "turnRight" | "turnLeft" | "changeX" | "setX" | "changeY" | "setY"
            | "pointInDirection" => format!("sprite.{}({});", block.name, self.arg(block, 0)?),
            "goTo" => format!("sprite.goTo({}, {});", self.arg(block, 0)?, self.arg(block, 1)?),
            "glideTo" => format!(
                "await sprite.glideTo({}, {}, {});",
                self.arg(block, 0)?,
                self.arg(block, 1)?,
                self.arg(block, 2)?
            ),
            "bounceOnEdge" => "sprite.bounceOnEdge();".to_string(),
            _ => return Err(unsupported(block)),
        };
        self.line(&code);
        Ok(())
    }

    fn emit_looks(&mut self, block: &Block) -> GenResult<()> {
        let code = match block.name {
            "say" | "think" | "switchCostume" | "setSize" | "changeSize" => {
                format!("sprite.{}({});", block.name, self.arg(block, 0)?)
            }
            "sayFor" | "thinkFor" => format!(
                "await sprite.{}({}, {});",
                block.name,
                self.arg(block, 0)?,
                self.arg(block, 1)?
            ),
            "show" | "hide" | "nextCostume" => format!("sprite.{}();", block.name),
            "switchBackdrop" => format!("scratchRuntime.switchBackdrop({});", self.arg(block, 0)?),
            "nextBackdrop" => "scratchRuntime.nextBackdrop();".to_string(),
            _ => return Err(unsupported(block)),
        };
        self.line(&code);
        Ok(())
    }

    fn emit_sound(&mut self, block: &Block) -> GenResult<()> {
        let code = match block.name {
            "playSound" => format!("sprite.playSound({});", self.arg(block, 0)?),
            "playSoundUntilDone" => format!("await sprite.playSoundUntilDone({});", self.arg(block, 0)?),
            "stopAllSounds" => "scratchRuntime.stopAllSounds();".to_string(),
            _ => return Err(unsupported(block)),
        };
        self.line(&code);
        Ok(())
    }

    fn emit_control(&mut self, block: &Block) -> GenResult<()> {
        match block.name {
            "wait" => {
                let seconds = self.number_arg(block, 0)?;
                self.line(&format!(
                    "await new Promise((resolve) => setTimeout(resolve, {} * 1000));",
                    seconds
                ));
            }
            "repeat" => {
                let id = self.next_id();
                let header = match block.args.first() {
                    Some(Arg::Number(count)) => format!(
                        "for (let __i{id} = 0; __i{id} < {}; __i{id}++) {{",
                        format_num(*count)
                    ),
                    _ => format!(
                        "for (let __i{id} = 0, __n{id} = {}; __i{id} < __n{id}; __i{id}++) {{",
                        self.number_arg(block, 0)?
                    ),
                };
                self.line(&header);
                self.emit_nested(block.body.as_deref())?;
                self.indent += 1;
                let wait = self.frame_wait();
                self.line(&wait);
                self.indent -= 1;
                self.line("}");
            }
            "forever" => {
                let id = self.next_id();
                self.line(&format!("const __forever{} = async () => {{", id));
                self.emit_nested(block.body.as_deref())?;
                self.indent += 1;
                self.line(&format!(
                    "setTimeout(__forever{}, {});",
                    id, self.options.frame_delay_ms
                ));
                self.indent -= 1;
                self.line("};");
                self.line(&format!("await __forever{}();", id));
            }
            "if" | "ifElse" => {
                let condition = self.arg(block, 0)?;
                self.line(&format!("if ({}) {{", condition));
                self.emit_nested(block.body.as_deref())?;
                if block.name == "ifElse" {
                    self.line("} else {");
                    self.emit_nested(block.else_body.as_deref())?;
                }
                self.line("}");
            }
            "waitUntil" => {
                let condition = self.arg(block, 0)?;
                let id = self.next_id();
                self.line("await new Promise((resolve) => {");
                self.indent += 1;
                self.line(&format!(
                    "const __wait{id} = () => (({}) ? resolve() : setTimeout(__wait{id}, {}));",
                    condition, self.options.frame_delay_ms
                ));
                self.line(&format!("__wait{}();", id));
                self.indent -= 1;
                self.line("});");
            }
            "repeatUntil" => {
                let condition = self.arg(block, 0)?;
                self.line(&format!("while (!({})) {{", condition));
                self.emit_nested(block.body.as_deref())?;
                self.indent += 1;
                let wait = self.frame_wait();
                self.line(&wait);
                self.indent -= 1;
                self.line("}");
            }
            "stop" => {
                match block.args.first().and_then(Arg::as_text).unwrap_or("all") {
                    "this script" => self.line("return;"),
                    option @ ("all" | "other scripts") => self.line(&format!(
                        "scratchRuntime.log({});",
                        js_string(&format!("stop {}", option))
                    )),
                    _ => return Err(unsupported(block)),
                }
            }
            _ => return Err(unsupported(block)),
        }
        Ok(())
    }

    fn emit_sensing(&mut self, block: &Block) -> GenResult<()> {
        let code = match block.name {
            "ask" => format!("await scratchRuntime.ask(sprite, {});", self.arg(block, 0)?),
            "resetTimer" => "scratchRuntime.resetTimer();".to_string(),
            _ => return Err(unsupported(block)),
        };
        self.line(&code);
        Ok(())
    }

    fn emit_variable(&mut self, block: &Block) -> GenResult<()> {
        let code = match block.name {
            "setVariable" => {
                let target = self.assign_target(block)?;
                format!("{} = {};", target, self.arg(block, 1)?)
            }
            "changeVariable" => {
                let target = self.assign_target(block)?;
                format!("{} = Number({}) + {};", target, target, self.number_arg(block, 1)?)
            }
            "showVariable" | "hideVariable" => {
                let name = match block.args.first() {
                    Some(Arg::Var(name)) => self.variable_key(name),
                    _ => return Err(missing(block)),
                };
                format!(
                    "scratchRuntime.setVariableVisible({}, {});",
                    js_string(&name),
                    block.name == "showVariable"
                )
            }
            "addToList" => format!("{}.push({});", self.arg(block, 1)?, self.arg(block, 0)?),
            "deleteAllOfList" => format!("{}.length = 0;", self.arg(block, 0)?),
            "deleteOfList" => format!(
                "{}.splice({} - 1, 1);",
                self.arg(block, 1)?,
                self.number_arg(block, 0)?
            ),
            "insertAtList" => format!(
                "{}.splice({} - 1, 0, {});",
                self.arg(block, 2)?,
                self.number_arg(block, 1)?,
                self.arg(block, 0)?
            ),
            "replaceItemOfList" => format!(
                "{}[{} - 1] = {};",
                self.arg(block, 1)?,
                self.number_arg(block, 0)?,
                self.arg(block, 2)?
            ),
            _ => return Err(unsupported(block)),
        };
        self.line(&code);
        Ok(())
    }

    fn emit_pen(&mut self, block: &Block) -> GenResult<()> {
        self.inject_pen();
        let code = match block.name {
            "penDown" | "penUp" | "penClear" | "stamp" => format!("sprite.{}();", block.name),
            "setPenColor" | "setPenSize" | "changePenSize" => {
                format!("sprite.{}({});", block.name, self.arg(block, 0)?)
            }
            _ => return Err(unsupported(block)),
        };
        self.line(&code);
        Ok(())
    }

    fn emit_custom(&mut self, block: &Block) -> GenResult<()> {
        match block.name {
            "defineFunction" => {
                let stub = self.procedure(block)?;
                let mut params = HashMap::new();
                let mut idents: Vec<String> = Vec::new();
                for param in &stub.params {
                    let mut ident = format!("p_{}", js_identifier(param));
                    if idents.contains(&ident) {
                        ident = format!("{}_{}", ident, idents.len());
                    }
                    params.insert(param.to_lowercase(), ident.clone());
                    idents.push(ident);
                }
                let mut signature = vec!["sprite".to_string()];
                signature.extend(idents);
                self.line(&format!(
                    "{} = async function ({}) {{",
                    self.procedure_ref(&stub.name),
                    signature.join(", ")
                ));
                let outer = std::mem::replace(&mut self.params, params);
                let result = self.emit_nested(block.next.as_deref());
                self.params = outer;
                result?;
                self.line("};");
                Ok(())
            }
            "call" => {
                let stub = self.procedure(block)?;
                let mut args = vec!["sprite".to_string()];
                for index in 1..block.args.len() {
                    args.push(self.arg(block, index)?);
                }
                self.line(&format!(
                    "await {}({});",
                    self.procedure_ref(&stub.name),
                    args.join(", ")
                ));
                Ok(())
            }
            _ => Err(unsupported(block)),
        }
    }

    fn procedure(&self, block: &Block) -> GenResult<ProcedureStub> {
        let name = block.procedure_name().ok_or_else(|| missing(block))?;
        self.procedures
            .get(&(self.sprite_index, name.to_lowercase()))
            .cloned()
            .ok_or_else(|| GenerateError::UnknownProcedure {
                name: name.to_string(),
                sprite: self.sprite_name.clone(),
            })
    }

    fn procedure_ref(&self, name: &str) -> String {
        format!(
            "scratchRuntime.procedures[{}][{}]",
            js_string(&self.sprite_name),
            js_string(name)
        )
    }

    fn assign_target(&self, block: &Block) -> GenResult<String> {
        match block.args.first() {
            Some(Arg::Var(name)) => Ok(self.variable_ref(name)),
            _ => Err(missing(block)),
        }
    }

    fn arg(&self, block: &Block, index: usize) -> GenResult<String> {
        let arg = block.args.get(index).unwrap_or(&Arg::Missing);
        self.format_arg(arg).map_err(|err| match err {
            GenerateError::MissingValue { .. } => missing(block),
            other => other,
        })
    }

    /// An argument coerced to a number; literals stay bare.
    fn number_arg(&self, block: &Block, index: usize) -> GenResult<String> {
        match block.args.get(index) {
            Some(Arg::Number(value)) => Ok(format_num(*value)),
            _ => Ok(format!("Number({})", self.arg(block, index)?)),
        }
    }

    fn text_arg(&self, block: &Block, index: usize) -> GenResult<String> {
        match block.args.get(index) {
            Some(Arg::Text(value)) => Ok(js_string(value)),
            Some(Arg::List(_)) => Ok(format!("{}.join(\" \")", self.arg(block, index)?)),
            _ => Ok(format!("String({})", self.arg(block, index)?)),
        }
    }

    fn variable_key(&self, name: &str) -> String {
        self.variable_names
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }

    fn variable_ref(&self, name: &str) -> String {
        if let Some(ident) = self.params.get(&name.to_lowercase()) {
            return ident.clone();
        }
        format!("scratchRuntime.variables[{}]", js_string(&self.variable_key(name)))
    }

    fn list_ref(&self, name: &str) -> String {
        let key = self
            .list_names
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string());
        format!("scratchRuntime.lists[{}]", js_string(&key))
    }

    /// Turns one argument into a JS expression. Never mutates the generator.
    fn format_arg(&self, arg: &Arg) -> GenResult<String> {
        match arg {
            Arg::Number(value) => Ok(format_num(*value)),
            Arg::Text(value) => Ok(js_string(value)),
            Arg::Var(name) => Ok(self.variable_ref(name)),
            Arg::List(name) => Ok(self.list_ref(name)),
            Arg::ListLiteral(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.format_arg(item))
                    .collect::<GenResult<Vec<_>>>()?;
                Ok(format!("[{}]", parts.join(", ")))
            }
            Arg::Block(block) => self.expression(block),
            Arg::Missing => Err(GenerateError::MissingValue {
                block: "value",
                line: 0,
            }),
        }
    }

    fn expression(&self, block: &Block) -> GenResult<String> {
        if !crate::blocks::is_reporter(block.name) {
            return Err(not_a_value(block));
        }
        match block.category {
            Category::Motion => self.motion_expr(block),
            Category::Looks => self.looks_expr(block),
            Category::Sensing => self.sensing_expr(block),
            Category::Operator => self.operator_expr(block),
            Category::Variable => self.variable_expr(block),
            _ => Err(unsupported(block)),
        }
    }

    fn motion_expr(&self, block: &Block) -> GenResult<String> {
        match block.name {
            "xPosition" => Ok("sprite.x".to_string()),
            "yPosition" => Ok("sprite.y".to_string()),
            "direction" => Ok("sprite.direction".to_string()),
            _ => Err(unsupported(block)),
        }
    }

    fn looks_expr(&self, block: &Block) -> GenResult<String> {
        match block.name {
            "costumeNumber" => Ok("(sprite.costumeIndex + 1)".to_string()),
            "size" => Ok("sprite.size".to_string()),
            _ => Err(unsupported(block)),
        }
    }

    fn sensing_expr(&self, block: &Block) -> GenResult<String> {
        match block.name {
            "answer" => Ok("scratchRuntime.answer".to_string()),
            "timer" => Ok("scratchRuntime.timer()".to_string()),
            "mouseX" => Ok("scratchRuntime.mouseX".to_string()),
            "mouseY" => Ok("scratchRuntime.mouseY".to_string()),
            "touching" => Ok(format!("sprite.touching({})", self.arg(block, 0)?)),
            "keyPressed" => Ok(format!("scratchRuntime.keyPressed({})", self.arg(block, 0)?)),
            _ => Err(unsupported(block)),
        }
    }

    fn operator_expr(&self, block: &Block) -> GenResult<String> {
        let binary = |op: &str| -> GenResult<String> {
            Ok(format!(
                "({} {} {})",
                self.number_arg(block, 0)?,
                op,
                self.number_arg(block, 1)?
            ))
        };
        let logical = |op: &str| -> GenResult<String> {
            Ok(format!("({} {} {})", self.arg(block, 0)?, op, self.arg(block, 1)?))
        };
        let math = |func: &str| -> GenResult<String> {
            Ok(format!("(Math.{}({}))", func, self.number_arg(block, 0)?))
        };
        match block.name {
            "add" => binary("+"),
            "subtract" => binary("-"),
            "multiply" => binary("*"),
            "divide" => binary("/"),
            "mod" => binary("%"),
            "lessThan" => binary("<"),
            "lessOrEqual" => binary("<="),
            "greaterThan" => binary(">"),
            "greaterOrEqual" => binary(">="),
            "equals" => logical("=="),
            "notEquals" => logical("!="),
            "and" => logical("&&"),
            "or" => logical("||"),
            "negate" => Ok(format!("(-{})", self.number_arg(block, 0)?)),
            "not" => Ok(format!("(!{})", self.arg(block, 0)?)),
            "round" => math("round"),
            "abs" => math("abs"),
            "sqrt" => math("sqrt"),
            "floor" => math("floor"),
            "ceiling" => math("ceil"),
            "random" => Ok(format!(
                "(scratchRuntime.random({}, {}))",
                self.arg(block, 0)?,
                self.arg(block, 1)?
            )),
            "join" => Ok(format!(
                "({} + {})",
                self.text_arg(block, 0)?,
                self.text_arg(block, 1)?
            )),
            "letterOf" => Ok(format!(
                "({}.charAt({} - 1))",
                self.text_arg(block, 1)?,
                self.number_arg(block, 0)?
            )),
            "length" => match block.args.first() {
                Some(Arg::List(_)) => Ok(format!("({}.length)", self.arg(block, 0)?)),
                _ => Ok(format!("({}.length)", self.text_arg(block, 0)?)),
            },
            "contains" => match block.args.first() {
                Some(Arg::List(_)) => Ok(format!(
                    "({}.some((item) => String(item).toLowerCase() === String({}).toLowerCase()))",
                    self.arg(block, 0)?,
                    self.arg(block, 1)?
                )),
                _ => Ok(format!(
                    "({}.toLowerCase().includes({}.toLowerCase()))",
                    self.text_arg(block, 0)?,
                    self.text_arg(block, 1)?
                )),
            },
            _ => Err(unsupported(block)),
        }
    }

    fn variable_expr(&self, block: &Block) -> GenResult<String> {
        match block.name {
            "itemOf" => Ok(format!(
                "({}[{} - 1] ?? \"\")",
                self.arg(block, 1)?,
                self.number_arg(block, 0)?
            )),
            _ => Err(unsupported(block)),
        }
    }
}

fn sprite_var(index: usize) -> String {
    format!("sprite_{}", index)
}

fn unsupported(block: &Block) -> GenerateError {
    GenerateError::Unsupported {
        category: block.category,
        block: block.name,
        line: block.pos.line,
    }
}

fn missing(block: &Block) -> GenerateError {
    GenerateError::MissingValue {
        block: block.name,
        line: block.pos.line,
    }
}

fn not_a_value(block: &Block) -> GenerateError {
    GenerateError::NotAValue {
        block: block.name,
        line: block.pos.line,
    }
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::Number(n) => format_num(*n),
        Literal::Text(text) => js_string(text),
    }
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

fn js_string_array(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

fn js_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Shortest text that reads back as the same `f64`, spelled as a JS literal.
fn format_num(v: f64) -> String {
    if v.is_nan() {
        return "NaN".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    format!("{}", v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn program(source: &str) -> Program {
        let (tokens, lex) = tokenize(source);
        assert!(lex.is_empty(), "{:?}", lex);
        let (program, diagnostics) = parse(tokens);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
        program
    }

    fn sprite<'a>(name: &'a str, program: &'a Program) -> SpriteProgram<'a> {
        SpriteProgram {
            name,
            program,
            is_stage: false,
            costume_names: &[],
            sound_names: &[],
        }
    }

    fn generate_one(source: &str) -> GeneratedOutput {
        let program = program(source);
        generate(&[sprite("Cat", &program)], &CodegenOptions::default()).unwrap()
    }

    #[test]
    fn repeat_becomes_bounded_for_loop() {
        let out = generate_one("when flag clicked\n    repeat 3\n        move 10\n");
        assert!(out.user_code.contains("scratchRuntime.onFlag(sprite_0, async (sprite) => {"));
        assert!(out
            .user_code
            .contains("for (let __i1 = 0; __i1 < 3; __i1++) {\n        sprite.move(10);"));
        assert!(out.js.starts_with(&RuntimeBuilder::new().render(16)[..40]));
        assert!(out.js.ends_with(&boot_code(true)));
        assert!(out.html.contains("sprite.move(10);"));
    }

    #[test]
    fn sprite_variables_and_lists_are_initialized_in_order() {
        let out = generate_one("var score = 0\nlist items = 1, \"two\"\nwhen flag clicked\n    set Score to 5\n");
        let code = &out.user_code;
        let create = code.find("const sprite_0 = scratchRuntime.createSprite(\"Cat\"").unwrap();
        let var = code.find("scratchRuntime.variables[\"score\"] = 0;").unwrap();
        let list = code.find("scratchRuntime.lists[\"items\"] = [1, \"two\"];").unwrap();
        let script = code.find("scratchRuntime.variables[\"score\"] = 5;").unwrap();
        assert!(create < var && var < list && list < script);
    }

    #[test]
    fn forever_reschedules_itself() {
        let out = generate_one("when flag clicked\n    forever\n        turn right 15\n");
        assert!(out.user_code.contains("const __forever1 = async () => {"));
        assert!(out.user_code.contains("setTimeout(__forever1, 16);"));
        assert!(out.user_code.contains("await __forever1();"));
    }

    #[test]
    fn control_flow_forms() {
        let out = generate_one(
            "when flag clicked\n    wait 2 seconds\n    if x position > 10 then\n        say \"far\"\n    else\n        stop this script\n    wait until key space pressed\n    repeat until touching edge\n        move 1\n    stop all\n",
        );
        let code = &out.user_code;
        assert!(code.contains("await new Promise((resolve) => setTimeout(resolve, 2 * 1000));"));
        assert!(code.contains("if ((Number(sprite.x) > 10)) {"));
        assert!(code.contains("} else {"));
        assert!(code.contains("return;"));
        assert!(code.contains("scratchRuntime.keyPressed(\"space\")"));
        assert!(code.contains("while (!(sprite.touching(\"edge\"))) {"));
        assert!(code.contains("scratchRuntime.log(\"stop all\");"));
    }

    #[test]
    fn operators_are_parenthesized_and_coerced() {
        let out = generate_one("var a = 1\nwhen flag clicked\n    say join \"a\" a\n    say a + 2 * 3\n    if a == \"1\"\n        say length of \"abc\"\n");
        let code = &out.user_code;
        assert!(code.contains("sprite.say((\"a\" + String(scratchRuntime.variables[\"a\"])));"));
        assert!(code.contains("sprite.say((Number(scratchRuntime.variables[\"a\"]) + Number((2 * 3))));"));
        assert!(code.contains("if ((scratchRuntime.variables[\"a\"] == \"1\")) {"));
        assert!(code.contains("(\"abc\".length)"));
    }

    #[test]
    fn procedures_register_stub_then_definition() {
        let out = generate_one(
            "define jump height\n    change y by height\nwhen flag clicked\n    call jump 10\n    jump 5\n",
        );
        let code = &out.user_code;
        let stub = code
            .find("scratchRuntime.procedures[\"Cat\"][\"jump\"] = async () => {};")
            .unwrap();
        let def = code
            .find("scratchRuntime.procedures[\"Cat\"][\"jump\"] = async function (sprite, p_height) {")
            .unwrap();
        assert!(stub < def);
        assert!(code.contains("sprite.changeY(p_height);"));
        assert!(code.contains("await scratchRuntime.procedures[\"Cat\"][\"jump\"](sprite, 10);"));
        assert!(code.contains("await scratchRuntime.procedures[\"Cat\"][\"jump\"](sprite, 5);"));
    }

    #[test]
    fn find_procedures_reads_definitions_along_the_chain() {
        let program = program("define greet who\n    say who\n");
        let found = program
            .top_blocks()
            .flat_map(find_procedures_in_block)
            .collect::<Vec<_>>();
        assert_eq!(found, vec![("greet".to_string(), vec!["who".to_string()])]);
    }

    #[test]
    fn pen_runtime_is_added_only_when_used() {
        let plain = generate_one("when flag clicked\n    move 1\n");
        assert!(!plain.js.contains("updatePenDrawing"));
        let pen = generate_one("when flag clicked\n    pen down\n    move 1\n    pen up\n");
        assert_eq!(pen.js.matches("updatePenDrawing() {").count(), 1);
        assert!(pen.user_code.contains("sprite.penDown();"));
    }

    #[test]
    fn broadcast_and_wait_uses_configured_delay() {
        let program = program("when flag clicked\n    broadcast \"go\" and wait\n");
        let options = CodegenOptions {
            broadcast_wait_ms: 250,
            ..CodegenOptions::default()
        };
        let out = generate(&[sprite("Cat", &program)], &options).unwrap();
        assert!(out.user_code.contains("await scratchRuntime.broadcast(\"go\");"));
        assert!(out.user_code.contains("setTimeout(resolve, 250)"));
    }

    #[test]
    fn format_arg_is_pure() {
        let options = CodegenOptions::default();
        let state = GeneratorState::new(&options);
        let arg = Arg::ListLiteral(vec![Arg::Number(1.5), Arg::Text("a\"b".into()), Arg::Var("v".into())]);
        let first = state.format_arg(&arg).unwrap();
        let second = state.format_arg(&arg).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "[1.5, \"a\\\"b\", scratchRuntime.variables[\"v\"]]");
    }

    #[test]
    fn missing_and_statement_args_are_errors() {
        let options = CodegenOptions::default();
        let state = GeneratorState::new(&options);
        assert!(matches!(
            state.format_arg(&Arg::Missing),
            Err(GenerateError::MissingValue { .. })
        ));
        let statement = Block::new(Category::Motion, "move", vec![Arg::Number(1.0)], Position::new(3, 5));
        assert_eq!(
            state.format_arg(&Arg::Block(Box::new(statement))),
            Err(GenerateError::NotAValue {
                block: "move",
                line: 3
            })
        );
    }

    #[test]
    fn progress_reports_every_phase() {
        let program = program("when flag clicked\n    show\n");
        let mut seen = Vec::new();
        let mut cb = |step: usize, total: usize, label: &str| seen.push((step, total, label.to_string()));
        generate_with_progress(&[sprite("Cat", &program)], &CodegenOptions::default(), Some(&mut cb))
            .unwrap();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen.last().map(|s| (s.0, s.1)), Some((5, 5)));
    }

    #[test]
    fn format_num_keeps_every_digit() {
        assert_eq!(format_num(3.0), "3");
        assert_eq!(format_num(-2.5), "-2.5");
        assert_eq!(format_num(0.1234567), "0.1234567");
        assert_eq!(format_num(1e20), "100000000000000000000");
        assert_eq!(format_num(f64::INFINITY), "Infinity");
        let text = format_num(0.1 + 0.2);
        assert_eq!(text.parse::<f64>().unwrap(), 0.1 + 0.2);
    }

    #[test]
    fn numeric_literals_pass_through_unchanged() {
        let output = generate_one("when flag clicked\n    say 0.1234567\n    move 100000000000000000000\n");
        assert!(output.user_code.contains("sprite.say(0.1234567);"), "{}", output.user_code);
        assert!(output.user_code.contains("sprite.move(100000000000000000000);"), "{}", output.user_code);
    }
}
