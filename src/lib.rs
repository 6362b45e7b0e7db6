pub mod ast;
pub mod blocks;
pub mod codegen;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod project;
pub mod runtime;
pub mod semantic;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use ast::{Position, Program};
use codegen::{GeneratedOutput, SpriteProgram};
use diagnostics::{codes, has_errors, Diagnostic};
use semantic::{Scope, SpriteContext};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use tracing::debug;

pub use codegen::CodegenOptions as CompileOptions;

/// Name given to the sprite of a single-source compile.
pub const DEFAULT_SPRITE_NAME: &str = "Sprite1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpriteSource {
    pub name: String,
    pub code: String,
    #[serde(default)]
    pub is_stage: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub costume_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound_names: Option<Vec<String>>,
}

impl SpriteSource {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            ..Self::default()
        }
    }

    pub fn stage(mut self) -> Self {
        self.is_stage = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub js: String,
    pub html: String,
    pub user_code: String,
    pub diagnostics: Vec<Diagnostic>,
    pub success: bool,
}

impl CompileResult {
    fn failed(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            diagnostics,
            ..Self::default()
        }
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

pub fn compile(source: &str) -> CompileResult {
    compile_with_options(source, &CompileOptions::default())
}

pub fn compile_with_options(source: &str, options: &CompileOptions) -> CompileResult {
    let sprite = SpriteSource::new(DEFAULT_SPRITE_NAME, source);
    guarded(|| compile_sprites(std::slice::from_ref(&sprite), options, false))
}

pub fn compile_multi_sprite(sprites: &[SpriteSource]) -> CompileResult {
    compile_multi_sprite_with_options(sprites, &CompileOptions::default())
}

pub fn compile_multi_sprite_with_options(sprites: &[SpriteSource], options: &CompileOptions) -> CompileResult {
    guarded(|| compile_sprites(sprites, options, true))
}

fn guarded<F>(run: F) -> CompileResult
where
    F: FnOnce() -> CompileResult,
{
    match panic::catch_unwind(AssertUnwindSafe(run)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            CompileResult::failed(vec![internal_error(&detail)])
        }
    }
}

fn internal_error(detail: &str) -> Diagnostic {
    Diagnostic::error(
        codes::INTERNAL,
        format!("Internal compiler error: {}", detail),
        Position::new(1, 1),
    )
    .with_suggestion("This is a compiler bug; please report it with the source that triggered it")
}

fn compile_sprites(sprites: &[SpriteSource], options: &CompileOptions, prefix: bool) -> CompileResult {
    let mut diagnostics = check_sprite_set(sprites);
    if has_errors(&diagnostics) {
        return CompileResult::failed(diagnostics);
    }

    let tag = |diag: Diagnostic, name: &str| if prefix { diag.for_sprite(name) } else { diag };

    let mut programs: Vec<Option<Program>> = Vec::with_capacity(sprites.len());
    let mut front_end_failed = Vec::with_capacity(sprites.len());
    for sprite in sprites {
        let (program, found) = front_end(&sprite.code);
        debug!(
            sprite = %sprite.name,
            diagnostics = found.len(),
            scripts = program.as_ref().map_or(0, |p| p.scripts.len()),
            "front end finished"
        );
        front_end_failed.push(has_errors(&found));
        diagnostics.extend(found.into_iter().map(|d| tag(d, &sprite.name)));
        programs.push(program);
    }

    let scope = Scope::from_programs(programs.iter().flatten());
    for ((sprite, program), failed) in sprites.iter().zip(&programs).zip(&front_end_failed) {
        let Some(program) = program else {
            continue;
        };
        if *failed {
            continue;
        }
        let (procedures, mut found) = semantic::collect_procedures(program);
        let context = SpriteContext {
            name: &sprite.name,
            is_stage: sprite.is_stage,
            costume_names: sprite.costume_names.as_deref(),
            sound_names: sprite.sound_names.as_deref(),
            scope: &scope,
        };
        found.extend(semantic::validate(program, &sprite.code, &procedures, &context));
        debug!(sprite = %sprite.name, diagnostics = found.len(), "validation finished");
        diagnostics.extend(found.into_iter().map(|d| tag(d, &sprite.name)));
    }

    let pairs = sprites
        .iter()
        .zip(&programs)
        .filter_map(|(sprite, program)| program.as_ref().map(|p| (sprite.name.as_str(), p)))
        .collect::<Vec<_>>();
    for diag in semantic::check_broadcasts(&pairs) {
        let name = diag.sprite.clone().unwrap_or_default();
        let diag = if prefix {
            diag.for_sprite(&name)
        } else {
            Diagnostic { sprite: None, ..diag }
        };
        diagnostics.push(diag);
    }

    if has_errors(&diagnostics) {
        debug!(errors = diagnostics.iter().filter(|d| d.is_error()).count(), "skipping generation");
        return CompileResult::failed(diagnostics);
    }

    let empty: &[String] = &[];
    let inputs = sprites
        .iter()
        .zip(&programs)
        .filter_map(|(sprite, program)| {
            program.as_ref().map(|program| SpriteProgram {
                name: &sprite.name,
                program,
                is_stage: sprite.is_stage,
                costume_names: sprite.costume_names.as_deref().unwrap_or(empty),
                sound_names: sprite.sound_names.as_deref().unwrap_or(empty),
            })
        })
        .collect::<Vec<_>>();

    match codegen::generate(&inputs, options) {
        Ok(GeneratedOutput { js, html, user_code }) => {
            debug!(js_bytes = js.len(), html_bytes = html.len(), "generation finished");
            CompileResult {
                js,
                html,
                user_code,
                diagnostics,
                success: true,
            }
        }
        Err(err) => {
            diagnostics.push(internal_error(&err.to_string()));
            CompileResult::failed(diagnostics)
        }
    }
}

/// Placeholder scan, tokenizer and tree builder for one sprite. A placeholder
/// hit stops the sprite before tokenizing.
fn front_end(source: &str) -> (Option<Program>, Vec<Diagnostic>) {
    match semantic::scan_placeholders(source) {
        Ok(found) if !found.is_empty() => return (None, found),
        Ok(_) => {}
        Err(err) => return (None, vec![internal_error(&err.to_string())]),
    }
    let (tokens, mut diagnostics) = lexer::tokenize(source);
    debug!(tokens = tokens.len(), "tokenized");
    let (program, parse_diagnostics) = parser::parse(tokens);
    diagnostics.extend(parse_diagnostics);
    (Some(program), diagnostics)
}

fn check_sprite_set(sprites: &[SpriteSource]) -> Vec<Diagnostic> {
    let origin = Position::new(1, 1);
    let mut diagnostics = Vec::new();
    if sprites.is_empty() {
        diagnostics.push(
            Diagnostic::error(codes::NO_SPRITES, "No sprites to compile", origin)
                .with_suggestion("Pass at least one sprite source"),
        );
        return diagnostics;
    }
    for name in project::duplicate_names(sprites) {
        diagnostics.push(
            Diagnostic::error(
                codes::DUPLICATE_SPRITE,
                format!("Sprite name '{}' is used more than once", name),
                origin,
            )
            .with_suggestion("Give every sprite a unique name"),
        );
    }
    let stages = sprites.iter().filter(|s| s.is_stage).count();
    if stages > 1 {
        diagnostics.push(
            Diagnostic::error(
                codes::MULTIPLE_STAGES,
                format!("{} sprites are marked as the Stage; only one may be", stages),
                origin,
            )
            .with_suggestion("Mark a single sprite with isStage"),
        );
    }
    diagnostics
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> anyhow::Result<bool> {
    use anyhow::Context;

    let total_stages = 3 + usize::from(args.output.is_some()) + usize::from(args.emit_js.is_some());
    let progress = CliProgress::new("Compile", total_stages, !args.json);
    let mut stage = 0usize;

    stage += 1;
    progress.emit(stage, "Loading sources");
    let mut loaded = if args.manifest {
        let [manifest] = args.inputs.as_slice() else {
            anyhow::bail!("--manifest takes exactly one INPUT (the manifest file).");
        };
        project::load_manifest(manifest)?
    } else {
        project::sprites_from_files(&args.inputs, None)?
    };
    if let Some(stage_name) = &args.stage {
        project::mark_stage(&mut loaded, stage_name)?;
    }

    let mut options = CompileOptions::default();
    if let Some(title) = args.title.clone().or_else(|| loaded.title.clone()) {
        options.title = title;
    }
    options.auto_start = !args.no_auto_start;

    stage += 1;
    progress.emit(stage, "Compiling sprites");
    let single = loaded.sprites.len() == 1 && !loaded.sprites[0].is_stage;
    let result = if single {
        compile_with_options(&loaded.sprites[0].code, &options)
    } else {
        compile_multi_sprite_with_options(&loaded.sprites, &options)
    };

    stage += 1;
    progress.emit(stage, "Reporting diagnostics");
    for diag in &result.diagnostics {
        let index = match &diag.sprite {
            Some(name) => loaded.sprites.iter().position(|s| &s.name == name),
            None if single => Some(0),
            None => None,
        };
        let (source, label) = match index {
            Some(i) => (
                loaded.sprites[i].code.as_str(),
                loaded.files[i].display().to_string(),
            ),
            None => ("", "<project>".to_string()),
        };
        eprint!("{}", diagnostics::render(diag, source, &label));
    }

    if result.success {
        if let Some(output) = &args.output {
            stage += 1;
            progress.emit(stage, "Writing HTML");
            write_output(output, &result.html)?;
        }
        if let Some(emit_js) = &args.emit_js {
            stage += 1;
            progress.emit(stage, "Writing JavaScript");
            write_output(emit_js, &result.js)?;
        }
    }

    if args.json {
        let json = serde_json::to_string_pretty(&result).context("Failed to serialize the compile result")?;
        println!("{}", json);
    }
    Ok(result.success)
}

#[cfg(not(target_arch = "wasm32"))]
fn write_output(path: &std::path::Path, contents: &str) -> anyhow::Result<()> {
    use anyhow::Context;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write '{}'", path.display()))
}

#[cfg(not(target_arch = "wasm32"))]
struct CliProgress {
    prefix: &'static str,
    total: usize,
    enabled: bool,
}

#[cfg(not(target_arch = "wasm32"))]
impl CliProgress {
    fn new(prefix: &'static str, total: usize, enabled: bool) -> Self {
        Self {
            prefix,
            total: total.max(1),
            enabled,
        }
    }

    fn emit(&self, step: usize, label: &str) {
        if !self.enabled {
            return;
        }
        let step = step.clamp(1, self.total);
        let bar = render_progress_bar(step, self.total, 14);
        eprintln!("[{}] {}... ({}/{}) {}", self.prefix, label, step, self.total, bar);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn render_progress_bar(step: usize, total: usize, width: usize) -> String {
    let width = width.max(1);
    let filled = ((step * width) + (total / 2)) / total;
    let mut s = String::with_capacity(width + 2);
    s.push('[');
    for i in 0..width {
        s.push(if i < filled { '=' } else { '-' });
    }
    s.push(']');
    s
}
