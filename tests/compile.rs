use sbtext_js_core::diagnostics::codes;
use sbtext_js_core::{compile, compile_multi_sprite, compile_multi_sprite_with_options, CompileOptions, SpriteSource};

#[test]
fn repeat_wraps_move_in_bounded_loop() {
    let result = compile("when flagClicked\n    repeat 3\n        move 10\n");
    assert!(result.success, "{:?}", result.diagnostics);
    let code = &result.user_code;
    let for_at = code.find("for (let __i1 = 0; __i1 < 3; __i1++) {").expect("for loop");
    let move_at = code.find("sprite.move(10);").expect("move call");
    let close_at = code[move_at..].find('}').map(|i| i + move_at).expect("loop close");
    assert!(for_at < move_at && move_at < close_at);
    assert!(result.js.contains(code.as_str()));
    assert!(result.html.contains("sprite.move(10);"));
}

#[test]
fn waiting_on_text_requires_a_number() {
    let result = compile("when flagClicked\n    wait \"hello\" seconds\n");
    assert!(!result.success);
    let error = result.errors().next().expect("an error");
    assert!(error.message.contains("requires a number"), "{}", error.message);
    assert_eq!(error.line, 2);
    assert!(result.js.is_empty());
}

#[test]
fn empty_parentheses_are_a_lexical_error() {
    let result = compile("when flag clicked\n    say ()\n    move 10\n");
    assert!(!result.success);
    assert!(result.diagnostics.iter().any(|d| d.code == codes::EMPTY_PARENS));
}

#[test]
fn broadcast_reaches_another_sprite() {
    let result = compile_multi_sprite(&[
        SpriteSource::new("Caller", "when flag clicked\n    broadcast \"start\"\n"),
        SpriteSource::new("Listener", "when I receive \"start\"\n    say \"go\"\n"),
    ]);
    assert!(result.success, "{:?}", result.diagnostics);
    assert!(result.user_code.contains("scratchRuntime.broadcast(\"start\");"));
    assert!(result.user_code.contains("scratchRuntime.onReceive(\"start\", sprite_1, async (sprite) => {"));
    assert!(!result.diagnostics.iter().any(|d| d.code == codes::UNRECEIVED_BROADCAST));
}

#[test]
fn unreceived_broadcast_is_informational() {
    let result = compile_multi_sprite(&[SpriteSource::new("Cat", "when flag clicked\n    broadcast \"nobody\"\n")]);
    assert!(result.success);
    let info = result
        .diagnostics
        .iter()
        .find(|d| d.code == codes::UNRECEIVED_BROADCAST)
        .expect("I3002");
    assert!(info.message.starts_with("[Cat] "));
}

#[test]
fn stage_cannot_move() {
    let result = compile_multi_sprite(&[
        SpriteSource::new("Stage", "when flag clicked\n    move 10\n").stage(),
        SpriteSource::new("Cat", "when flag clicked\n    move 10\n"),
    ]);
    assert!(!result.success);
    let error = result
        .diagnostics
        .iter()
        .find(|d| d.code == codes::STAGE_MOTION)
        .expect("stage motion error");
    assert!(error.message.contains("Stage"));
    assert!(result.js.is_empty() && result.html.is_empty() && result.user_code.is_empty());
}

#[test]
fn malformed_line_is_isolated() {
    let result = compile("when flag clicked\n    move 10\n    ) ) )\n    say \"after\"\n");
    assert!(!result.success);
    let lines = result.errors().map(|d| d.line).collect::<Vec<_>>();
    assert!(!lines.is_empty());
    assert!(lines.iter().all(|&line| line == 3), "{:?}", result.diagnostics);
}

#[test]
fn unknown_block_suggests_correction() {
    let result = compile("when flag clicked\n    mvoe 10\n");
    assert!(!result.success);
    let error = result
        .diagnostics
        .iter()
        .find(|d| d.code == codes::UNKNOWN_BLOCK)
        .expect("unknown block");
    assert!(error.message.contains("Did you mean 'move'?"), "{}", error.message);
}

#[test]
fn full_program_uses_every_runtime_area() {
    let source = "\
var score = 0
list names = \"a\", \"b\"

define bump amount
    change score by amount

when flag clicked
    go to x: 0 y: 0
    pen down
    repeat until score > 5
        bump 1
        move 5
    if touching edge then
        if on edge bounce
    else
        say join \"score \" score for 1 seconds
    add answer to names
    ask \"name?\" and wait
    forever
        turn right 5

when space pressed
    broadcast \"jump\" and wait

when I receive \"jump\"
    change y by 10
";
    let result = compile(source);
    assert!(result.success, "{:?}", result.diagnostics);
    let code = &result.user_code;
    assert!(code.contains("scratchRuntime.procedures[\"Sprite1\"][\"bump\"] = async function (sprite, p_amount) {"));
    assert!(code.contains("while (!((Number(scratchRuntime.variables[\"score\"]) > 5))) {"));
    assert!(code.contains("scratchRuntime.lists[\"names\"].push(scratchRuntime.answer);"));
    assert!(code.contains("await scratchRuntime.ask(sprite, \"name?\");"));
    assert!(code.contains("scratchRuntime.onKey(\"space\", sprite_0, async (sprite) => {"));
    assert!(code.contains("await sprite.sayFor((\"score \" + String(scratchRuntime.variables[\"score\"])), 1);"));
    assert!(result.js.contains("updatePenDrawing() {"));
}

#[test]
fn options_shape_the_output() {
    let options = CompileOptions {
        title: "Race".to_string(),
        frame_delay_ms: 33,
        broadcast_wait_ms: 100,
        auto_start: false,
    };
    let result = compile_multi_sprite_with_options(
        &[SpriteSource::new("Car", "when flag clicked\n    forever\n        move 1\n")],
        &options,
    );
    assert!(result.success);
    assert!(result.html.contains("<title>Race</title>"));
    assert!(result.user_code.contains("setTimeout(__forever1, 33);"));
    assert!(result.js.contains("frameDelay: 33"));
    assert!(result.js.contains("once: true"));
}

#[test]
fn compile_is_deterministic() {
    let source = "var a = 1\nwhen flag clicked\n    say a + 1\n";
    assert_eq!(compile(source), compile(source));
}

#[test]
fn very_long_script_compiles_and_is_freed() {
    let mut source = String::from("when flag clicked\n");
    for _ in 0..100_000 {
        source.push_str("    move 1\n");
    }
    let result = compile(&source);
    assert!(result.success, "{:?}", result.diagnostics.first());
    assert_eq!(result.user_code.matches("sprite.move(1);").count(), 100_000);
}

#[test]
fn minus_after_a_reporter_subtracts() {
    let result = compile("when flag clicked\n    change x by x position -1\n    point in direction -90\n");
    assert!(result.success, "{:?}", result.diagnostics);
    assert!(result.user_code.contains("(Number(sprite.x) - 1)"), "{}", result.user_code);
    assert!(result.user_code.contains("-90"), "{}", result.user_code);
}
