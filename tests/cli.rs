use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sbtext-js"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("failed to run sbtext-js")
}

#[test]
fn writes_html_and_js_for_a_sprite_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("cat.sbtext"), "when flag clicked\n    move 10\n").unwrap();

    let output = run(
        dir.path(),
        &["cat.sbtext", "-o", "build/index.html", "--emit-js", "build/game.js", "--title", "Cat Game"],
    );
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let html = fs::read_to_string(dir.path().join("build/index.html")).unwrap();
    assert!(html.contains("<title>Cat Game</title>"));
    assert!(html.contains("sprite.move(10);"));
    let js = fs::read_to_string(dir.path().join("build/game.js")).unwrap();
    assert!(js.contains("const scratchRuntime"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("[Compile] Loading sources..."));
}

#[test]
fn failing_compile_renders_caret_and_exits_non_zero() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("cat.sbtext"), "when flag clicked\n    wait \"soon\"\n").unwrap();

    let output = run(dir.path(), &["cat.sbtext", "-o", "index.html"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E3002]"), "{}", stderr);
    assert!(stderr.contains("2 |     wait \"soon\""), "{}", stderr);
    assert!(stderr.contains('^'));
    assert!(!dir.path().join("index.html").exists());
}

#[test]
fn json_output_for_a_manifest_project() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("stage.sbtext"), "when I receive \"start\"\n    next backdrop\n").unwrap();
    fs::write(dir.path().join("cat.sbtext"), "when flag clicked\n    broadcast \"start\"\n").unwrap();
    fs::write(
        dir.path().join("project.json"),
        r#"{ "title": "Demo", "sprites": [
            { "file": "stage.sbtext", "name": "Stage", "isStage": true },
            { "file": "cat.sbtext", "name": "Cat" }
        ] }"#,
    )
    .unwrap();

    let output = run(dir.path(), &["--manifest", "project.json", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], true);
    assert!(value["userCode"].as_str().unwrap().contains("scratchRuntime.broadcast(\"start\");"));
    assert!(value["html"].as_str().unwrap().contains("<title>Demo</title>"));
}

#[test]
fn stage_flag_marks_the_named_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("backdrop.sbtext"), "when flag clicked\n    move 1\n").unwrap();
    fs::write(dir.path().join("cat.sbtext"), "when flag clicked\n    move 1\n").unwrap();

    let output = run(dir.path(), &["backdrop.sbtext", "cat.sbtext", "--stage", "backdrop"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error[E3007]"), "{}", stderr);
    assert!(stderr.contains("backdrop.sbtext"), "{}", stderr);
}

#[test]
fn missing_input_file_is_an_error() {
    let dir = tempdir().unwrap();
    let output = run(dir.path(), &["nope.sbtext"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("nope.sbtext"));
}
