use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sbtext-js",
    about = "Compile SBText sprite sources into a JavaScript program and a standalone HTML page."
)]
pub struct Args {
    #[arg(
        value_name = "INPUT",
        required = true,
        help = "Sprite source files, each named by its file stem (or one manifest with --manifest)."
    )]
    pub inputs: Vec<PathBuf>,

    #[arg(long, help = "Treat the single INPUT as a JSON project manifest.")]
    pub manifest: bool,

    #[arg(long, value_name = "NAME", help = "Mark the sprite with this name as the Stage.")]
    pub stage: Option<String>,

    #[arg(short, long, value_name = "HTML", help = "Write the HTML page to this path.")]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "PATH", help = "Write the generated JavaScript to this path.")]
    pub emit_js: Option<PathBuf>,

    #[arg(long, help = "Print the compile result as JSON on stdout.")]
    pub json: bool,

    #[arg(long, help = "Title of the generated HTML page.")]
    pub title: Option<String>,

    #[arg(long, help = "Wait for the green flag button instead of starting on page load.")]
    pub no_auto_start: bool,

    #[arg(long, help = "Log compiler stages to stderr.")]
    pub verbose: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_multiple_inputs_and_flags() {
        let args = Args::try_parse_from([
            "sbtext-js",
            "cat.sbtext",
            "stage.sbtext",
            "--stage",
            "stage",
            "-o",
            "out/index.html",
            "--no-auto-start",
        ])
        .unwrap();
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.stage.as_deref(), Some("stage"));
        assert_eq!(args.output, Some(PathBuf::from("out/index.html")));
        assert!(args.no_auto_start);
        assert!(!args.json);
    }

    #[test]
    fn input_is_required() {
        assert!(Args::try_parse_from(["sbtext-js", "--json"]).is_err());
    }
}
