use clap::{Parser, ValueEnum};
use slim_transpiler::{CompileError, CompileResult, Format, Options, compile_file, compile_with};
use std::fs;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "slimc")]
#[command(about = "Compile Slim templates to Go text/template source")]
struct Cli {
    /// Path to a .slim file
    #[arg(required_unless_present = "stdin")]
    input: Option<PathBuf>,

    /// Read the template from stdin; imports resolve against the current directory
    #[arg(long)]
    stdin: bool,

    /// Emit compact output without structural newlines
    #[arg(long)]
    compact: bool,

    /// Emit {{/* file:line:col */}} markers before statements
    #[arg(long)]
    line_numbers: bool,

    /// Doctype table to use
    #[arg(long, value_enum)]
    format: Option<FormatArg>,

    /// Extension appended to import/extend targets that have none
    #[arg(long)]
    extension: Option<String>,

    /// JSON file with compile options; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the result (or the error, on stderr) as JSON
    #[arg(long)]
    json: bool,

    /// Log debug information to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Html,
    Xhtml,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Html => Format::Html,
            FormatArg::Xhtml => Format::Xhtml,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();

    let options = match load_options(&cli) {
        Ok(options) => options,
        Err(message) => fail(&message),
    };

    let (source, result) = if cli.stdin {
        let mut source = String::new();
        if let Err(err) = io::stdin().read_to_string(&mut source) {
            fail(&format!("Failed to read stdin: {}", err));
        }
        let options = Options {
            base_dir: options.base_dir.clone().or_else(|| Some(PathBuf::from("."))),
            ..options
        };
        let result = compile_with(&source, &options);
        (source, result)
    } else if let Some(path) = &cli.input {
        let result = compile_file(path, &options);
        (read_for_report(path), result)
    } else {
        fail("provide a template path or use --stdin")
    };

    match result {
        Ok(result) => print_result(&result, cli.json),
        Err(err) if cli.json => report_json(&err),
        Err(err) => report(&err, &source, cli.input.as_deref()),
    }
}

/// Config file first, then flags on top
fn load_options(cli: &Cli) -> Result<Options, String> {
    let mut options = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|err| format!("Failed to read {}: {}", path.display(), err))?;
            serde_json::from_str(&text)
                .map_err(|err| format!("Invalid config {}: {}", path.display(), err))?
        }
        None => Options::default(),
    };

    if cli.compact {
        options.pretty_print = false;
    }
    if cli.line_numbers {
        options.line_numbers = true;
    }
    if let Some(format) = cli.format {
        options.format = format.into();
    }
    if let Some(extension) = &cli.extension {
        options.extension = extension.clone();
    }

    Ok(options)
}

fn print_result(result: &CompileResult, json: bool) {
    if json {
        match serde_json::to_string(result) {
            Ok(text) => println!("{}", text),
            Err(err) => fail(&format!("Failed to serialize result: {}", err)),
        }
    } else {
        print!("{}", result.code);
    }
}

/// Source of the file the error points at, for the excerpt
fn read_for_report(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}

fn report(err: &CompileError, source: &str, input: Option<&Path>) -> ! {
    // Errors raised inside an imported or parent template point at that file
    let excerpt = match (&err.position.filename, input) {
        (Some(file), Some(input)) if Path::new(&**file) != input => {
            fs::read_to_string(&**file).unwrap_or_default()
        }
        _ => source.to_string(),
    };

    if io::stderr().is_terminal() {
        eprint!("{}", err.render_color(&excerpt));
    } else {
        eprint!("{}", err.render(&excerpt));
    }
    process::exit(1);
}

/// Machine-readable failure for editor integrations
fn report_json(err: &CompileError) -> ! {
    let report = serde_json::json!({
        "error": err,
        "category": err.category(),
    });
    eprintln!("{}", report);
    process::exit(1);
}

fn fail(message: &str) -> ! {
    if io::stderr().is_terminal() {
        eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
    } else {
        eprintln!("error: {}", message);
    }
    process::exit(1);
}
