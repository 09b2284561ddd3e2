//! Properties that must hold for every fixture, not just its expected output
//!
//! Run with: cargo test --test invariants

use libtest_mimic::{Arguments, Failed, Trial};
use slim_transpiler::parser::Parser;
use slim_transpiler::{Block, Node, Options, compile_file};
use std::path::{Path, PathBuf};

fn fixtures() -> Vec<PathBuf> {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures");
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "slim"))
        .filter(|path| !path.components().any(|c| c.as_os_str() == "errors"))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| !name.starts_with('_'))
        })
        .collect();
    files.sort();
    files
}

fn contains_named_block(block: &Block) -> bool {
    block.children.iter().any(|node| match node {
        Node::NamedBlock(_) => true,
        Node::Block(inner) => contains_named_block(inner),
        Node::Tag(tag) => tag.block.as_ref().is_some_and(contains_named_block),
        Node::Comment(comment) => comment.block.as_ref().is_some_and(contains_named_block),
        Node::Each(each) => each.block.as_ref().is_some_and(contains_named_block),
        Node::Condition(condition) => {
            contains_named_block(&condition.positive)
                || condition.negative.as_ref().is_some_and(contains_named_block)
        }
        _ => false,
    })
}

/// Two compiles of the same file produce byte-identical output
fn deterministic(path: &Path) -> Result<(), Failed> {
    let options = Options::default();
    let first = compile_file(path, &options).map_err(|e| e.to_string())?;
    let second = compile_file(path, &options).map_err(|e| e.to_string())?;
    if first.code != second.code {
        return Err(format!("{} compiled differently on the second run", path.display()).into());
    }
    Ok(())
}

/// The resolved tree never exposes named blocks to the generator
fn blocks_resolved(path: &Path) -> Result<(), Failed> {
    let root = Parser::open(path, &Options::default())
        .and_then(|mut parser| parser.parse())
        .map_err(|e| e.to_string())?;
    if contains_named_block(&root) {
        return Err(format!("{} still holds a named block after parsing", path.display()).into());
    }
    Ok(())
}

/// Every `{{if}}` and `{{range}}` action is closed by an `{{end}}`
fn balanced_actions(path: &Path) -> Result<(), Failed> {
    let code = compile_file(path, &Options::default())
        .map_err(|e| e.to_string())?
        .code;
    let opened = code.matches("{{if ").count() + code.matches("{{range ").count();
    let closed = code.matches("{{end}}").count();
    if opened != closed {
        return Err(format!("{}: {} opening actions, {} {{{{end}}}}", path.display(), opened, closed).into());
    }
    Ok(())
}

/// Fixtures whose raw bodies keep their own line breaks in compact mode
const RAW_BODY_FIXTURES: [&str; 3] = ["script.slim", "script_template.slim", "raw_html.slim"];

/// Compact output carries no structural newlines or tabs
fn compact_is_flat(path: &Path) -> Result<(), Failed> {
    let options = Options {
        pretty_print: false,
        ..Options::default()
    };
    let code = compile_file(path, &options).map_err(|e| e.to_string())?.code;
    if RAW_BODY_FIXTURES.iter().any(|name| path.ends_with(name)) {
        return Ok(());
    }
    if code.contains('\t') || code.trim_end().contains('\n') {
        return Err(format!("{} kept layout whitespace in compact mode:\n{}", path.display(), code).into());
    }
    Ok(())
}

fn main() {
    let args = Arguments::from_args();
    let checks: [(&str, fn(&Path) -> Result<(), Failed>); 4] = [
        ("deterministic", deterministic),
        ("blocks_resolved", blocks_resolved),
        ("balanced_actions", balanced_actions),
        ("compact_is_flat", compact_is_flat),
    ];

    let mut trials = Vec::new();
    for path in fixtures() {
        let stem = path.file_stem().unwrap_or_default().to_string_lossy().into_owned();
        for (check, run) in checks {
            let path = path.clone();
            trials.push(Trial::test(format!("{}::{}", check, stem), move || run(&path)));
        }
    }

    libtest_mimic::run(&args, trials).exit();
}
