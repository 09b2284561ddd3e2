//! Compiler from indentation-based Slim markup to Go `text/template` source.
//!
//! ```text
//! source --tokenizer--> tokens --parser--> tree --transform--> resolved tree --generate--> script
//! ```
//!
//! The parser resolves `import` and `extend`/`block` inheritance across files,
//! and the generator flattens every embedded expression into single-action
//! `$__slim_N` temporaries.

pub mod ast;
pub mod error;
pub mod expr;
pub mod generate;
pub mod html;
pub mod parser;
pub mod transform;

pub use ast::{Block, Format, Node};
pub use error::{CompileError, ErrorKind};
pub use generate::Mapping;

use generate::{GenerateOptions, Generator, TemplateGenerator};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for one compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Structural newlines and tab indentation (default: true)
    pub pretty_print: bool,
    /// Emit `{{/* file:line:col */}}` markers before statements
    pub line_numbers: bool,
    /// Doctype table to use
    pub format: Format,
    /// Appended to import/extend targets without an extension (default: ".slim")
    pub extension: String,
    /// Directory for import/extend targets of in-memory sources
    pub base_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            pretty_print: true,
            line_numbers: false,
            format: Format::Html,
            extension: ".slim".to_string(),
            base_dir: None,
        }
    }
}

impl Options {
    fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            pretty_print: self.pretty_print,
            line_numbers: self.line_numbers,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub code: String,
    pub mappings: Vec<Mapping>,
    /// Functions the rendering runtime must provide
    pub helpers: Vec<String>,
}

pub fn compile(source: &str) -> Result<CompileResult, CompileError> {
    compile_with(source, &Options::default())
}

pub fn compile_with(source: &str, options: &Options) -> Result<CompileResult, CompileError> {
    let root = parse(source, options)?;
    generate(&root, options)
}

/// Compile a template file; its imports and parent templates resolve
/// relative to its own directory.
pub fn compile_file(path: impl AsRef<Path>, options: &Options) -> Result<CompileResult, CompileError> {
    let root = parser::Parser::open(path, options)?.parse()?;
    generate(&root, options)
}

/// Parse and resolve inheritance without generating code
pub fn parse(source: &str, options: &Options) -> Result<Block, CompileError> {
    parser::Parser::new(source, options).parse()
}

fn generate(root: &Block, options: &Options) -> Result<CompileResult, CompileError> {
    let result = TemplateGenerator::new().generate(root, &options.generate_options())?;

    Ok(CompileResult {
        code: result.code,
        mappings: result.mappings,
        helpers: result.helpers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: Options = serde_json::from_str(r#"{"pretty_print": false, "format": "xhtml"}"#).unwrap();
        assert!(!options.pretty_print);
        assert_eq!(options.format, Format::Xhtml);
        assert_eq!(options.extension, ".slim");
        assert!(options.base_dir.is_none());
    }

    #[test]
    fn test_compile_result_serializes() {
        let result = compile("p= a + b").unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["helpers"][0], "__slim_add");
        assert!(json["mappings"].as_array().is_some_and(|m| !m.is_empty()));
    }

    #[test]
    fn test_errors_are_atomic() {
        let err = compile("p ok\n  span\n\tb").unwrap_err();
        assert_eq!(err.kind, ErrorKind::IndentationMismatch);
        assert_eq!(err.position.line, 3);
    }
}
