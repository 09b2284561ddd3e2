mod lower;
mod output;
mod template;

pub use lower::{BUILTIN_FUNCTIONS, Lowered, TEMP_PREFIX, Temporaries, lower, lower_at};
pub use output::{Mapping, Output};
pub use template::TemplateGenerator;

use crate::ast::Block;
use crate::error::CompileError;

/// Generator options
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Structural newlines and tab indentation
    pub pretty_print: bool,
    /// Emit `{{/* file:line:col */}}` before each statement
    pub line_numbers: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            pretty_print: true,
            line_numbers: false,
        }
    }
}

/// Generation result
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub code: String,
    pub mappings: Vec<Mapping>,
    /// Runtime functions the script calls, sorted
    pub helpers: Vec<String>,
}

/// Generator trait - converts a resolved tree to script text
pub trait Generator {
    fn generate(&self, root: &Block, options: &GenerateOptions) -> Result<GenerateResult, CompileError>;
}
