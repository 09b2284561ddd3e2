pub mod tokenizer;
mod tree_builder;

pub use tokenizer::{SourcePosition, TextMode, Token, Tokenizer, tokenize};

use crate::Options;
use crate::ast::{Block, NamedBlockNode};
use crate::error::{CompileError, ErrorKind};
use crate::transform::{
    BlockDetectionPlugin, BlockOverridePlugin, FlattenNamedBlocksPlugin, Transformer,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Parser for one source unit (a string or a file).
///
/// `parse()` is memoized. When the unit `extend`s another template, the
/// parent is parsed first and this unit's named blocks are spliced into the
/// parent's tree.
pub struct Parser {
    tokenizer: Tokenizer,
    token: Token,
    options: Options,
    /// Directory that import/extend targets resolve against
    directory: Option<PathBuf>,
    /// Canonical paths of this file and every template that reached it
    ancestry: Vec<PathBuf>,
    parent: Option<Box<Parser>>,
    named_blocks: BTreeMap<String, NamedBlockNode>,
    result: Option<Block>,
}

impl Parser {
    /// Parser for an in-memory template. Imports resolve against `options.base_dir`.
    pub fn new(source: impl Into<String>, options: &Options) -> Self {
        Self::with_tokenizer(
            Tokenizer::new(source, None),
            options,
            options.base_dir.clone(),
            Vec::new(),
        )
    }

    /// Parser for a template file. Imports resolve against the file's directory.
    pub fn open(path: impl AsRef<Path>, options: &Options) -> Result<Self, CompileError> {
        Self::load(path.as_ref(), options, Vec::new(), &SourcePosition::default())
    }

    fn with_tokenizer(
        tokenizer: Tokenizer,
        options: &Options,
        directory: Option<PathBuf>,
        ancestry: Vec<PathBuf>,
    ) -> Self {
        let position = tokenizer.position();
        Self {
            tokenizer,
            token: Token::Blank { position },
            options: options.clone(),
            directory,
            ancestry,
            parent: None,
            named_blocks: BTreeMap::new(),
            result: None,
        }
    }

    /// Read a template file fully into memory, refusing files already on the include path
    fn load(
        path: &Path,
        options: &Options,
        mut ancestry: Vec<PathBuf>,
        site: &SourcePosition,
    ) -> Result<Self, CompileError> {
        let io_error = |err: std::io::Error| {
            CompileError::new(
                ErrorKind::Io,
                format!("Unable to read template {}: {}", path.display(), err),
                site.clone(),
            )
        };

        let canonical = fs::canonicalize(path).map_err(io_error)?;
        if ancestry.contains(&canonical) {
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
            return Err(CompileError::new(
                ErrorKind::CyclicInclude,
                format!("Template {} includes or extends itself", name),
                site.clone(),
            )
            .with_help("Break the import/extend cycle between these templates"));
        }

        let source = fs::read_to_string(&canonical).map_err(io_error)?;
        log::debug!("loaded template {} ({} bytes)", path.display(), source.len());

        ancestry.push(canonical);
        let filename: Arc<str> = Arc::from(path.to_string_lossy().as_ref());
        let directory = path.parent().map(Path::to_path_buf);

        Ok(Self::with_tokenizer(
            Tokenizer::new(source, Some(filename)),
            options,
            directory,
            ancestry,
        ))
    }

    /// Parse the unit and resolve inheritance. The returned tree holds no
    /// NamedBlock nodes: each one is replaced by its resolved contents.
    pub fn parse(&mut self) -> Result<Block, CompileError> {
        let mut block = self.parse_composed()?;
        let mut transformer = Transformer::new().add(FlattenNamedBlocksPlugin);
        transformer.transform(&mut block);
        log::debug!(
            "resolved {} named block(s) in {}",
            transformer.metadata.flattened,
            self.tokenizer.position()
        );
        Ok(block)
    }

    /// Parse the unit and apply its overrides to the parent, keeping NamedBlock
    /// nodes so that templates further down the chain can still override them.
    fn parse_composed(&mut self) -> Result<Block, CompileError> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }

        let mut block = self.build()?;

        if let Some(parent) = self.parent.as_mut() {
            let mut inherited = parent.parse_composed()?;
            let mut transformer = Transformer::new()
                .add(BlockOverridePlugin::new(self.named_blocks.clone()))
                .add(BlockDetectionPlugin);
            transformer.transform(&mut inherited);
            log::debug!(
                "applied overrides {:?} from {}",
                transformer.metadata.overridden,
                self.tokenizer.position()
            );

            // Blocks nested in an override are spliced in, so they count as present
            for name in self.named_blocks.keys() {
                if !transformer.metadata.blocks.contains(name) {
                    log::warn!(
                        "block '{}' in {} has no matching block in the parent template",
                        name,
                        self.tokenizer.position()
                    );
                }
            }
            block = inherited;
        }

        Ok(self.result.insert(block).clone())
    }

    /// Resolve an import/extend target relative to this unit's directory
    fn resolve(&self, target: &str, site: &SourcePosition) -> Result<PathBuf, CompileError> {
        let directory = self.directory.as_ref().ok_or_else(|| {
            CompileError::new(
                ErrorKind::MissingPath,
                format!("Unable to resolve '{}' from a template without a file path", target),
                site.clone(),
            )
            .with_help("Compile from a file, or set `base_dir` in the options")
        })?;

        let mut path = directory.join(target);
        if path.extension().is_none() {
            path.set_extension(self.options.extension.trim_start_matches('.'));
        }
        Ok(path)
    }

    /// Parser for an import/extend target, inheriting options and ancestry
    fn open_related(&self, target: &str, site: &SourcePosition) -> Result<Parser, CompileError> {
        let path = self.resolve(target, site)?;
        Self::load(&path, &self.options, self.ancestry.clone(), site)
    }
}
