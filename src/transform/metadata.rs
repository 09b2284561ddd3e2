use std::collections::BTreeSet;

/// Metadata collected during transformation
#[derive(Debug, Clone, Default)]
pub struct TransformMetadata {
    /// Named blocks that received an override
    pub overridden: BTreeSet<String>,
    /// Named blocks present in the tree
    pub blocks: BTreeSet<String>,
    /// NamedBlock nodes replaced by plain blocks
    pub flattened: usize,
}

impl TransformMetadata {
    pub fn new() -> Self {
        Self::default()
    }
}
