use super::{TransformMetadata, Visitor};
use crate::ast::Node;

/// Records the name of every named block left in the tree
pub struct BlockDetectionPlugin;

impl Visitor for BlockDetectionPlugin {
    fn enter(&mut self, node: &mut Node, metadata: &mut TransformMetadata) -> bool {
        if let Node::NamedBlock(named) = node {
            metadata.blocks.insert(named.name.clone());
        }
        true
    }
}
