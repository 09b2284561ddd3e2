use super::{TransformMetadata, Visitor};
use crate::ast::Node;

/// Replaces every NamedBlock with a plain block holding its resolved contents
pub struct FlattenNamedBlocksPlugin;

impl Visitor for FlattenNamedBlocksPlugin {
    fn exit(&mut self, node: &mut Node, metadata: &mut TransformMetadata) {
        if let Node::NamedBlock(named) = node {
            let block = std::mem::take(&mut named.block);
            *node = Node::Block(block);
            metadata.flattened += 1;
        }
    }
}
