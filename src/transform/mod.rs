mod block_detect;
mod block_override;
mod flatten;
mod metadata;

pub use block_detect::BlockDetectionPlugin;
pub use block_override::BlockOverridePlugin;
pub use flatten::FlattenNamedBlocksPlugin;
pub use metadata::TransformMetadata;

use crate::ast::{Block, Node};

/// Visitor trait for AST transformations
pub trait Visitor {
    /// Called before visiting children. Return `false` to skip children.
    fn enter(&mut self, _node: &mut Node, _metadata: &mut TransformMetadata) -> bool {
        true
    }

    /// Called after visiting children.
    fn exit(&mut self, _node: &mut Node, _metadata: &mut TransformMetadata) {}
}

/// Transformer that applies a series of plugins to a tree
pub struct Transformer {
    plugins: Vec<Box<dyn Visitor>>,
    pub metadata: TransformMetadata,
}

impl Transformer {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            metadata: TransformMetadata::new(),
        }
    }

    pub fn add<V: Visitor + 'static>(mut self, visitor: V) -> Self {
        self.plugins.push(Box::new(visitor));
        self
    }

    pub fn transform(&mut self, root: &mut Block) -> &TransformMetadata {
        for plugin in &mut self.plugins {
            Self::visit_nodes(&mut root.children, plugin.as_mut(), &mut self.metadata);
        }

        &self.metadata
    }

    fn visit_nodes(nodes: &mut Vec<Node>, visitor: &mut dyn Visitor, metadata: &mut TransformMetadata) {
        for node in nodes {
            if visitor.enter(node, metadata) {
                match node {
                    Node::Block(block) => {
                        Self::visit_nodes(&mut block.children, visitor, metadata);
                    }
                    Node::NamedBlock(named) => {
                        Self::visit_nodes(&mut named.block.children, visitor, metadata);
                    }
                    Node::Comment(comment) => {
                        if let Some(block) = &mut comment.block {
                            Self::visit_nodes(&mut block.children, visitor, metadata);
                        }
                    }
                    Node::Tag(tag) => {
                        if let Some(block) = &mut tag.block {
                            Self::visit_nodes(&mut block.children, visitor, metadata);
                        }
                    }
                    Node::Condition(condition) => {
                        Self::visit_nodes(&mut condition.positive.children, visitor, metadata);
                        if let Some(negative) = &mut condition.negative {
                            Self::visit_nodes(&mut negative.children, visitor, metadata);
                        }
                    }
                    Node::Each(each) => {
                        if let Some(block) = &mut each.block {
                            Self::visit_nodes(&mut block.children, visitor, metadata);
                        }
                    }
                    // Leaf nodes
                    Node::Doctype(_) | Node::Text(_) | Node::Assignment(_) | Node::Output(_) => {}
                }
            }
            visitor.exit(node, metadata);
        }
    }
}

impl Default for Transformer {
    fn default() -> Self {
        Self::new()
    }
}
