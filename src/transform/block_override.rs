use super::{TransformMetadata, Visitor};
use crate::ast::{BlockModifier, NamedBlockNode, Node};
use std::collections::BTreeMap;

/// Splices a child template's named blocks into its parent's tree
pub struct BlockOverridePlugin {
    overrides: BTreeMap<String, NamedBlockNode>,
}

impl BlockOverridePlugin {
    pub fn new(overrides: BTreeMap<String, NamedBlockNode>) -> Self {
        Self { overrides }
    }
}

impl Visitor for BlockOverridePlugin {
    // Runs on exit so nested blocks are settled before their enclosing block
    fn exit(&mut self, node: &mut Node, metadata: &mut TransformMetadata) {
        let Node::NamedBlock(target) = node else { return };
        let Some(replacement) = self.overrides.get(&target.name) else { return };

        let inherited = std::mem::take(&mut target.block.children);
        let supplied = replacement.block.children.clone();

        target.block.children = match replacement.modifier {
            BlockModifier::Default => supplied,
            BlockModifier::Append => inherited.into_iter().chain(supplied).collect(),
            BlockModifier::Prepend => supplied.into_iter().chain(inherited).collect(),
        };

        log::trace!("block '{}' overridden ({:?})", target.name, replacement.modifier);
        metadata.overridden.insert(target.name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Block, SourcePosition, TextNode};
    use crate::transform::Transformer;

    fn text(value: &str) -> Node {
        Node::Text(TextNode {
            value: value.to_string(),
            raw: false,
            position: SourcePosition::default(),
        })
    }

    fn named(name: &str, modifier: BlockModifier, children: Vec<Node>) -> NamedBlockNode {
        NamedBlockNode {
            name: name.to_string(),
            modifier,
            block: Block {
                children,
                position: SourcePosition::default(),
            },
            position: SourcePosition::default(),
        }
    }

    fn apply(modifier: BlockModifier) -> Vec<String> {
        let mut tree = Block::default();
        tree.push(Node::NamedBlock(named("content", BlockModifier::Default, vec![text("parent")])));

        let overrides = BTreeMap::from([(
            "content".to_string(),
            named("content", modifier, vec![text("child")]),
        )]);
        let mut transformer = Transformer::new().add(BlockOverridePlugin::new(overrides));
        transformer.transform(&mut tree);
        assert!(transformer.metadata.overridden.contains("content"));

        let Node::NamedBlock(result) = &tree.children[0] else { panic!("expected named block") };
        result
            .block
            .children
            .iter()
            .map(|node| match node {
                Node::Text(t) => t.value.clone(),
                _ => panic!("expected text"),
            })
            .collect()
    }

    #[test]
    fn test_replace() {
        assert_eq!(apply(BlockModifier::Default), vec!["child"]);
    }

    #[test]
    fn test_append() {
        assert_eq!(apply(BlockModifier::Append), vec!["parent", "child"]);
    }

    #[test]
    fn test_prepend() {
        assert_eq!(apply(BlockModifier::Prepend), vec!["child", "parent"]);
    }

    #[test]
    fn test_unmatched_name_is_not_recorded() {
        let mut tree = Block::default();
        tree.push(Node::NamedBlock(named("head", BlockModifier::Default, vec![])));
        let overrides = BTreeMap::from([(
            "footer".to_string(),
            named("footer", BlockModifier::Default, vec![text("x")]),
        )]);
        let mut transformer = Transformer::new().add(BlockOverridePlugin::new(overrides));
        transformer.transform(&mut tree);
        assert!(transformer.metadata.overridden.is_empty());
    }
}
