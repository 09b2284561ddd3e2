use serde::{Deserialize, Serialize};

// Re-export SourcePosition from tokenizer so every stage shares one position type
pub use crate::parser::tokenizer::SourcePosition;

/// Output markup dialect; selects the doctype table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Html,
    Xhtml,
}

/// How a child template's named block combines with its parent's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockModifier {
    /// Replace the parent's content
    #[default]
    Default,
    /// Parent content first, then the child's
    Append,
    /// Child content first, then the parent's
    Prepend,
}

/// Ordered sequence of nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub children: Vec<Node>,
    pub position: SourcePosition,
}

impl Block {
    pub fn new(position: SourcePosition) -> Self {
        Self {
            children: Vec::new(),
            position,
        }
    }

    pub fn push(&mut self, node: Node) {
        self.children.push(node);
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// A block renders on one line when it is empty or holds only non-raw
    /// text and output statements.
    pub fn can_inline(&self) -> bool {
        self.children.iter().all(|child| match child {
            Node::Text(text) => !text.raw,
            Node::Output(_) => true,
            _ => false,
        })
    }
}

/// AST Node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // Structure
    Block(Block),
    NamedBlock(NamedBlockNode),

    // Markup
    Doctype(DoctypeNode),
    Comment(CommentNode),
    Text(TextNode),
    Tag(TagNode),

    // Control flow
    Condition(ConditionNode),
    Each(EachNode),
    Assignment(AssignmentNode),
    Output(OutputNode),
}

impl Node {
    pub fn position(&self) -> &SourcePosition {
        match self {
            Node::Block(block) => &block.position,
            Node::NamedBlock(node) => &node.position,
            Node::Doctype(node) => &node.position,
            Node::Comment(node) => &node.position,
            Node::Text(node) => &node.position,
            Node::Tag(node) => &node.position,
            Node::Condition(node) => &node.position,
            Node::Each(node) => &node.position,
            Node::Assignment(node) => &node.position,
            Node::Output(node) => &node.position,
        }
    }
}

/// `doctype 5`, `doctype xml utf-8`
#[derive(Debug, Clone, PartialEq)]
pub struct DoctypeNode {
    pub value: String,
    pub format: Format,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentNode {
    pub text: String,
    /// `//-` comments never reach the output
    pub silent: bool,
    /// IE conditional comment: `//[if IE]`
    pub condition: Option<String>,
    pub block: Option<Block>,
    pub position: SourcePosition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub value: String,
    /// Captured verbatim from a script/style/raw-html body
    pub raw: bool,
    pub position: SourcePosition,
}

/// HTML element
#[derive(Debug, Clone, PartialEq)]
pub struct TagNode {
    pub name: String,
    /// Marked raw-html with `name!`
    pub raw: bool,
    pub attributes: Vec<Attribute>,
    pub block: Option<Block>,
    pub position: SourcePosition,
}

impl TagNode {
    pub fn is_self_closing(&self) -> bool {
        crate::html::is_self_closing(&self.name)
    }

    /// Whether the nested block is captured as literal text
    pub fn captures_raw(&self) -> bool {
        self.raw || crate::html::is_raw_text_element(&self.name)
    }
}

/// Attribute on a tag
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    /// Literal text when `raw`, otherwise an expression to lower
    pub value: String,
    pub raw: bool,
    /// Emit the attribute only when this expression holds
    pub guard: Option<String>,
    pub position: SourcePosition,
}

/// if / else if / else
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionNode {
    pub expression: String,
    pub positive: Block,
    pub negative: Option<Block>,
    pub position: SourcePosition,
}

/// `each $k, $v in expr`
#[derive(Debug, Clone, PartialEq)]
pub struct EachNode {
    pub key: String,
    pub value: Option<String>,
    pub expression: String,
    pub block: Option<Block>,
    pub position: SourcePosition,
}

/// `$var = expr`
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentNode {
    pub variable: String,
    pub expression: String,
    pub position: SourcePosition,
}

/// `= expr`, prints the value
#[derive(Debug, Clone, PartialEq)]
pub struct OutputNode {
    pub expression: String,
    pub position: SourcePosition,
}

/// `block [append|prepend] name`; resolved away before generation
#[derive(Debug, Clone, PartialEq)]
pub struct NamedBlockNode {
    pub name: String,
    pub modifier: BlockModifier,
    pub block: Block,
    pub position: SourcePosition,
}
