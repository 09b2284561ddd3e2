use super::Parser;
use super::tokenizer::{TextMode, Token};
use crate::ast::*;
use crate::error::{CompileError, ErrorKind};

/// Recursive-descent grammar over the token stream.
///
/// Every `parse_*` method expects `self.token` to be the construct's first
/// token and leaves `self.token` at the first token it did not consume.
impl Parser {
    pub(super) fn build(&mut self) -> Result<Block, CompileError> {
        let mut block = Block::new(self.tokenizer.position());
        self.advance()?;

        loop {
            match &self.token {
                Token::Eof { .. } => break,
                Token::Blank { .. } => self.advance()?,
                _ => {
                    let node = self.parse_node()?;
                    block.push(node);
                }
            }
        }

        Ok(block)
    }

    fn advance(&mut self) -> Result<(), CompileError> {
        self.token = self.tokenizer.next_token()?;
        Ok(())
    }

    /// Take the current token and move on to the next one
    fn bump(&mut self) -> Result<Token, CompileError> {
        let next = self.tokenizer.next_token()?;
        Ok(std::mem::replace(&mut self.token, next))
    }

    fn parse_node(&mut self) -> Result<Node, CompileError> {
        match &self.token {
            Token::Indent { .. } => Ok(Node::Block(self.parse_block(None)?)),
            Token::Doctype { .. } => self.parse_doctype(),
            Token::Comment { .. } => self.parse_comment(),
            Token::Tag { .. } => self.parse_tag(),
            Token::Text { .. } => self.parse_text(),
            Token::Assignment { .. } => self.parse_assignment(),
            Token::If { .. } => self.parse_condition(),
            Token::Each { .. } => self.parse_each(),
            Token::NamedBlock { .. } => self.parse_named_block(),
            Token::Import { .. } => self.parse_import(),
            Token::Extend { .. } => self.parse_extend(),
            Token::Id { .. } | Token::Class { .. } | Token::Attribute { .. } => Err(CompileError::new(
                ErrorKind::MisplacedAttribute,
                format!("Unexpected {}: attributes belong to a tag", self.token.describe()),
                self.token.position().clone(),
            )
            .with_help("Write attributes after the tag name, or on their own line in the tag's block")),
            Token::Else { .. } | Token::ElseIf { .. } => Err(CompileError::new(
                ErrorKind::UnexpectedToken,
                format!("Unexpected {} without a preceding if", self.token.describe()),
                self.token.position().clone(),
            )),
            Token::Outdent { .. } | Token::Blank { .. } | Token::Eof { .. } => {
                Err(unexpected(&self.token, "a template construct"))
            }
        }
    }

    /// Indented block. Attribute lines are only legal when `attributes` is the
    /// owning tag's attribute list.
    fn parse_block(&mut self, mut attributes: Option<&mut Vec<Attribute>>) -> Result<Block, CompileError> {
        let position = match self.bump()? {
            Token::Indent { position, .. } => position,
            other => return Err(unexpected(&other, "an indented block")),
        };
        let mut block = Block::new(position);

        loop {
            match &self.token {
                Token::Eof { .. } => break,
                Token::Outdent { .. } => {
                    self.advance()?;
                    break;
                }
                Token::Blank { .. } => self.advance()?,
                Token::Id { .. } | Token::Class { .. } | Token::Attribute { .. } => {
                    let Some(list) = attributes.as_deref_mut() else {
                        return Err(CompileError::new(
                            ErrorKind::MisplacedAttribute,
                            format!("Unexpected {}: attribute lines must be nested directly under a tag", self.token.describe()),
                            self.token.position().clone(),
                        ));
                    };
                    let token = self.bump()?;
                    list.extend(into_attribute(token));
                }
                _ => {
                    let node = self.parse_node()?;
                    block.push(node);
                }
            }
        }

        Ok(block)
    }

    fn parse_doctype(&mut self) -> Result<Node, CompileError> {
        match self.bump()? {
            Token::Doctype { value, position } => Ok(Node::Doctype(DoctypeNode {
                value,
                format: self.options.format,
                position,
            })),
            other => Err(unexpected(&other, "doctype")),
        }
    }

    fn parse_comment(&mut self) -> Result<Node, CompileError> {
        let Token::Comment { text, silent, condition, position } = self.bump()? else {
            return Err(unexpected(&self.token, "comment"));
        };

        let mut comment = CommentNode {
            text,
            silent,
            condition,
            block: None,
            position,
        };

        if let Token::Indent { .. } = self.token {
            // Content nested under a silent comment is never parsed
            if silent {
                self.tokenizer.request_raw();
            }
            comment.block = Some(self.parse_block(None)?);
        }

        Ok(Node::Comment(comment))
    }

    fn parse_tag(&mut self) -> Result<Node, CompileError> {
        let Token::Tag { name, raw, position } = self.bump()? else {
            return Err(unexpected(&self.token, "tag"));
        };

        let mut tag = TagNode {
            name,
            raw,
            attributes: Vec::new(),
            block: None,
            position,
        };

        loop {
            match &self.token {
                Token::Id { .. } | Token::Class { .. } | Token::Attribute { .. } => {
                    let token = self.bump()?;
                    let Some(attribute) = into_attribute(token) else { continue };
                    if attribute.guard.is_some() {
                        return Err(CompileError::new(
                            ErrorKind::ConditionalAttribute,
                            "Conditional attributes must be placed in a block within a tag.",
                            attribute.position,
                        )
                        .with_help("Move the attribute onto its own line, indented under the tag"));
                    }
                    tag.attributes.push(attribute);
                }
                Token::Text { mode, .. } if *mode != TextMode::Piped => {
                    let node = self.parse_text()?;
                    let position = tag.position.clone();
                    tag.block.get_or_insert_with(|| Block::new(position)).children.insert(0, node);
                }
                Token::Assignment { variable: None, .. } => {
                    let node = self.parse_assignment()?;
                    let position = tag.position.clone();
                    tag.block.get_or_insert_with(|| Block::new(position)).children.insert(0, node);
                }
                Token::Indent { .. } => {
                    if tag.captures_raw() {
                        self.tokenizer.request_raw();
                    }
                    let nested = self.parse_block(Some(&mut tag.attributes))?;
                    let position = tag.position.clone();
                    tag.block
                        .get_or_insert_with(|| Block::new(position))
                        .children
                        .extend(nested.children);
                    break;
                }
                _ => break,
            }
        }

        if tag.is_self_closing() && tag.block.as_ref().is_some_and(|block| !block.is_empty()) {
            log::warn!(
                "<{}> at {} is self-closing; its content is ignored",
                tag.name,
                tag.position
            );
        }

        Ok(Node::Tag(tag))
    }

    fn parse_text(&mut self) -> Result<Node, CompileError> {
        match self.bump()? {
            Token::Text { value, mode, position } => Ok(Node::Text(TextNode {
                value,
                raw: mode == TextMode::Raw,
                position,
            })),
            other => Err(unexpected(&other, "text")),
        }
    }

    fn parse_assignment(&mut self) -> Result<Node, CompileError> {
        match self.bump()? {
            Token::Assignment { variable: Some(variable), expression, position } => {
                Ok(Node::Assignment(AssignmentNode { variable, expression, position }))
            }
            Token::Assignment { variable: None, expression, position } => {
                Ok(Node::Output(OutputNode { expression, position }))
            }
            other => Err(unexpected(&other, "assignment")),
        }
    }

    /// `if` or `elsif`, with its branches and any chained `else if`
    fn parse_condition(&mut self) -> Result<Node, CompileError> {
        let (expression, position) = match self.bump()? {
            Token::If { expression, position } | Token::ElseIf { expression, position } => {
                (expression, position)
            }
            other => return Err(unexpected(&other, "if")),
        };

        let mut condition = ConditionNode {
            expression,
            positive: Block::new(position.clone()),
            negative: None,
            position,
        };

        loop {
            match &self.token {
                Token::Indent { .. } => condition.positive = self.parse_block(None)?,
                Token::Blank { .. } => self.advance()?,
                Token::ElseIf { .. } => {
                    self.reject_second_else(&condition)?;
                    let nested = self.parse_condition()?;
                    condition.negative = Some(singleton(nested));
                }
                Token::Else { .. } => {
                    self.reject_second_else(&condition)?;
                    self.advance()?;
                    match &self.token {
                        Token::If { .. } => {
                            let nested = self.parse_condition()?;
                            condition.negative = Some(singleton(nested));
                        }
                        Token::Indent { .. } => condition.negative = Some(self.parse_block(None)?),
                        _ => return Err(unexpected(&self.token, "`if` or an indented block after else")),
                    }
                }
                _ => break,
            }
        }

        Ok(Node::Condition(condition))
    }

    fn reject_second_else(&self, condition: &ConditionNode) -> Result<(), CompileError> {
        if condition.negative.is_some() {
            return Err(CompileError::new(
                ErrorKind::DuplicateElse,
                format!("The if on line {} already has an else branch", condition.position.line),
                self.token.position().clone(),
            ));
        }
        Ok(())
    }

    fn parse_each(&mut self) -> Result<Node, CompileError> {
        let Token::Each { key, value, expression, position } = self.bump()? else {
            return Err(unexpected(&self.token, "each"));
        };

        let block = match self.token {
            Token::Indent { .. } => Some(self.parse_block(None)?),
            _ => None,
        };

        Ok(Node::Each(EachNode {
            key,
            value,
            expression,
            block,
            position,
        }))
    }

    fn parse_named_block(&mut self) -> Result<Node, CompileError> {
        let Token::NamedBlock { name, modifier, position } = self.bump()? else {
            return Err(unexpected(&self.token, "block"));
        };

        if self.named_blocks.contains_key(&name) {
            return Err(CompileError::new(
                ErrorKind::DuplicateBlock,
                format!(
                    "Multiple definitions of named blocks are not permitted. Block {} has been redefined.",
                    name
                ),
                position,
            ));
        }

        let block = match self.token {
            Token::Indent { .. } => self.parse_block(None)?,
            _ => Block::new(position.clone()),
        };

        let node = NamedBlockNode {
            name: name.clone(),
            modifier,
            block,
            position: position.clone(),
        };
        self.named_blocks.insert(name, node.clone());

        // append/prepend only extend a parent's block; at their own site they render nothing
        if modifier != BlockModifier::Default {
            return Ok(Node::Block(Block::new(position)));
        }

        Ok(Node::NamedBlock(node))
    }

    /// Parse the target file and splice its tree in place
    fn parse_import(&mut self) -> Result<Node, CompileError> {
        let Token::Import { path, position } = self.bump()? else {
            return Err(unexpected(&self.token, "import"));
        };

        let mut imported = self.open_related(&path, &position)?;
        let mut block = imported.parse_composed()?;
        block.position = position;

        Ok(Node::Block(block))
    }

    /// Parse the target file as this unit's parent; the site itself renders nothing
    fn parse_extend(&mut self) -> Result<Node, CompileError> {
        let Token::Extend { path, position } = self.bump()? else {
            return Err(unexpected(&self.token, "extend"));
        };

        if self.parent.is_some() {
            return Err(CompileError::new(
                ErrorKind::MultipleExtends,
                "Unable to extend multiple parent templates.",
                position,
            ));
        }

        let mut parent = self.open_related(&path, &position)?;
        parent.parse_composed()?;
        self.parent = Some(Box::new(parent));

        Ok(Node::Block(Block::new(position)))
    }
}

fn unexpected(token: &Token, expected: &str) -> CompileError {
    CompileError::new(
        ErrorKind::UnexpectedToken,
        format!("Unexpected {}, expected {}", token.describe(), expected),
        token.position().clone(),
    )
}

fn singleton(node: Node) -> Block {
    Block {
        position: node.position().clone(),
        children: vec![node],
    }
}

/// `#id`, `.class` and `[name=value]` tokens as tag attributes
fn into_attribute(token: Token) -> Option<Attribute> {
    match token {
        Token::Id { name, guard, position } => Some(Attribute {
            name: "id".to_string(),
            value: name,
            raw: true,
            guard,
            position,
        }),
        Token::Class { name, guard, position } => Some(Attribute {
            name: "class".to_string(),
            value: name,
            raw: true,
            guard,
            position,
        }),
        Token::Attribute { name, value, quoted, guard, position } => Some(Attribute {
            name,
            value,
            raw: quoted,
            guard,
            position,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use crate::Options;
    use crate::ast::*;
    use crate::error::ErrorKind;
    use crate::parser::Parser;

    fn parse(source: &str) -> Block {
        Parser::new(source, &Options::default()).parse().unwrap()
    }

    fn parse_err(source: &str) -> crate::error::CompileError {
        Parser::new(source, &Options::default()).parse().unwrap_err()
    }

    #[test]
    fn test_tag_with_inline_text() {
        let block = parse("p Hello #{name}");
        let Node::Tag(tag) = &block.children[0] else { panic!("expected tag") };
        assert_eq!(tag.name, "p");
        let body = tag.block.as_ref().unwrap();
        assert!(matches!(&body.children[0], Node::Text(text) if text.value == "Hello #{name}" && !text.raw));
    }

    #[test]
    fn test_inline_text_precedes_nested_block() {
        let block = parse("p intro\n  span more");
        let Node::Tag(tag) = &block.children[0] else { panic!("expected tag") };
        let body = tag.block.as_ref().unwrap();
        assert_eq!(body.children.len(), 2);
        assert!(matches!(&body.children[0], Node::Text(_)));
        assert!(matches!(&body.children[1], Node::Tag(span) if span.name == "span"));
    }

    #[test]
    fn test_attributes_in_tag_block() {
        let block = parse("a.btn[href=\"/\"]\n  .active ? $on\n  | Home");
        let Node::Tag(tag) = &block.children[0] else { panic!("expected tag") };
        assert_eq!(tag.attributes.len(), 3);
        assert_eq!(tag.attributes[0].name, "class");
        assert_eq!(tag.attributes[1].name, "href");
        assert!(tag.attributes[1].raw);
        assert_eq!(tag.attributes[2].guard.as_deref(), Some("$on"));
        assert_eq!(tag.block.as_ref().unwrap().children.len(), 1);
    }

    #[test]
    fn test_inline_conditional_attribute_rejected() {
        let err = parse_err("div.active ? $on");
        assert_eq!(err.kind, ErrorKind::ConditionalAttribute);
    }

    #[test]
    fn test_attribute_outside_tag_block_rejected() {
        let err = parse_err("if $x\n  .active");
        assert_eq!(err.kind, ErrorKind::MisplacedAttribute);
        let err = parse_err(".orphan");
        assert_eq!(err.kind, ErrorKind::MisplacedAttribute);
    }

    #[test]
    fn test_script_body_is_raw() {
        let block = parse("script\n  if (a) {\n    go();\n  }\np");
        let Node::Tag(script) = &block.children[0] else { panic!("expected tag") };
        let body = script.block.as_ref().unwrap();
        assert!(matches!(&body.children[0], Node::Text(t) if t.raw && t.value == "if (a) {\n\tgo();\n}"));
        assert!(matches!(&block.children[1], Node::Tag(p) if p.name == "p"));
    }

    #[test]
    fn test_raw_html_marker() {
        let block = parse("div!\n  <b>bold</b>");
        let Node::Tag(tag) = &block.children[0] else { panic!("expected tag") };
        assert!(tag.raw);
        assert!(matches!(&tag.block.as_ref().unwrap().children[0], Node::Text(t) if t.raw));
    }

    #[test]
    fn test_condition_chain() {
        let block = parse("if $a\n  p a\nelse if $b\n  p b\nelse\n  p c");
        assert_eq!(block.children.len(), 1);
        let Node::Condition(outer) = &block.children[0] else { panic!("expected condition") };
        assert_eq!(outer.expression, "$a");
        let negative = outer.negative.as_ref().unwrap();
        let Node::Condition(inner) = &negative.children[0] else { panic!("expected nested condition") };
        assert_eq!(inner.expression, "$b");
        assert!(inner.negative.is_some());
    }

    #[test]
    fn test_elsif_chain() {
        let block = parse("if $a\n  p a\nelsif $b\n  p b");
        let Node::Condition(outer) = &block.children[0] else { panic!("expected condition") };
        assert!(matches!(&outer.negative.as_ref().unwrap().children[0], Node::Condition(c) if c.expression == "$b"));
    }

    #[test]
    fn test_else_after_blank_line() {
        let block = parse("if $a\n  p a\n\nelse\n  p b");
        assert_eq!(block.children.len(), 1);
    }

    #[test]
    fn test_duplicate_else_rejected() {
        let err = parse_err("if $a\n  p\nelse\n  p\nelse\n  p");
        assert_eq!(err.kind, ErrorKind::DuplicateElse);
    }

    #[test]
    fn test_orphan_else_rejected() {
        let err = parse_err("p\nelse\n  p");
        assert_eq!(err.kind, ErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_each_with_and_without_body() {
        let block = parse("each $i, $v in .Items\n  li= $v\neach $x in .Empty");
        let Node::Each(first) = &block.children[0] else { panic!("expected each") };
        assert_eq!(first.key, "$i");
        assert_eq!(first.value.as_deref(), Some("$v"));
        assert!(first.block.is_some());
        let Node::Each(second) = &block.children[1] else { panic!("expected each") };
        assert!(second.block.is_none());
    }

    #[test]
    fn test_duplicate_named_block_rejected() {
        let err = parse_err("block content\n  p\nblock content\n  p");
        assert_eq!(err.kind, ErrorKind::DuplicateBlock);
        assert!(err.message.contains("Block content has been redefined"));
        assert_eq!(err.position.line, 3);
    }

    #[test]
    fn test_append_block_without_parent_renders_nothing() {
        let block = parse("block append scripts\n  script[src=\"a.js\"]\nblock content\n  p");
        assert!(matches!(&block.children[0], Node::Block(inner) if inner.is_empty()));
        assert!(matches!(&block.children[1], Node::Block(inner) if inner.children.len() == 1));

        let block = parse("block prepend scripts\n  p");
        assert!(matches!(&block.children[0], Node::Block(inner) if inner.is_empty()));
    }

    #[test]
    fn test_silent_comment_swallows_block() {
        let block = parse("//- note\n  div\n    .not-an-error\np");
        let Node::Comment(comment) = &block.children[0] else { panic!("expected comment") };
        assert!(comment.silent);
        assert!(matches!(&block.children[1], Node::Tag(p) if p.name == "p"));
    }

    #[test]
    fn test_void_tag_body_is_kept_but_tolerated() {
        let block = parse("br\n  p ignored");
        let Node::Tag(tag) = &block.children[0] else { panic!("expected tag") };
        assert!(tag.is_self_closing());
    }

    #[test]
    fn test_output_statement() {
        let block = parse("= .Title\nh1= .Heading");
        assert!(matches!(&block.children[0], Node::Output(o) if o.expression == ".Title"));
        let Node::Tag(tag) = &block.children[1] else { panic!("expected tag") };
        assert!(matches!(&tag.block.as_ref().unwrap().children[0], Node::Output(_)));
    }

    #[test]
    fn test_doctype_carries_format() {
        let options = Options {
            format: Format::Xhtml,
            ..Options::default()
        };
        let block = Parser::new("doctype strict", &options).parse().unwrap();
        assert!(matches!(&block.children[0], Node::Doctype(d) if d.value == "strict" && d.format == Format::Xhtml));
    }
}
