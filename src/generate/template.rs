use super::lower::{Temporaries, lower_at};
use super::{GenerateOptions, GenerateResult, Generator, Output};
use crate::ast::*;
use crate::error::{CompileError, ErrorKind};
use crate::html;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref INTERPOLATION: Regex = Regex::new(r"#\{(.*?)\}").unwrap();
    static ref ACTION_DELIMITERS: Regex = Regex::new(r"\{\{|\}\}").unwrap();
}

/// Emits Go text/template source from a resolved tree
pub struct TemplateGenerator;

/// Mutable state for one generation run
struct Context<'a> {
    out: Output,
    temps: Temporaries,
    options: &'a GenerateOptions,
}

/// An attribute after lowering, ready to print
struct RenderedAttribute {
    name: String,
    /// Empty for a valueless attribute
    value: String,
    condition: Option<String>,
}

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    fn emit_block(&self, block: &Block, ctx: &mut Context) -> Result<(), CompileError> {
        let inline = block.can_inline();

        for child in &block.children {
            if !inline && matches!(child, Node::Text(_) | Node::Output(_)) {
                ctx.out.indent(true);
            }
            self.emit_node(child, ctx)?;
        }

        Ok(())
    }

    /// Nested content; a body that cannot stay on one line goes one level deeper
    /// and the closing markup starts a new line
    fn emit_body(&self, block: &Block, ctx: &mut Context) -> Result<(), CompileError> {
        let inline = block.can_inline();
        if !inline {
            ctx.out.nest();
        }

        self.emit_block(block, ctx)?;

        if !inline {
            ctx.out.unnest();
            ctx.out.indent(true);
        }
        Ok(())
    }

    fn emit_node(&self, node: &Node, ctx: &mut Context) -> Result<(), CompileError> {
        match node {
            Node::Block(block) => self.emit_block(block, ctx),
            // Only present when a caller generates from an unflattened tree
            Node::NamedBlock(named) => self.emit_block(&named.block, ctx),
            Node::Doctype(doctype) => self.emit_doctype(doctype, ctx),
            Node::Comment(comment) => self.emit_comment(comment, ctx),
            Node::Text(text) => self.emit_text(text, ctx),
            Node::Tag(tag) => self.emit_tag(tag, ctx),
            Node::Condition(condition) => self.emit_condition(condition, ctx),
            Node::Each(each) => self.emit_each(each, ctx),
            Node::Assignment(assignment) => {
                self.mark(&assignment.position, ctx);
                let lowered = lower_at(&assignment.expression, &mut ctx.temps, &assignment.position)?;
                ctx.out.push(&lowered.actions);
                ctx.out.push_mapped(
                    &format!("{{{{{} := {}}}}}", assignment.variable, lowered.value),
                    &assignment.position,
                );
                Ok(())
            }
            Node::Output(output) => {
                self.mark(&output.position, ctx);
                let lowered = lower_at(&output.expression, &mut ctx.temps, &output.position)?;
                ctx.out.push(&lowered.actions);
                ctx.out
                    .push_mapped(&format!("{{{{{}}}}}", lowered.value), &output.position);
                Ok(())
            }
        }
    }

    /// Position comment for runtime error attribution
    fn mark(&self, position: &SourcePosition, ctx: &mut Context) {
        if ctx.options.line_numbers {
            ctx.out.push(&format!("{{{{/* {} */}}}}", position));
        }
    }

    fn emit_doctype(&self, doctype: &DoctypeNode, ctx: &mut Context) -> Result<(), CompileError> {
        let declaration = html::doctype(&doctype.value, doctype.format).map_err(|message| {
            CompileError::new(ErrorKind::InvalidDoctype, message, doctype.position.clone())
                .with_help("Use `doctype xml` only with the xhtml format")
        })?;
        ctx.out.push_mapped(&declaration, &doctype.position);
        Ok(())
    }

    fn emit_comment(&self, comment: &CommentNode, ctx: &mut Context) -> Result<(), CompileError> {
        if comment.silent {
            return Ok(());
        }

        ctx.out.indent(true);
        self.mark(&comment.position, ctx);

        match (&comment.condition, &comment.block) {
            (Some(condition), block) => {
                ctx.out
                    .push_mapped(&format!("<!--[if {}]>", condition), &comment.position);
                ctx.out.push(&comment.text);
                if let Some(block) = block {
                    self.emit_body(block, ctx)?;
                }
                ctx.out.push("<![endif]-->");
            }
            (None, None) => {
                ctx.temps.use_helper("unescaped");
                ctx.out.push_mapped(
                    &format!("{{{{unescaped \"<!-- {} -->\"}}}}", escape_string(&comment.text)),
                    &comment.position,
                );
            }
            (None, Some(block)) => {
                ctx.out
                    .push_mapped(&format!("<!-- {}", comment.text), &comment.position);
                self.emit_body(block, ctx)?;
                ctx.out.push(if block.can_inline() { " -->" } else { "-->" });
            }
        }

        Ok(())
    }

    fn emit_text(&self, text: &TextNode, ctx: &mut Context) -> Result<(), CompileError> {
        let value = self.interpolate(text, ctx)?;

        let mut lines = value.split('\n');
        if let Some(first) = lines.next() {
            ctx.out.push_mapped(first, &text.position);
        }
        for line in lines {
            ctx.out.push("\n");
            ctx.out.indent(false);
            ctx.out.push(line);
        }

        Ok(())
    }

    /// Replace each `#{expr}` with its lowered action and escape every literal
    /// `{{` or `}}` around them
    fn interpolate(&self, text: &TextNode, ctx: &mut Context) -> Result<String, CompileError> {
        let mut result = String::with_capacity(text.value.len());
        let mut last = 0;
        for caps in INTERPOLATION.captures_iter(&text.value) {
            let (Some(whole), Some(expression)) = (caps.get(0), caps.get(1)) else { continue };
            let lowered = lower_at(expression.as_str(), &mut ctx.temps, &text.position)?;
            result.push_str(&escape_delimiters(&text.value[last..whole.start()]));
            result.push_str(&lowered.actions);
            result.push_str(&format!("{{{{{}}}}}", lowered.value));
            last = whole.end();
        }
        result.push_str(&escape_delimiters(&text.value[last..]));

        Ok(result)
    }

    fn emit_tag(&self, tag: &TagNode, ctx: &mut Context) -> Result<(), CompileError> {
        ctx.out.indent(true);
        self.mark(&tag.position, ctx);

        // Attribute temporaries must be bound before the tag opens
        let attributes = self.render_attributes(tag, ctx)?;

        ctx.out.push_mapped(&format!("<{}", tag.name), &tag.position);
        for attribute in &attributes {
            if let Some(condition) = &attribute.condition {
                ctx.out.push(&format!("{{{{if {}}}}}", condition));
            }

            if attribute.value.is_empty() {
                ctx.out.push(&format!(" {}", attribute.name));
            } else {
                ctx.out
                    .push(&format!(" {}=\"{}\"", attribute.name, attribute.value));
            }

            if attribute.condition.is_some() {
                ctx.out.push("{{end}}");
            }
        }

        if tag.is_self_closing() {
            ctx.out.push(" />");
            return Ok(());
        }

        ctx.out.push(">");
        if let Some(block) = &tag.block {
            self.emit_body(block, ctx)?;
        }
        ctx.out.push(&format!("</{}>", tag.name));
        Ok(())
    }

    /// Lower attribute values and guards, merging repeated `class` attributes
    fn render_attributes(
        &self,
        tag: &TagNode,
        ctx: &mut Context,
    ) -> Result<Vec<RenderedAttribute>, CompileError> {
        let mut rendered: Vec<RenderedAttribute> = Vec::new();

        for attribute in &tag.attributes {
            let mut value = if !attribute.raw {
                let lowered = lower_at(&attribute.value, &mut ctx.temps, &attribute.position)?;
                ctx.out.push(&lowered.actions);
                format!("{{{{{}}}}}", lowered.value)
            } else if attribute.value.is_empty() {
                String::new()
            } else {
                format!("{{{{\"{}\"}}}}", attribute.value)
            };

            let mut condition = match &attribute.guard {
                Some(guard) => {
                    let lowered = lower_at(guard, &mut ctx.temps, &attribute.position)?;
                    ctx.out.push(&lowered.actions);
                    Some(lowered.value)
                }
                None => None,
            };

            let existing = rendered.iter_mut().find(|r| r.name == attribute.name);
            match existing {
                Some(previous) if attribute.name == "class" => {
                    value.insert(0, ' ');
                    if let Some(condition) = condition.take() {
                        value = format!("{{{{if {}}}}}{}{{{{end}}}}", condition, value);
                    }
                    if let Some(condition) = previous.condition.take() {
                        previous.value = format!("{{{{if {}}}}}{}{{{{end}}}}", condition, previous.value);
                    }
                    previous.value.push_str(&value);
                }
                Some(previous) => {
                    previous.value = value;
                    previous.condition = condition;
                }
                None => rendered.push(RenderedAttribute {
                    name: attribute.name.clone(),
                    value,
                    condition,
                }),
            }
        }

        Ok(rendered)
    }

    fn emit_condition(&self, condition: &ConditionNode, ctx: &mut Context) -> Result<(), CompileError> {
        self.mark(&condition.position, ctx);
        let lowered = lower_at(&condition.expression, &mut ctx.temps, &condition.position)?;
        ctx.out.push(&lowered.actions);
        ctx.out
            .push_mapped(&format!("{{{{if {}}}}}", lowered.value), &condition.position);

        self.emit_block(&condition.positive, ctx)?;

        if let Some(negative) = &condition.negative {
            ctx.out.push("{{else}}");
            self.emit_block(negative, ctx)?;
        }

        ctx.out.push("{{end}}");
        Ok(())
    }

    fn emit_each(&self, each: &EachNode, ctx: &mut Context) -> Result<(), CompileError> {
        let Some(block) = &each.block else {
            return Ok(());
        };

        self.mark(&each.position, ctx);
        let lowered = lower_at(&each.expression, &mut ctx.temps, &each.position)?;
        ctx.out.push(&lowered.actions);

        let variables = match &each.value {
            Some(value) => format!("{}, {}", each.key, value),
            None => each.key.clone(),
        };
        ctx.out.push_mapped(
            &format!("{{{{range {} := {}}}}}", variables, lowered.value),
            &each.position,
        );

        self.emit_block(block, ctx)?;
        ctx.out.push("{{end}}");
        Ok(())
    }
}

impl Default for TemplateGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for TemplateGenerator {
    fn generate(&self, root: &Block, options: &GenerateOptions) -> Result<GenerateResult, CompileError> {
        let mut ctx = Context {
            out: Output::new(options.pretty_print),
            temps: Temporaries::new(),
            options,
        };

        self.emit_block(root, &mut ctx)?;

        let (code, mappings) = ctx.out.finish();
        log::debug!("generated {} bytes, {} mappings", code.len(), mappings.len());

        Ok(GenerateResult {
            code,
            mappings,
            helpers: ctx.temps.helpers.into_iter().collect(),
        })
    }
}

/// Escape for a Go double-quoted string literal
/// Literal action delimiters as string-constant actions
fn escape_delimiters(text: &str) -> std::borrow::Cow<'_, str> {
    ACTION_DELIMITERS.replace_all(text, |caps: &Captures| match &caps[0] {
        "{{" => "{{\"{{\"}}",
        _ => "{{\"}}\"}}",
    })
}

fn escape_string(input: &str) -> String {
    input.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Options;
    use crate::parser::Parser;

    fn generate_with(source: &str, options: &GenerateOptions) -> String {
        let block = Parser::new(source, &Options::default()).parse().unwrap();
        TemplateGenerator::new().generate(&block, options).unwrap().code
    }

    fn generate(source: &str) -> String {
        generate_with(source, &GenerateOptions::default())
    }

    #[test]
    fn test_interpolated_paragraph() {
        assert_eq!(generate("p Hello #{name}"), "<p>Hello {{.name}}</p>\n");
    }

    #[test]
    fn test_doctype_and_html() {
        assert_eq!(generate("doctype 5\nhtml"), "<!DOCTYPE html>\n<html></html>\n");
    }

    #[test]
    fn test_nested_tags_are_indented() {
        assert_eq!(
            generate("ul\n  li one\n  li two"),
            "<ul>\n\t<li>one</li>\n\t<li>two</li>\n</ul>\n"
        );
    }

    #[test]
    fn test_compact_output() {
        let options = GenerateOptions {
            pretty_print: false,
            ..GenerateOptions::default()
        };
        assert_eq!(
            generate_with("ul\n  li one\n  li two", &options),
            "<ul><li>one</li><li>two</li></ul>\n"
        );
    }

    #[test]
    fn test_attributes() {
        assert_eq!(
            generate("a#home.nav[href=\"/\"][disabled] Home"),
            "<a id=\"{{\"home\"}}\" class=\"{{\"nav\"}}\" href=\"{{\"/\"}}\" disabled>Home</a>\n"
        );
    }

    #[test]
    fn test_expression_attribute_binds_first() {
        assert_eq!(
            generate("a[href=$base + path]"),
            "{{$__slim_1 := __slim_add $base .path}}<a href=\"{{$__slim_1}}\"></a>\n"
        );
    }

    #[test]
    fn test_class_merge_with_guard() {
        assert_eq!(
            generate("div.item\n  .active ? $on"),
            "<div class=\"{{\"item\"}}{{if $on}} {{\"active\"}}{{end}}\"></div>\n"
        );
    }

    #[test]
    fn test_guarded_attribute() {
        assert_eq!(
            generate("input\n  [checked] ? $done"),
            "<input{{if $done}} checked{{end}} />\n"
        );
    }

    #[test]
    fn test_void_tag_drops_body() {
        assert_eq!(generate("br\n  p gone"), "<br />\n");
    }

    #[test]
    fn test_text_escapes_action_delimiters() {
        assert_eq!(
            generate("p {{raw}}"),
            "<p>{{\"{{\"}}raw{{\"}}\"}}</p>\n"
        );
    }

    #[test]
    fn test_unpaired_delimiters_are_escaped() {
        assert_eq!(generate("p a {{ b"), "<p>a {{\"{{\"}} b</p>\n");
        assert_eq!(generate("p b }} a"), "<p>b {{\"}}\"}} a</p>\n");
        assert_eq!(
            generate("p }}{{ #{x}}}"),
            "<p>{{\"}}\"}}{{\"{{\"}} {{.x}}{{\"}}\"}}</p>\n"
        );
    }

    #[test]
    fn test_interpolation_with_operator() {
        assert_eq!(
            generate("p #{a + 1} items"),
            "<p>{{$__slim_1 := __slim_add .a 1}}{{$__slim_1}} items</p>\n"
        );
    }

    #[test]
    fn test_condition_chain() {
        assert_eq!(
            generate("if $a\n  p a\nelse if $b\n  p b\nelse\n  p c"),
            "{{if $a}}\n<p>a</p>{{else}}{{if $b}}\n<p>b</p>{{else}}\n<p>c</p>{{end}}{{end}}\n"
        );
    }

    #[test]
    fn test_each() {
        assert_eq!(
            generate("ul\n  each $i, $v in items\n    li= $v"),
            "<ul>{{range $i, $v := .items}}\n\t<li>{{$v}}</li>{{end}}\n</ul>\n"
        );
        assert_eq!(generate("each $v in items"), "");
    }

    #[test]
    fn test_assignment_and_output() {
        assert_eq!(
            generate("$total = price * 2\n= $total"),
            "{{$__slim_1 := __slim_mul .price 2}}{{$total := $__slim_1}}\n{{$total}}\n"
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            generate("// say \"hi\""),
            "{{unescaped \"<!-- say \\\"hi\\\" -->\"}}\n"
        );
        assert_eq!(generate("//- hidden"), "");
        assert_eq!(
            generate("//[if IE] <p>old</p>"),
            "<!--[if IE]><p>old</p><![endif]-->\n"
        );
    }

    #[test]
    fn test_comment_with_block() {
        assert_eq!(
            generate("// nav\n  a Home"),
            "<!-- nav\n\t<a>Home</a>\n-->\n"
        );
        assert_eq!(
            generate("//[if IE]\n  p old"),
            "<!--[if IE]>\n\t<p>old</p>\n<![endif]-->\n"
        );
    }

    #[test]
    fn test_script_body_keeps_nesting() {
        assert_eq!(
            generate("script\n  if (a) {\n    go();\n  }"),
            "<script>\n\tif (a) {\n\t\tgo();\n\t}\n</script>\n"
        );
    }

    #[test]
    fn test_script_body_escapes_and_interpolates() {
        assert_eq!(
            generate("script[type=\"text/x-template\"]\n  <p>{{ msg }}</p>\n  var a = \"#{name}\";"),
            "<script type=\"{{\"text/x-template\"}}\">\n\t<p>{{\"{{\"}} msg {{\"}}\"}}</p>\n\tvar a = \"{{.name}}\";\n</script>\n"
        );
    }

    #[test]
    fn test_line_numbers() {
        let options = GenerateOptions {
            line_numbers: true,
            ..GenerateOptions::default()
        };
        assert_eq!(
            generate_with("p\n  = x", &options),
            "{{/* <input>:1:1 */}}<p>{{/* <input>:2:3 */}}{{.x}}</p>\n"
        );
    }

    #[test]
    fn test_helpers_reported() {
        let block = Parser::new("p #{len(items) > 1}\n// c", &Options::default())
            .parse()
            .unwrap();
        let result = TemplateGenerator::new()
            .generate(&block, &GenerateOptions::default())
            .unwrap();
        assert_eq!(result.helpers, vec!["__slim_gtr", "len", "unescaped"]);
    }

    #[test]
    fn test_invalid_expression_reports_node_position() {
        let block = Parser::new("div\n  p #{a +}", &Options::default()).parse().unwrap();
        let err = TemplateGenerator::new()
            .generate(&block, &GenerateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidExpression);
        assert_eq!(err.position.line, 2);
    }

    #[test]
    fn test_xml_doctype_requires_xhtml() {
        let block = Parser::new("doctype xml", &Options::default()).parse().unwrap();
        let err = TemplateGenerator::new()
            .generate(&block, &GenerateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidDoctype);
    }
}
