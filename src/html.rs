//! HTML lookup tables shared by the parser and the generator.
//!
//! Every table is an immutable constant, safe to read from concurrent compiles.

use crate::ast::Format;

/// Elements rendered as `<name />`: they never get a body or a closing tag.
const SELF_CLOSING_ELEMENTS: &[&str] = &[
    "area", "base", "basefont", "bgsound", "br", "col", "embed", "frame", "hr",
    "img", "input", "keygen", "link", "menuitem", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose nested block is captured as literal text instead of markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

const HTML_DOCTYPES: &[(&str, &str)] = &[
    ("5", "<!DOCTYPE html>"),
    ("html", "<!DOCTYPE html>"),
    (
        "strict",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01//EN" "http://www.w3.org/TR/html4/strict.dtd">"#,
    ),
    (
        "frameset",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Frameset//EN" "http://www.w3.org/TR/html4/frameset.dtd">"#,
    ),
    (
        "transitional",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "http://www.w3.org/TR/html4/loose.dtd">"#,
    ),
];

const XHTML_DOCTYPES: &[(&str, &str)] = &[
    (
        "1.1",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.1//EN" "http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd">"#,
    ),
    ("5", "<!DOCTYPE html>"),
    ("html", "<!DOCTYPE html>"),
    (
        "strict",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">"#,
    ),
    (
        "frameset",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Frameset//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-frameset.dtd">"#,
    ),
    (
        "mobile",
        r#"<!DOCTYPE html PUBLIC "-//WAPFORUM//DTD XHTML Mobile 1.2//EN" "http://www.openmobilealliance.org/tech/DTD/xhtml-mobile12.dtd">"#,
    ),
    (
        "basic",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML Basic 1.1//EN" "http://www.w3.org/TR/xhtml-basic/xhtml-basic11.dtd">"#,
    ),
    (
        "transitional",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">"#,
    ),
];

const HTML5_DOCTYPE: &str = "<!DOCTYPE html>";
const DEFAULT_XML_ENCODING: &str = "utf-8";

pub fn is_self_closing(tag: &str) -> bool {
    SELF_CLOSING_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

pub fn is_raw_text_element(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag.to_ascii_lowercase().as_str())
}

/// Resolve a doctype shorthand to its literal declaration.
///
/// Unknown shorthands fall back to the HTML5 doctype. `xml [encoding]` is only
/// meaningful for XHTML output; requesting it in HTML format is an error.
pub fn doctype(value: &str, format: Format) -> Result<String, String> {
    let value = value.trim();

    if let Some(rest) = value.strip_prefix("xml") {
        if rest.is_empty() || rest.starts_with(char::is_whitespace) {
            if format == Format::Html {
                return Err("Invalid xml directive with html format".to_string());
            }
            let encoding = match rest.trim() {
                "" => DEFAULT_XML_ENCODING,
                encoding => encoding,
            };
            return Ok(format!(r#"<?xml version="1.0" encoding="{}" ?>"#, encoding));
        }
    }

    let table = match format {
        Format::Html => HTML_DOCTYPES,
        Format::Xhtml => XHTML_DOCTYPES,
    };

    let declaration = table
        .iter()
        .find(|(key, _)| *key == value)
        .map(|(_, declaration)| *declaration)
        .unwrap_or(HTML5_DOCTYPE);

    Ok(declaration.to_string())
}
