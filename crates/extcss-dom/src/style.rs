//! Inline style access through the `style` attribute.
//!
//! [CSSOM § 6.6 CSSStyleDeclaration](https://drafts.csswg.org/cssom/#the-cssstyledeclaration-interface)
//!
//! The attribute is the single source of truth: every write re-serializes
//! the declaration block into `style`, so attribute observers see style
//! changes exactly like a browser's `style` attribute mutation.

use crate::{DomTree, NodeId};

/// One `name: value [!important]` entry of an inline declaration block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineDeclaration {
    /// Lowercase property name.
    pub name: String,
    /// Value without the `!important` flag.
    pub value: String,
    /// Whether the declaration carried `!important`.
    pub important: bool,
}

/// Parse the contents of a `style` attribute.
///
/// Later declarations of the same property replace earlier ones, matching
/// how a declaration block is built from text.
#[must_use]
pub fn parse_inline_style(text: &str) -> Vec<InlineDeclaration> {
    let mut declarations: Vec<InlineDeclaration> = Vec::new();
    for chunk in split_declarations(text) {
        let Some((name, value)) = chunk.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let mut value = value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        let mut important = false;
        if let Some(stripped) = strip_important(value) {
            value = stripped;
            important = true;
        }
        let declaration = InlineDeclaration {
            name,
            value: value.to_string(),
            important,
        };
        match declarations.iter_mut().find(|d| d.name == declaration.name) {
            Some(existing) => *existing = declaration,
            None => declarations.push(declaration),
        }
    }
    declarations
}

/// Serialize declarations back into `style` attribute text.
#[must_use]
pub fn serialize_inline_style(declarations: &[InlineDeclaration]) -> String {
    declarations
        .iter()
        .map(|d| {
            if d.important {
                format!("{}: {} !important;", d.name, d.value)
            } else {
                format!("{}: {};", d.name, d.value)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip a trailing `!important` (case-insensitive, optional whitespace).
#[must_use]
pub fn strip_important(value: &str) -> Option<&str> {
    let trimmed = value.trim_end();
    let bang = trimmed.rfind('!')?;
    trimmed[bang + 1..]
        .trim()
        .eq_ignore_ascii_case("important")
        .then(|| trimmed[..bang].trim_end())
}

/// Split on `;` outside of quotes and parentheses (`url(data:a;b)`).
fn split_declarations(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0u32;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&text[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// The handful of user-agent defaults the reference document knows about.
pub(crate) fn user_agent_default(tag: &str, property: &str) -> Option<&'static str> {
    match property {
        "display" => Some(match tag {
            "head" | "script" | "style" | "template" | "title" | "meta" | "link" => "none",
            "html" | "body" | "div" | "p" | "section" | "article" | "header" | "footer"
            | "nav" | "main" | "aside" | "ul" | "ol" | "form" | "h1" | "h2" | "h3" | "h4"
            | "h5" | "h6" | "blockquote" | "figure" | "pre" | "hr" => "block",
            "li" => "list-item",
            "table" => "table",
            _ => "inline",
        }),
        "visibility" => Some("visible"),
        "opacity" => Some("1"),
        "position" => Some("static"),
        _ => None,
    }
}

impl DomTree {
    /// The parsed inline declaration block of an element.
    #[must_use]
    pub fn inline_style(&self, id: NodeId) -> Vec<InlineDeclaration> {
        self.attribute(id, "style")
            .map(parse_inline_style)
            .unwrap_or_default()
    }

    /// [CSSOM getPropertyValue()](https://drafts.csswg.org/cssom/#dom-cssstyledeclaration-getpropertyvalue)
    #[must_use]
    pub fn style_property(&self, id: NodeId, name: &str) -> Option<String> {
        let name = name.to_ascii_lowercase();
        self.inline_style(id)
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.value)
    }

    /// [CSSOM getPropertyPriority()](https://drafts.csswg.org/cssom/#dom-cssstyledeclaration-getpropertypriority)
    #[must_use]
    pub fn style_property_is_important(&self, id: NodeId, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        self.inline_style(id)
            .iter()
            .any(|d| d.name == name && d.important)
    }

    /// [CSSOM setProperty()](https://drafts.csswg.org/cssom/#dom-cssstyledeclaration-setproperty)
    ///
    /// Writes through the `style` attribute, queueing one attribute record.
    pub fn set_style_property(&mut self, id: NodeId, name: &str, value: &str, important: bool) {
        let name = name.to_ascii_lowercase();
        let mut declarations = self.inline_style(id);
        let declaration = InlineDeclaration {
            name,
            value: value.trim().to_string(),
            important,
        };
        match declarations.iter_mut().find(|d| d.name == declaration.name) {
            Some(existing) => *existing = declaration,
            None => declarations.push(declaration),
        }
        let text = serialize_inline_style(&declarations);
        self.set_attribute(id, "style", &text);
    }

    /// [CSSOM removeProperty()](https://drafts.csswg.org/cssom/#dom-cssstyledeclaration-removeproperty)
    pub fn remove_style_property(&mut self, id: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        let mut declarations = self.inline_style(id);
        let before = declarations.len();
        declarations.retain(|d| d.name != name);
        if declarations.len() == before {
            return;
        }
        let text = serialize_inline_style(&declarations);
        self.set_attribute(id, "style", &text);
    }
}
