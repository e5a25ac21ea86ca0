//! Terminal rendering of document trees and selector ASTs.

use std::collections::HashMap;
use std::fmt;

use extcss::{Fragment, PseudoClassNode, SelectorList};
use extcss_dom::{DomTree, NodeId, NodeType};
use owo_colors::{OwoColorize, Style};

/// Color on or off.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    /// A palette that emits ANSI colors only if `color` is set.
    #[must_use]
    pub const fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn tag(self, text: &str) -> String {
        self.paint(text, Style::new().cyan())
    }

    fn value(self, text: &str) -> String {
        self.paint(text, Style::new().yellow())
    }

    fn dim(self, text: &str) -> String {
        self.paint(text, Style::new().dimmed())
    }

    /// Highlight for matched or affected elements.
    #[must_use]
    pub fn hit(self, text: &str) -> String {
        self.paint(text, Style::new().green().bold())
    }

    /// Highlight for failures.
    #[must_use]
    pub fn error(self, text: &str) -> String {
        self.paint(text, Style::new().red().bold())
    }
}

/// A document subtree with per-element annotations.
pub struct TreeView<'a> {
    tree: &'a DomTree,
    root: NodeId,
    marks: &'a HashMap<NodeId, String>,
    palette: Palette,
}

impl<'a> TreeView<'a> {
    /// Render `root` and its subtree; elements in `marks` are highlighted
    /// and followed by their note.
    #[must_use]
    pub const fn new(
        tree: &'a DomTree,
        root: NodeId,
        marks: &'a HashMap<NodeId, String>,
        palette: Palette,
    ) -> Self {
        Self {
            tree,
            root,
            marks,
            palette,
        }
    }

    fn write_node(&self, f: &mut fmt::Formatter<'_>, id: NodeId, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        let Some(node) = self.tree.get(id) else {
            return Ok(());
        };
        match &node.node_type {
            NodeType::Document => writeln!(f, "{prefix}Document")?,
            NodeType::Element(data) => {
                let mut attrs: Vec<(&String, &String)> = data.attrs.iter().collect();
                attrs.sort();
                let mut open = format!("<{}", self.palette.tag(&data.tag_name));
                for (name, value) in attrs {
                    open.push(' ');
                    open.push_str(name);
                    if !value.is_empty() {
                        open.push('=');
                        open.push_str(&self.palette.value(&format!("\"{value}\"")));
                    }
                }
                open.push('>');
                match self.marks.get(&id) {
                    Some(note) => writeln!(
                        f,
                        "{prefix}{open} {} {}",
                        self.palette.hit("\u{25C0}"),
                        self.palette.hit(note)
                    )?,
                    None => writeln!(f, "{prefix}{open}")?,
                }
            }
            NodeType::Text(data) => {
                let display = data.replace('\n', "\\n").replace(' ', "\u{00B7}");
                writeln!(f, "{prefix}{}", self.palette.dim(&format!("\"{display}\"")))?;
            }
            NodeType::Comment(data) => {
                writeln!(f, "{prefix}{}", self.palette.dim(&format!("<!-- {data} -->")))?;
            }
        }
        for &child in self.tree.children(id) {
            self.write_node(f, child, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for TreeView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(f, self.root, 0)
    }
}

/// An indented dump of a selector AST.
pub struct AstView<'a> {
    list: &'a SelectorList,
    palette: Palette,
}

impl<'a> AstView<'a> {
    /// Render `list`.
    #[must_use]
    pub const fn new(list: &'a SelectorList, palette: Palette) -> Self {
        Self { list, palette }
    }

    fn write_list(&self, f: &mut fmt::Formatter<'_>, list: &SelectorList, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        writeln!(f, "{prefix}{}", self.palette.dim("SelectorList"))?;
        for selector in &list.selectors {
            writeln!(f, "{prefix}  {}", self.palette.dim("Selector"))?;
            for fragment in &selector.fragments {
                self.write_fragment(f, fragment, indent + 2)?;
            }
        }
        Ok(())
    }

    fn write_fragment(&self, f: &mut fmt::Formatter<'_>, fragment: &Fragment, indent: usize) -> fmt::Result {
        let prefix = "  ".repeat(indent);
        match fragment {
            Fragment::Regular(regular) => writeln!(
                f,
                "{prefix}{} {}",
                self.palette.dim("RegularSelector"),
                self.palette.value(&format!("{:?}", regular.value))
            ),
            Fragment::Extended(extended) => {
                writeln!(f, "{prefix}{}", self.palette.dim("ExtendedSelector"))?;
                match &extended.child {
                    PseudoClassNode::Absolute(absolute) => writeln!(
                        f,
                        "{prefix}  {} {} {}",
                        self.palette.dim("AbsolutePseudoClass"),
                        self.palette.tag(&format!(":{}", absolute.name)),
                        self.palette.value(&format!("{:?}", absolute.value))
                    ),
                    PseudoClassNode::Relative(relative) => {
                        writeln!(
                            f,
                            "{prefix}  {} {}",
                            self.palette.dim("RelativePseudoClass"),
                            self.palette.tag(&format!(":{}", relative.name))
                        )?;
                        self.write_list(f, &relative.selector_list, indent + 2)
                    }
                }
            }
        }
    }
}

impl fmt::Display for AstView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_list(f, self.list, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: Palette = Palette::new(false);

    #[test]
    fn test_tree_view_marks_elements() {
        let mut tree = DomTree::new();
        let html = tree.create_element(NodeId::ROOT, "html", &[]);
        let div = tree.create_element(html, "div", &[("id", "ad"), ("hidden", "")]);
        let _ = tree.create_text(div, "buy now");
        let marks = HashMap::from([(div, "display: none".to_string())]);

        let out = TreeView::new(&tree, NodeId::ROOT, &marks, PLAIN).to_string();
        assert_eq!(
            out,
            "Document\n  <html>\n    <div hidden id=\"ad\"> \u{25C0} display: none\n      \"buy\u{00B7}now\"\n"
        );
    }

    #[test]
    fn test_ast_view_nests_relative_arguments() {
        let list = extcss::parse("div:has(> a:contains(ad))").unwrap();
        let out = AstView::new(&list, PLAIN).to_string();
        let expected = "\
SelectorList
  Selector
    RegularSelector \"div\"
    ExtendedSelector
      RelativePseudoClass :has
        SelectorList
          Selector
            RegularSelector \"> a\"
            ExtendedSelector
              AbsolutePseudoClass :contains \"ad\"
";
        assert_eq!(out, expected);
    }
}
