//! In-memory text surface
//!
//! One node per ayah, each carrying a class set. Used by the text-mode
//! reader and by tests to observe exactly which nodes are marked.

use std::collections::BTreeSet;

use quick_xml::escape::escape;

use super::target::{NodeId, RenderError, TextSurface};

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub ayah: u32,
    pub text: String,
    classes: BTreeSet<String>,
}

impl TextNode {
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryTextSurface {
    nodes: Vec<TextNode>,
    last_scroll: Option<(NodeId, bool)>,
}

impl MemoryTextSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_verses<I, S>(verses: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let nodes = verses
            .into_iter()
            .map(|(ayah, text)| TextNode {
                ayah,
                text: text.into(),
                classes: BTreeSet::new(),
            })
            .collect();
        Self {
            nodes,
            last_scroll: None,
        }
    }

    pub fn push(&mut self, ayah: u32, text: impl Into<String>) -> NodeId {
        self.nodes.push(TextNode {
            ayah,
            text: text.into(),
            classes: BTreeSet::new(),
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn nodes(&self) -> &[TextNode] {
        &self.nodes
    }

    pub fn node(&self, id: NodeId) -> Option<&TextNode> {
        self.nodes.get(id.0)
    }

    /// Ayahs whose node carries `class`
    pub fn marked(&self, class: &str) -> Vec<u32> {
        self.nodes
            .iter()
            .filter(|n| n.has_class(class))
            .map(|n| n.ayah)
            .collect()
    }

    pub fn last_scroll(&self) -> Option<(NodeId, bool)> {
        self.last_scroll
    }

    /// Render as a sequence of `<span data-ayah>` elements
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            out.push_str(&format!("<span data-ayah=\"{}\"", node.ayah));
            if !node.classes.is_empty() {
                let classes: Vec<&str> = node.classes().collect();
                out.push_str(&format!(" class=\"{}\"", escape(classes.join(" ").as_str())));
            }
            out.push('>');
            out.push_str(&escape(node.text.as_str()));
            out.push_str("</span>\n");
        }
        out
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut TextNode, RenderError> {
        self.nodes.get_mut(id.0).ok_or(RenderError::StaleHandle)
    }
}

impl TextSurface for MemoryTextSurface {
    fn find_node(&self, ayah: u32) -> Option<NodeId> {
        self.nodes.iter().position(|n| n.ayah == ayah).map(NodeId)
    }

    fn add_class(&mut self, node: NodeId, class: &str) -> Result<(), RenderError> {
        self.node_mut(node)?.classes.insert(class.to_string());
        Ok(())
    }

    fn remove_class(&mut self, node: NodeId, class: &str) -> Result<(), RenderError> {
        self.node_mut(node)?.classes.remove(class);
        Ok(())
    }

    fn scroll_into_view(&mut self, node: NodeId, smooth: bool) {
        self.last_scroll = Some((node, smooth));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_mark() {
        let mut surface = MemoryTextSurface::from_verses([(1, "a"), (2, "b"), (3, "c")]);
        let node = surface.find_node(2).unwrap();
        surface.add_class(node, "on").unwrap();
        assert_eq!(surface.marked("on"), vec![2]);

        surface.remove_class(node, "on").unwrap();
        assert!(surface.marked("on").is_empty());
        assert_eq!(surface.find_node(9), None);
    }

    #[test]
    fn test_unknown_node_is_stale() {
        let mut surface = MemoryTextSurface::new();
        assert_eq!(
            surface.add_class(NodeId(4), "on"),
            Err(RenderError::StaleHandle)
        );
    }

    #[test]
    fn test_html_output_escapes_text() {
        let mut surface = MemoryTextSurface::new();
        let node = surface.push(7, "a < b");
        surface.add_class(node, "ayah-active").unwrap();
        assert_eq!(
            surface.to_html(),
            "<span data-ayah=\"7\" class=\"ayah-active\">a &lt; b</span>\n"
        );
    }
}
