//! Capture-time cleanup of pasted HTML.
//!
//! Runs once when a snippet is captured, never during pagination. Input is
//! parsed as a full document with html5ever, so comments, raw-text elements
//! and malformed markup close exactly where a browser would close them. The
//! body's children are serialized back out.

use std::cell::RefCell;
use std::io;
use std::rc::{Rc, Weak};

use html5ever::serialize::{Serialize, SerializeOpts, Serializer, TraversalScope, serialize};
use html5ever::tendril::{StrTendril, TendrilSink as _};
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode, TreeSink};
use html5ever::{Attribute, ParseOpts, QualName, parse_document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SanitizeOptions {
    pub remove_scripts: bool,
    pub flatten_whitespace: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            remove_scripts: true,
            flatten_whitespace: false,
        }
    }
}

/// Returns the inner markup of the parsed `<body>`. With `remove_scripts`,
/// script/style/meta elements, stylesheet links and `onload` attributes are
/// dropped first. Falls back to `raw` if serialization fails.
pub fn sanitize_html(raw: &str, options: SanitizeOptions) -> String {
    let document = parse(raw);
    if options.remove_scripts {
        strip_active_content(&document);
    }
    let root = content_root(&document);

    let mut bytes = Vec::new();
    let opts = SerializeOpts {
        traversal_scope: TraversalScope::ChildrenOnly(None),
        ..SerializeOpts::default()
    };
    if let Err(err) = serialize(&mut bytes, &SerializableNode(&root), opts) {
        tracing::warn!(?err, "html serialization failed; keeping raw markup");
        return raw.to_owned();
    }
    let content = String::from_utf8_lossy(&bytes).into_owned();

    if options.flatten_whitespace {
        content.split_whitespace().collect::<Vec<_>>().join(" ")
    } else {
        content
    }
}

/// Text content of the body, with script/style bodies removed. Element
/// boundaries count as whitespace.
pub fn visible_text(html: &str) -> String {
    let document = parse(html);
    let mut out = String::with_capacity(html.len());
    collect_text(&content_root(&document), &mut out);
    out
}

fn parse(html: &str) -> Rc<Node> {
    parse_document(DomSink::default(), ParseOpts::default())
        .one(StrTendril::from(html))
        .document
}

/// The `<body>` element, or the document itself when there is none (framesets).
fn content_root(document: &Rc<Node>) -> Rc<Node> {
    find_element(document, "body").unwrap_or_else(|| Rc::clone(document))
}

fn find_element(node: &Rc<Node>, local: &str) -> Option<Rc<Node>> {
    for child in node.children.borrow().iter() {
        if child.is_element(local) {
            return Some(Rc::clone(child));
        }
        if let Some(found) = find_element(child, local) {
            return Some(found);
        }
    }
    None
}

fn strip_active_content(node: &Node) {
    node.children.borrow_mut().retain(|child| !child.is_active());
    for child in node.children.borrow().iter() {
        if let NodeData::Element { attrs, .. } = &child.data {
            attrs
                .borrow_mut()
                .retain(|attr| !(*attr.name.local).eq_ignore_ascii_case("onload"));
        }
        strip_active_content(child);
    }
    if let NodeData::Element {
        template_contents: Some(contents),
        ..
    } = &node.data
    {
        strip_active_content(contents);
    }
}

fn collect_text(node: &Node, out: &mut String) {
    for child in node.children.borrow().iter() {
        match &child.data {
            NodeData::Text(text) => out.push_str(&text.borrow()),
            NodeData::Element { name, .. } => {
                if is_raw_text(&name.local) {
                    continue;
                }
                out.push(' ');
                collect_text(child, out);
                out.push(' ');
            }
            _ => {}
        }
    }
}

fn is_raw_text(local: &str) -> bool {
    local == "script" || local == "style"
}

#[derive(Debug)]
struct Node {
    parent: RefCell<Option<Weak<Node>>>,
    children: RefCell<Vec<Rc<Node>>>,
    data: NodeData,
}

#[derive(Debug)]
enum NodeData {
    Document,
    /// Doctypes and processing instructions; never serialized.
    Ignored,
    Text(RefCell<String>),
    Comment(String),
    Element {
        name: QualName,
        attrs: RefCell<Vec<Attribute>>,
        template_contents: Option<Rc<Node>>,
    },
}

impl Node {
    fn new(data: NodeData) -> Rc<Self> {
        Rc::new(Self {
            parent: RefCell::new(None),
            children: RefCell::new(Vec::new()),
            data,
        })
    }

    fn is_element(&self, local: &str) -> bool {
        matches!(&self.data, NodeData::Element { name, .. } if &*name.local == local)
    }

    fn is_active(&self) -> bool {
        let NodeData::Element { name, attrs, .. } = &self.data else {
            return false;
        };
        match &*name.local {
            "script" | "style" | "meta" => true,
            "link" => attrs.borrow().iter().any(|attr| {
                &*attr.name.local == "rel"
                    && attr
                        .value
                        .split_whitespace()
                        .any(|token| token.eq_ignore_ascii_case("stylesheet"))
            }),
            _ => false,
        }
    }

    fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }
}

fn detach(node: &Rc<Node>) {
    if let Some(parent) = node.parent() {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
    *node.parent.borrow_mut() = None;
}

fn append_node(parent: &Rc<Node>, child: Rc<Node>) {
    detach(&child);
    *child.parent.borrow_mut() = Some(Rc::downgrade(parent));
    parent.children.borrow_mut().push(child);
}

fn append_text(parent: &Rc<Node>, text: &str) {
    if let Some(last) = parent.children.borrow().last()
        && let NodeData::Text(existing) = &last.data
    {
        existing.borrow_mut().push_str(text);
        return;
    }
    append_node(parent, Node::new(NodeData::Text(RefCell::new(text.to_owned()))));
}

#[derive(Debug)]
struct DomSink {
    document: Rc<Node>,
}

impl Default for DomSink {
    fn default() -> Self {
        Self {
            document: Node::new(NodeData::Document),
        }
    }
}

impl TreeSink for DomSink {
    type Handle = Rc<Node>;
    type Output = Self;
    type ElemName<'a>
        = &'a QualName
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        self
    }

    fn parse_error(&self, _msg: std::borrow::Cow<'static, str>) {}

    fn get_document(&self) -> Self::Handle {
        Rc::clone(&self.document)
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> Self::ElemName<'a> {
        static NONE: QualName = QualName {
            prefix: None,
            ns: html5ever::ns!(),
            local: html5ever::local_name!(""),
        };
        match &target.data {
            NodeData::Element { name, .. } => name,
            _ => &NONE,
        }
    }

    fn create_element(
        &self,
        name: QualName,
        attrs: Vec<Attribute>,
        flags: ElementFlags,
    ) -> Self::Handle {
        Node::new(NodeData::Element {
            name,
            attrs: RefCell::new(attrs),
            template_contents: flags.template.then(|| Node::new(NodeData::Document)),
        })
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        Node::new(NodeData::Comment(text.to_string()))
    }

    fn create_pi(&self, _target: StrTendril, _data: StrTendril) -> Self::Handle {
        Node::new(NodeData::Ignored)
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => append_node(parent, node),
            NodeOrText::AppendText(text) => append_text(parent, &text),
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        if element.parent().is_some() {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(
        &self,
        _name: StrTendril,
        _public_id: StrTendril,
        _system_id: StrTendril,
    ) {
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        match &target.data {
            NodeData::Element {
                template_contents: Some(contents),
                ..
            } => Rc::clone(contents),
            _ => Rc::clone(target),
        }
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        Rc::ptr_eq(x, y)
    }

    fn set_quirks_mode(&self, _mode: QuirksMode) {}

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some(parent) = sibling.parent() else {
            return;
        };
        let node = match new_node {
            NodeOrText::AppendNode(node) => {
                detach(&node);
                node
            }
            NodeOrText::AppendText(text) => {
                let children = parent.children.borrow();
                let idx = children.iter().position(|c| Rc::ptr_eq(c, sibling));
                if let Some(idx) = idx
                    && idx > 0
                    && let NodeData::Text(existing) = &children[idx - 1].data
                {
                    existing.borrow_mut().push_str(&text);
                    return;
                }
                Node::new(NodeData::Text(RefCell::new(text.to_string())))
            }
        };

        *node.parent.borrow_mut() = Some(Rc::downgrade(&parent));
        let mut children = parent.children.borrow_mut();
        let idx = children
            .iter()
            .position(|c| Rc::ptr_eq(c, sibling))
            .unwrap_or(children.len());
        children.insert(idx, node);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        if let NodeData::Element { attrs: existing, .. } = &target.data {
            let mut existing = existing.borrow_mut();
            for attr in attrs {
                if !existing.iter().any(|a| a.name == attr.name) {
                    existing.push(attr);
                }
            }
        }
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        detach(target);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = std::mem::take(&mut *node.children.borrow_mut());
        for child in &children {
            *child.parent.borrow_mut() = Some(Rc::downgrade(new_parent));
        }
        new_parent.children.borrow_mut().extend(children);
    }
}

struct SerializableNode<'a>(&'a Rc<Node>);

impl Serialize for SerializableNode<'_> {
    fn serialize<S>(&self, serializer: &mut S, traversal_scope: TraversalScope) -> io::Result<()>
    where
        S: Serializer,
    {
        match traversal_scope {
            TraversalScope::IncludeNode => write_node(self.0, serializer),
            TraversalScope::ChildrenOnly(_) => write_children(self.0, serializer),
        }
    }
}

fn write_children<S: Serializer>(node: &Node, serializer: &mut S) -> io::Result<()> {
    let source = match &node.data {
        NodeData::Element {
            template_contents: Some(contents),
            ..
        } => contents.as_ref(),
        _ => node,
    };
    for child in source.children.borrow().iter() {
        write_node(child, serializer)?;
    }
    Ok(())
}

fn write_node<S: Serializer>(node: &Node, serializer: &mut S) -> io::Result<()> {
    match &node.data {
        NodeData::Element { name, attrs, .. } => {
            {
                let attrs = attrs.borrow();
                serializer.start_elem(
                    name.clone(),
                    attrs.iter().map(|attr| (&attr.name, &*attr.value)),
                )?;
            }
            write_children(node, serializer)?;
            serializer.end_elem(name.clone())
        }
        NodeData::Text(text) => serializer.write_text(&text.borrow()),
        NodeData::Comment(text) => serializer.write_comment(text),
        NodeData::Document => write_children(node, serializer),
        NodeData::Ignored => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_scripts_styles_and_meta() {
        let raw = "<meta charset=\"utf-8\"><STYLE>p{}</STYLE><p>Keep</p><script type=\"x\">if (a < b) {}</script >tail";
        assert_eq!(
            sanitize_html(raw, SanitizeOptions::default()),
            "<p>Keep</p>tail"
        );
    }

    #[test]
    fn removes_only_stylesheet_links() {
        let raw = "<p>a</p><link rel=\"stylesheet\" href=\"a.css\"><link rel=icon href=\"i.png\"><link rel='Alternate StyleSheet'>";
        assert_eq!(
            sanitize_html(raw, SanitizeOptions::default()),
            "<p>a</p><link rel=\"icon\" href=\"i.png\">"
        );
    }

    #[test]
    fn strips_onload_attributes() {
        let raw = "<img src=\"a.png\" ONLOAD='go()' alt=\"x\"><body-part onload=1>";
        assert_eq!(
            sanitize_html(raw, SanitizeOptions::default()),
            "<img src=\"a.png\" alt=\"x\"><body-part></body-part>"
        );
    }

    #[test]
    fn takes_body_contents() {
        let raw = "<html><head><title>T</title></head><body class=\"x\">\n<p>Body</p>\n</body></html>";
        assert_eq!(
            sanitize_html(raw, SanitizeOptions::default()),
            "\n<p>Body</p>\n"
        );
    }

    #[test]
    fn keeps_everything_when_not_removing_scripts() {
        let raw = "<p onload=\"x\">a</p>  <script>b()</script>";
        let options = SanitizeOptions {
            remove_scripts: false,
            flatten_whitespace: true,
        };
        assert_eq!(
            sanitize_html(raw, options),
            "<p onload=\"x\">a</p> <script>b()</script>"
        );
    }

    #[test]
    fn comments_stay_inert() {
        let raw = "<p>a</p><!-- <script>x</script> -->";
        assert_eq!(sanitize_html(raw, SanitizeOptions::default()), raw);
    }

    #[test]
    fn abruptly_closed_comment_does_not_hide_script() {
        let out = sanitize_html(
            "<p>x</p><!--><script>alert(1)</script><p>y</p>",
            SanitizeOptions::default(),
        );
        assert_eq!(out, "<p>x</p><!----><p>y</p>");
    }

    #[test]
    fn bang_closed_comment_does_not_hide_script() {
        let out = sanitize_html(
            "<p>x</p><!-- a --!><script>alert(2)</script>",
            SanitizeOptions::default(),
        );
        assert_eq!(out, "<p>x</p><!-- a -->");

        let leading = sanitize_html(
            "<!--><script>alert(1)</script><p>x</p>",
            SanitizeOptions::default(),
        );
        assert!(!leading.contains("script"), "{leading}");
        assert!(leading.contains("<p>x</p>"));
    }

    #[test]
    fn stray_angle_brackets_are_escaped_text() {
        let raw = "1 < 2 and <3";
        assert_eq!(
            sanitize_html(raw, SanitizeOptions::default()),
            "1 &lt; 2 and &lt;3"
        );
    }

    #[test]
    fn visible_text_drops_markup() {
        let text = visible_text("<div><h1>Title</h1><style>x</style><p>Body text</p></div>");
        assert_eq!(
            text.split_whitespace().collect::<Vec<_>>(),
            ["Title", "Body", "text"]
        );
    }
}
