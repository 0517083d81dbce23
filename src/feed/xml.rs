//! Lenient XML tree shared by the Atom, RSS and RDF parsers.
//!
//! Feeds are frequently not well-formed: undeclared namespace prefixes, HTML
//! entities, mismatched end tags, garbage after the root element. The builder
//! here accepts all of that. It resolves namespaces itself (falling back to the
//! canonical URI for well-known prefixes), decodes entities with the HTML table
//! and stops at the end of the root element.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::util::{decode_entities, escape_html, strip_invalid_xml_chars};

/// Deepest element nesting accepted before the document is rejected.
const MAX_DEPTH: usize = 256;

/// Namespace URIs used by the parsers.
pub mod ns {
    pub const ATOM: &str = "http://www.w3.org/2005/Atom";
    pub const ATOM03: &str = "http://purl.org/atom/ns#";
    pub const DC: &str = "http://purl.org/dc/elements/1.1/";
    pub const CONTENT: &str = "http://purl.org/rss/1.0/modules/content/";
    pub const MEDIA: &str = "http://search.yahoo.com/mrss/";
    pub const ITUNES: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
    pub const GOOGLEPLAY: &str = "http://www.google.com/schemas/play-podcasts/1.0";
    pub const FEEDBURNER: &str = "http://rssnamespace.org/feedburner/ext/1.0";
    pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
    pub const RSS10: &str = "http://purl.org/rss/1.0/";
    pub const RSS090: &str = "http://my.netscape.com/rdf/simple/0.9/";
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
}

/// Prefixes that resolve even when the document forgets to declare them.
static WELL_KNOWN_PREFIXES: &[(&str, &str)] = &[
    ("atom", ns::ATOM),
    ("dc", ns::DC),
    ("content", ns::CONTENT),
    ("media", ns::MEDIA),
    ("itunes", ns::ITUNES),
    ("googleplay", ns::GOOGLEPLAY),
    ("feedburner", ns::FEEDBURNER),
    ("rdf", ns::RDF),
    ("xml", ns::XML),
];

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("XML syntax error: {0}")]
    Syntax(String),

    #[error("Document has no root element")]
    NoRoot,

    #[error("XML nesting depth exceeds maximum of {0} levels")]
    TooDeep(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub ns: String,
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
}

/// An element with its namespace URI resolved and its local name split off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub ns: String,
    pub name: String,
    pub attrs: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn is(&self, ns: &str, name: &str) -> bool {
        self.ns == ns && self.name == name
    }

    /// Unqualified attribute by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns.is_empty() && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn attr_ns(&self, ns: &str, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns == ns && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn children<'a>(&'a self, ns: &'a str, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.is(ns, name))
    }

    pub fn child(&self, ns: &str, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(ns, name))
    }

    /// First child whose namespace satisfies `accepts`.
    pub fn child_where(&self, name: &str, accepts: impl Fn(&str) -> bool) -> Option<&Element> {
        self.elements().find(|e| e.name == name && accepts(&e.ns))
    }

    /// Trimmed text of the first matching child, `None` when absent or blank.
    pub fn child_text(&self, ns: &str, name: &str) -> Option<String> {
        self.child(ns, name).map(Element::text).filter(|t| !t.is_empty())
    }

    /// Concatenated text and CDATA of all descendants, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out.trim().to_owned()
    }

    fn collect_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(text) | Node::CData(text) => out.push_str(text),
                Node::Element(element) => element.collect_text(out),
            }
        }
    }

    /// Serializes the children back to markup. Prefixes are dropped and text is
    /// re-escaped, which is what embedded XHTML content needs.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            write_node(node, &mut out);
        }
        out.trim().to_owned()
    }
}

fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) | Node::CData(text) => out.push_str(&escape_html(text)),
        Node::Element(element) => {
            out.push('<');
            out.push_str(&element.name);
            for attr in element.attrs.iter().filter(|a| a.ns.is_empty()) {
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&escape_html(&attr.value));
                out.push('"');
            }
            if element.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &element.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&element.name);
            out.push('>');
        }
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Open element plus the raw qualified name used to match its end tag.
struct Open {
    qname: String,
    element: Element,
    declared: Vec<(String, String)>,
}

/// Parses `input` into a tree rooted at the document element.
///
/// Syntax errors after the root element opened are not fatal: the tree built
/// so far is closed and returned.
pub fn parse(input: &str) -> Result<Element, XmlError> {
    let cleaned = strip_invalid_xml_chars(input);
    let mut reader = Reader::from_str(&cleaned);
    {
        let config = reader.config_mut();
        config.trim_text(false);
        config.check_end_names = false;
        config.expand_empty_elements = true;
    }

    let mut stack: Vec<Open> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(XmlError::TooDeep(MAX_DEPTH));
                }
                stack.push(open_element(&start, &stack));
            }
            Ok(Event::End(end)) => {
                let qname = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                if !stack.iter().any(|open| open.qname == qname) {
                    continue;
                }
                while let Some(open) = stack.pop() {
                    let matched = open.qname == qname;
                    match stack.last_mut() {
                        Some(parent) => parent.element.children.push(Node::Element(open.element)),
                        None => return Ok(open.element),
                    }
                    if matched {
                        break;
                    }
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(open) = stack.last_mut() {
                    let raw = String::from_utf8_lossy(&text);
                    open.element
                        .children
                        .push(Node::Text(decode_entities(&raw).into_owned()));
                }
            }
            Ok(Event::CData(cdata)) => {
                if let Some(open) = stack.last_mut() {
                    open.element
                        .children
                        .push(Node::CData(String::from_utf8_lossy(&cdata).into_owned()));
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                if stack.is_empty() {
                    return Err(XmlError::Syntax(e.to_string()));
                }
                tracing::warn!(
                    position = reader.buffer_position(),
                    error = %e,
                    "Malformed XML, keeping the document parsed so far"
                );
                break;
            }
        }
    }

    close_all(stack).ok_or(XmlError::NoRoot)
}

fn close_all(mut stack: Vec<Open>) -> Option<Element> {
    while let Some(open) = stack.pop() {
        match stack.last_mut() {
            Some(parent) => parent.element.children.push(Node::Element(open.element)),
            None => return Some(open.element),
        }
    }
    None
}

fn open_element(start: &BytesStart<'_>, stack: &[Open]) -> Open {
    let qname = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut declared = Vec::new();
    let mut raw_attrs = Vec::new();
    for attr in start.attributes().with_checks(false).flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = decode_entities(&raw).into_owned();

        if key == "xmlns" {
            declared.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_owned(), value));
        } else {
            raw_attrs.push((key, value));
        }
    }

    let resolve = |prefix: &str| resolve_prefix(prefix, &declared, stack);

    let (prefix, name) = split_qname(&qname);
    let ns = resolve(prefix);

    let attrs = raw_attrs
        .into_iter()
        .map(|(key, value)| {
            let (prefix, name) = split_qname(&key);
            Attribute {
                // Unprefixed attributes belong to no namespace.
                ns: if prefix.is_empty() { String::new() } else { resolve(prefix) },
                name: name.to_owned(),
                value,
            }
        })
        .collect();

    Open {
        element: Element {
            ns,
            name: name.to_owned(),
            attrs,
            children: Vec::new(),
        },
        qname,
        declared,
    }
}

fn split_qname(qname: &str) -> (&str, &str) {
    qname.split_once(':').unwrap_or(("", qname))
}

fn resolve_prefix(prefix: &str, declared: &[(String, String)], stack: &[Open]) -> String {
    let scopes = std::iter::once(declared).chain(stack.iter().rev().map(|open| open.declared.as_slice()));
    for scope in scopes {
        if let Some((_, uri)) = scope.iter().find(|(p, _)| p == prefix) {
            return uri.trim().to_owned();
        }
    }

    if prefix.is_empty() {
        return String::new();
    }

    WELL_KNOWN_PREFIXES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(prefix))
        .map_or_else(|| prefix.to_owned(), |(_, uri)| (*uri).to_owned())
}
