//! XML documents and selection paths
//!
//! Thin layer over `quick-xml` that reads files into `Element` trees and
//! writes them back. Comments, processing instructions and whitespace-only
//! text are not preserved.

use crate::element::Element;
use crate::error::{InventoryError, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use std::fs;
use std::path::Path;
use std::rc::Rc;

/// A parsed XML document with a single root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse a document from a string.
    pub fn parse(input: &str) -> Result<Self> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(element_from_start(&start)?),
                Ok(Event::Empty(start)) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| InventoryError::Xml("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(text)) => {
                    let text = text
                        .unescape()
                        .map_err(|e| InventoryError::Xml(e.to_string()))?;
                    append_text(&mut stack, &text);
                }
                Ok(Event::CData(data)) => {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    append_text(&mut stack, &text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(InventoryError::Xml(format!(
                        "at position {}: {}",
                        reader.error_position(),
                        e
                    )))
                }
            }
        }

        if let Some(open) = stack.last() {
            return Err(InventoryError::Xml(format!("unclosed element <{}>", open.name)));
        }
        root.map(XmlDocument::new)
            .ok_or_else(|| InventoryError::Xml("document has no root element".to_string()))
    }

    /// Load a document from disk, wrapping parse failures with the file path.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        let content = String::from_utf8(bytes).map_err(|e| InventoryError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&content).map_err(|e| match e {
            InventoryError::Xml(message) => InventoryError::Parse {
                path: path.to_path_buf(),
                message,
            },
            other => other,
        })
    }

    /// Serialize with an XML declaration and two-space indentation.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| InventoryError::Xml(e.to_string()))?;
        write_element(&mut writer, &self.root)?;
        into_string(writer.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut xml = self.to_xml_string()?;
        xml.push('\n');
        fs::write(path, xml)?;
        Ok(())
    }
}

impl Element {
    /// Compact serialized form. Two elements with the same form are duplicates.
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, self)?;
        into_string(writer.into_inner())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| InventoryError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| InventoryError::Xml(e.to_string()))?
            .into_owned();
        element.set_attr(key, value);
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(InventoryError::Xml(format!(
                "multiple root elements (second is <{}>)",
                element.name
            )))
        }
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        match current.text.as_mut() {
            Some(existing) => existing.push_str(text),
            None => current.text = Some(text.to_string()),
        }
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (name, value) in &element.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if element.children.is_empty() && element.text.is_none() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| InventoryError::Xml(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| InventoryError::Xml(e.to_string()))?;
    if let Some(text) = &element.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| InventoryError::Xml(e.to_string()))?;
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(|e| InventoryError::Xml(e.to_string()))
}

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| InventoryError::Xml(e.to_string()))
}

/// An element picked out of a document by a `SelectionPath`
#[derive(Debug, Clone)]
pub struct Selected {
    /// Index of the wrapper element (in document order) that holds this node
    pub parent: usize,
    pub element: Rc<Element>,
}

/// A path of the form `/Wrapper1/.../WrapperN/*`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionPath {
    raw: String,
    wrappers: Vec<String>,
}

impl SelectionPath {
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || InventoryError::InvalidSelectionPath(path.to_string());
        if !path.starts_with('/') || !path.ends_with("/*") || path.len() < 4 {
            return Err(invalid());
        }
        let wrappers: Vec<String> = path[1..path.len() - 2]
            .split('/')
            .map(str::to_string)
            .collect();
        if wrappers.iter().any(|w| w.is_empty() || w.contains('*')) {
            return Err(invalid());
        }
        Ok(Self {
            raw: path.to_string(),
            wrappers,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The chain of wrapper element names, outermost first.
    pub fn wrapper_names(&self) -> &[String] {
        &self.wrappers
    }

    /// All children of every innermost wrapper, in document order.
    pub fn select(&self, doc: &XmlDocument) -> Vec<Selected> {
        let mut out = Vec::new();
        if doc.root.name != self.wrappers[0] {
            return out;
        }
        let mut parents = vec![&doc.root];
        for name in &self.wrappers[1..] {
            parents = parents
                .into_iter()
                .flat_map(|p| p.children_named(name).map(|c| c.as_ref()))
                .collect();
        }
        for (index, parent) in parents.into_iter().enumerate() {
            out.extend(parent.children.iter().map(|child| Selected {
                parent: index,
                element: Rc::clone(child),
            }));
        }
        out
    }

    /// Remove every selected node and append `replacements` to the wrapper
    /// that held the first of them. Documents with no selected nodes are left
    /// untouched. Returns whether anything was replaced.
    pub fn replace_selected(&self, doc: &mut XmlDocument, replacements: &[Rc<Element>]) -> bool {
        if doc.root.name != self.wrappers[0] {
            return false;
        }
        let mut placed = false;
        visit_wrappers(&mut doc.root, &self.wrappers[1..], &mut |wrapper| {
            if wrapper.children.is_empty() {
                return;
            }
            wrapper.children.clear();
            if !placed {
                wrapper.children.extend(replacements.iter().cloned());
                placed = true;
            }
        });
        placed
    }

    /// A fresh document holding only the wrapper chain.
    pub fn skeleton(&self) -> XmlDocument {
        let mut names = self.wrappers.iter().rev();
        let mut inner = Element::new(names.next().map(String::as_str).unwrap_or_default());
        for name in names {
            inner = Element::new(name.as_str()).with_child(inner);
        }
        XmlDocument::new(inner)
    }

    /// Follow the first-child chain of `doc` along the wrapper names and
    /// return the innermost wrapper, or `None` if the chain does not match.
    pub fn innermost_wrapper_mut<'a>(&self, doc: &'a mut XmlDocument) -> Option<&'a mut Element> {
        let mut current = &mut doc.root;
        if current.name != self.wrappers[0] {
            return None;
        }
        for name in &self.wrappers[1..] {
            current = current.first_child_mut()?;
            if &current.name != name {
                return None;
            }
        }
        Some(current)
    }
}

fn visit_wrappers(element: &mut Element, rest: &[String], f: &mut dyn FnMut(&mut Element)) {
    let Some((name, tail)) = rest.split_first() else {
        f(element);
        return;
    };
    for child in element.children.iter_mut() {
        if &child.name == name {
            visit_wrappers(Rc::make_mut(child), tail, f);
        }
    }
}
