use std::fmt::Display;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ExtractError;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    /// Concatenated text content, like the DOM's `textContent`.
    pub fn text(&self) -> String {
        match self {
            Node::Element(el) => el.text(),
            Node::Text(t) => t.clone(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Exact match on the whole `class` attribute.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class") == Some(class)
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// First element in document order below this one.
    pub fn first_descendant(&self) -> Option<&Element> {
        self.elements().next()
    }

    pub fn find_descendant(&self, pred: &impl Fn(&Element) -> bool) -> Option<&Element> {
        for child in self.elements() {
            if pred(child) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(pred) {
                return Some(found);
            }
        }
        None
    }

    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(el) => el.collect_text(out),
                Node::Text(t) => out.push_str(t),
            }
        }
    }

    /// Copy of this subtree with every element matching `pred` dropped.
    pub fn without(self, pred: &impl Fn(&Element) -> bool) -> Element {
        let children = self
            .children
            .into_iter()
            .filter_map(|n| match n {
                Node::Element(el) if pred(&el) => None,
                Node::Element(el) => Some(Node::Element(el.without(pred))),
                text => Some(text),
            })
            .collect();
        Element { children, ..self }
    }
}

fn markup(err: impl Display, pos: u64) -> ExtractError {
    ExtractError::Markup(format!("{} (at byte {})", err, pos))
}

fn open(start: &BytesStart, pos: u64) -> Result<Element, ExtractError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attrs = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| markup(e, pos))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| markup(e, pos))?;
        attrs.push((key, value.into_owned()));
    }
    Ok(Element {
        name,
        attrs,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    el: Element,
    pos: u64,
) -> Result<(), ExtractError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(el));
        return Ok(());
    }
    if root.is_some() {
        return Err(markup(format!("second root element <{}>", el.name), pos));
    }
    *root = Some(el);
    Ok(())
}

/// Parse a repaired fragment into a single-rooted element tree.
pub fn parse(fragment: &str) -> Result<Element, ExtractError> {
    let mut reader = Reader::from_str(fragment);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let pos = reader.buffer_position() as u64;
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(open(&e, pos)?),
            Ok(Event::Empty(e)) => {
                let el = open(&e, pos)?;
                attach(&mut stack, &mut root, el, pos)?;
            }
            Ok(Event::End(e)) => {
                let el = stack.pop().ok_or_else(|| {
                    markup(
                        format!(
                            "unmatched </{}>",
                            String::from_utf8_lossy(e.name().as_ref())
                        ),
                        pos,
                    )
                })?;
                attach(&mut stack, &mut root, el, pos)?;
            }
            Ok(Event::Text(e)) => {
                let text = e.unescape().map_err(|err| markup(err, pos))?;
                push_text(&mut stack, text.into_owned(), pos)?;
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_text(&mut stack, text, pos)?;
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(markup(e, pos)),
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(ExtractError::Markup(format!("unclosed <{}>", unclosed.name)));
    }
    root.ok_or_else(|| ExtractError::Markup("no root element".into()))
}

fn push_text(stack: &mut [Element], text: String, pos: u64) -> Result<(), ExtractError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Text(text)),
        None if text.trim().is_empty() => {}
        None => return Err(markup("text outside the root element", pos)),
    }
    Ok(())
}
