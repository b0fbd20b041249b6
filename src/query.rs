//! Element path queries
//!
//! A small XPath-like language evaluated against the direct children of a
//! store root: slash-separated steps, each a name test (`name` or `*`) with an
//! optional predicate list such as `[@class='LexEntry' and not(@choiceGuid)]`.

use crate::element::Element;
use crate::error::{InventoryError, Result};
use std::fmt;
use std::rc::Rc;

/// A single attribute condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// `@attr='value'`
    Equals { attr: String, value: String },
    /// `not(@attr)`
    Absent { attr: String },
    /// `@attr`
    Present { attr: String },
}

impl Predicate {
    /// `Equals` for `Some`, `Absent` for `None`.
    pub fn for_value(attr: &str, value: Option<&str>) -> Self {
        match value {
            Some(value) => Predicate::Equals {
                attr: attr.to_string(),
                value: value.to_string(),
            },
            None => Predicate::Absent {
                attr: attr.to_string(),
            },
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        match self {
            Predicate::Equals { attr, value } => element.attr(attr) == Some(value.as_str()),
            Predicate::Absent { attr } => !element.has_attr(attr),
            Predicate::Present { attr } => element.has_attr(attr),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // A quote inside a value is written twice.
            Predicate::Equals { attr, value } if value.contains('\'') && !value.contains('"') => {
                write!(f, "@{}=\"{}\"", attr, value)
            }
            Predicate::Equals { attr, value } => {
                write!(f, "@{}='{}'", attr, value.replace('\'', "''"))
            }
            Predicate::Absent { attr } => write!(f, "not(@{})", attr),
            Predicate::Present { attr } => write!(f, "@{}", attr),
        }
    }
}

/// One path step: a name test plus predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// `None` matches any element name
    pub name: Option<String>,
    pub predicates: Vec<Predicate>,
}

impl Step {
    /// Step selecting elements named `name` whose key attributes have `values`.
    pub fn for_key(name: &str, key_attrs: &[String], values: &[Option<&str>]) -> Self {
        Self {
            name: Some(name.to_string()),
            predicates: key_attrs
                .iter()
                .zip(values.iter())
                .map(|(attr, value)| Predicate::for_value(attr, *value))
                .collect(),
        }
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.name.as_deref().map_or(true, |n| n == element.name)
            && self.predicates.iter().all(|p| p.matches(element))
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name.as_deref().unwrap_or("*"))?;
        if !self.predicates.is_empty() {
            let preds: Vec<String> = self.predicates.iter().map(|p| p.to_string()).collect();
            write!(f, "[{}]", preds.join(" and "))?;
        }
        Ok(())
    }
}

/// A relative path of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuery {
    pub steps: Vec<Step>,
}

impl PathQuery {
    pub fn parse(input: &str) -> Result<Self> {
        let mut parser = Parser {
            input,
            chars: input.char_indices().peekable(),
        };
        let mut steps = vec![parser.step()?];
        while parser.eat('/') {
            steps.push(parser.step()?);
        }
        if let Some((pos, c)) = parser.chars.next() {
            return Err(parser.error(&format!("unexpected {:?} at {}", c, pos)));
        }
        Ok(Self { steps })
    }

    /// Evaluate against a list of top-level elements.
    pub fn select(&self, roots: &[Rc<Element>]) -> Vec<Rc<Element>> {
        let mut current: Vec<Rc<Element>> = roots
            .iter()
            .filter(|e| self.steps[0].matches(e))
            .cloned()
            .collect();
        for step in &self.steps[1..] {
            current = current
                .iter()
                .flat_map(|e| e.children.iter().filter(|c| step.matches(c)).cloned())
                .collect();
        }
        current
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self.steps.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", steps.join("/"))
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
}

impl Parser<'_> {
    fn error(&self, reason: &str) -> InventoryError {
        InventoryError::ConfigError(format!("invalid element path {:?}: {}", self.input, reason))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {:?}", expected)))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let Some(&(pos, _)) = self.chars.peek() else {
            return false;
        };
        if !self.input[pos..].starts_with(keyword) {
            return false;
        }
        for _ in keyword.chars() {
            self.chars.next();
        }
        true
    }

    fn skip_spaces(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.chars.next();
        }
    }

    fn name(&mut self) -> Result<String> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':') {
                name.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(self.error("expected a name"));
        }
        Ok(name)
    }

    fn quoted(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected a quoted value")),
        };
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => {
                    if !self.eat(quote) {
                        return Ok(value);
                    }
                    value.push(quote);
                }
                Some((_, c)) => value.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn step(&mut self) -> Result<Step> {
        let name = if self.eat('*') { None } else { Some(self.name()?) };
        let mut predicates = Vec::new();
        if self.eat('[') {
            loop {
                self.skip_spaces();
                predicates.push(self.predicate()?);
                self.skip_spaces();
                if !self.eat_keyword("and") {
                    break;
                }
            }
            self.expect(']')?;
        }
        Ok(Step { name, predicates })
    }

    fn predicate(&mut self) -> Result<Predicate> {
        if self.eat_keyword("not(") {
            self.skip_spaces();
            self.expect('@')?;
            let attr = self.name()?;
            self.skip_spaces();
            self.expect(')')?;
            return Ok(Predicate::Absent { attr });
        }
        self.expect('@')?;
        let attr = self.name()?;
        self.skip_spaces();
        if self.eat('=') {
            self.skip_spaces();
            let value = self.quoted()?;
            Ok(Predicate::Equals { attr, value })
        } else {
            Ok(Predicate::Present { attr })
        }
    }
}
