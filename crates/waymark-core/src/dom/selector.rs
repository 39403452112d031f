//! Selector parsing and matching.
//!
//! Supports the subset Waymark produces and consumes: type selectors, `*`,
//! `#id`, `.class`, `[attr]`, `[attr="value"]`, `:nth-of-type(n)`, the child
//! (`>`) and descendant combinators, and comma-separated groups.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

use super::document::Document;
use super::dom_types::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Unexpected character '{found}' at {position}")]
    Unexpected { found: char, position: usize },

    #[error("Unexpected end of selector")]
    UnexpectedEnd,

    #[error("Unsupported pseudo-class: {0}")]
    UnsupportedPseudo(String),
}

/// A parsed selector (one or more comma-separated groups).
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    groups: Vec<Complex>,
}

#[derive(Debug, Clone, PartialEq)]
struct Complex {
    /// Rightmost compound last.
    compounds: Vec<Compound>,
    /// `combinators[i]` joins `compounds[i]` and `compounds[i + 1]`.
    combinators: Vec<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Child,
    Descendant,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
    nth_of_type: Option<usize>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        Parser::new(input).parse()
    }

    /// Whether `node` matches any group.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.groups.iter().any(|g| g.matches(doc, node))
    }
}

impl Complex {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.matches_from(doc, node, self.compounds.len() - 1)
    }

    fn matches_from(&self, doc: &Document, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(doc, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => doc
                .parent(node)
                .is_some_and(|p| self.matches_from(doc, p, index - 1)),
            Combinator::Descendant => doc
                .ancestors(node)
                .any(|a| self.matches_from(doc, a, index - 1)),
        }
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attributes.is_empty()
            && self.nth_of_type.is_none()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = &self.tag {
            if tag != "*" && !doc.tag_name(node).eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if doc.attribute(node, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes = doc.class_list(node);
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        for (name, value) in &self.attributes {
            match (doc.attribute(node, name), value) {
                (None, _) => return false,
                (Some(actual), Some(expected)) if actual != expected => return false,
                _ => {}
            }
        }
        if let Some(n) = self.nth_of_type {
            if doc.nth_of_type(node) != n {
                return false;
            }
        }
        true
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.trim().chars().peekable(),
            position: 0,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        self.position += 1;
        self.chars.next()
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            found,
            position: self.position,
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
            skipped = true;
        }
        skipped
    }

    fn parse(mut self) -> Result<Selector, SelectorError> {
        let mut groups = vec![self.parse_complex()?];
        while self.peek() == Some(',') {
            self.bump();
            self.skip_whitespace();
            groups.push(self.parse_complex()?);
        }
        match self.peek() {
            None => Ok(Selector { groups }),
            Some(c) => Err(self.unexpected(c)),
        }
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.bump();
                    self.skip_whitespace();
                    Combinator::Child
                }
                Some(_) if had_space => Combinator::Descendant,
                Some(c) => return Err(self.unexpected(c)),
            };
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        Ok(Complex {
            compounds,
            combinators,
        })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();

        match self.peek() {
            Some('*') => {
                self.bump();
                compound.tag = Some("*".to_string());
            }
            Some(c) if is_ident_start(c) => {
                compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.parse_ident()?);
                }
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attributes.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.bump();
                    compound.nth_of_type = Some(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if compound.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None if self.position == 0 => SelectorError::Empty,
                None => SelectorError::UnexpectedEnd,
            });
        }
        Ok(compound)
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                self.bump();
                ident.push(self.parse_escape()?);
            } else if is_ident_char(c) {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if ident.is_empty() {
            return Err(match self.peek() {
                Some(c) => self.unexpected(c),
                None => SelectorError::UnexpectedEnd,
            });
        }
        Ok(ident)
    }

    /// Body of a backslash escape: up to six hex digits plus one optional
    /// trailing space, or a single literal character.
    fn parse_escape(&mut self) -> Result<char, SelectorError> {
        let mut hex = String::new();
        while hex.len() < 6 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
            hex.push(self.bump().unwrap_or_default());
        }
        if hex.is_empty() {
            return self.bump().ok_or(SelectorError::UnexpectedEnd);
        }
        if self.peek() == Some(' ') {
            self.bump();
        }
        let code = u32::from_str_radix(&hex, 16).unwrap_or(0xFFFD);
        Ok(char::from_u32(code).unwrap_or('\u{FFFD}'))
    }

    fn parse_attribute(&mut self) -> Result<(String, Option<String>), SelectorError> {
        self.skip_whitespace();
        let name = self.parse_ident()?.to_ascii_lowercase();
        self.skip_whitespace();
        let value = match self.bump() {
            Some(']') => return Ok((name, None)),
            Some('=') => {
                self.skip_whitespace();
                match self.peek() {
                    Some(q @ ('"' | '\'')) => {
                        self.bump();
                        self.parse_quoted(q)?
                    }
                    _ => self.parse_ident()?,
                }
            }
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(SelectorError::UnexpectedEnd),
        };
        self.skip_whitespace();
        match self.bump() {
            Some(']') => Ok((name, Some(value))),
            Some(c) => Err(self.unexpected(c)),
            None => Err(SelectorError::UnexpectedEnd),
        }
    }

    fn parse_quoted(&mut self, quote: char) -> Result<String, SelectorError> {
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => value.push(self.parse_escape()?),
                Some(c) => value.push(c),
                None => return Err(SelectorError::UnexpectedEnd),
            }
        }
    }

    fn parse_pseudo(&mut self) -> Result<usize, SelectorError> {
        let name = self.parse_ident()?;
        if !name.eq_ignore_ascii_case("nth-of-type") {
            return Err(SelectorError::UnsupportedPseudo(name));
        }
        match self.bump() {
            Some('(') => {}
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(SelectorError::UnexpectedEnd),
        }
        self.skip_whitespace();
        let mut digits = String::new();
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            digits.push(self.bump().unwrap_or_default());
        }
        self.skip_whitespace();
        match self.bump() {
            Some(')') => {}
            Some(c) => return Err(self.unexpected(c)),
            None => return Err(SelectorError::UnexpectedEnd),
        }
        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(SelectorError::UnsupportedPseudo(format!("nth-of-type({})", digits))),
        }
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '-' || c == '\\' || !c.is_ascii()
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || !c.is_ascii()
}

/// Escape `value` for use as an identifier in a selector, following the
/// rules of `CSS.escape`.
pub fn css_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let chars: Vec<char> = value.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        let leading_digit = c.is_ascii_digit()
            && (i == 0 || (i == 1 && chars[0] == '-'));
        if c == '\0' {
            out.push('\u{FFFD}');
        } else if c.is_control() || leading_digit {
            out.push_str(&format!("\\{:x} ", c as u32));
        } else if i == 0 && c == '-' && chars.len() == 1 {
            out.push_str("\\-");
        } else if is_ident_char(c) {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Quote `value` as a double-quoted attribute value.
pub(crate) fn quote_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
