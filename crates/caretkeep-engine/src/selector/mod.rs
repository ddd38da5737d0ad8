//! Structural predicates over document elements.
//!
//! The grammar is a comma-separated list of compound selectors. Each compound
//! is an optional tag name (or `*`) followed by any number of `#id`, `.class`,
//! `[attr]` and `[attr=value]` tests, e.g. `td.cell-selected, th.cell-selected`
//! or `a[href]`. Combinators are not supported; ancestor matching is done by
//! the caller walking the ancestor chain.

pub mod cursor;

use thiserror::Error;

use crate::dom::{Document, NodeId};
use cursor::Cursor;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("selector is empty")]
    Empty,

    #[error("unexpected character {found:?} at byte {at} in selector {source_text:?}")]
    UnexpectedChar {
        found: char,
        at: usize,
        source_text: String,
    },

    #[error("expected a name at byte {at} in selector {source_text:?}")]
    ExpectedName { at: usize, source_text: String },

    #[error("unterminated attribute test in selector {source_text:?}")]
    UnterminatedAttribute { source_text: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Exists(String),
    Equals(String, String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(element) = doc.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !element.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.iter().all(|c| doc.has_class(node, c)) {
            return false;
        }
        self.attrs.iter().all(|test| match test {
            AttrTest::Exists(name) => element.attrs.contains_key(name),
            AttrTest::Equals(name, value) => element.attrs.get(name) == Some(value),
        })
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    alternatives: Vec<Compound>,
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let mut cur = Cursor::new(source);
        let mut alternatives = Vec::new();

        loop {
            cur.skip_whitespace();
            alternatives.push(Self::parse_compound(&mut cur, source)?);
            cur.skip_whitespace();
            if cur.eof() {
                break;
            }
            if !cur.eat(b',') {
                return Err(unexpected(&cur, source));
            }
        }

        Ok(Self {
            source: source.trim().to_string(),
            alternatives,
        })
    }

    fn parse_compound(cur: &mut Cursor<'_>, source: &str) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();

        let universal = cur.eat(b'*');
        if !universal {
            let tag = cur.take_while(is_name_byte);
            if !tag.is_empty() {
                compound.tag = Some(tag.to_ascii_lowercase());
            }
        }

        loop {
            match cur.peek() {
                Some(b'#') => {
                    cur.bump();
                    compound.id = Some(parse_name(cur, source)?.to_string());
                }
                Some(b'.') => {
                    cur.bump();
                    compound.classes.push(parse_name(cur, source)?.to_string());
                }
                Some(b'[') => {
                    cur.bump();
                    compound.attrs.push(parse_attr(cur, source)?);
                }
                _ => break,
            }
        }

        if compound == Compound::default() && !universal {
            return if source.trim().is_empty() {
                Err(SelectorError::Empty)
            } else if cur.eof() {
                Err(SelectorError::ExpectedName {
                    at: cur.i,
                    source_text: source.to_string(),
                })
            } else {
                Err(unexpected(cur, source))
            };
        }
        Ok(compound)
    }

    /// The selector text as registered.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.alternatives.iter().any(|c| c.matches(doc, node))
    }

    /// Matching descendants of `scope` (excluding `scope`) in document order.
    pub fn select_all(&self, doc: &Document, scope: NodeId) -> Vec<NodeId> {
        doc.descendants(scope)
            .into_iter()
            .filter(|&n| self.matches(doc, n))
            .collect()
    }
}

fn unexpected(cur: &Cursor<'_>, source: &str) -> SelectorError {
    let found = source[cur.i..].chars().next().unwrap_or('\0');
    SelectorError::UnexpectedChar {
        found,
        at: cur.i,
        source_text: source.to_string(),
    }
}

fn parse_name<'a>(cur: &mut Cursor<'a>, source: &str) -> Result<&'a str, SelectorError> {
    let at = cur.i;
    let name = cur.take_while(is_name_byte);
    if name.is_empty() {
        return Err(SelectorError::ExpectedName {
            at,
            source_text: source.to_string(),
        });
    }
    Ok(name)
}

fn parse_attr(cur: &mut Cursor<'_>, source: &str) -> Result<AttrTest, SelectorError> {
    let unterminated = || SelectorError::UnterminatedAttribute {
        source_text: source.to_string(),
    };

    cur.skip_whitespace();
    let name = parse_name(cur, source)?.to_ascii_lowercase();
    cur.skip_whitespace();

    if cur.eat(b']') {
        return Ok(AttrTest::Exists(name));
    }
    if !cur.eat(b'=') {
        return Err(if cur.eof() {
            unterminated()
        } else {
            unexpected(cur, source)
        });
    }
    cur.skip_whitespace();

    let value = match cur.peek() {
        Some(quote @ (b'"' | b'\'')) => {
            cur.bump();
            let value = cur.take_until(quote).ok_or_else(unterminated)?;
            cur.bump();
            value
        }
        _ => cur.take_while(is_name_byte),
    };
    cur.skip_whitespace();
    if !cur.eat(b']') {
        return Err(unterminated());
    }
    Ok(AttrTest::Equals(name, value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Fragment;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn doc() -> Document {
        Document::from_fragments(&[
            Fragment::element("p")
                .with_attr("class", "lead note")
                .with_attr("id", "intro")
                .with_child(
                    Fragment::element("a")
                        .with_attr("href", "https://example.com")
                        .with_child(Fragment::text("x")),
                ),
            Fragment::element("table").with_child(Fragment::element("tr").with_children([
                Fragment::element("td").with_attr("class", "cell-selected"),
                Fragment::element("td"),
                Fragment::element("th").with_attr("class", "cell-selected"),
            ])),
        ])
    }

    #[rstest]
    #[case("p", true)]
    #[case("P", true)]
    #[case("*", true)]
    #[case("div", false)]
    #[case(".lead", true)]
    #[case("p.lead.note", true)]
    #[case("p.missing", false)]
    #[case("#intro", true)]
    #[case("p#other", false)]
    #[case("[class]", true)]
    #[case("[id=intro]", true)]
    #[case("[id='intro']", true)]
    #[case("[id=\"outro\"]", false)]
    #[case("div, p", true)]
    fn test_matches_paragraph(#[case] selector: &str, #[case] expected: bool) {
        let doc = doc();
        let p = doc.child(doc.body(), 0).unwrap();
        let selector = Selector::parse(selector).unwrap();

        assert_eq!(selector.matches(&doc, p), expected);
    }

    #[test]
    fn test_text_nodes_never_match() {
        let doc = doc();
        let text = doc.elements_by_tag("a")[0];
        let text = doc.first_child(text).unwrap();
        assert!(!Selector::parse("*").unwrap().matches(&doc, text));
    }

    #[test]
    fn test_select_all_in_document_order() {
        let doc = doc();
        let selector = Selector::parse("td.cell-selected, th.cell-selected").unwrap();

        let cells = selector.select_all(&doc, doc.body());

        let tags: Vec<_> = cells.iter().map(|&c| doc.tag(c).unwrap()).collect();
        assert_eq!(tags, vec!["td", "th"]);
        assert_eq!(selector.as_str(), "td.cell-selected, th.cell-selected");
    }

    #[rstest]
    #[case("", SelectorError::Empty)]
    #[case("   ", SelectorError::Empty)]
    fn test_empty_selector(#[case] input: &str, #[case] expected: SelectorError) {
        assert_eq!(Selector::parse(input), Err(expected));
    }

    #[rstest]
    #[case("p > b")]
    #[case("p,")]
    #[case("a[href")]
    #[case("a[href=\"x]")]
    #[case(".")]
    fn test_invalid_selectors(#[case] input: &str) {
        assert!(Selector::parse(input).is_err(), "{input} should not parse");
    }
}
