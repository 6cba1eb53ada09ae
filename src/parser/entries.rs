use std::fmt;
use std::mem;

use tracing::debug;

use super::pos;
use super::tree::{Element, Node};
use crate::error::{ExtractError, MalformedOrdinal};

const ENTRY_PREFIX: &str = "/entry_krjp.nhn?entryId=";

/// Link targets marking entries that are not plain Korean headwords.
const SKIPPED_ENTRY_TYPES: &[&str] = &["jpkr", "foreign", "hanja"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    pub id: i64,
    pub reading: String,
    pub item_number: Option<i32>,
    pub hanja: Option<String>,
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meaning {
    /// Bullet number as printed; gaps are possible.
    pub id: i32,
    pub pos: Option<String>,
    pub description: String,
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.id, self.reading)?;
        if let Some(n) = self.item_number {
            write!(f, " ({})", n)?;
        }
        write!(f, "\t{}", self.hanja.as_deref().unwrap_or(""))?;
        for m in &self.meanings {
            write!(f, "\n  {}", m)?;
        }
        Ok(())
    }
}

impl fmt::Display for Meaning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}. [{}] {}",
            self.id,
            self.pos.as_deref().unwrap_or(""),
            self.description
        )
    }
}

enum State {
    NoOpenWord,
    BuildingWord(Word),
}

/// Lazily folds the listing's `<dt>`/`<dd>` children into words.
///
/// A word is yielded once the next title (or the end of the listing) is reached.
/// The first fatal error is yielded once, after which the iterator is exhausted.
pub struct Entries {
    nodes: std::vec::IntoIter<Element>,
    state: State,
    done: bool,
}

impl Entries {
    /// Takes the cleaned listing root; only its direct child elements matter.
    pub fn new(listing: Element) -> Self {
        let nodes: Vec<Element> = listing
            .children
            .into_iter()
            .filter_map(|n| match n {
                Node::Element(el) => Some(el),
                Node::Text(_) => None,
            })
            .collect();
        Entries {
            nodes: nodes.into_iter(),
            state: State::NoOpenWord,
            done: false,
        }
    }

    pub fn empty() -> Self {
        Entries {
            nodes: Vec::new().into_iter(),
            state: State::NoOpenWord,
            done: true,
        }
    }

    /// Close the open word, if any, and start `next` in its place.
    fn flush(&mut self, next: State) -> Option<Word> {
        match mem::replace(&mut self.state, next) {
            State::BuildingWord(word) => Some(word),
            State::NoOpenWord => None,
        }
    }
}

impl Iterator for Entries {
    type Item = Result<Word, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(node) = self.nodes.next() {
            if node.is("dt") {
                let next = match parse_title(&node) {
                    Ok(Some(word)) => State::BuildingWord(word),
                    Ok(None) => State::NoOpenWord,
                    Err(e) => {
                        self.done = true;
                        return Some(Err(e));
                    }
                };
                if let Some(word) = self.flush(next) {
                    return Some(Ok(word));
                }
            } else if node.is("dd") {
                let State::BuildingWord(word) = &mut self.state else {
                    continue;
                };
                match parse_meaning(&node) {
                    Ok(meaning) => word.meanings.push(meaning),
                    Err(e) => debug!(word = word.id, "skipping meaning: {}", e),
                }
            }
        }

        self.done = true;
        self.flush(State::NoOpenWord).map(Ok)
    }
}

/// `Ok(None)` for entries filtered out by type.
fn parse_title(dt: &Element) -> Result<Option<Word>, ExtractError> {
    let link = dt
        .first_descendant()
        .ok_or_else(|| ExtractError::Structure("title without a link".into()))?;
    if !link.is("a") {
        return Err(ExtractError::Structure(format!(
            "title starts with <{}>, expected <a>",
            link.name
        )));
    }
    let href = link
        .attr("href")
        .ok_or_else(|| ExtractError::Structure("title link has no href".into()))?;

    if SKIPPED_ENTRY_TYPES.iter().any(|t| href.contains(t)) {
        debug!(href, "skipping non-Korean entry");
        return Ok(None);
    }

    let id = parse_entry_id(href)?;
    let item_number = link
        .find_descendant(&|el: &Element| el.is("sup"))
        .map(|sup| {
            let text = sup.text();
            text.trim().parse::<i32>().map_err(|_| {
                ExtractError::Structure(format!("item number {:?} is not an integer", text))
            })
        })
        .transpose()?;
    let reading = link
        .clone()
        .without(&|el: &Element| el.is("sup"))
        .text()
        .trim()
        .to_string();

    Ok(Some(Word {
        id,
        reading,
        item_number,
        hanja: parse_hanja(&dt.children),
        meanings: Vec::new(),
    }))
}

fn parse_entry_id(href: &str) -> Result<i64, ExtractError> {
    let raw = href
        .find(ENTRY_PREFIX)
        .map(|i| &href[i + ENTRY_PREFIX.len()..])
        .ok_or_else(|| ExtractError::Structure(format!("unexpected link target {:?}", href)))?;
    let raw = raw.split('&').next().unwrap_or_default();
    raw.parse()
        .map_err(|_| ExtractError::Structure(format!("entry id {:?} is not an integer", raw)))
}

/// Rebuild the `[...]` side reading from the title's direct children.
/// The bracket may close inside any later text node, or be a node of its own.
/// Returns `None` unless both brackets are found.
fn parse_hanja(children: &[Node]) -> Option<String> {
    let start = children
        .iter()
        .position(|n| n.as_text().is_some_and(|t| t.trim().starts_with('[')))?;
    let first = children[start].as_text()?.trim();
    let first = &first[1..];

    if let Some(end) = first.find(']') {
        return non_empty(&first[..end]);
    }

    let mut hanja = first.to_string();
    for node in &children[start + 1..] {
        match node {
            Node::Element(el) => hanja.push_str(&el.text()),
            Node::Text(t) => {
                let part = t.trim();
                if let Some(end) = part.find(']') {
                    hanja.push_str(&part[..end]);
                    return non_empty(&hanja);
                }
                hanja.push_str(part);
            }
        }
    }
    None
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// Drop the first and last characters (the `「」` around a label).
fn strip_delimiters(s: &str) -> &str {
    let mut chars = s.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}

fn parse_meaning(dd: &Element) -> Result<Meaning, MalformedOrdinal> {
    // The bullet is the first element: <strong>1</strong>, or <strong>『사람』</strong>
    // for a grammatical-person label, which carries no definition.
    let bullet_idx = dd
        .children
        .iter()
        .position(|n| matches!(n, Node::Element(_)))
        .ok_or_else(|| MalformedOrdinal(String::new()))?;
    let bullet = dd.children[bullet_idx].text();
    let id = bullet
        .trim()
        .parse::<i32>()
        .map_err(|_| MalformedOrdinal(bullet.trim().to_string()))?;

    let rest: Vec<&Node> = dd
        .children
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != bullet_idx)
        .map(|(_, n)| n)
        .collect();

    let lead_idx = rest
        .iter()
        .position(|n| n.as_text().map_or(true, |t| !t.trim().is_empty()));

    let mut pos = None;
    let mut pos_idx = None;
    let mut lead = "";
    let mut consumed = None;

    if let Some(i) = lead_idx {
        if let Some(text) = rest[i].as_text() {
            let text = text.trim();
            consumed = Some(i);
            if text == "." {
                pos_idx = rest.iter().position(|n| {
                    matches!(n, Node::Element(el) if el.is("em") && el.has_class("pos"))
                });
                pos = pos_idx.map(|p| {
                    let label = rest[p].text();
                    pos::normalize(strip_delimiters(label.trim()))
                });
            } else {
                lead = text.strip_prefix('.').unwrap_or(text);
            }
        }
    }

    let tail: String = rest
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != consumed && Some(*i) != pos_idx)
        .map(|(_, n)| n.text())
        .collect();

    Ok(Meaning {
        id,
        pos,
        description: format!("{}{}", lead.trim_start(), tail.trim()).trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tree::parse;

    fn words(listing: &str) -> Vec<Word> {
        Entries::new(parse(listing).unwrap())
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    fn title(id: i64, body: &str) -> String {
        format!("<dt><a href=\"/entry_krjp.nhn?entryId={}\">{}</dt>", id, body)
    }

    #[test]
    fn single_word_with_pos() {
        let listing = format!(
            "<dl>{}<dd><strong>1</strong>.<em class=\"pos\">「동사」</em> to go.</dd></dl>",
            title(12345, "가다</a>")
        );
        assert_eq!(
            words(&listing),
            vec![Word {
                id: 12345,
                reading: "가다".into(),
                item_number: None,
                hanja: None,
                meanings: vec![Meaning {
                    id: 1,
                    pos: Some("動詞".into()),
                    description: "to go.".into(),
                }],
            }]
        );
    }

    #[test]
    fn description_following_period() {
        let listing = format!(
            "<dl>{}<dd><strong>2</strong>.行く<b>こと</b></dd></dl>",
            title(1, "가다</a>")
        );
        let w = words(&listing);
        assert_eq!(w[0].meanings[0].id, 2);
        assert_eq!(w[0].meanings[0].pos, None);
        assert_eq!(w[0].meanings[0].description, "行くこと");
    }

    #[test]
    fn unmapped_pos_passes_through() {
        let listing = format!(
            "<dl>{}<dd><strong>1</strong>.<em class=\"pos\">「감탄사」</em>ああ</dd></dl>",
            title(7, "아</a>")
        );
        assert_eq!(words(&listing)[0].meanings[0].pos.as_deref(), Some("감탄사"));
    }

    #[test]
    fn non_numeric_bullet_is_skipped() {
        let listing = format!(
            "<dl>{}<dd><strong>1</strong>.一</dd><dd><strong>『사람』</strong>.人</dd><dd><strong>3</strong>.三</dd></dl>",
            title(9, "하나</a>")
        );
        let w = words(&listing);
        assert_eq!(w.len(), 1);
        let ids: Vec<i32> = w[0].meanings.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn word_without_meanings_is_kept() {
        let listing = format!("<dl>{}{}</dl>", title(1, "가</a>"), title(2, "나</a>"));
        let w = words(&listing);
        assert_eq!(w.len(), 2);
        assert!(w.iter().all(|w| w.meanings.is_empty()));
        assert_eq!(w[1].reading, "나");
    }

    #[test]
    fn filtered_titles_drop_their_meanings() {
        let listing = "<dl>\
            <dt><a href=\"/entry_jpkr.nhn?entryId=5\">行く</a></dt><dd><strong>1</strong>.x</dd>\
            <dt><a href=\"/foreign/entry.nhn?entryId=6\">x</a></dt>\
            <dt><a href=\"/hanja/entry.nhn?entryId=7\">x</a></dt>\
            <dt><a href=\"/entry_krjp.nhn?entryId=8\">가다</a></dt><dd><strong>1</strong>.y</dd>\
            </dl>";
        let w = words(listing);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].id, 8);
        assert_eq!(w[0].meanings.len(), 1);
    }

    #[test]
    fn item_number_superscript() {
        let listing = format!("<dl>{}</dl>", title(3, "눈<SUP>2</SUP></a>"));
        let w = words(&listing);
        assert_eq!(w[0].reading, "눈");
        assert_eq!(w[0].item_number, Some(2));
    }

    #[test]
    fn hanja_in_one_text_run() {
        let listing = format!("<dl>{}</dl>", title(4, "학교</a> [學校]"));
        assert_eq!(words(&listing)[0].hanja.as_deref(), Some("學校"));
    }

    #[test]
    fn hanja_split_across_nodes() {
        let attached = format!("<dl>{}</dl>", title(4, "학교</a> [<span>學</span>校]"));
        assert_eq!(words(&attached)[0].hanja.as_deref(), Some("學校"));

        let trailing = format!(
            "<dl>{}</dl>",
            title(4, "학교</a> [<span>學</span><span>校</span> ]")
        );
        assert_eq!(words(&trailing)[0].hanja.as_deref(), Some("學校"));
    }

    #[test]
    fn unclosed_hanja_is_dropped() {
        let listing = format!("<dl>{}</dl>", title(4, "학교</a> [<span>學</span>"));
        assert_eq!(words(&listing)[0].hanja, None);
    }

    #[test]
    fn title_without_link_is_fatal() {
        let root = parse("<dl><dt><span>가</span></dt><dt><a href=\"/entry_krjp.nhn?entryId=1\">나</a></dt></dl>").unwrap();
        let mut entries = Entries::new(root);
        assert!(matches!(entries.next(), Some(Err(ExtractError::Structure(_)))));
        assert!(entries.next().is_none());
    }

    #[test]
    fn bad_entry_id_is_fatal() {
        let root = parse("<dl><dt><a href=\"/entry_krjp.nhn?entryId=abc\">나</a></dt></dl>").unwrap();
        let result: Result<Vec<_>, _> = Entries::new(root).collect();
        assert!(result.is_err());
    }

    #[test]
    fn words_are_yielded_lazily() {
        let listing = format!(
            "<dl>{}<dd><strong>1</strong>.a</dd>{}<dt><b>broken</b></dt></dl>",
            title(1, "가</a>"),
            title(2, "나</a>")
        );
        let mut entries = Entries::new(parse(&listing).unwrap());
        assert_eq!(entries.next().unwrap().unwrap().id, 1);
        assert!(entries.next().unwrap().is_err());
        assert!(entries.next().is_none());
    }

    #[test]
    fn meanings_before_any_title_are_ignored() {
        let listing = format!("<dl><dd><strong>1</strong>.a</dd>{}</dl>", title(1, "가</a>"));
        let w = words(&listing);
        assert_eq!(w.len(), 1);
        assert!(w[0].meanings.is_empty());
    }

    #[test]
    fn display_lists_meanings() {
        let w = Word {
            id: 1,
            reading: "가다".into(),
            item_number: None,
            hanja: None,
            meanings: vec![Meaning {
                id: 1,
                pos: Some("動詞".into()),
                description: "行く".into(),
            }],
        };
        assert_eq!(w.to_string(), "1\t가다\t\n  1. [動詞] 行く");
    }
}
