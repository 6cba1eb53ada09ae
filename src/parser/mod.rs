pub mod entries;
pub mod pos;
pub mod repair;
pub mod tree;

use tracing::info;

use crate::error::ExtractError;
pub use entries::{Entries, Meaning, Word};
use tree::Element;

/// Furigana glosses (`<sup class="huri">`) never belong in extracted text.
fn is_furigana(el: &Element) -> bool {
    el.is("sup") && el.has_class("huri")
}

/// Page markup → listing → repairs → tree → lazy word stream.
pub fn extract_words(page: &str) -> Result<Entries, ExtractError> {
    let Some(fragment) = repair::extract_fragment(page)? else {
        info!("page has no entry listing");
        return Ok(Entries::empty());
    };
    let repaired = repair::repair(fragment);
    let listing = tree::parse(&repaired)?.without(&is_furigana);
    Ok(Entries::new(listing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap()
    }

    fn extract(page: &str) -> Vec<Word> {
        extract_words(page)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn gada_page() {
        let words = extract(&fixture("gada"));
        assert_eq!(words.len(), 3);

        let gada = &words[0];
        assert_eq!(gada.id, 12345);
        assert_eq!(gada.reading, "가다");
        assert_eq!(gada.hanja, None);
        assert_eq!(gada.meanings.len(), 2);
        assert_eq!(gada.meanings[0].pos.as_deref(), Some("自動詞"));
        assert_eq!(gada.meanings[0].description, "行く。");
        assert_eq!(gada.meanings[1].id, 2);
        assert_eq!(gada.meanings[1].description, "(時間が)経つ。");
    }

    #[test]
    fn gada_page_second_layout() {
        let words = extract(&fixture("gada"));
        let gaga = &words[1];
        assert_eq!(gaga.id, 20001);
        assert_eq!(gaga.reading, "가가");
        assert_eq!(gaga.item_number, Some(2));
        assert_eq!(gaga.hanja.as_deref(), Some("家家"));
        // bullet 『사람』 is skipped
        let ids: Vec<i32> = gaga.meanings.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(gaga.meanings[0].pos.as_deref(), Some("名詞"));
        assert_eq!(gaga.meanings[0].description, "家々。");
    }

    #[test]
    fn furigana_never_leaks() {
        let words = extract(&fixture("gada"));
        for w in &words {
            assert!(!w.reading.contains('ゆ'));
            for m in &w.meanings {
                assert!(!m.description.contains("ゆ"), "{}", m.description);
            }
        }
        assert_eq!(words[2].id, 30002);
        assert_eq!(words[2].hanja.as_deref(), Some("學校"));
    }

    #[test]
    fn page_without_listing_yields_nothing() {
        assert!(extract("<html><body>nothing</body></html>").is_empty());
    }

    #[test]
    fn unrepaired_markup_is_fatal() {
        let page = "<dl class=\"entry_result\"><dt><a href=x>가</a></dt></dl>";
        assert!(matches!(
            extract_words(page).err(),
            Some(ExtractError::Markup(_))
        ));
    }
}
