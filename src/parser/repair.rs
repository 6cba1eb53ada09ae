use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::ExtractError;

pub const LISTING_OPEN: &str = "<dl class=\"entry_result\">";
pub const LISTING_CLOSE: &str = "</dl>";

static IMG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<img [^>]+>").unwrap());
static PARAM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"param="[^"]*""#).unwrap());

/// A single textual fix applied to the listing before tree parsing.
pub enum RepairRule {
    Literal {
        name: &'static str,
        from: &'static str,
        to: &'static str,
    },
    Pattern {
        name: &'static str,
        re: &'static LazyLock<Regex>,
    },
}

impl RepairRule {
    pub fn name(&self) -> &'static str {
        match self {
            RepairRule::Literal { name, .. } | RepairRule::Pattern { name, .. } => *name,
        }
    }

    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        match self {
            RepairRule::Literal { from, to, .. } => {
                if text.contains(from) {
                    Cow::Owned(text.replace(from, to))
                } else {
                    Cow::Borrowed(text)
                }
            }
            RepairRule::Pattern { re, .. } => re.replace_all(text, ""),
        }
    }
}

/// Applied in order. The first two cover the two observed link layouts.
pub static RULES: &[RepairRule] = &[
    RepairRule::Literal {
        name: "mouse_handlers",
        from: "onmouseout=\"this.className = 'jpAutoLink';\" onmouseover=\"this.className = 'jpAutoLink pointbg';\" href=\"javascript:void(0);\"",
        to: "",
    },
    RepairRule::Literal {
        name: "autolink_span",
        from: "<span class='han' autolink>",
        to: "<span>",
    },
    RepairRule::Literal {
        name: "pos_index",
        from: "&posIndex=",
        to: "",
    },
    RepairRule::Pattern {
        name: "img",
        re: &IMG_RE,
    },
    RepairRule::Pattern {
        name: "param_attr",
        re: &PARAM_RE,
    },
    RepairRule::Literal {
        name: "nbsp",
        from: "&nbsp;",
        to: "&#160;",
    },
];

/// Slice the entry listing out of a full page, `<dl ...>` through `</dl>` inclusive.
/// `Ok(None)` means the page has no listing, i.e. zero results.
pub fn extract_fragment(page: &str) -> Result<Option<&str>, ExtractError> {
    let Some(start) = page.find(LISTING_OPEN) else {
        return Ok(None);
    };
    let end = page[start..]
        .find(LISTING_CLOSE)
        .ok_or(ExtractError::UnterminatedListing)?
        + start
        + LISTING_CLOSE.len();
    Ok(Some(&page[start..end]))
}

pub fn repair(fragment: &str) -> String {
    let mut text = fragment.to_string();
    for rule in RULES {
        if let Cow::Owned(fixed) = rule.apply(&text) {
            debug!(rule = rule.name(), before = text.len(), after = fixed.len(), "repair applied");
            text = fixed;
        }
    }
    text
}
