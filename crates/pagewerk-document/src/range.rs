// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page-selection expressions: "all", "3", "1,3,5-7".

use std::collections::BTreeSet;

use pagewerk_core::error::{PagewerkError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ascending, deduplicated, non-empty list of 1-based page numbers, all
/// within `1..=total_pages` of the document it was built for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SerializedRange")]
pub struct PageRange {
    pages: Vec<u32>,
}

/// Wire shape of a [`PageRange`]; checked on the way in.
#[derive(Deserialize)]
struct SerializedRange {
    pages: Vec<u32>,
}

impl TryFrom<SerializedRange> for PageRange {
    type Error = String;

    fn try_from(raw: SerializedRange) -> std::result::Result<Self, Self::Error> {
        Self::from_pages(raw.pages)
            .ok_or_else(|| "page range needs at least one page and no page 0".to_owned())
    }
}

impl PageRange {
    /// Parse a page-selection expression against a document of
    /// `total_pages` pages.
    ///
    /// Tokens are comma separated; each is a page `p` or a span `a-b`.
    /// Spans are clipped to the document, tokens that don't parse and
    /// single pages outside the document are skipped. Fails only when
    /// nothing is left.
    pub fn parse(expression: &str, total_pages: u32) -> Result<Self> {
        let trimmed = expression.trim();
        let mut pages = BTreeSet::new();

        if trimmed.eq_ignore_ascii_case("all") {
            pages.extend(1..=total_pages);
        } else {
            for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
                match parse_token(token) {
                    Some(Token::Single(page)) => {
                        if page >= 1 && page <= total_pages as i64 {
                            pages.insert(page as u32);
                        }
                    }
                    Some(Token::Span(start, end)) => {
                        let lo = start.max(1);
                        let hi = end.min(total_pages as i64);
                        if lo <= hi {
                            pages.extend(lo as u32..=hi as u32);
                        }
                    }
                    None => warn!(token, "skipping malformed page token"),
                }
            }
        }

        Self::from_set(pages).ok_or_else(|| PagewerkError::Parse {
            expression: expression.to_owned(),
            reason: "empty selection".into(),
        })
    }

    /// Every page of a `total_pages` document.
    pub fn all(total_pages: u32) -> Result<Self> {
        Self::parse("all", total_pages)
    }

    /// The inclusive span `start..=end`, which must lie inside the document.
    pub fn span(start: u32, end: u32, total_pages: u32) -> Result<Self> {
        if start < 1 || start > end || end > total_pages {
            return Err(PagewerkError::Parse {
                expression: format!("{start}-{end}"),
                reason: format!("outside 1-{total_pages}"),
            });
        }
        Ok(Self {
            pages: (start..=end).collect(),
        })
    }

    /// Build from arbitrary page numbers; sorts and deduplicates. Returns
    /// `None` for an empty or zero-containing list.
    pub fn from_pages(pages: impl IntoIterator<Item = u32>) -> Option<Self> {
        let set: BTreeSet<u32> = pages.into_iter().collect();
        if set.contains(&0) {
            return None;
        }
        Self::from_set(set)
    }

    fn from_set(set: BTreeSet<u32>) -> Option<Self> {
        if set.is_empty() {
            None
        } else {
            Some(Self {
                pages: set.into_iter().collect(),
            })
        }
    }

    pub fn pages(&self) -> &[u32] {
        &self.pages
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Always false for a constructed range.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn first(&self) -> u32 {
        self.pages[0]
    }

    pub fn last(&self) -> u32 {
        self.pages[self.pages.len() - 1]
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.binary_search(&page).is_ok()
    }

    /// Highest page number, for checking against a document's page count.
    pub fn max_page(&self) -> u32 {
        self.last()
    }
}

impl IntoIterator for PageRange {
    type Item = u32;
    type IntoIter = std::vec::IntoIter<u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.into_iter()
    }
}

enum Token {
    Single(i64),
    Span(i64, i64),
}

fn parse_token(token: &str) -> Option<Token> {
    match token.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse::<i64>().ok()?;
            let end = end.trim().parse::<i64>().ok()?;
            Some(Token::Span(start, end))
        }
        None => token.parse::<i64>().ok().map(Token::Single),
    }
}
