//! Multi-page collection for cursor and page-number pagination.

use std::future::Future;

use crate::error::Result;

/// How far to follow continuation cursors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagePolicy {
    SinglePage,
    DrainAll,
}

impl PagePolicy {
    pub fn from_all_flag(all: bool) -> Self {
        if all {
            Self::DrainAll
        } else {
            Self::SinglePage
        }
    }
}

/// One page as returned by a fetcher
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

/// Result of a walk. `next_cursor` is only set when a single-page walk stopped early.
#[derive(Debug, Clone)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

impl<T> Collected<T> {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Fetch one page or all pages, starting from `start`.
///
/// Pages are concatenated in fetch order. Any failing page aborts the walk
/// and nothing fetched so far is returned.
pub async fn walk<T, F, Fut>(policy: PagePolicy, start: Option<String>, mut fetch: F) -> Result<Collected<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut cursor = start;
    let mut pages = 0usize;

    loop {
        let page = fetch(cursor.take()).await?;
        pages += 1;
        items.extend(page.items);

        match (policy, page.next_cursor) {
            (_, None) => {
                tracing::debug!(pages, items = items.len(), "pagination finished");
                return Ok(Collected {
                    items,
                    next_cursor: None,
                });
            }
            (PagePolicy::SinglePage, Some(next)) => {
                return Ok(Collected {
                    items,
                    next_cursor: Some(next),
                });
            }
            (PagePolicy::DrainAll, Some(next)) => cursor = Some(next),
        }
    }
}

/// Cursor for page-number pagination: the next page while pages remain
pub fn next_page_cursor(page: u32, pages: u32) -> Option<String> {
    (page < pages).then(|| (page + 1).to_string())
}

/// Page number encoded in a cursor, defaulting to the first page
pub fn page_from_cursor(cursor: Option<&str>) -> u32 {
    cursor.and_then(|c| c.parse().ok()).unwrap_or(1)
}
