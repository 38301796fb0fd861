//! Paginator: drains a paginated source into one collection.
//!
//! Sources signal completion differently. Some report a total count, some
//! just return a short page. [`Paginator::drain`] honours both, stops on an
//! empty page, and can cap the number of rows it will accumulate.

use std::future::Future;
use tracing::{debug, warn};

use crate::error::{Error, PageToken, Result};

/// How page tokens advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStyle {
    /// `page=1, 2, 3...`
    PageNumber,
    /// `startRow=0, n, 2n...`
    RowOffset,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total item count reported by the source, if it reports one.
    pub total: Option<usize>,
}

impl<T> Page<T> {
    /// A page from a source that reports a total count.
    #[must_use]
    pub fn with_total(items: Vec<T>, total: usize) -> Self {
        Self {
            items,
            total: Some(total),
        }
    }

    /// A page from a source that only signals completion by a short page.
    #[must_use]
    pub fn items(items: Vec<T>) -> Self {
        Self { items, total: None }
    }
}

/// Drains pages until the source is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    style: PageStyle,
    page_size: Option<usize>,
    max_rows: Option<usize>,
}

impl Paginator {
    /// Page-number pagination; the server picks the page size.
    #[must_use]
    pub const fn page_numbers() -> Self {
        Self {
            style: PageStyle::PageNumber,
            page_size: None,
            max_rows: None,
        }
    }

    /// Row-offset pagination with a fixed page size.
    #[must_use]
    pub fn row_offsets(page_size: usize) -> Self {
        Self {
            style: PageStyle::RowOffset,
            page_size: Some(page_size.max(1)),
            max_rows: None,
        }
    }

    /// Expected page size; a page with fewer items ends the drain.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Stop after accumulating this many items.
    #[must_use]
    pub const fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    #[must_use]
    pub const fn first_token(&self) -> PageToken {
        match self.style {
            PageStyle::PageNumber => PageToken::PageNumber(1),
            PageStyle::RowOffset => PageToken::RowOffset(0),
        }
    }

    fn next_token(&self, token: PageToken) -> PageToken {
        match token {
            PageToken::PageNumber(n) => PageToken::PageNumber(n + 1),
            PageToken::RowOffset(n) => PageToken::RowOffset(n + self.page_size.unwrap_or(1)),
        }
    }

    /// Fetch pages until one of the termination signals fires:
    ///
    /// - the accumulated count reaches the source-reported total,
    /// - a page holds fewer items than the page size,
    /// - a page is empty,
    /// - the row cap is reached (the result is truncated to the cap).
    ///
    /// # Errors
    ///
    /// A failed page fetch fails the whole drain with `Error::Fetch`
    /// naming the page; items from earlier pages are discarded.
    pub async fn drain<T, F, Fut>(&self, mut fetch: F) -> Result<Vec<T>>
    where
        F: FnMut(PageToken) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut token = self.first_token();

        loop {
            let page = fetch(token).await.map_err(|cause| Error::Fetch {
                token,
                cause: Box::new(cause),
            })?;

            let fetched = page.items.len();
            items.extend(page.items);
            debug!(%token, fetched, accumulated = items.len(), total = ?page.total, "Fetched page");

            if let Some(max) = self.max_rows {
                if items.len() >= max {
                    if items.len() > max || page.total.is_some_and(|t| t > max) {
                        warn!(max_rows = max, "Row cap reached, stopping pagination");
                    }
                    items.truncate(max);
                    break;
                }
            }

            if fetched == 0 {
                break;
            }
            if page.total.is_some_and(|total| items.len() >= total) {
                break;
            }
            if self.page_size.is_some_and(|size| fetched < size) {
                break;
            }

            token = self.next_token(token);
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// A source of `n` numbered items served in pages of `size`.
    fn serve(n: usize, size: usize, token: PageToken, report_total: bool) -> Page<usize> {
        let offset = match token {
            PageToken::PageNumber(p) => (p as usize - 1) * size,
            PageToken::RowOffset(o) => o,
        };
        let items: Vec<usize> = (offset..n.min(offset + size)).collect();
        if report_total {
            Page::with_total(items, n)
        } else {
            Page::items(items)
        }
    }

    #[tokio::test]
    async fn test_total_count_completeness_for_any_page_size() {
        for size in [1, 3, 7, 10, 25, 100] {
            let got = Paginator::page_numbers()
                .drain(|t| async move { Ok(serve(25, size, t, true)) })
                .await
                .unwrap();
            assert_eq!(got, (0..25).collect::<Vec<_>>(), "page size {size}");
        }
    }

    #[tokio::test]
    async fn test_short_page_completeness_for_any_page_size() {
        for size in [1, 4, 5, 6, 20] {
            let got = Paginator::row_offsets(size)
                .drain(|t| async move { Ok(serve(20, size, t, false)) })
                .await
                .unwrap();
            assert_eq!(got.len(), 20, "page size {size}");
        }
    }

    #[tokio::test]
    async fn test_short_page_beats_inflated_total() {
        let calls = Mutex::new(Vec::new());
        let got = Paginator::page_numbers()
            .with_page_size(10)
            .drain(|t| {
                calls.lock().unwrap().push(t);
                async move {
                    // Claims 1000 rows but only ever has 15.
                    let mut page = serve(15, 10, t, true);
                    page.total = Some(1000);
                    Ok(page)
                }
            })
            .await
            .unwrap();

        assert_eq!(got.len(), 15);
        assert_eq!(
            *calls.lock().unwrap(),
            vec![PageToken::PageNumber(1), PageToken::PageNumber(2)]
        );
    }

    #[tokio::test]
    async fn test_empty_first_page() {
        let got: Vec<usize> = Paginator::page_numbers()
            .drain(|_| async { Ok(Page::with_total(Vec::new(), 0)) })
            .await
            .unwrap();
        assert!(got.is_empty());

        let got: Vec<usize> = Paginator::row_offsets(100)
            .drain(|_| async { Ok(Page::items(Vec::new())) })
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_stops_when_total_lies() {
        let got = Paginator::page_numbers()
            .drain(|t| async move {
                let mut page = serve(4, 2, t, true);
                page.total = Some(50);
                Ok(page)
            })
            .await
            .unwrap();
        assert_eq!(got.len(), 4);
    }

    #[tokio::test]
    async fn test_max_rows_cap_returns_partial_without_error() {
        let got = Paginator::row_offsets(10)
            .with_max_rows(25)
            .drain(|t| async move { Ok(serve(1_000, 10, t, false)) })
            .await
            .unwrap();
        assert_eq!(got, (0..25).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_row_offsets_advance_by_page_size() {
        let calls = Mutex::new(Vec::new());
        Paginator::row_offsets(5)
            .drain(|t| {
                calls.lock().unwrap().push(t);
                async move { Ok(serve(12, 5, t, false)) }
            })
            .await
            .unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                PageToken::RowOffset(0),
                PageToken::RowOffset(5),
                PageToken::RowOffset(10)
            ]
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_names_page_and_discards_partial() {
        let err = Paginator::page_numbers()
            .drain(|t| async move {
                match t {
                    PageToken::PageNumber(3) => {
                        Err(Error::source_unavailable("stackadapt", "HTTP 503"))
                    }
                    _ => Ok(serve(100, 10, t, true)),
                }
            })
            .await
            .unwrap_err();

        match err {
            Error::Fetch { token, cause } => {
                assert_eq!(token, PageToken::PageNumber(3));
                assert!(cause.to_string().contains("HTTP 503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
