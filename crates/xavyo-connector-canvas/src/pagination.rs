//! Link-header pagination
//!
//! Canvas pages collections with `page`/`per_page` parameters and announces
//! the following page in the `Link` header. Callers address results with a
//! 1-based offset and a page size, which rarely lines up with Canvas page
//! boundaries, so the first page fetched may need a few leading items
//! skipped.

use xavyo_connector::error::{ConnectorError, ConnectorResult};
use xavyo_connector::operation::PageRequest;

use crate::client::{CanvasClient, CanvasResponse, NextPage};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Position within a paged collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// `page` parameter value.
    pub page: String,
    /// `per_page` parameter value.
    pub per_page: u32,
}

impl PageCursor {
    /// The first page of `per_page` items.
    pub fn first(per_page: u32) -> Self {
        Self::numbered(1, per_page)
    }

    /// A numbered page.
    pub fn numbered(page: u32, per_page: u32) -> Self {
        Self {
            page: page.to_string(),
            per_page,
        }
    }

    /// Cursor for the page announced by `next`, keeping the current size
    /// unless the link states one.
    pub fn follow(&self, next: &NextPage) -> Self {
        Self {
            page: next.page.clone(),
            per_page: next.per_page.unwrap_or(self.per_page),
        }
    }

    fn query(&self) -> [(&'static str, String); 2] {
        [
            ("page", self.page.clone()),
            ("per_page", self.per_page.to_string()),
        ]
    }
}

/// The slice of a collection a caller asked for, expressed in Canvas pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based offset of the first requested item.
    pub offset: u32,
    /// First Canvas page to read.
    pub start: PageCursor,
    /// Items to drop from the start of the first page.
    pub skip: usize,
    /// Maximum number of items to return; `None` reads to the end.
    pub limit: Option<usize>,
}

impl PageWindow {
    /// Translate an optional page request.
    ///
    /// Without a request, or with a zero page size, the whole collection is
    /// read in pages of [`DEFAULT_PAGE_SIZE`].
    pub fn from_request(request: Option<&PageRequest>) -> Self {
        match request {
            Some(req) if req.page_size > 0 => {
                // Canvas caps per_page, so larger requests span several pages.
                let per_page = req.page_size.min(DEFAULT_PAGE_SIZE);
                let fixed_offset = req.offset.max(1) - 1;
                Self {
                    offset: fixed_offset + 1,
                    start: PageCursor::numbered(fixed_offset / per_page + 1, per_page),
                    skip: (fixed_offset % per_page) as usize,
                    limit: Some(req.page_size as usize),
                }
            }
            _ => Self {
                offset: 1,
                start: PageCursor::first(DEFAULT_PAGE_SIZE),
                skip: 0,
                limit: None,
            },
        }
    }
}

/// Walks the pages of one collection, refusing to read more than
/// `max_pages`.
#[derive(Debug)]
pub struct Pager<'a> {
    client: &'a CanvasClient,
    path: String,
    query: Vec<(&'static str, String)>,
    next: Option<PageCursor>,
    pages_read: u32,
    max_pages: u32,
    resource: &'static str,
}

impl<'a> Pager<'a> {
    /// Start at `start`. `query` holds the fixed, non-paging parameters.
    pub fn new(
        client: &'a CanvasClient,
        path: impl Into<String>,
        query: Vec<(&'static str, String)>,
        start: PageCursor,
        max_pages: u32,
        resource: &'static str,
    ) -> Self {
        Self {
            client,
            path: path.into(),
            query,
            next: Some(start),
            pages_read: 0,
            max_pages,
            resource,
        }
    }

    /// Fetch the next page, or `None` once the collection is exhausted.
    ///
    /// The response status is not checked. Hitting the page ceiling while
    /// Canvas still announces more pages is an error, never a silent stop.
    pub async fn next_page(&mut self) -> ConnectorResult<Option<CanvasResponse>> {
        let Some(cursor) = self.next.take() else {
            return Ok(None);
        };

        if self.pages_read >= self.max_pages {
            return Err(ConnectorError::PageLimitExceeded {
                resource: self.resource.to_string(),
                max_pages: self.max_pages,
            });
        }

        let mut query = self.query.clone();
        query.extend(cursor.query());

        let response = self.client.get(&self.path, &query).await?;
        self.pages_read += 1;
        self.next = response
            .next_page
            .as_ref()
            .filter(|_| response.is_success())
            .map(|next| cursor.follow(next));

        Ok(Some(response))
    }

    /// Whether Canvas announced another page after the last one read.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpaged_window_reads_everything() {
        let window = PageWindow::from_request(None);
        assert_eq!(window.start, PageCursor::first(DEFAULT_PAGE_SIZE));
        assert_eq!(window.skip, 0);
        assert_eq!(window.limit, None);

        let zero = PageRequest::new(0).with_offset(5);
        assert_eq!(PageWindow::from_request(Some(&zero)).limit, None);
    }

    #[test]
    fn test_aligned_window() {
        let window = PageWindow::from_request(Some(&PageRequest::new(10).with_offset(21)));
        assert_eq!(window.start, PageCursor::numbered(3, 10));
        assert_eq!(window.skip, 0);
        assert_eq!(window.limit, Some(10));
    }

    #[test]
    fn test_unaligned_window_skips_into_page() {
        // Items 4..=5 of a collection paged by 2 start halfway through page 2.
        let window = PageWindow::from_request(Some(&PageRequest::new(2).with_offset(4)));
        assert_eq!(window.start, PageCursor::numbered(2, 2));
        assert_eq!(window.skip, 1);
        assert_eq!(window.limit, Some(2));
        assert_eq!(window.offset, 4);
    }

    #[test]
    fn test_oversized_window_uses_capped_pages() {
        let window = PageWindow::from_request(Some(&PageRequest::new(150).with_offset(151)));
        assert_eq!(window.start, PageCursor::numbered(2, DEFAULT_PAGE_SIZE));
        assert_eq!(window.skip, 50);
        assert_eq!(window.limit, Some(150));
    }

    #[test]
    fn test_zero_offset_treated_as_first() {
        let window = PageWindow::from_request(Some(&PageRequest::new(5).with_offset(0)));
        assert_eq!(window.start, PageCursor::numbered(1, 5));
        assert_eq!(window.skip, 0);
        assert_eq!(window.offset, 1);
    }

    #[test]
    fn test_follow_keeps_size_unless_link_overrides() {
        let cursor = PageCursor::first(50);
        let next = NextPage {
            page: "bookmark:abc".to_string(),
            per_page: None,
        };
        assert_eq!(
            cursor.follow(&next),
            PageCursor {
                page: "bookmark:abc".to_string(),
                per_page: 50
            }
        );

        let next = NextPage {
            page: "2".to_string(),
            per_page: Some(20),
        };
        assert_eq!(cursor.follow(&next).per_page, 20);
    }
}
