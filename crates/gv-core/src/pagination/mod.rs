//! Paging bookkeeping: which row window to request next and when a file
//! has been read to the end.

use serde::{Deserialize, Serialize};

/// A row window to read: `[offset, offset + limit)`, or to the end of the
/// file when `limit` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: Option<usize>,
}

/// Rule deciding whether a page was the last one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionRule {
    /// Complete once loaded rows reach the file's row count. Falls back to
    /// short-page detection while the row count is unknown.
    #[default]
    RowCount,
    /// Complete when a page returns fewer rows than requested
    ShortPage,
}

/// Both completion signals for one page, before a rule picks one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    pub rows: usize,
    pub reached_total: Option<bool>,
    pub short_page: bool,
    pub empty: bool,
}

/// Offset, page size and completion state of the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    offset: usize,
    /// 0 means "everything remaining"
    page_size: usize,
    total_rows: Option<usize>,
    complete: bool,
    rule: CompletionRule,
}

impl Pagination {
    pub fn new(page_size: usize, rule: CompletionRule) -> Self {
        Self {
            offset: 0,
            page_size,
            total_rows: None,
            complete: false,
            rule,
        }
    }

    /// Back to the first row; keeps page size, rule and known total
    pub fn reset(&mut self) {
        self.offset = 0;
        self.complete = false;
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size;
    }

    pub fn total_rows(&self) -> Option<usize> {
        self.total_rows
    }

    pub fn set_total_rows(&mut self, total: Option<usize>) {
        self.total_rows = total;
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn rule(&self) -> CompletionRule {
        self.rule
    }

    /// The window to request next, or `None` once complete
    pub fn next_request(&self) -> Option<PageRequest> {
        if self.complete {
            return None;
        }
        let limit = match self.page_size {
            0 => None,
            size => Some(size),
        };
        Some(PageRequest {
            offset: self.offset,
            limit,
        })
    }

    /// Advance past a page that returned `rows` rows for `request`
    pub fn record_page(&mut self, request: PageRequest, rows: usize) -> PageOutcome {
        self.offset += rows;

        let short_page = match request.limit {
            Some(limit) => rows < limit,
            // An open-ended request always reads to the end
            None => true,
        };
        let reached_total = self.total_rows.map(|total| self.offset >= total);
        let outcome = PageOutcome {
            rows,
            reached_total,
            short_page,
            empty: rows == 0,
        };

        self.complete = outcome.empty
            || match self.rule {
                CompletionRule::RowCount => reached_total.unwrap_or(short_page),
                CompletionRule::ShortPage => short_page,
            };
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drive(pagination: &mut Pagination, total: usize) -> Vec<PageRequest> {
        let mut requests = Vec::new();
        while let Some(request) = pagination.next_request() {
            let available = total.saturating_sub(request.offset);
            let rows = request.limit.map_or(available, |l| l.min(available));
            pagination.record_page(request, rows);
            requests.push(request);
            assert!(requests.len() < 100, "paging did not terminate");
        }
        requests
    }

    #[test]
    fn two_hundred_fifty_rows_in_pages_of_one_hundred() {
        let mut pagination = Pagination::new(100, CompletionRule::RowCount);
        pagination.set_total_rows(Some(250));

        let offsets: Vec<usize> = drive(&mut pagination, 250).iter().map(|r| r.offset).collect();
        assert_eq!(offsets, vec![0, 100, 200]);
        assert!(pagination.is_complete());
        assert_eq!(pagination.offset(), 250);
    }

    #[test]
    fn both_signals_agree_on_last_page() {
        let mut pagination = Pagination::new(100, CompletionRule::RowCount);
        pagination.set_total_rows(Some(250));
        pagination.record_page(PageRequest { offset: 0, limit: Some(100) }, 100);
        pagination.record_page(PageRequest { offset: 100, limit: Some(100) }, 100);
        let last = pagination.record_page(PageRequest { offset: 200, limit: Some(100) }, 50);
        assert_eq!(last.reached_total, Some(true));
        assert!(last.short_page);
    }

    #[test]
    fn exact_multiple_completes_by_row_count() {
        let mut pagination = Pagination::new(100, CompletionRule::RowCount);
        pagination.set_total_rows(Some(200));
        let requests = drive(&mut pagination, 200);
        assert_eq!(requests.len(), 2);
    }

    #[test]
    fn short_page_rule_needs_an_extra_empty_page_on_exact_multiple() {
        let mut pagination = Pagination::new(100, CompletionRule::ShortPage);
        pagination.set_total_rows(Some(200));
        let requests = drive(&mut pagination, 200);
        assert_eq!(requests.len(), 3);
    }

    #[test]
    fn unknown_total_falls_back_to_short_page() {
        let mut pagination = Pagination::new(10, CompletionRule::RowCount);
        let outcome = pagination.record_page(PageRequest { offset: 0, limit: Some(10) }, 4);
        assert_eq!(outcome.reached_total, None);
        assert!(pagination.is_complete());
    }

    #[test]
    fn zero_page_size_requests_everything_remaining() {
        let mut pagination = Pagination::new(0, CompletionRule::RowCount);
        pagination.set_total_rows(Some(42));
        assert_eq!(
            pagination.next_request(),
            Some(PageRequest { offset: 0, limit: None })
        );
        pagination.record_page(PageRequest { offset: 0, limit: None }, 42);
        assert!(pagination.is_complete());
        assert_eq!(pagination.next_request(), None);
    }

    #[test]
    fn empty_page_is_terminal_even_with_stale_total() {
        let mut pagination = Pagination::new(10, CompletionRule::RowCount);
        pagination.set_total_rows(Some(1_000));
        pagination.record_page(PageRequest { offset: 0, limit: Some(10) }, 0);
        assert!(pagination.is_complete());
    }

    #[test]
    fn reset_keeps_page_size_and_total() {
        let mut pagination = Pagination::new(25, CompletionRule::RowCount);
        pagination.set_total_rows(Some(30));
        drive(&mut pagination, 30);
        pagination.reset();
        assert_eq!(pagination.offset(), 0);
        assert!(!pagination.is_complete());
        assert_eq!(pagination.page_size(), 25);
        assert_eq!(pagination.total_rows(), Some(30));
    }
}
