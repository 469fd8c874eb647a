//! Result collection and sequencing.
//!
//! Pages complete in scheduler order. Two ways of restoring page order live
//! here:
//!
//! * [`collect_results`] + [`OrderedResults::sequence`] buffer the whole
//!   document, then sort once. Used by [`crate::convert::convert`].
//! * [`ReorderBuffer`] holds only the pages that arrived ahead of the next
//!   expected index in a min-heap and releases contiguous runs as soon as
//!   they are complete. Used by [`crate::stream`].

use crate::error::PageError;
use crate::output::{RenderResult, RenderedPage};
use futures::{Stream, StreamExt};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use tracing::warn;

/// Drain a result stream into memory. Failures are logged, never fatal.
pub async fn collect_results<S>(results: S) -> Vec<RenderResult>
where
    S: Stream<Item = RenderResult>,
{
    results
        .inspect(|r| {
            if let Err(ref e) = r.outcome {
                warn!("{}", e);
            }
        })
        .collect()
        .await
}

/// Every page of a document, sorted ascending by page index, unique, with
/// one entry per page. Only constructible through [`OrderedResults::sequence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedResults(Vec<RenderResult>);

impl OrderedResults {
    /// Order `results` for a document of `expected_pages` pages.
    ///
    /// Duplicate indices keep the first arrival, indices past the end are
    /// dropped, and any page without a result is recorded as
    /// [`PageError::Lost`], so the set always has exactly `expected_pages`
    /// entries.
    pub fn sequence(mut results: Vec<RenderResult>, expected_pages: usize) -> Self {
        // Stable sort keeps arrival order among duplicates.
        results.sort_by_key(|r| r.page_index);
        results.dedup_by_key(|r| r.page_index);
        results.retain(|r| r.page_index < expected_pages);

        if results.len() == expected_pages {
            return Self(results);
        }

        let mut filled = Vec::with_capacity(expected_pages);
        let mut present = results.into_iter().peekable();
        for page_index in 0..expected_pages {
            match present.next_if(|r| r.page_index == page_index) {
                Some(r) => filled.push(r),
                None => {
                    warn!("No result for page {}", page_index + 1);
                    filled.push(RenderResult {
                        page_index,
                        outcome: Err(PageError::Lost {
                            page: page_index + 1,
                        }),
                    });
                }
            }
        }
        Self(filled)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RenderResult> {
        self.0.iter()
    }

    /// Successful pages in ascending order.
    pub fn successes(&self) -> impl Iterator<Item = (usize, &RenderedPage)> {
        self.0
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok().map(|p| (r.page_index, p)))
    }

    /// Failed pages in ascending order.
    pub fn failures(&self) -> impl Iterator<Item = &PageError> {
        self.0.iter().filter_map(|r| r.outcome.as_ref().err())
    }

    pub fn into_inner(self) -> Vec<RenderResult> {
        self.0
    }
}

impl IntoIterator for OrderedResults {
    type Item = RenderResult;
    type IntoIter = std::vec::IntoIter<RenderResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Heap entry ordered by page index only.
#[derive(Debug)]
struct Pending(RenderResult);

impl PartialEq for Pending {
    fn eq(&self, other: &Self) -> bool {
        self.0.page_index == other.0.page_index
    }
}

impl Eq for Pending {}

impl PartialOrd for Pending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.page_index.cmp(&other.0.page_index)
    }
}

/// Streaming sequencer: accepts results in any order, releases them in
/// ascending page order as soon as the next expected page is available.
#[derive(Debug, Default)]
pub struct ReorderBuffer {
    next: usize,
    heap: BinaryHeap<Reverse<Pending>>,
}

impl ReorderBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one result and return every result that is now in order.
    ///
    /// Results for pages already released are dropped.
    pub fn push(&mut self, result: RenderResult) -> Vec<RenderResult> {
        if result.page_index < self.next {
            warn!("Duplicate result for page {}", result.page_num());
            return Vec::new();
        }
        self.heap.push(Reverse(Pending(result)));

        let mut ready = Vec::new();
        while let Some(Reverse(Pending(top))) = self.heap.peek() {
            if top.page_index > self.next {
                break;
            }
            if let Some(Reverse(Pending(r))) = self.heap.pop() {
                if r.page_index == self.next {
                    self.next += 1;
                    ready.push(r);
                }
            }
        }
        ready
    }

    /// Drain the buffer once no more results will arrive.
    ///
    /// Held results are released in order; every page below
    /// `expected_pages` that never arrived becomes [`PageError::Lost`].
    pub fn finish(&mut self, expected_pages: usize) -> Vec<RenderResult> {
        let mut ready = Vec::new();
        while self.next < expected_pages || !self.heap.is_empty() {
            let top_index = self.heap.peek().map(|Reverse(Pending(r))| r.page_index);
            match top_index {
                Some(i) if i <= self.next => {
                    if let Some(Reverse(Pending(r))) = self.heap.pop() {
                        if i == self.next {
                            self.next += 1;
                            ready.push(r);
                        }
                    }
                }
                _ if self.next < expected_pages => {
                    warn!("No result for page {}", self.next + 1);
                    ready.push(RenderResult {
                        page_index: self.next,
                        outcome: Err(PageError::Lost { page: self.next + 1 }),
                    });
                    self.next += 1;
                }
                _ => {
                    // Past the end of the document.
                    self.heap.pop();
                }
            }
        }
        ready
    }

    /// Results waiting for an earlier page.
    pub fn pending(&self) -> usize {
        self.heap.len()
    }

    /// Index of the next page to release.
    pub fn next_index(&self) -> usize {
        self.next
    }
}
