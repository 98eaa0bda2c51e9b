//! Incrementally loaded list state for paged API collections
//!
//! Pages are requested one at a time. The first page replaces whatever was
//! shown, later pages append. Load-more triggers from scrolling are
//! coalesced by a trailing debounce, and the in-flight guard is released
//! when the fetch settles rather than after a fixed delay.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Items requested per page unless configured otherwise
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Quiet window used to coalesce load-more triggers
pub const DEFAULT_LOAD_MORE_DEBOUNCE: Duration = Duration::from_millis(300);

/// One page as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_next_page: bool,
}

/// A fetch the list wants performed; hand it back to [`PaginationState::settle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct PaginationState<T> {
    page: u32,
    per_page: u32,
    items: Vec<T>,
    has_next_page: bool,
    is_loading: bool,
    is_loading_more: bool,
    error: Option<String>,
    debounce: Duration,
    load_more_deadline: Option<Instant>,
    generation: u64,
}

impl<T> PaginationState<T> {
    pub fn new(per_page: u32, debounce: Duration) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
            items: Vec::new(),
            has_next_page: true,
            is_loading: false,
            is_loading_more: false,
            error: None,
            debounce,
            load_more_deadline: None,
            generation: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_loading_more(&self) -> bool {
        self.is_loading_more
    }

    /// Last fetch failure, as an opaque message
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Nothing to show and nothing on the way
    pub fn is_empty_state(&self) -> bool {
        self.items.is_empty() && !self.is_loading
    }

    /// Start over at page 1.
    ///
    /// Responses to requests issued before the refresh are ignored when they
    /// settle.
    pub fn refresh(&mut self) -> PageRequest {
        self.generation += 1;
        self.page = 1;
        self.is_loading = true;
        self.is_loading_more = false;
        self.load_more_deadline = None;
        self.error = None;
        tracing::debug!(generation = self.generation, "pagination refresh");
        self.request(1)
    }

    /// Merge a page of results.
    ///
    /// Page 1 replaces the list, any other page is appended in the order
    /// received. `has_next_page` always takes the response's value.
    pub fn on_page_response(
        &mut self,
        page: u32,
        per_page: u32,
        response_items: Vec<T>,
        response_has_next_page: bool,
    ) {
        if per_page != self.per_page {
            tracing::debug!(per_page, expected = self.per_page, "page size mismatch");
        }
        if page <= 1 {
            self.items = response_items;
        } else {
            self.items.extend(response_items);
        }
        self.has_next_page = response_has_next_page;
    }

    /// Apply the outcome of a fetch and release the matching loading flag.
    ///
    /// Returns `false` when the request predates the latest refresh and was
    /// dropped.
    pub fn settle(&mut self, request: PageRequest, result: Result<Page<T>, String>) -> bool {
        if request.generation != self.generation {
            tracing::debug!(
                page = request.page,
                generation = request.generation,
                current = self.generation,
                "dropping stale page response"
            );
            return false;
        }

        if request.page <= 1 {
            self.is_loading = false;
        } else {
            self.is_loading_more = false;
        }

        match result {
            Ok(page) => {
                self.error = None;
                self.on_page_response(request.page, request.per_page, page.data, page.has_next_page);
            }
            Err(message) => {
                tracing::warn!(page = request.page, error = %message, "page fetch failed");
                // Let the next trigger ask for the same page again.
                if request.page > 1 && self.page == request.page {
                    self.page -= 1;
                }
                self.error = Some(message);
            }
        }
        true
    }

    /// Note a load-more trigger; repeated triggers push the deadline out
    pub fn trigger_load_more(&mut self, now: Instant) {
        if !self.has_next_page {
            return;
        }
        self.load_more_deadline = Some(now + self.debounce);
    }

    /// Fire the coalesced trigger once its quiet window has passed.
    ///
    /// Returns the next page to fetch when the guard allows it.
    pub fn poll_load_more(&mut self, now: Instant) -> Option<PageRequest> {
        let deadline = self.load_more_deadline?;
        if now < deadline {
            return None;
        }
        self.load_more_deadline = None;

        if !self.has_next_page || self.is_loading_more || self.is_loading {
            return None;
        }

        self.is_loading_more = true;
        self.page += 1;
        tracing::debug!(page = self.page, "loading more");
        Some(self.request(self.page))
    }

    /// A trigger is waiting for its quiet window
    pub fn has_pending_trigger(&self) -> bool {
        self.load_more_deadline.is_some()
    }

    fn request(&self, page: u32) -> PageRequest {
        PageRequest {
            page,
            per_page: self.per_page,
            generation: self.generation,
        }
    }
}

impl<T> Default for PaginationState<T> {
    fn default() -> Self {
        Self::new(DEFAULT_PER_PAGE, DEFAULT_LOAD_MORE_DEBOUNCE)
    }
}
