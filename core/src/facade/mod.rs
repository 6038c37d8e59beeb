//! Observable list state for the UI layer.
//!
//! # Design
//! Each facade owns a `ListState`: the latest page of entities, a loading
//! flag and a pagination snapshot, each published through an `Observable`.
//! Only the facade mutates them.
//!
//! - Loading is derived from a count of tracked operations in flight, so
//!   overlapping operations keep it true until the last one settles. The
//!   count is held by a guard and released on drop, which covers errors and
//!   cancelled futures alike.
//! - Every load takes a generation number. A page is published only if no
//!   newer load has started since, so a slow stale response cannot overwrite
//!   newer state.
//! - Mutations reload with the last query that was issued.

mod pet;
mod tutor;

pub use pet::{PetEntry, PetFacade};
pub use tutor::TutorFacade;

use std::future::Future;
use std::sync::Mutex;

use tracing::{debug, error};

use crate::error::ApiError;
use crate::observable::{Observable, Subscription};
use crate::types::Page;

/// Pagination snapshot published alongside each page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub total_pages: u32,
    pub total: u64,
}

impl<T> From<&Page<T>> for Pagination {
    fn from(page: &Page<T>) -> Self {
        Self {
            page: page.page,
            total_pages: page.page_count,
            total: page.total,
        }
    }
}

struct LoadBook<Q> {
    generation: u64,
    last_query: Q,
}

/// State shared by the pet and tutor facades.
pub struct ListState<T, Q> {
    items: Observable<Vec<T>>,
    loading: Observable<bool>,
    pagination: Observable<Pagination>,
    in_flight: Mutex<usize>,
    book: Mutex<LoadBook<Q>>,
}

impl<T, Q> ListState<T, Q>
where
    T: Clone + Send + 'static,
    Q: Clone,
{
    pub fn new(initial_query: Q) -> Self {
        Self {
            items: Observable::new(Vec::new()),
            loading: Observable::new(false),
            pagination: Observable::new(Pagination::default()),
            in_flight: Mutex::new(0),
            book: Mutex::new(LoadBook {
                generation: 0,
                last_query: initial_query,
            }),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.items.get()
    }

    pub fn subscribe_items(&self) -> Subscription<Vec<T>> {
        self.items.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.get()
    }

    pub fn subscribe_loading(&self) -> Subscription<bool> {
        self.loading.subscribe()
    }

    pub fn pagination(&self) -> Pagination {
        self.pagination.get()
    }

    pub fn subscribe_pagination(&self) -> Subscription<Pagination> {
        self.pagination.subscribe()
    }

    pub fn last_query(&self) -> Q {
        self.book.lock().unwrap_or_else(|e| e.into_inner()).last_query.clone()
    }

    /// Mark an operation as in flight until the guard drops.
    fn track(&self) -> LoadingGuard<'_> {
        let mut count = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        if *count == 1 {
            self.loading.publish(true);
        }
        LoadingGuard {
            in_flight: &self.in_flight,
            loading: &self.loading,
        }
    }

    /// Run `op` as a tracked operation, logging its failure before returning it.
    async fn tracked<R>(
        &self,
        action: &'static str,
        op: impl Future<Output = Result<R, ApiError>>,
    ) -> Result<R, ApiError> {
        let _loading = self.track();
        op.await.inspect_err(|e| error!(action, error = %e, "registry operation failed"))
    }

    fn begin_load(&self, query: Q) -> u64 {
        let mut book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        book.generation += 1;
        book.last_query = query;
        book.generation
    }

    /// Publish a page unless a newer load has started. Returns whether it was
    /// published.
    fn publish_page(&self, generation: u64, items: Vec<T>, pagination: Pagination) -> bool {
        let book = self.book.lock().unwrap_or_else(|e| e.into_inner());
        if book.generation != generation {
            debug!(generation, latest = book.generation, "discarding stale page");
            return false;
        }
        self.items.publish(items);
        self.pagination.publish(pagination);
        true
    }
}

struct LoadingGuard<'a> {
    in_flight: &'a Mutex<usize>,
    loading: &'a Observable<bool>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut count = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        *count -= 1;
        if *count == 0 {
            self.loading.publish(false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ListState<u32, u32> {
        ListState::new(0)
    }

    #[test]
    fn nested_tracking_publishes_one_true_and_one_false() {
        let state = state();
        let mut loading = state.subscribe_loading();
        {
            let _outer = state.track();
            let _inner = state.track();
            assert!(state.is_loading());
        }
        assert!(!state.is_loading());
        assert_eq!(loading.drain(), vec![false, true, false]);
    }

    #[test]
    fn stale_generation_is_not_published() {
        let state = state();
        let first = state.begin_load(1);
        let second = state.begin_load(2);

        assert!(state.publish_page(second, vec![2], Pagination::default()));
        assert!(!state.publish_page(first, vec![1], Pagination::default()));
        assert_eq!(state.items(), vec![2]);
        assert_eq!(state.last_query(), 2);
    }

    #[tokio::test]
    async fn tracked_clears_loading_on_error() {
        let state = state();
        let result: Result<(), ApiError> = state
            .tracked("test", async { Err(ApiError::NotFound) })
            .await;
        assert_eq!(result, Err(ApiError::NotFound));
        assert!(!state.is_loading());
    }

    #[test]
    fn pagination_from_page() {
        let page = Page {
            page: 3,
            size: 10,
            total: 42,
            page_count: 5,
            content: vec![1u8],
        };
        assert_eq!(
            Pagination::from(&page),
            Pagination {
                page: 3,
                total_pages: 5,
                total: 42
            }
        );
    }
}
