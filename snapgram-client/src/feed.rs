//! Paging controller for the all-posts feed.
//!
//! The view reports when the end-of-list sentinel becomes visible and what is
//! typed into the search box; the controller decides whether another page
//! should be requested.

use crate::{cache::InfinitePages, error::Result, query::QueryClient};
use snapgram_remote::client::RemoteApi;
use tracing::debug;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct FeedState {
    pub has_next_page: bool,
    pub is_fetching_next: bool,
    /// Set while the search box holds any text; paging is suspended meanwhile.
    pub search_active: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            has_next_page: true,
            is_fetching_next: false,
            search_active: false,
        }
    }
}

/// Permission to fetch one page, handed back through [`FeedController::complete`].
#[derive(Eq, PartialEq, Debug, Hash)]
#[must_use]
pub struct FetchTicket(u64);

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct FeedController {
    state: FeedState,
    issued: u64,
}

impl FeedController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> FeedState {
        self.state
    }

    /// Takes the raw search box contents; whitespace counts as a search.
    pub fn set_search_term(&mut self, raw: &str) {
        self.state.search_active = !raw.is_empty();
    }

    /// Returns a ticket if a page fetch should start now.
    ///
    /// Nothing is issued while searching, after the last page, or while a
    /// previous ticket is outstanding.
    pub fn on_sentinel_visible(&mut self) -> Option<FetchTicket> {
        if self.state.search_active || !self.state.has_next_page || self.state.is_fetching_next {
            return None;
        }

        self.issued += 1;
        self.state.is_fetching_next = true;
        Some(FetchTicket(self.issued))
    }

    /// Records the end of the fetch for `ticket`; `pages` is `None` on failure.
    ///
    /// A failed fetch keeps `has_next_page`, so the next sentinel event retries.
    pub fn complete(&mut self, ticket: FetchTicket, pages: Option<&InfinitePages>) {
        if ticket.0 != self.issued {
            debug!(ticket = ticket.0, current = self.issued, "Ignoring outdated fetch ticket");
            return;
        }

        self.state.is_fetching_next = false;
        if let Some(pages) = pages {
            self.sync(pages);
        }
    }

    /// Takes `has_next_page` from pages loaded elsewhere.
    pub fn sync(&mut self, pages: &InfinitePages) {
        self.state.has_next_page = pages.has_next_page();
    }

    /// Handles one sentinel event against `client`.
    ///
    /// Returns `Ok(None)` when no fetch was due.
    pub async fn drive<R: RemoteApi>(
        &mut self,
        client: &QueryClient<R>,
    ) -> Result<Option<InfinitePages>> {
        let Some(ticket) = self.on_sentinel_visible() else {
            return Ok(None);
        };

        let result = client.fetch_next_page().await;
        self.complete(ticket, result.as_ref().ok());

        result.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        feed::FeedController,
        testing::{calls, client, seed},
    };
    use snapgram_remote::backend::BackendCall;

    #[test]
    fn sentinel_is_ignored_while_fetching() {
        let mut feed = FeedController::new();

        let ticket = feed.on_sentinel_visible().unwrap();
        assert!(feed.state().is_fetching_next);
        assert!(feed.on_sentinel_visible().is_none());
        assert!(feed.on_sentinel_visible().is_none());

        feed.complete(ticket, None);
        assert!(!feed.state().is_fetching_next);
        assert!(feed.state().has_next_page);
        assert!(feed.on_sentinel_visible().is_some());
    }

    #[test]
    fn any_search_text_suspends_paging() {
        let mut feed = FeedController::new();

        feed.set_search_term(" ");
        assert!(feed.state().search_active);
        assert!(feed.on_sentinel_visible().is_none());

        feed.set_search_term("");
        assert!(!feed.state().search_active);
        assert!(feed.on_sentinel_visible().is_some());
    }

    #[tokio::test]
    async fn searching_makes_no_page_requests() {
        let client = client(2);
        seed(&client, &["p1", "p2", "p3"]).await;
        let mut feed = FeedController::new();

        feed.set_search_term("cat");
        assert_eq!(feed.drive(&client).await.unwrap(), None);
        assert_eq!(feed.drive(&client).await.unwrap(), None);

        assert_eq!(calls(&client, BackendCall::ListPosts).await, 0);
    }

    #[tokio::test]
    async fn paging_stops_after_an_empty_page() {
        let client = client(2);
        seed(&client, &["p1", "p2", "p3"]).await;
        let mut feed = FeedController::new();

        let mut page_sizes = Vec::new();
        while let Some(pages) = feed.drive(&client).await.unwrap() {
            page_sizes.push(pages.pages().last().map_or(0, Vec::len));
        }

        assert_eq!(page_sizes, [2, 1, 0]);
        assert!(!feed.state().has_next_page);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 3);

        assert_eq!(feed.drive(&client).await.unwrap(), None);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 3);
    }

    #[tokio::test]
    async fn failed_page_can_be_retried() {
        let client = client(2);
        seed(&client, &["p1"]).await;
        client.api().backend().fail_next(BackendCall::ListPosts).await;
        let mut feed = FeedController::new();

        assert!(feed.drive(&client).await.is_err());
        assert!(!feed.state().is_fetching_next);
        assert!(feed.state().has_next_page);

        let pages = feed.drive(&client).await.unwrap().unwrap();
        assert_eq!(pages.posts().count(), 1);
    }
}
