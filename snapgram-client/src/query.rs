use crate::{
    cache::{CachedValue, InfinitePages, QueryCache, QueryKey},
    error::Result,
};
use snapgram_common::model::{
    Id,
    post::{Post, PostMarker},
    user::User,
};
use snapgram_remote::client::{RemoteApi, Result as RemoteResult};
use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard};
use tracing::{debug, warn};

/// Entry point for views: cached queries and invalidating mutations over a
/// [`RemoteApi`].
///
/// Clones share the same cache.
pub struct QueryClient<R> {
    pub(crate) api: Arc<R>,
    pub(crate) cache: Arc<RwLock<QueryCache>>,
    pub(crate) mutating: Arc<AtomicUsize>,
    /// Held while the all-posts pages are being fetched.
    pages: Arc<Mutex<()>>,
}

impl<R> Clone for QueryClient<R> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
            mutating: Arc::clone(&self.mutating),
            pages: Arc::clone(&self.pages),
        }
    }
}

impl<R: RemoteApi> QueryClient<R> {
    #[must_use]
    pub fn new(api: R) -> Self {
        Self::with_cache(api, QueryCache::default())
    }

    #[must_use]
    pub fn with_stale_time(api: R, stale_time: Option<Duration>) -> Self {
        Self::with_cache(api, QueryCache::with_stale_time(stale_time))
    }

    #[must_use]
    pub fn with_cache(api: R, cache: QueryCache) -> Self {
        Self {
            api: Arc::new(api),
            cache: Arc::new(RwLock::new(cache)),
            mutating: Arc::new(AtomicUsize::new(0)),
            pages: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn api(&self) -> &R {
        &self.api
    }

    /// Read access to the cache.
    pub async fn cache(&self) -> RwLockReadGuard<'_, QueryCache> {
        self.cache.read().await
    }

    pub async fn is_fetching(&self, key: &QueryKey) -> bool {
        self.cache.read().await.is_fetching(key)
    }

    /// Number of mutations currently awaiting the service.
    #[must_use]
    pub fn is_mutating(&self) -> usize {
        self.mutating.load(Ordering::SeqCst)
    }

    /// Serves `key` from cache when fresh, otherwise runs `fetch` and stores the result.
    ///
    /// `fetch` is only polled on a miss. Failed fetches leave the cache as it was.
    async fn query<T, F>(&self, key: QueryKey, fetch: F) -> Result<T>
    where
        T: CachedValue,
        F: Future<Output = RemoteResult<T>>,
    {
        if let Some(value) = self.cache.read().await.fresh::<T>(&key) {
            debug!(?key, "Serving query from cache");
            return Ok(value);
        }

        self.cache.write().await.begin_fetch(&key);
        debug!(?key, "Fetching query");
        let result = fetch.await;

        let mut cache = self.cache.write().await;
        cache.end_fetch(&key);
        match result {
            Ok(value) => {
                cache.store(key, value.clone().into_data());
                Ok(value)
            }
            Err(err) => {
                warn!(?key, error = %err, "Query failed");
                Err(err.into())
            }
        }
    }

    pub async fn recent_posts(&self) -> Result<Vec<Post>> {
        self.query(QueryKey::RecentPosts, self.api.get_recent_posts())
            .await
    }

    /// Disabled (returns `None` without a request) for an empty id.
    pub async fn post_by_id(&self, post_id: &Id<PostMarker>) -> Result<Option<Post>> {
        if post_id.is_empty() {
            return Ok(None);
        }

        self.query(
            QueryKey::PostById(post_id.clone()),
            self.api.get_post_by_id(post_id),
        )
        .await
        .map(Some)
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        self.query(QueryKey::CurrentUser, self.api.get_current_user())
            .await
    }

    /// Disabled for a blank term: no request is made and no fetching state is
    /// entered.
    pub async fn search_posts(&self, term: &str) -> Result<Option<Vec<Post>>> {
        if term.trim().is_empty() {
            return Ok(None);
        }

        self.query(
            QueryKey::SearchPosts(term.to_owned()),
            self.api.search_posts(term),
        )
        .await
        .map(Some)
    }

    /// The all-posts pages, loading the first page if nothing is cached.
    ///
    /// A stale entry is refetched page by page, as many pages as it held.
    /// Waits for a page fetch in flight so the page it appends is kept.
    pub async fn infinite_posts(&self) -> Result<InfinitePages> {
        let _pages = self.pages.lock().await;
        self.load_pages().await
    }

    /// Requires the pages lock.
    async fn load_pages(&self) -> Result<InfinitePages> {
        let key = QueryKey::InfinitePosts;
        let page_count = {
            let cache = self.cache.read().await;
            if let Some(pages) = cache.fresh::<InfinitePages>(&key) {
                debug!(?key, "Serving query from cache");
                return Ok(pages);
            }
            cache
                .peek::<InfinitePages>(&key)
                .map_or(1, |pages| pages.pages().len().max(1))
        };

        self.cache.write().await.begin_fetch(&key);
        debug!(?key, page_count, "Fetching pages");
        let result = self.fetch_pages(page_count).await;

        let mut cache = self.cache.write().await;
        cache.end_fetch(&key);
        match result {
            Ok(pages) => {
                cache.store(key, pages.clone().into_data());
                Ok(pages)
            }
            Err(err) => {
                warn!(?key, error = %err, "Query failed");
                Err(err.into())
            }
        }
    }

    async fn fetch_pages(&self, page_count: usize) -> RemoteResult<InfinitePages> {
        let mut pages = InfinitePages::default();
        while pages.pages().len() < page_count && pages.has_next_page() {
            let page = self.api.get_infinite_posts(pages.next_cursor()).await?;
            pages.push(page);
        }
        Ok(pages)
    }

    /// Fetches the page after the last cached one and appends it.
    ///
    /// A stale entry is first refetched as [`infinite_posts`](Self::infinite_posts)
    /// would, so earlier pages never come back out of date. Does nothing when
    /// the last page was empty or the pages are already being fetched.
    pub async fn fetch_next_page(&self) -> Result<InfinitePages> {
        let key = QueryKey::InfinitePosts;
        let Ok(_pages) = self.pages.try_lock() else {
            debug!("Page fetch already in flight");
            return Ok(self
                .cache
                .read()
                .await
                .peek::<InfinitePages>(&key)
                .unwrap_or_default());
        };

        if self.cache.read().await.is_stale(&key) {
            self.load_pages().await?;
        }

        let cursor = {
            let mut cache = self.cache.write().await;
            let pages = cache.peek::<InfinitePages>(&key).unwrap_or_default();
            if !pages.has_next_page() {
                debug!("No further pages");
                return Ok(pages);
            }
            cache.begin_fetch(&key);
            pages.next_cursor().cloned()
        };

        debug!(cursor = ?cursor, "Fetching next page");
        let result = self.api.get_infinite_posts(cursor.as_ref()).await;

        let mut cache = self.cache.write().await;
        cache.end_fetch(&key);
        match result {
            Ok(page) => {
                if page.is_empty() {
                    debug!("Reached the last page");
                }
                Ok(cache.push_page(page))
            }
            Err(err) => {
                warn!(?key, error = %err, "Page fetch failed");
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        cache::{KeyFilter, QueryKey},
        error::ClientError,
        testing::{calls, client, seed, yielding_client},
    };
    use snapgram_common::model::Id;
    use snapgram_remote::{backend::BackendCall, client::RemoteError};
    use std::collections::HashSet;

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let client = client(9);
        seed(&client, &["one", "two"]).await;

        let first = client.recent_posts().await.unwrap();
        let second = client.recent_posts().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 1);
    }

    #[tokio::test]
    async fn blank_search_is_disabled() {
        let client = client(9);
        seed(&client, &["cat pictures"]).await;

        assert_eq!(client.search_posts("").await.unwrap(), None);
        assert_eq!(client.search_posts("   ").await.unwrap(), None);

        assert_eq!(calls(&client, BackendCall::ListPosts).await, 0);
        assert!(!client.is_fetching(&QueryKey::SearchPosts(String::new())).await);
        assert!(!client.cache().await.contains(&QueryKey::SearchPosts(String::new())));
    }

    #[tokio::test]
    async fn search_results_are_cached_per_term() {
        let client = client(9);
        seed(&client, &["cat pictures", "dog pictures"]).await;

        let cats = client.search_posts("cat").await.unwrap().unwrap();
        assert_eq!(cats.len(), 1);
        let pictures = client.search_posts("pictures").await.unwrap().unwrap();
        assert_eq!(pictures.len(), 2);
        client.search_posts("cat").await.unwrap();

        assert_eq!(calls(&client, BackendCall::ListPosts).await, 2);
        assert!(!client.is_fetching(&QueryKey::SearchPosts("cat".to_owned())).await);
    }

    #[tokio::test]
    async fn empty_post_id_is_disabled() {
        let client = client(9);

        assert_eq!(client.post_by_id(&Id::new("")).await.unwrap(), None);
        assert_eq!(calls(&client, BackendCall::GetPost).await, 0);
    }

    #[tokio::test]
    async fn missing_post_is_an_error() {
        let client = client(9);

        let result = client.post_by_id(&Id::new("missing")).await;

        assert!(matches!(
            result,
            Err(ClientError::Remote(RemoteError::NotFound { .. }))
        ));
        assert!(!client.cache().await.contains(&QueryKey::PostById(Id::new("missing"))));
    }

    #[tokio::test]
    async fn failed_queries_are_not_retried_or_cached() {
        let client = client(9);
        client.api().backend().fail_next(BackendCall::ListPosts).await;

        assert!(client.recent_posts().await.is_err());
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 1);
        assert!(!client.cache().await.contains(&QueryKey::RecentPosts));
        assert!(!client.is_fetching(&QueryKey::RecentPosts).await);

        assert!(client.recent_posts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn pages_follow_cursors_until_an_empty_page() {
        let client = client(2);
        let seeded = seed(&client, &["p1", "p2", "p3", "p4", "p5"]).await;

        let mut pages = client.infinite_posts().await.unwrap();
        while pages.has_next_page() {
            pages = client.fetch_next_page().await.unwrap();
        }

        let sizes = pages.pages().iter().map(Vec::len).collect::<Vec<_>>();
        assert_eq!(sizes, [2, 2, 1, 0]);

        let ids = pages.posts().map(|post| post.id.clone()).collect::<Vec<_>>();
        let unique = ids.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), ids.len());
        let newest_first = seeded.iter().rev().map(|post| post.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, newest_first);

        let requests = calls(&client, BackendCall::ListPosts).await;
        let after_end = client.fetch_next_page().await.unwrap();
        assert_eq!(after_end, pages);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, requests);
    }

    #[tokio::test]
    async fn fetched_pages_are_kept_in_order() {
        let client = client(2);
        seed(&client, &["p1", "p2", "p3"]).await;

        let first = client.fetch_next_page().await.unwrap();
        let second = client.fetch_next_page().await.unwrap();

        assert_eq!(second.pages()[0], first.pages()[0]);
        assert_eq!(second.pages().len(), 2);
        assert_eq!(client.infinite_posts().await.unwrap(), second);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 2);
    }

    #[tokio::test]
    async fn next_page_after_a_like_refreshes_earlier_pages() {
        let client = client(2);
        seed(&client, &["p1", "p2", "p3", "p4"]).await;
        let first = client.fetch_next_page().await.unwrap();
        let liked = first.pages()[0][0].clone();
        let liker = Id::new("liker");

        client
            .like_post(&liked.id, &liked.likes.toggled(&liker))
            .await
            .unwrap();
        let pages = client.fetch_next_page().await.unwrap();

        assert_eq!(pages.pages().len(), 2);
        assert_eq!(pages.pages()[0][0].id, liked.id);
        assert!(pages.pages()[0][0].likes.contains(&liker));
        assert!(!client.cache().await.is_stale(&QueryKey::InfinitePosts));
        assert_eq!(client.infinite_posts().await.unwrap(), pages);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 3);
    }

    #[tokio::test]
    async fn overlapping_next_page_calls_fetch_once() {
        let client = yielding_client(2, &["p1", "p2", "p3"]).await;

        let (first, second) = tokio::join!(client.fetch_next_page(), client.fetch_next_page());

        assert_eq!(first.unwrap().pages().len(), 1);
        assert!(second.unwrap().pages().is_empty());
        assert_eq!(client.api().backend().count_calls(BackendCall::ListPosts).await, 1);
        assert!(!client.is_fetching(&QueryKey::InfinitePosts).await);
    }

    #[tokio::test]
    async fn refetch_keeps_a_page_fetched_alongside_it() {
        let client = yielding_client(2, &["p1", "p2", "p3", "p4", "p5"]).await;
        client.infinite_posts().await.unwrap();
        client
            .cache
            .write()
            .await
            .invalidate(KeyFilter::Exact(QueryKey::InfinitePosts));

        let (next, refetched) = tokio::join!(client.fetch_next_page(), client.infinite_posts());

        let next = next.unwrap();
        assert_eq!(next.pages().len(), 2);
        assert_eq!(refetched.unwrap(), next);
        assert_eq!(client.infinite_posts().await.unwrap(), next);
        assert_eq!(client.api().backend().count_calls(BackendCall::ListPosts).await, 3);
        assert!(!client.is_fetching(&QueryKey::InfinitePosts).await);
    }
}
