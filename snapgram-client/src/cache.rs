//! Client-side query cache.
//!
//! Entries are keyed by [`QueryKey`]. Only the query layer writes entries;
//! mutations mark them stale through [`KeyFilter`]s, and the next read of a
//! stale entry fetches it again.

use snapgram_common::model::{
    Id,
    post::{Post, PostMarker},
    user::User,
};
use std::{collections::HashMap, time::Duration};
use tokio::time::Instant;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum QueryNamespace {
    RecentPosts,
    InfinitePosts,
    PostById,
    CurrentUser,
    SearchPosts,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum QueryKey {
    RecentPosts,
    InfinitePosts,
    PostById(Id<PostMarker>),
    CurrentUser,
    SearchPosts(String),
}

impl QueryKey {
    #[must_use]
    pub fn namespace(&self) -> QueryNamespace {
        match self {
            QueryKey::RecentPosts => QueryNamespace::RecentPosts,
            QueryKey::InfinitePosts => QueryNamespace::InfinitePosts,
            QueryKey::PostById(_) => QueryNamespace::PostById,
            QueryKey::CurrentUser => QueryNamespace::CurrentUser,
            QueryKey::SearchPosts(_) => QueryNamespace::SearchPosts,
        }
    }
}

/// Selects the entries an invalidation applies to.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum KeyFilter {
    /// Every key in the namespace, whatever its parameters.
    Namespace(QueryNamespace),
    Exact(QueryKey),
}

impl KeyFilter {
    #[must_use]
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyFilter::Namespace(namespace) => key.namespace() == *namespace,
            KeyFilter::Exact(exact) => exact == key,
        }
    }
}

/// Pages of the all-posts query in the order they were fetched.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct InfinitePages {
    pages: Vec<Vec<Post>>,
}

impl InfinitePages {
    #[must_use]
    pub fn pages(&self) -> &[Vec<Post>] {
        &self.pages
    }

    pub fn posts(&self) -> impl Iterator<Item = &Post> {
        self.pages.iter().flatten()
    }

    /// False once a page came back empty.
    #[must_use]
    pub fn has_next_page(&self) -> bool {
        self.pages.last().is_none_or(|page| !page.is_empty())
    }

    /// Cursor for the next request: the id of the last post fetched so far.
    #[must_use]
    pub fn next_cursor(&self) -> Option<&Id<PostMarker>> {
        self.pages.last()?.last().map(|post| &post.id)
    }

    pub(crate) fn push(&mut self, page: Vec<Post>) {
        self.pages.push(page);
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum QueryData {
    Posts(Vec<Post>),
    Post(Post),
    User(Option<User>),
    Pages(InfinitePages),
}

/// Conversion between a query's result type and its cached form.
pub(crate) trait CachedValue: Clone + Sized {
    fn from_data(data: &QueryData) -> Option<Self>;

    fn into_data(self) -> QueryData;
}

impl CachedValue for Vec<Post> {
    fn from_data(data: &QueryData) -> Option<Self> {
        match data {
            QueryData::Posts(posts) => Some(posts.clone()),
            _ => None,
        }
    }

    fn into_data(self) -> QueryData {
        QueryData::Posts(self)
    }
}

impl CachedValue for Post {
    fn from_data(data: &QueryData) -> Option<Self> {
        match data {
            QueryData::Post(post) => Some(post.clone()),
            _ => None,
        }
    }

    fn into_data(self) -> QueryData {
        QueryData::Post(self)
    }
}

impl CachedValue for Option<User> {
    fn from_data(data: &QueryData) -> Option<Self> {
        match data {
            QueryData::User(user) => Some(user.clone()),
            _ => None,
        }
    }

    fn into_data(self) -> QueryData {
        QueryData::User(self)
    }
}

impl CachedValue for InfinitePages {
    fn from_data(data: &QueryData) -> Option<Self> {
        match data {
            QueryData::Pages(pages) => Some(pages.clone()),
            _ => None,
        }
    }

    fn into_data(self) -> QueryData {
        QueryData::Pages(self)
    }
}

#[derive(Clone, Debug)]
pub struct CacheEntry {
    pub data: QueryData,
    pub stale: bool,
    pub updated_at: Instant,
}

#[derive(Debug, Default)]
pub struct QueryCache {
    entries: HashMap<QueryKey, CacheEntry>,
    /// Requests in flight per key.
    fetching: HashMap<QueryKey, usize>,
    invalidations: Vec<KeyFilter>,
    stale_time: Option<Duration>,
}

impl QueryCache {
    /// A cache whose entries also go stale `stale_time` after they were stored.
    #[must_use]
    pub fn with_stale_time(stale_time: Option<Duration>) -> Self {
        Self {
            stale_time,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn get(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether a stored entry must be fetched again before it is served.
    #[must_use]
    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| self.entry_is_stale(entry))
    }

    #[must_use]
    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.fetching.contains_key(key)
    }

    /// Every invalidation applied so far, oldest first.
    #[must_use]
    pub fn invalidation_history(&self) -> &[KeyFilter] {
        &self.invalidations
    }

    fn entry_is_stale(&self, entry: &CacheEntry) -> bool {
        entry.stale
            || self
                .stale_time
                .is_some_and(|stale_time| entry.updated_at.elapsed() >= stale_time)
    }

    pub(crate) fn fresh<T: CachedValue>(&self, key: &QueryKey) -> Option<T> {
        self.entries
            .get(key)
            .filter(|entry| !self.entry_is_stale(entry))
            .and_then(|entry| T::from_data(&entry.data))
    }

    /// The stored value regardless of staleness.
    pub(crate) fn peek<T: CachedValue>(&self, key: &QueryKey) -> Option<T> {
        self.entries
            .get(key)
            .and_then(|entry| T::from_data(&entry.data))
    }

    pub(crate) fn store(&mut self, key: QueryKey, data: QueryData) {
        self.entries.insert(
            key,
            CacheEntry {
                data,
                stale: false,
                updated_at: Instant::now(),
            },
        );
    }

    /// Appends a page to the all-posts entry, keeping its staleness.
    pub(crate) fn push_page(&mut self, page: Vec<Post>) -> InfinitePages {
        let entry = self
            .entries
            .entry(QueryKey::InfinitePosts)
            .or_insert_with(|| CacheEntry {
                data: QueryData::Pages(InfinitePages::default()),
                stale: false,
                updated_at: Instant::now(),
            });

        if let QueryData::Pages(pages) = &mut entry.data {
            pages.push(page);
            pages.clone()
        } else {
            let mut pages = InfinitePages::default();
            pages.push(page);
            entry.data = QueryData::Pages(pages.clone());
            pages
        }
    }

    /// Marks all entries matching `filter` stale and returns how many matched.
    pub(crate) fn invalidate(&mut self, filter: KeyFilter) -> usize {
        let mut matched = 0;
        for (key, entry) in &mut self.entries {
            if filter.matches(key) {
                entry.stale = true;
                matched += 1;
            }
        }
        self.invalidations.push(filter);

        matched
    }

    /// Returns false if `key` was already being fetched. Every call must be
    /// paired with one [`end_fetch`](Self::end_fetch).
    pub(crate) fn begin_fetch(&mut self, key: &QueryKey) -> bool {
        let count = self.fetching.entry(key.clone()).or_default();
        *count += 1;
        *count == 1
    }

    pub(crate) fn end_fetch(&mut self, key: &QueryKey) {
        if let Some(count) = self.fetching.get_mut(key) {
            *count -= 1;
            if *count == 0 {
                self.fetching.remove(key);
            }
        }
    }
}
