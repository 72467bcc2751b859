use crate::query::QueryClient;
use async_trait::async_trait;
use snapgram_common::{
    form::{NewPost, PostUpdate},
    model::{
        FileMarker, Id,
        auth::{Credentials, NewUser, Session},
        post::{LikerSet, Post, PostContent, PostMarker, SavedPost, SavedPostMarker},
        user::{User, UserMarker},
    },
    util::parse_tags,
};
use snapgram_remote::{
    backend::BackendCall,
    client::{Api, PageLimits, RemoteApi, Result},
    memory::InMemoryBackend,
};
use tokio::task::yield_now;

pub type TestClient = QueryClient<Api<InMemoryBackend>>;

fn api(page_size: usize) -> Api<InMemoryBackend> {
    Api::new(
        InMemoryBackend::new(),
        PageLimits {
            page_size,
            recent_posts: 20,
        },
    )
}

pub fn client(page_size: usize) -> TestClient {
    QueryClient::new(api(page_size))
}

pub fn author() -> Id<UserMarker> {
    Id::new("author")
}

pub fn new_post(caption: &str, tags: &str) -> NewPost {
    NewPost {
        author: author(),
        content: PostContent {
            caption: caption.to_owned(),
            tags: parse_tags(tags),
            location: None,
        },
        image: None,
    }
}

async fn seed_api(api: &Api<InMemoryBackend>, captions: &[&str]) -> Vec<Post> {
    let mut posts = Vec::new();
    for caption in captions {
        posts.push(api.create_post(&new_post(caption, "")).await.unwrap());
    }
    api.backend().clear_calls().await;
    posts
}

/// Creates posts straight through the API, bypassing the cache.
pub async fn seed(client: &TestClient, captions: &[&str]) -> Vec<Post> {
    seed_api(client.api(), captions).await
}

pub async fn calls(client: &TestClient, call: BackendCall) -> usize {
    client.api().backend().count_calls(call).await
}

/// Yields to the scheduler before every call, so joined futures interleave.
pub struct YieldingApi(pub Api<InMemoryBackend>);

impl YieldingApi {
    pub fn backend(&self) -> &InMemoryBackend {
        self.0.backend()
    }
}

/// A client over [`YieldingApi`] holding posts with the given captions.
pub async fn yielding_client(page_size: usize, captions: &[&str]) -> QueryClient<YieldingApi> {
    let api = api(page_size);
    seed_api(&api, captions).await;
    QueryClient::new(YieldingApi(api))
}

#[async_trait]
impl RemoteApi for YieldingApi {
    async fn create_account(&self, user: &NewUser) -> Result<User> {
        yield_now().await;
        self.0.create_account(user).await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        yield_now().await;
        self.0.sign_in(credentials).await
    }

    async fn sign_out(&self) -> Result<()> {
        yield_now().await;
        self.0.sign_out().await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        yield_now().await;
        self.0.create_post(post).await
    }

    async fn update_post(&self, update: &PostUpdate) -> Result<Post> {
        yield_now().await;
        self.0.update_post(update).await
    }

    async fn delete_post(
        &self,
        post_id: &Id<PostMarker>,
        image_id: Option<&Id<FileMarker>>,
    ) -> Result<()> {
        yield_now().await;
        self.0.delete_post(post_id, image_id).await
    }

    async fn get_post_by_id(&self, post_id: &Id<PostMarker>) -> Result<Post> {
        yield_now().await;
        self.0.get_post_by_id(post_id).await
    }

    async fn get_recent_posts(&self) -> Result<Vec<Post>> {
        yield_now().await;
        self.0.get_recent_posts().await
    }

    async fn get_infinite_posts(&self, cursor: Option<&Id<PostMarker>>) -> Result<Vec<Post>> {
        yield_now().await;
        self.0.get_infinite_posts(cursor).await
    }

    async fn search_posts(&self, term: &str) -> Result<Vec<Post>> {
        yield_now().await;
        self.0.search_posts(term).await
    }

    async fn like_post(&self, post_id: &Id<PostMarker>, likes: &LikerSet) -> Result<Post> {
        yield_now().await;
        self.0.like_post(post_id, likes).await
    }

    async fn save_post(
        &self,
        post_id: &Id<PostMarker>,
        user_id: &Id<UserMarker>,
    ) -> Result<SavedPost> {
        yield_now().await;
        self.0.save_post(post_id, user_id).await
    }

    async fn delete_saved_post(&self, record_id: &Id<SavedPostMarker>) -> Result<()> {
        yield_now().await;
        self.0.delete_saved_post(record_id).await
    }

    async fn get_current_user(&self) -> Result<Option<User>> {
        yield_now().await;
        self.0.get_current_user().await
    }
}
