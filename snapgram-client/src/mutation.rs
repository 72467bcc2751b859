//! Mutations and the cache entries each one invalidates.

use crate::{
    cache::{KeyFilter, QueryKey, QueryNamespace},
    error::Result,
    query::QueryClient,
};
use snapgram_common::{
    form::{NewPost, PostForm, PostUpdate, ValidPostForm, validate_sign_in, validate_sign_up},
    model::{
        FileMarker, Id,
        auth::{Credentials, NewUser, Session},
        post::{LikerSet, Post, PostMarker, SavedPost, SavedPostMarker},
        user::{User, UserMarker},
    },
};
use snapgram_remote::client::{RemoteApi, Result as RemoteResult};
use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
};
use tracing::{info, warn};

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Mutation {
    CreateAccount,
    SignIn,
    SignOut,
    CreatePost,
    UpdatePost { post_id: Id<PostMarker> },
    DeletePost,
    LikePost { post_id: Id<PostMarker> },
    SavePost,
    DeleteSavedPost,
}

impl Mutation {
    /// Cache entries to mark stale once this mutation has succeeded.
    ///
    /// Like and save mutations invalidate every post list and the current
    /// user. Post edits invalidate only the edited post, so list entries keep
    /// the old content until they are refetched for another reason.
    #[must_use]
    pub fn invalidations(&self) -> Vec<KeyFilter> {
        use KeyFilter::{Exact, Namespace};

        match self {
            Mutation::CreateAccount | Mutation::SignIn | Mutation::SignOut => Vec::new(),
            Mutation::CreatePost | Mutation::DeletePost => {
                vec![Namespace(QueryNamespace::RecentPosts)]
            }
            Mutation::UpdatePost { post_id } => vec![Exact(QueryKey::PostById(post_id.clone()))],
            Mutation::LikePost { post_id } => vec![
                Exact(QueryKey::PostById(post_id.clone())),
                Namespace(QueryNamespace::RecentPosts),
                Namespace(QueryNamespace::InfinitePosts),
                Namespace(QueryNamespace::CurrentUser),
            ],
            Mutation::SavePost | Mutation::DeleteSavedPost => vec![
                Namespace(QueryNamespace::PostById),
                Namespace(QueryNamespace::RecentPosts),
                Namespace(QueryNamespace::InfinitePosts),
                Namespace(QueryNamespace::CurrentUser),
            ],
        }
    }
}

struct MutatingGuard<'a>(&'a AtomicUsize);

impl Drop for MutatingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<R: RemoteApi> QueryClient<R> {
    /// Runs `call`, then applies the invalidations of the mutation `kind`
    /// derives from the result. Nothing is invalidated or retried on failure.
    async fn mutate<T, F>(&self, call: F, kind: impl FnOnce(&T) -> Mutation) -> Result<T>
    where
        F: Future<Output = RemoteResult<T>>,
    {
        self.mutating.fetch_add(1, Ordering::SeqCst);
        let guard = MutatingGuard(&self.mutating);
        let result = call.await;
        drop(guard);

        let value = result.inspect_err(|err| warn!(error = %err, "Mutation failed"))?;
        let mutation = kind(&value);

        let mut cache = self.cache.write().await;
        for filter in mutation.invalidations() {
            cache.invalidate(filter);
        }
        info!(?mutation, "Mutation succeeded");

        Ok(value)
    }

    pub async fn create_account(&self, user: &NewUser) -> Result<User> {
        validate_sign_up(user)?;
        self.mutate(self.api.create_account(user), |_| Mutation::CreateAccount)
            .await
    }

    pub async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        validate_sign_in(credentials)?;
        self.mutate(self.api.sign_in(credentials), |_| Mutation::SignIn)
            .await
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.mutate(self.api.sign_out(), |()| Mutation::SignOut)
            .await
    }

    pub async fn create_post(&self, post: &NewPost) -> Result<Post> {
        self.mutate(self.api.create_post(post), |_| Mutation::CreatePost)
            .await
    }

    pub async fn update_post(&self, update: &PostUpdate) -> Result<Post> {
        self.mutate(self.api.update_post(update), |post| Mutation::UpdatePost {
            post_id: post.id.clone(),
        })
        .await
    }

    /// Validates a submitted post form and creates or updates accordingly.
    pub async fn submit_post(&self, form: PostForm) -> Result<Post> {
        match form.validate()? {
            ValidPostForm::Create(post) => self.create_post(&post).await,
            ValidPostForm::Update(update) => self.update_post(&update).await,
        }
    }

    pub async fn delete_post(
        &self,
        post_id: &Id<PostMarker>,
        image_id: Option<&Id<FileMarker>>,
    ) -> Result<()> {
        self.mutate(self.api.delete_post(post_id, image_id), |()| {
            Mutation::DeletePost
        })
        .await
    }

    /// Sends the complete resulting liker set; see [`LikerSet::toggled`].
    pub async fn like_post(&self, post_id: &Id<PostMarker>, likes: &LikerSet) -> Result<Post> {
        self.mutate(self.api.like_post(post_id, likes), |_| Mutation::LikePost {
            post_id: post_id.clone(),
        })
        .await
    }

    pub async fn save_post(
        &self,
        post_id: &Id<PostMarker>,
        user_id: &Id<UserMarker>,
    ) -> Result<SavedPost> {
        self.mutate(self.api.save_post(post_id, user_id), |_| Mutation::SavePost)
            .await
    }

    pub async fn delete_saved_post(&self, record_id: &Id<SavedPostMarker>) -> Result<()> {
        self.mutate(self.api.delete_saved_post(record_id), |()| {
            Mutation::DeleteSavedPost
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        cache::{KeyFilter, QueryKey, QueryNamespace},
        error::ClientError,
        mutation::Mutation,
        testing::{author, calls, client, new_post, seed},
    };
    use snapgram_common::{
        file::accept_files,
        form::{Field, PostFieldsInput, PostForm, PostUpdate},
        model::{
            Id,
            auth::{Credentials, NewUser},
            post::{LikerSet, PostContent},
        },
    };
    use snapgram_remote::backend::BackendCall;

    #[test]
    fn like_invalidates_every_view_of_likes() {
        let post_id = Id::new("p");
        let filters = Mutation::LikePost {
            post_id: post_id.clone(),
        }
        .invalidations();

        assert!(filters.contains(&KeyFilter::Exact(QueryKey::PostById(post_id))));
        assert!(filters.contains(&KeyFilter::Namespace(QueryNamespace::RecentPosts)));
        assert!(filters.contains(&KeyFilter::Namespace(QueryNamespace::InfinitePosts)));
        assert!(filters.contains(&KeyFilter::Namespace(QueryNamespace::CurrentUser)));
        assert!(Mutation::SignOut.invalidations().is_empty());
    }

    #[tokio::test]
    async fn created_post_shows_up_in_recent_posts() {
        let client = client(9);
        assert!(client.recent_posts().await.unwrap().is_empty());

        let form = PostForm::Create {
            author: author(),
            fields: PostFieldsInput {
                caption: "Hello".to_owned(),
                tags: "a,b".to_owned(),
                location: String::new(),
            },
            image: None,
        };
        let post = client.submit_post(form).await.unwrap();
        assert_eq!(post.tags, ["a", "b"]);

        let recent_filter = KeyFilter::Namespace(QueryNamespace::RecentPosts);
        {
            let cache = client.cache().await;
            assert!(cache.is_stale(&QueryKey::RecentPosts));
            let recent_invalidations = cache
                .invalidation_history()
                .iter()
                .filter(|filter| **filter == recent_filter)
                .count();
            assert_eq!(recent_invalidations, 1);
        }

        let recent = client.recent_posts().await.unwrap();
        assert_eq!(recent, [post]);
        assert_eq!(calls(&client, BackendCall::ListPosts).await, 2);
    }

    #[tokio::test]
    async fn likes_are_refetched_everywhere() {
        let client = client(9);
        let post = seed(&client, &["liked post"]).await.remove(0);
        let liker = Id::new("liker");

        client.post_by_id(&post.id).await.unwrap();
        client.recent_posts().await.unwrap();
        client.infinite_posts().await.unwrap();
        client.current_user().await.unwrap();

        let likes = post.likes.toggled(&liker);
        client.like_post(&post.id, &likes).await.unwrap();

        {
            let cache = client.cache().await;
            for key in [
                QueryKey::PostById(post.id.clone()),
                QueryKey::RecentPosts,
                QueryKey::InfinitePosts,
                QueryKey::CurrentUser,
            ] {
                assert!(cache.is_stale(&key), "{key:?} should be stale");
            }
        }

        let reloaded = client.post_by_id(&post.id).await.unwrap().unwrap();
        assert!(reloaded.likes.contains(&liker));
        let recent = client.recent_posts().await.unwrap();
        assert!(recent[0].likes.contains(&liker));
        let pages = client.infinite_posts().await.unwrap();
        assert!(pages.posts().all(|post| post.likes.contains(&liker)));

        let unliked = reloaded.likes.toggled(&liker);
        client.like_post(&post.id, &unliked).await.unwrap();
        let reloaded = client.post_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(reloaded.likes, LikerSet::new());
        assert_eq!(calls(&client, BackendCall::UpdatePost).await, 2);
    }

    #[tokio::test]
    async fn editing_invalidates_only_the_edited_post() {
        let client = client(9);
        let posts = seed(&client, &["first post", "second post"]).await;
        for post in &posts {
            client.post_by_id(&post.id).await.unwrap();
        }
        client.recent_posts().await.unwrap();

        let updated = client
            .update_post(&PostUpdate {
                post_id: posts[0].id.clone(),
                content: PostContent {
                    caption: "first post, edited".to_owned(),
                    ..PostContent::default()
                },
                image: None,
            })
            .await
            .unwrap();
        assert_eq!(updated.image, posts[0].image);

        let cache = client.cache().await;
        assert!(cache.is_stale(&QueryKey::PostById(posts[0].id.clone())));
        assert!(!cache.is_stale(&QueryKey::PostById(posts[1].id.clone())));
        assert!(!cache.is_stale(&QueryKey::RecentPosts));
    }

    #[tokio::test]
    async fn edit_shows_up_when_the_old_image_lingers() {
        let client = client(9);
        let mut post = new_post("Hello", "");
        post.image = Some(accept_files(["cat.png"]).unwrap().remove(0));
        let post = client.create_post(&post).await.unwrap();
        assert_eq!(client.post_by_id(&post.id).await.unwrap().unwrap().caption, "Hello");
        client.api().backend().fail_next(BackendCall::DeleteFile).await;

        let updated = client
            .update_post(&PostUpdate {
                post_id: post.id.clone(),
                content: PostContent {
                    caption: "Edited caption".to_owned(),
                    ..PostContent::default()
                },
                image: Some(accept_files(["dog.jpg"]).unwrap().remove(0)),
            })
            .await
            .unwrap();

        assert_eq!(updated.caption, "Edited caption");
        let cached = client.post_by_id(&post.id).await.unwrap().unwrap();
        assert_eq!(cached.caption, "Edited caption");
        assert_eq!(cached.image, updated.image);
        assert_eq!(client.api().backend().stored_files().await.len(), 2);
    }

    #[tokio::test]
    async fn saving_invalidates_all_single_posts() {
        let client = client(9);
        let posts = seed(&client, &["first post", "second post"]).await;
        for post in &posts {
            client.post_by_id(&post.id).await.unwrap();
        }

        let saved = client.save_post(&posts[0].id, &author()).await.unwrap();
        {
            let cache = client.cache().await;
            assert!(cache.is_stale(&QueryKey::PostById(posts[0].id.clone())));
            assert!(cache.is_stale(&QueryKey::PostById(posts[1].id.clone())));
        }

        client.post_by_id(&posts[1].id).await.unwrap();
        client.delete_saved_post(&saved.id).await.unwrap();
        assert!(
            client
                .cache()
                .await
                .is_stale(&QueryKey::PostById(posts[1].id.clone()))
        );
    }

    #[tokio::test]
    async fn failed_mutation_invalidates_nothing() {
        let client = client(9);
        client.recent_posts().await.unwrap();
        client.api().backend().fail_next(BackendCall::CreatePost).await;

        let result = client.create_post(&new_post("Hello", "")).await;

        assert!(matches!(result, Err(ClientError::Remote(_))));
        let cache = client.cache().await;
        assert!(cache.invalidation_history().is_empty());
        assert!(!cache.is_stale(&QueryKey::RecentPosts));
        assert_eq!(client.is_mutating(), 0);
        assert_eq!(calls(&client, BackendCall::CreatePost).await, 1);
    }

    #[tokio::test]
    async fn invalid_forms_never_reach_the_service() {
        let client = client(9);

        let form = PostForm::Create {
            author: author(),
            fields: PostFieldsInput {
                caption: "Hey".to_owned(),
                ..PostFieldsInput::default()
            },
            image: None,
        };
        let Err(ClientError::Validation(errors)) = client.submit_post(form).await else {
            panic!("short caption should fail validation");
        };
        assert_eq!(errors.for_field(Field::Caption).len(), 1);

        let sign_up = client
            .create_account(&NewUser {
                name: "A".to_owned(),
                username: "ada".to_owned(),
                email: "ada@example.com".to_owned(),
                password: "hunter22".to_owned(),
            })
            .await;
        assert!(matches!(sign_up, Err(ClientError::Validation(_))));

        let sign_in = client
            .sign_in(&Credentials {
                email: "not-an-email".to_owned(),
                password: "short".to_owned(),
            })
            .await;
        let Err(ClientError::Validation(errors)) = sign_in else {
            panic!("bad credentials should fail validation");
        };
        assert_eq!(errors.0.len(), 2);

        assert!(client.api().backend().calls().await.is_empty());
    }

    #[tokio::test]
    async fn session_mutations_leave_the_cache_alone() {
        let client = client(9);
        let user = client
            .create_account(&NewUser {
                name: "Ada".to_owned(),
                username: "ada".to_owned(),
                email: "ada@example.com".to_owned(),
                password: "hunter22".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(client.current_user().await.unwrap(), None);

        let session = client
            .sign_in(&Credentials {
                email: "ada@example.com".to_owned(),
                password: "hunter22".to_owned(),
            })
            .await
            .unwrap();
        assert_eq!(session.user_id, user.id);
        client.sign_out().await.unwrap();

        let cache = client.cache().await;
        assert!(cache.invalidation_history().is_empty());
        assert!(!cache.is_stale(&QueryKey::CurrentUser));
    }
}
