use crate::backend::{Backend, PostDocument, PostPatch, PostQuery, UserDocument};
use async_trait::async_trait;
use snapgram_common::{
    file::AcceptedFile,
    form::{NewPost, PostUpdate},
    model::{
        FileMarker, Id, ImageRef, ModelValidationError,
        auth::{Credentials, NewUser, Session},
        post::{LikerSet, Post, PostMarker, SavedPost, SavedPostMarker},
        user::{User, UserMarker, Username},
    },
};
use thiserror::Error;
use tracing::{debug, warn};

pub type Result<T, E = RemoteError> = std::result::Result<T, E>;

pub const DEFAULT_PAGE_SIZE: usize = 9;
pub const DEFAULT_RECENT_POSTS_LIMIT: usize = 20;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum RemoteError {
    #[error("{kind} with id {id} was not found.")]
    NotFound { kind: &'static str, id: String },
    #[error("No valid session for this request")]
    Unauthorized,
    #[error("Conflicting resource: {0}")]
    Conflict(String),
    #[error("The service rejected the input: {0}")]
    Invalid(#[from] ModelValidationError),
    #[error("The service is unavailable: {0}")]
    Unavailable(String),
}

impl RemoteError {
    pub(crate) fn post_not_found(id: &Id<PostMarker>) -> Self {
        RemoteError::NotFound {
            kind: "Post",
            id: id.to_string(),
        }
    }
}

/// The remote operations the application consumes.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_account(&self, user: &NewUser) -> Result<User>;

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session>;

    async fn sign_out(&self) -> Result<()>;

    async fn create_post(&self, post: &NewPost) -> Result<Post>;

    async fn update_post(&self, update: &PostUpdate) -> Result<Post>;

    async fn delete_post(
        &self,
        post_id: &Id<PostMarker>,
        image_id: Option<&Id<FileMarker>>,
    ) -> Result<()>;

    async fn get_post_by_id(&self, post_id: &Id<PostMarker>) -> Result<Post>;

    /// Newest posts first, at most one fixed-size batch.
    async fn get_recent_posts(&self) -> Result<Vec<Post>>;

    /// One page of posts after `cursor`, or the first page when there is none.
    async fn get_infinite_posts(&self, cursor: Option<&Id<PostMarker>>) -> Result<Vec<Post>>;

    async fn search_posts(&self, term: &str) -> Result<Vec<Post>>;

    /// Overwrites the post's liker set with `likes`.
    async fn like_post(&self, post_id: &Id<PostMarker>, likes: &LikerSet) -> Result<Post>;

    async fn save_post(&self, post_id: &Id<PostMarker>, user_id: &Id<UserMarker>)
    -> Result<SavedPost>;

    async fn delete_saved_post(&self, record_id: &Id<SavedPostMarker>) -> Result<()>;

    async fn get_current_user(&self) -> Result<Option<User>>;
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct PageLimits {
    pub page_size: usize,
    pub recent_posts: usize,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            recent_posts: DEFAULT_RECENT_POSTS_LIMIT,
        }
    }
}

/// [`RemoteApi`] built from backend primitives.
///
/// Multi-step operations run their steps strictly in order and stop at the
/// first failure. Nothing is rolled back: a post record that fails after its
/// image was uploaded leaves the file in storage.
pub struct Api<B> {
    backend: B,
    limits: PageLimits,
}

impl<B: Backend> Api<B> {
    #[must_use]
    pub fn new(backend: B, limits: PageLimits) -> Self {
        Self { backend, limits }
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    async fn upload_image(&self, file: &AcceptedFile) -> Result<ImageRef> {
        let id = self.backend.upload_file(file).await?;
        let url = self.backend.file_preview_url(&id).await?;
        debug!(file = %id, "Uploaded image");

        Ok(ImageRef { id, url })
    }
}

#[async_trait]
impl<B: Backend> RemoteApi for Api<B> {
    async fn create_account(&self, user: &NewUser) -> Result<User> {
        let username = Username::new(user.username.clone()).map_err(ModelValidationError::from)?;
        let id = Id::unique();

        self.backend
            .create_account(&id, &user.email, &user.password, &user.name)
            .await?;

        self.backend
            .create_user(UserDocument {
                id,
                name: user.name.clone(),
                username,
                email: user.email.clone(),
                image_url: None,
            })
            .await
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session> {
        self.backend
            .create_session(&credentials.email, &credentials.password)
            .await
    }

    async fn sign_out(&self) -> Result<()> {
        self.backend.delete_session().await
    }

    async fn create_post(&self, post: &NewPost) -> Result<Post> {
        let image = match &post.image {
            Some(file) => Some(self.upload_image(file).await?),
            None => None,
        };

        let result = self
            .backend
            .create_post(PostDocument {
                id: Id::unique(),
                creator: post.author.clone(),
                content: post.content.clone(),
                image: image.clone(),
            })
            .await;

        if let (Err(err), Some(image)) = (&result, &image) {
            warn!(file = %image.id, error = %err, "Post creation failed after upload; file is orphaned");
        }
        result
    }

    async fn update_post(&self, update: &PostUpdate) -> Result<Post> {
        let existing = self
            .backend
            .get_post(&update.post_id)
            .await?
            .ok_or_else(|| RemoteError::post_not_found(&update.post_id))?;

        let new_image = match &update.image {
            Some(file) => Some(self.upload_image(file).await?),
            None => None,
        };
        let replaces_image = new_image.is_some();

        let updated = self
            .backend
            .update_post(
                &update.post_id,
                PostPatch {
                    content: Some(update.content.clone()),
                    image: new_image,
                    likes: None,
                },
            )
            .await?;

        if replaces_image
            && let Some(old_image) = existing.image
            && let Err(err) = self.backend.delete_file(&old_image.id).await
        {
            warn!(file = %old_image.id, error = %err, "Old image could not be deleted; file is orphaned");
        }

        Ok(updated)
    }

    async fn delete_post(
        &self,
        post_id: &Id<PostMarker>,
        image_id: Option<&Id<FileMarker>>,
    ) -> Result<()> {
        if let Some(image_id) = image_id {
            self.backend.delete_file(image_id).await?;
        }
        self.backend.delete_post(post_id).await
    }

    async fn get_post_by_id(&self, post_id: &Id<PostMarker>) -> Result<Post> {
        self.backend
            .get_post(post_id)
            .await?
            .ok_or_else(|| RemoteError::post_not_found(post_id))
    }

    async fn get_recent_posts(&self) -> Result<Vec<Post>> {
        self.backend
            .list_posts(&PostQuery {
                limit: Some(self.limits.recent_posts),
                ..PostQuery::default()
            })
            .await
    }

    async fn get_infinite_posts(&self, cursor: Option<&Id<PostMarker>>) -> Result<Vec<Post>> {
        self.backend
            .list_posts(&PostQuery {
                cursor_after: cursor.cloned(),
                limit: Some(self.limits.page_size),
                ..PostQuery::default()
            })
            .await
    }

    async fn search_posts(&self, term: &str) -> Result<Vec<Post>> {
        self.backend
            .list_posts(&PostQuery {
                search: Some(term.to_owned()),
                ..PostQuery::default()
            })
            .await
    }

    async fn like_post(&self, post_id: &Id<PostMarker>, likes: &LikerSet) -> Result<Post> {
        self.backend
            .update_post(
                post_id,
                PostPatch {
                    likes: Some(likes.clone()),
                    ..PostPatch::default()
                },
            )
            .await
    }

    async fn save_post(
        &self,
        post_id: &Id<PostMarker>,
        user_id: &Id<UserMarker>,
    ) -> Result<SavedPost> {
        self.backend.create_save(user_id, post_id).await
    }

    async fn delete_saved_post(&self, record_id: &Id<SavedPostMarker>) -> Result<()> {
        self.backend.delete_save(record_id).await
    }

    async fn get_current_user(&self) -> Result<Option<User>> {
        let Some(account) = self.backend.get_account().await? else {
            return Ok(None);
        };
        self.backend.get_user(&account).await
    }
}
