//! Primitive operations of the backend-as-a-service SDK.
//!
//! These map one-to-one onto SDK calls (accounts, documents, storage). The
//! composed operations the application uses live in [`crate::client`].

use crate::client::Result;
use async_trait::async_trait;
use snapgram_common::{
    file::AcceptedFile,
    model::{
        FileMarker, Id, ImageRef,
        auth::Session,
        post::{LikerSet, Post, PostContent, PostMarker, SavedPost, SavedPostMarker},
        user::{User, UserMarker, Username},
    },
};

/// Identifies a backend primitive, for call logs and failure injection.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum BackendCall {
    CreateAccount,
    CreateSession,
    DeleteSession,
    GetAccount,
    CreateUser,
    GetUser,
    CreatePost,
    GetPost,
    UpdatePost,
    DeletePost,
    ListPosts,
    CreateSave,
    DeleteSave,
    UploadFile,
    FilePreview,
    DeleteFile,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserDocument {
    pub id: Id<UserMarker>,
    pub name: String,
    pub username: Username,
    pub email: String,
    pub image_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostDocument {
    pub id: Id<PostMarker>,
    pub creator: Id<UserMarker>,
    pub content: PostContent,
    pub image: Option<ImageRef>,
}

/// Fields to overwrite on a post document. `None` leaves a field untouched.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostPatch {
    pub content: Option<PostContent>,
    pub image: Option<ImageRef>,
    pub likes: Option<LikerSet>,
}

/// Listing of post documents, newest first.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostQuery {
    pub search: Option<String>,
    pub cursor_after: Option<Id<PostMarker>>,
    pub limit: Option<usize>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_account(
        &self,
        id: &Id<UserMarker>,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<()>;

    async fn create_session(&self, email: &str, password: &str) -> Result<Session>;

    async fn delete_session(&self) -> Result<()>;

    /// The account behind the active session, if any.
    async fn get_account(&self) -> Result<Option<Id<UserMarker>>>;

    async fn create_user(&self, user: UserDocument) -> Result<User>;

    async fn get_user(&self, id: &Id<UserMarker>) -> Result<Option<User>>;

    async fn create_post(&self, post: PostDocument) -> Result<Post>;

    async fn get_post(&self, id: &Id<PostMarker>) -> Result<Option<Post>>;

    async fn update_post(&self, id: &Id<PostMarker>, patch: PostPatch) -> Result<Post>;

    async fn delete_post(&self, id: &Id<PostMarker>) -> Result<()>;

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    async fn create_save(&self, user: &Id<UserMarker>, post: &Id<PostMarker>) -> Result<SavedPost>;

    async fn delete_save(&self, id: &Id<SavedPostMarker>) -> Result<()>;

    async fn upload_file(&self, file: &AcceptedFile) -> Result<Id<FileMarker>>;

    async fn file_preview_url(&self, id: &Id<FileMarker>) -> Result<String>;

    async fn delete_file(&self, id: &Id<FileMarker>) -> Result<()>;
}
