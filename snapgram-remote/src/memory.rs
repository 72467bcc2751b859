//! In-process [`Backend`] holding everything in memory.
//!
//! Stands in for the hosted service in tests and the terminal front end. It
//! keeps a log of the most recent primitives called and can be told to fail
//! the next call of a given kind.

use crate::{
    backend::{Backend, BackendCall, PostDocument, PostPatch, PostQuery, UserDocument},
    client::{RemoteError, Result},
    record::{AccountRecord, FileRecord, PostRecord, UserRecord},
};
use async_trait::async_trait;
use snapgram_common::{
    file::AcceptedFile,
    model::{
        FileMarker, Id,
        auth::{PasswordHash, Session},
        post::{Post, PostMarker, SavedPost, SavedPostMarker},
        user::{User, UserMarker},
    },
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::debug;

/// Calls kept in the log; older ones are dropped first.
pub const CALL_LOG_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Store {
    accounts: HashMap<String, AccountRecord>,
    users: HashMap<Id<UserMarker>, UserRecord>,
    posts: Vec<PostRecord>,
    saves: Vec<SavedPost>,
    files: BTreeMap<Id<FileMarker>, FileRecord>,
    session: Option<Session>,
    next_sequence: u64,
    calls: VecDeque<BackendCall>,
    failures: HashSet<BackendCall>,
}

impl Store {
    /// Logs `call` and consumes a pending injected failure for it.
    fn enter(&mut self, call: BackendCall) -> Result<()> {
        if self.calls.len() == CALL_LOG_CAPACITY {
            self.calls.pop_front();
        }
        self.calls.push_back(call);
        if self.failures.remove(&call) {
            debug!(?call, "Injected failure");
            return Err(RemoteError::Unavailable(format!("injected failure in {call:?}")));
        }
        Ok(())
    }

    fn post_mut(&mut self, id: &Id<PostMarker>) -> Result<&mut PostRecord> {
        self.posts
            .iter_mut()
            .find(|post| &post.id == id)
            .ok_or_else(|| RemoteError::post_not_found(id))
    }

    fn user(&self, id: &Id<UserMarker>) -> Result<Option<User>> {
        let Some(record) = self.users.get(id) else {
            return Ok(None);
        };
        let saved = self
            .saves
            .iter()
            .filter(|save| &save.user == id)
            .cloned()
            .collect();

        Ok(Some(record.clone().into_user(saved)?))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    store: Mutex<Store>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of kind `call` fail with [`RemoteError::Unavailable`].
    pub async fn fail_next(&self, call: BackendCall) {
        self.store.lock().await.failures.insert(call);
    }

    /// The last [`CALL_LOG_CAPACITY`] primitives called, oldest first.
    pub async fn calls(&self) -> Vec<BackendCall> {
        self.store.lock().await.calls.iter().copied().collect()
    }

    pub async fn count_calls(&self, call: BackendCall) -> usize {
        self.store
            .lock()
            .await
            .calls
            .iter()
            .filter(|logged| **logged == call)
            .count()
    }

    pub async fn clear_calls(&self) {
        self.store.lock().await.calls.clear();
    }

    /// Ids of all files currently in storage.
    pub async fn stored_files(&self) -> Vec<Id<FileMarker>> {
        self.store.lock().await.files.keys().cloned().collect()
    }

    pub async fn stored_file_name(&self, id: &Id<FileMarker>) -> Option<String> {
        let store = self.store.lock().await;
        store.files.get(id).map(|file| file.name.clone())
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn create_account(
        &self,
        id: &Id<UserMarker>,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<()> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::CreateAccount)?;

        if store.accounts.contains_key(email) {
            return Err(RemoteError::Conflict(format!("account {email} already exists")));
        }
        let password = PasswordHash::compute(password).map_err(|err| RemoteError::Invalid(err.into()))?;
        store.accounts.insert(
            email.to_owned(),
            AccountRecord {
                user_id: id.clone(),
                password,
            },
        );
        debug!(user = %id, %name, "Created account");

        Ok(())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::CreateSession)?;

        let account = store.accounts.get(email).ok_or(RemoteError::Unauthorized)?;
        let verified = account
            .password
            .verify(password)
            .map_err(|err| RemoteError::Invalid(err.into()))?;
        if !verified {
            return Err(RemoteError::Unauthorized);
        }

        let session = Session::generate_random(account.user_id.clone());
        store.session = Some(session.clone());

        Ok(session)
    }

    async fn delete_session(&self) -> Result<()> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::DeleteSession)?;

        store
            .session
            .take()
            .map(|_| ())
            .ok_or(RemoteError::Unauthorized)
    }

    async fn get_account(&self) -> Result<Option<Id<UserMarker>>> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::GetAccount)?;

        Ok(store.session.as_ref().map(|session| session.user_id.clone()))
    }

    async fn create_user(&self, user: UserDocument) -> Result<User> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::CreateUser)?;

        if store
            .users
            .values()
            .any(|existing| existing.username == user.username.get())
        {
            return Err(RemoteError::Conflict(format!(
                "username {} is taken",
                user.username.get()
            )));
        }

        let id = user.id.clone();
        store.users.insert(
            id.clone(),
            UserRecord {
                id: user.id,
                name: user.name,
                username: user.username.into_inner(),
                email: user.email,
                image_url: user.image_url,
            },
        );

        store.user(&id)?.ok_or(RemoteError::NotFound {
            kind: "User",
            id: id.to_string(),
        })
    }

    async fn get_user(&self, id: &Id<UserMarker>) -> Result<Option<User>> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::GetUser)?;

        store.user(id)
    }

    async fn create_post(&self, post: PostDocument) -> Result<Post> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::CreatePost)?;

        let sequence = store.next_sequence;
        store.next_sequence += 1;

        let (image_id, image_url) = post
            .image
            .map(|image| (Some(image.id), Some(image.url)))
            .unwrap_or_default();
        let record = PostRecord {
            sequence,
            id: post.id,
            creator: post.creator,
            caption: post.content.caption,
            tags: post.content.tags,
            location: post.content.location,
            image_id,
            image_url,
            likes: Vec::new(),
            created_at: OffsetDateTime::now_utc(),
        };
        let created = Post::from(&record);
        store.posts.push(record);

        Ok(created)
    }

    async fn get_post(&self, id: &Id<PostMarker>) -> Result<Option<Post>> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::GetPost)?;

        Ok(store
            .posts
            .iter()
            .find(|post| &post.id == id)
            .map(Post::from))
    }

    async fn update_post(&self, id: &Id<PostMarker>, patch: PostPatch) -> Result<Post> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::UpdatePost)?;

        let record = store.post_mut(id)?;
        if let Some(content) = patch.content {
            record.apply_content(content);
        }
        if let Some(image) = patch.image {
            record.apply_image(image);
        }
        if let Some(likes) = patch.likes {
            record.likes = likes.iter().cloned().collect();
        }

        Ok(Post::from(&*record))
    }

    async fn delete_post(&self, id: &Id<PostMarker>) -> Result<()> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::DeletePost)?;

        store.post_mut(id)?;
        store.posts.retain(|post| &post.id != id);
        store.saves.retain(|save| &save.post != id);

        Ok(())
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::ListPosts)?;

        let mut posts = store
            .posts
            .iter()
            .filter(|post| query.search.as_deref().is_none_or(|term| post.matches(term)))
            .collect::<Vec<_>>();
        posts.sort_by(|a, b| b.sequence.cmp(&a.sequence));

        let start = match &query.cursor_after {
            Some(cursor) => {
                posts
                    .iter()
                    .position(|post| &post.id == cursor)
                    .ok_or_else(|| RemoteError::post_not_found(cursor))?
                    + 1
            }
            None => 0,
        };

        Ok(posts
            .into_iter()
            .skip(start)
            .take(query.limit.unwrap_or(usize::MAX))
            .map(Post::from)
            .collect())
    }

    async fn create_save(&self, user: &Id<UserMarker>, post: &Id<PostMarker>) -> Result<SavedPost> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::CreateSave)?;

        store.post_mut(post)?;
        if store
            .saves
            .iter()
            .any(|save| &save.user == user && &save.post == post)
        {
            return Err(RemoteError::Conflict(format!("post {post} is already saved")));
        }

        let saved = SavedPost {
            id: Id::unique(),
            user: user.clone(),
            post: post.clone(),
        };
        store.saves.push(saved.clone());

        Ok(saved)
    }

    async fn delete_save(&self, id: &Id<SavedPostMarker>) -> Result<()> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::DeleteSave)?;

        let before = store.saves.len();
        store.saves.retain(|save| &save.id != id);
        if store.saves.len() == before {
            return Err(RemoteError::NotFound {
                kind: "Saved post",
                id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn upload_file(&self, file: &AcceptedFile) -> Result<Id<FileMarker>> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::UploadFile)?;

        let id = Id::unique();
        store.files.insert(
            id.clone(),
            FileRecord {
                name: file.file_name(),
            },
        );

        Ok(id)
    }

    async fn file_preview_url(&self, id: &Id<FileMarker>) -> Result<String> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::FilePreview)?;

        if !store.files.contains_key(id) {
            return Err(file_not_found(id));
        }

        Ok(format!("memory://storage/files/{id}/preview"))
    }

    async fn delete_file(&self, id: &Id<FileMarker>) -> Result<()> {
        let mut store = self.store.lock().await;
        store.enter(BackendCall::DeleteFile)?;

        store
            .files
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| file_not_found(id))
    }
}

fn file_not_found(id: &Id<FileMarker>) -> RemoteError {
    RemoteError::NotFound {
        kind: "File",
        id: id.to_string(),
    }
}
