use snapgram_common::model::{
    FileMarker, Id, ImageRef, ModelValidationError,
    auth::PasswordHash,
    post::{LikerSet, Post, PostContent, PostMarker, SavedPost},
    user::{User, UserMarker, Username},
};
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct AccountRecord {
    pub user_id: Id<UserMarker>,
    pub password: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub(crate) struct UserRecord {
    pub id: Id<UserMarker>,
    pub name: String,
    pub username: String,
    pub email: String,
    pub image_url: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct PostRecord {
    /// Insertion order; listings sort on this, newest first.
    pub sequence: u64,
    pub id: Id<PostMarker>,
    pub creator: Id<UserMarker>,
    pub caption: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub image_id: Option<Id<FileMarker>>,
    pub image_url: Option<String>,
    pub likes: Vec<Id<UserMarker>>,
    pub created_at: OffsetDateTime,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub(crate) struct FileRecord {
    pub name: String,
}

impl UserRecord {
    pub fn into_user(self, saved: Vec<SavedPost>) -> Result<User, ModelValidationError> {
        Ok(User {
            id: self.id,
            name: self.name,
            username: Username::new(self.username)?,
            email: self.email,
            image_url: self.image_url,
            saved,
        })
    }
}

impl PostRecord {
    pub fn matches(&self, term: &str) -> bool {
        self.caption.to_lowercase().contains(&term.to_lowercase())
    }

    pub fn apply_content(&mut self, content: PostContent) {
        self.caption = content.caption;
        self.tags = content.tags;
        self.location = content.location;
    }

    pub fn apply_image(&mut self, image: ImageRef) {
        self.image_id = Some(image.id);
        self.image_url = Some(image.url);
    }
}

impl From<&PostRecord> for Post {
    fn from(value: &PostRecord) -> Self {
        let image = value
            .image_id
            .clone()
            .zip(value.image_url.clone())
            .map(|(id, url)| ImageRef { id, url });

        Self {
            id: value.id.clone(),
            creator: value.creator.clone(),
            caption: value.caption.clone(),
            tags: value.tags.clone(),
            location: value.location.clone(),
            image,
            likes: value.likes.iter().cloned().collect::<LikerSet>(),
            created_at: value.created_at,
        }
    }
}
