use crate::model::{Id, ImageRef, user::UserMarker};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct SavedPostMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub creator: Id<UserMarker>,
    pub caption: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
    pub image: Option<ImageRef>,
    pub likes: LikerSet,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Join record between a user and a post they saved.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct SavedPost {
    pub id: Id<SavedPostMarker>,
    pub user: Id<UserMarker>,
    pub post: Id<PostMarker>,
}

/// The user-editable part of a post.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct PostContent {
    pub caption: String,
    pub tags: Vec<String>,
    pub location: Option<String>,
}

/// Ordered set of the users who liked a post.
///
/// Likes are always written as a whole set, so callers compute the resulting
/// set with [`LikerSet::toggled`] before sending it.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct LikerSet(Vec<Id<UserMarker>>);

impl LikerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, user: &Id<UserMarker>) -> bool {
        self.0.contains(user)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Id<UserMarker>> {
        self.0.iter()
    }

    /// The set after `user` flips their like: removed if present, appended otherwise.
    #[must_use]
    pub fn toggled(&self, user: &Id<UserMarker>) -> Self {
        if self.contains(user) {
            Self(self.0.iter().filter(|id| *id != user).cloned().collect())
        } else {
            let mut likes = self.0.clone();
            likes.push(user.clone());
            Self(likes)
        }
    }
}

impl FromIterator<Id<UserMarker>> for LikerSet {
    fn from_iter<T: IntoIterator<Item = Id<UserMarker>>>(iter: T) -> Self {
        let mut likes = Vec::new();
        for id in iter {
            if !likes.contains(&id) {
                likes.push(id);
            }
        }
        Self(likes)
    }
}

impl<'de> Deserialize<'de> for LikerSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ids = Vec::<Id<UserMarker>>::deserialize(deserializer)?;
        Ok(ids.into_iter().collect())
    }
}
