//! Validation of user-entered forms.
//!
//! Everything here runs before any remote call. Errors are collected per
//! field so each one can be shown next to the input it concerns.

use crate::{
    file::AcceptedFile,
    model::{
        Id,
        auth::{Credentials, NewUser},
        post::{Post, PostContent, PostMarker},
        user::{USERNAME_MAX_LEN, USERNAME_MIN_LEN, UserMarker},
    },
    util::{join_tags, looks_like_email, parse_tags},
};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub const CAPTION_MIN_LEN: usize = 5;
pub const CAPTION_MAX_LEN: usize = 2200;
pub const LOCATION_MAX_LEN: usize = 1000;
pub const NAME_MIN_LEN: usize = 2;
pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Field {
    Caption,
    Tags,
    Location,
    Image,
    Name,
    Username,
    Email,
    Password,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Field::Caption => "caption",
            Field::Tags => "tags",
            Field::Location => "location",
            Field::Image => "image",
            Field::Name => "name",
            Field::Username => "username",
            Field::Email => "email",
            Field::Password => "password",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct FieldError {
    pub field: Field,
    pub message: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Error)]
#[error("Form has {} invalid field(s)", .0.len())]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: Field, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    #[must_use]
    pub fn for_field(&self, field: Field) -> Vec<&str> {
        self.0
            .iter()
            .filter(|error| error.field == field)
            .map(|error| error.message.as_str())
            .collect()
    }

    fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.0.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Raw text of the fields shared by the create and update post forms.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct PostFieldsInput {
    pub caption: String,
    pub tags: String,
    pub location: String,
}

impl PostFieldsInput {
    /// Pre-fills the form from an existing post for editing.
    #[must_use]
    pub fn from_post(post: &Post) -> Self {
        Self {
            caption: post.caption.clone(),
            tags: join_tags(&post.tags),
            location: post.location.clone().unwrap_or_default(),
        }
    }

    fn validate(&self, errors: &mut ValidationErrors) -> PostContent {
        let caption_len = self.caption.chars().count();
        if caption_len < CAPTION_MIN_LEN {
            errors.push(
                Field::Caption,
                format!("Minimum {CAPTION_MIN_LEN} characters."),
            );
        } else if caption_len > CAPTION_MAX_LEN {
            errors.push(
                Field::Caption,
                format!("Maximum {CAPTION_MAX_LEN} characters."),
            );
        }

        let location = self.location.trim();
        if location.chars().count() > LOCATION_MAX_LEN {
            errors.push(
                Field::Location,
                format!("Maximum {LOCATION_MAX_LEN} characters."),
            );
        }

        PostContent {
            caption: self.caption.clone(),
            tags: parse_tags(&self.tags),
            location: (!location.is_empty()).then(|| location.to_owned()),
        }
    }
}

/// The post form as submitted, before validation.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum PostForm {
    Create {
        author: Id<UserMarker>,
        fields: PostFieldsInput,
        image: Option<AcceptedFile>,
    },
    Update {
        post_id: Id<PostMarker>,
        fields: PostFieldsInput,
        image: Option<AcceptedFile>,
    },
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct NewPost {
    pub author: Id<UserMarker>,
    pub content: PostContent,
    pub image: Option<AcceptedFile>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct PostUpdate {
    pub post_id: Id<PostMarker>,
    pub content: PostContent,
    /// Replacement image; `None` keeps the current one.
    pub image: Option<AcceptedFile>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum ValidPostForm {
    Create(NewPost),
    Update(PostUpdate),
}

impl PostForm {
    pub fn validate(self) -> Result<ValidPostForm, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let form = match self {
            PostForm::Create {
                author,
                fields,
                image,
            } => ValidPostForm::Create(NewPost {
                author,
                content: fields.validate(&mut errors),
                image,
            }),
            PostForm::Update {
                post_id,
                fields,
                image,
            } => ValidPostForm::Update(PostUpdate {
                post_id,
                content: fields.validate(&mut errors),
                image,
            }),
        };

        errors.into_result(form)
    }
}

pub fn validate_sign_up(user: &NewUser) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if user.name.trim().chars().count() < NAME_MIN_LEN {
        errors.push(Field::Name, "Too short");
    }
    let username_len = user.username.chars().count();
    if username_len < USERNAME_MIN_LEN {
        errors.push(Field::Username, "Too short");
    } else if username_len > USERNAME_MAX_LEN {
        errors.push(Field::Username, "Too long");
    }
    validate_credentials_into(&user.email, &user.password, &mut errors);

    errors.into_result(())
}

pub fn validate_sign_in(credentials: &Credentials) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    validate_credentials_into(&credentials.email, &credentials.password, &mut errors);
    errors.into_result(())
}

fn validate_credentials_into(email: &str, password: &str, errors: &mut ValidationErrors) {
    if !looks_like_email(email) {
        errors.push(Field::Email, "Invalid email");
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        errors.push(
            Field::Password,
            format!("Passwords must be at least {PASSWORD_MIN_LEN} characters."),
        );
    }
}
