//! Input forms for posts and comments. Nothing reaches the datastore until `clean` succeeds.
use crate::datastore::structs::{Group, PostCard};
use serde::{Deserialize, Serialize};

/// Every post must mention that it was checked.
pub const REQUIRED_POST_TOKEN: &str = "проверка";
pub const MISSING_TOKEN_MESSAGE: &str = "Вы обязательно должны проверить пост!";

/// Comments can't contain this word.
pub const BANNED_COMMENT_TOKEN: &str = "бяка";
pub const BANNED_TOKEN_MESSAGE: &str = "Комментарий не должен содержать нецензурных выражений!";

pub const REQUIRED_MESSAGE: &str = "This field is required.";
pub const INVALID_CHOICE_MESSAGE: &str =
    "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE_MESSAGE: &str = "Enter a valid image path.";

/// Validation errors, keyed by the form field they belong to.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(&'static str, &'static str)>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &'static str, message: &'static str) {
        self.errors.push((field, message));
    }

    pub fn for_field<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'static str> + 'a {
        self.errors
            .iter()
            .filter(move |(f, _)| *f == field)
            .map(|(_, message)| *message)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

/// The create/edit post form, exactly as the user submitted it.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct PostForm {
    #[serde(default)]
    pub text: String,
    /// Group id. Empty means no group.
    #[serde(default)]
    pub group: Option<String>,
    /// Media-relative image path. Empty means no image.
    #[serde(default)]
    pub image: Option<String>,
}

/// A post form that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl PostForm {
    /// Prefill the form with a post's current values, for editing.
    pub fn from_card(card: &PostCard) -> Self {
        Self {
            text: card.post.text.clone(),
            group: card.post.group_id.map(|id| id.to_string()),
            image: card.post.image.clone(),
        }
    }

    /// `groups` are the groups the user may choose from.
    pub fn clean(&self, groups: &[Group]) -> Result<CleanPost, FieldErrors> {
        let mut errors = FieldErrors::default();

        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED_MESSAGE);
        } else if !text.to_lowercase().contains(REQUIRED_POST_TOKEN) {
            errors.add("text", MISSING_TOKEN_MESSAGE);
        }

        let group_id = match non_blank(&self.group) {
            None => None,
            Some(raw) => {
                let chosen = raw
                    .parse::<i32>()
                    .ok()
                    .filter(|id| groups.iter().any(|g| g.id == *id));
                if chosen.is_none() {
                    errors.add("group", INVALID_CHOICE_MESSAGE);
                }
                chosen
            }
        };

        let image = non_blank(&self.image).map(str::to_owned);
        if let Some(path) = &image {
            if path.starts_with('/') || path.split('/').any(|part| part == "..") {
                errors.add("image", INVALID_IMAGE_MESSAGE);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(CleanPost {
            text: text.to_owned(),
            group_id,
            image,
        })
    }
}

/// The comment form under each post.
#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    /// Returns the comment text to save.
    pub fn clean(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::default();
        let text = self.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED_MESSAGE);
        } else if text.to_lowercase().contains(BANNED_COMMENT_TOKEN) {
            errors.add("text", BANNED_TOKEN_MESSAGE);
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(text.to_owned())
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
