use crate::datastore::postfilters::PostFilters;
use crate::datastore::tables::{comments, follows, groups, posts, users};
use chrono::{offset::Utc, DateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// How many characters of a post or comment are shown when it's displayed in a listing.
pub const NUM_SYMBOLS: usize = 15;

/// A user of the website. Accounts are owned by the identity provider; this row just lets
/// posts, comments and follows reference them.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

/// Parameters for the database statement which inserts new users.
#[derive(Insertable, Deserialize, Debug)]
#[table_name = "users"]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
}

/// A named category posts can be filed under.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Group {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Group {}>", self.title)
    }
}

#[derive(Insertable, Serialize, Deserialize, Clone, Debug)]
#[table_name = "groups"]
pub struct NewGroup {
    pub title: String,
    pub slug: String,
    pub description: String,
}

/// A post from a user
#[derive(
    Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, Associations,
)]
#[belongs_to(User, foreign_key = "author_id")]
#[belongs_to(Group)]
pub struct Post {
    pub id: i32,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub author_id: Uuid,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

impl Post {
    #[allow(dead_code)]
    /// Does this post match all specified filters?
    /// `followed_by` can't be checked from the post alone, so it's passed in as the set of
    /// authors that user follows.
    pub fn matches(&self, filters: &PostFilters, followed_authors: &[Uuid]) -> bool {
        if let Some(group_id) = filters.group_id {
            if self.group_id != Some(group_id) {
                return false;
            }
        }
        if let Some(author_id) = filters.author_id {
            if author_id != self.author_id {
                return false;
            }
        }
        if filters.followed_by.is_some() && !followed_authors.contains(&self.author_id) {
            return false;
        }
        true
    }
}

impl fmt::Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", truncated(&self.text))
    }
}

/// Parameters for the database statement which inserts new posts.
#[derive(Insertable, Clone, Debug)]
#[table_name = "posts"]
pub struct NewPost {
    pub text: String,
    pub author_id: Uuid,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// The fields of a post its author can edit. Unset optional fields are written as NULL.
#[derive(AsChangeset, Clone, Debug)]
#[table_name = "posts"]
#[changeset_options(treat_none_as_null = "true")]
pub struct PostChanges {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<String>,
}

/// A post along with the rows every page needs to display it.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PostCard {
    pub post: Post,
    pub author: User,
    pub group: Option<Group>,
}

#[derive(
    Queryable, Identifiable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, Associations,
)]
#[belongs_to(Post)]
pub struct Comment {
    pub id: i32,
    pub post_id: i32,
    pub author_id: Uuid,
    pub text: String,
    pub created: DateTime<Utc>,
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", truncated(&self.text))
    }
}

#[derive(Insertable, Clone, Debug)]
#[table_name = "comments"]
pub struct NewComment {
    pub post_id: i32,
    pub author_id: Uuid,
    pub text: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CommentCard {
    pub comment: Comment,
    pub author: User,
}

/// `user_id` follows `author_id`.
#[derive(Queryable, Identifiable, Serialize, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Follow {
    pub id: i32,
    pub user_id: Uuid,
    pub author_id: Uuid,
}

#[derive(Insertable, Clone, Copy, Debug)]
#[table_name = "follows"]
pub struct NewFollow {
    pub user_id: Uuid,
    pub author_id: Uuid,
}

fn truncated(text: &str) -> String {
    text.chars().take(NUM_SYMBOLS).collect()
}
