//! Ways to filter posts based on their fields. Filter semantics work just like SQL:
//! If a field is unset, its filter won't be applied.
//! If set, filter out posts that don't match the filter.
use serde::Deserialize;
use uuid::Uuid;

/// Filters that can be applied to queries on the datastore.
#[derive(Default, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub struct PostFilters {
    /// Only posts filed under this group.
    pub group_id: Option<i32>,
    /// Only posts written by this user.
    pub author_id: Option<Uuid>,
    /// Only posts written by authors this user follows.
    pub followed_by: Option<Uuid>,
}

impl PostFilters {
    pub fn group(group_id: i32) -> Self {
        Self {
            group_id: Some(group_id),
            ..Default::default()
        }
    }

    pub fn author(author_id: Uuid) -> Self {
        Self {
            author_id: Some(author_id),
            ..Default::default()
        }
    }

    pub fn followed_by(user_id: Uuid) -> Self {
        Self {
            followed_by: Some(user_id),
            ..Default::default()
        }
    }
}
