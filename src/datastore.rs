#[cfg(test)]
pub mod mock;
pub mod postfilters;
pub mod postgres;
pub mod structs;
pub mod tables;

use crate::datastore::structs::{
    Comment, CommentCard, Follow, Group, NewComment, NewFollow, NewGroup, NewPost, NewUser, Post,
    PostCard, PostChanges, User,
};
use crate::twoface::Fallible;
use async_trait::async_trait;
use postfilters::PostFilters;
use uuid::Uuid;

#[async_trait]
/// The interface for storing blog data.
pub trait Client: Clone {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User>;
    async fn find_user(&self, username: &str) -> Fallible<Option<User>>;

    async fn new_group(&self, new_group: NewGroup) -> Fallible<Group>;
    async fn list_groups(&self) -> Fallible<Vec<Group>>;
    async fn find_group(&self, slug: &str) -> Fallible<Option<Group>>;
    /// Posts in the deleted group are kept, with their group cleared.
    async fn delete_group(&self, slug: &str) -> Fallible<Option<Group>>;

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post>;
    async fn count_posts(&self, filters: PostFilters) -> Fallible<i64>;
    /// Newest first, skipping `offset` posts and returning at most `limit`.
    async fn list_posts(
        &self,
        filters: PostFilters,
        offset: i64,
        limit: i64,
    ) -> Fallible<Vec<PostCard>>;
    async fn find_post(&self, post_id: i32) -> Fallible<Option<PostCard>>;
    async fn update_post(&self, post_id: i32, changes: PostChanges) -> Fallible<Option<Post>>;
    /// Comments on the deleted post are deleted too.
    async fn delete_post(&self, post_id: i32) -> Fallible<Option<Post>>;

    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment>;
    /// Newest first.
    async fn list_comments(&self, post_id: i32) -> Fallible<Vec<CommentCard>>;

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool>;
    /// Fails with `Cause::UserConflict` if the pair already exists or is a self-follow.
    async fn new_follow(&self, new_follow: NewFollow) -> Fallible<Follow>;
    /// Returns false if there was nothing to delete.
    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool>;
}
