use crate::datastore::{
    postfilters::PostFilters,
    structs::{
        Comment, CommentCard, Follow, Group, NewComment, NewFollow, NewGroup, NewPost, NewUser,
        Post, PostCard, PostChanges, User,
    },
};
use crate::twoface::{Cause, Describe, ExternalError, Fallible};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::offset::Utc;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default, Debug)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn followed_authors(&self, filters: &PostFilters) -> Vec<Uuid> {
        match filters.followed_by {
            Some(user_id) => self
                .follows
                .iter()
                .filter(|f| f.user_id == user_id)
                .map(|f| f.author_id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Matching posts, newest first.
    fn matching_posts(&self, filters: &PostFilters) -> Vec<Post> {
        let followed = self.followed_authors(filters);
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| p.matches(filters, &followed))
            .cloned()
            .collect();
        posts.sort_by(|a, b| (b.pub_date, b.id).cmp(&(a.pub_date, a.id)));
        posts
    }

    fn has_user(&self, id: Uuid) -> bool {
        self.users.iter().any(|u| u.id == id)
    }

    /// A missing group id refers to no group, which is always fine.
    fn has_group(&self, id: Option<i32>) -> bool {
        id.map_or(true, |id| self.groups.iter().any(|g| g.id == id))
    }

    fn card(&self, post: Post) -> Option<PostCard> {
        let author = self.users.iter().find(|u| u.id == post.author_id)?.clone();
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|g| g.id == id).cloned());
        Some(PostCard {
            post,
            author,
            group,
        })
    }
}

fn constraint(name: &'static str, text: &'static str) -> crate::twoface::TfError {
    anyhow!("violates constraint {}", name).describe(ExternalError {
        cause: Cause::UserConflict,
        text,
    })
}

/// An in-memory implementation of datastore::Client, enforcing the same constraints as the
/// Postgres schema.
#[derive(Clone, Default, Debug)]
pub struct Client {
    tables: Arc<Mutex<Tables>>,
}

impl Client {
    /// Total follow rows, regardless of who follows whom.
    pub fn follow_count(&self) -> usize {
        self.tables.lock().unwrap().follows.len()
    }

    pub fn post_count(&self) -> usize {
        self.tables.lock().unwrap().posts.len()
    }

    pub fn comments_on(&self, post_id: i32) -> Vec<Comment> {
        self.tables
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl super::Client for Client {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let mut tables = self.tables.lock().unwrap();
        if tables.users.iter().any(|u| u.username == new_user.username) {
            return Err(constraint("users_username_key", "That username is already taken"));
        }
        let user = User {
            id: new_user.id,
            created_at: Utc::now(),
            username: new_user.username,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, username: &str) -> Fallible<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn new_group(&self, new_group: NewGroup) -> Fallible<Group> {
        let mut tables = self.tables.lock().unwrap();
        if tables.groups.iter().any(|g| g.slug == new_group.slug) {
            return Err(constraint(
                "groups_slug_key",
                "A group with that slug already exists",
            ));
        }
        let group = Group {
            id: tables.next_id(),
            title: new_group.title,
            slug: new_group.slug,
            description: new_group.description,
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn list_groups(&self) -> Fallible<Vec<Group>> {
        let mut groups = self.tables.lock().unwrap().groups.clone();
        groups.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(groups)
    }

    async fn find_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.groups.iter().find(|g| g.slug == slug).cloned())
    }

    async fn delete_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables.groups.iter().position(|g| g.slug == slug) else {
            return Ok(None)
        });
        let group = tables.groups.remove(index);
        for post in tables.posts.iter_mut() {
            if post.group_id == Some(group.id) {
                post.group_id = None;
            }
        }
        Ok(Some(group))
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.has_user(new_post.author_id) {
            return Err(constraint(
                "posts_author_id_fkey",
                "The post refers to a group or author that doesn't exist",
            ));
        }
        if !tables.has_group(new_post.group_id) {
            return Err(constraint(
                "posts_group_id_fkey",
                "The post refers to a group or author that doesn't exist",
            ));
        }
        let post = Post {
            id: tables.next_id(),
            text: new_post.text,
            pub_date: Utc::now(),
            author_id: new_post.author_id,
            group_id: new_post.group_id,
            image: new_post.image,
        };
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn count_posts(&self, filters: PostFilters) -> Fallible<i64> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.matching_posts(&filters).len() as i64)
    }

    async fn list_posts(
        &self,
        filters: PostFilters,
        offset: i64,
        limit: i64,
    ) -> Fallible<Vec<PostCard>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .matching_posts(&filters)
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .filter_map(|post| tables.card(post))
            .collect())
    }

    async fn find_post(&self, post_id: i32) -> Fallible<Option<PostCard>> {
        let tables = self.tables.lock().unwrap();
        let post = tables.posts.iter().find(|p| p.id == post_id).cloned();
        Ok(post.and_then(|post| tables.card(post)))
    }

    async fn update_post(&self, post_id: i32, changes: PostChanges) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.has_group(changes.group_id) {
            return Err(constraint(
                "posts_group_id_fkey",
                "The post refers to a group that doesn't exist",
            ));
        }
        let post = tables.posts.iter_mut().find(|p| p.id == post_id).map(|post| {
            post.text = changes.text;
            post.group_id = changes.group_id;
            post.image = changes.image;
            post.clone()
        });
        Ok(post)
    }

    async fn delete_post(&self, post_id: i32) -> Fallible<Option<Post>> {
        let mut tables = self.tables.lock().unwrap();
        guard!(let Some(index) = tables.posts.iter().position(|p| p.id == post_id) else {
            return Ok(None)
        });
        let post = tables.posts.remove(index);
        tables.comments.retain(|c| c.post_id != post_id);
        Ok(Some(post))
    }

    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.posts.iter().any(|p| p.id == new_comment.post_id) {
            return Err(constraint(
                "comments_post_id_fkey",
                "The comment refers to a post or author that doesn't exist",
            ));
        }
        if !tables.has_user(new_comment.author_id) {
            return Err(constraint(
                "comments_author_id_fkey",
                "The comment refers to a post or author that doesn't exist",
            ));
        }
        let comment = Comment {
            id: tables.next_id(),
            post_id: new_comment.post_id,
            author_id: new_comment.author_id,
            text: new_comment.text,
            created: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn list_comments(&self, post_id: i32) -> Fallible<Vec<CommentCard>> {
        let tables = self.tables.lock().unwrap();
        let mut comments: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| (b.created, b.id).cmp(&(a.created, a.id)));
        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let author = tables.users.iter().find(|u| u.id == comment.author_id)?;
                Some(CommentCard {
                    author: author.clone(),
                    comment,
                })
            })
            .collect())
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .follows
            .iter()
            .any(|f| f.user_id == user_id && f.author_id == author_id))
    }

    async fn new_follow(&self, new_follow: NewFollow) -> Fallible<Follow> {
        let mut tables = self.tables.lock().unwrap();
        if new_follow.user_id == new_follow.author_id {
            return Err(constraint(
                "author_not_user",
                "You can't follow yourself or follow an author twice",
            ));
        }
        if !tables.has_user(new_follow.user_id) || !tables.has_user(new_follow.author_id) {
            return Err(constraint(
                "follows_author_id_fkey",
                "You can't follow yourself or follow an author twice",
            ));
        }
        let duplicate = tables
            .follows
            .iter()
            .any(|f| f.user_id == new_follow.user_id && f.author_id == new_follow.author_id);
        if duplicate {
            return Err(constraint(
                "unique_follow",
                "You can't follow yourself or follow an author twice",
            ));
        }
        let follow = Follow {
            id: tables.next_id(),
            user_id: new_follow.user_id,
            author_id: new_follow.author_id,
        };
        tables.follows.push(follow.clone());
        Ok(follow)
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.follows.len();
        tables
            .follows
            .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
        Ok(tables.follows.len() < before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::Client as _;

    async fn user(store: &Client, name: &str) -> User {
        store
            .new_user(NewUser {
                id: Uuid::new_v4(),
                username: name.to_owned(),
            })
            .await
            .unwrap()
    }

    #[actix_rt::test]
    async fn test_store_rejects_self_follow() {
        let store = Client::default();
        let alice = user(&store, "alice").await;
        let err = store
            .new_follow(NewFollow {
                user_id: alice.id,
                author_id: alice.id,
            })
            .await
            .unwrap_err();
        assert_eq!(
            actix_web::http::StatusCode::from(err.external.cause),
            actix_web::http::StatusCode::CONFLICT
        );
        assert_eq!(store.follow_count(), 0);
    }

    #[actix_rt::test]
    async fn test_store_rejects_duplicate_follow() {
        let store = Client::default();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let pair = NewFollow {
            user_id: alice.id,
            author_id: bob.id,
        };
        store.new_follow(pair).await.unwrap();
        assert!(store.new_follow(pair).await.is_err());
        assert_eq!(store.follow_count(), 1);
    }

    #[actix_rt::test]
    async fn test_deleting_group_keeps_its_posts() {
        let store = Client::default();
        let alice = user(&store, "alice").await;
        let group = store
            .new_group(NewGroup {
                title: "Cats".to_owned(),
                slug: "cats".to_owned(),
                description: "".to_owned(),
            })
            .await
            .unwrap();
        let post = store
            .new_post(NewPost {
                text: "meow".to_owned(),
                author_id: alice.id,
                group_id: Some(group.id),
                image: None,
            })
            .await
            .unwrap();

        store.delete_group("cats").await.unwrap().unwrap();
        let card = store.find_post(post.id).await.unwrap().unwrap();
        assert_eq!(card.post.group_id, None);
        assert_eq!(card.group, None);
    }

    #[actix_rt::test]
    async fn test_deleting_post_deletes_its_comments() {
        let store = Client::default();
        let alice = user(&store, "alice").await;
        let post = store
            .new_post(NewPost {
                text: "hello".to_owned(),
                author_id: alice.id,
                group_id: None,
                image: None,
            })
            .await
            .unwrap();
        store
            .new_comment(NewComment {
                post_id: post.id,
                author_id: alice.id,
                text: "first".to_owned(),
            })
            .await
            .unwrap();

        store.delete_post(post.id).await.unwrap().unwrap();
        assert!(store.comments_on(post.id).is_empty());
    }

    #[actix_rt::test]
    async fn test_rows_must_refer_to_existing_rows() {
        let store = Client::default();
        let alice = user(&store, "alice").await;
        let stranger = Uuid::new_v4();
        let post = |author_id, group_id| NewPost {
            text: "hello".to_owned(),
            author_id,
            group_id,
            image: None,
        };

        assert!(store.new_post(post(stranger, None)).await.is_err());
        assert!(store.new_post(post(alice.id, Some(404))).await.is_err());
        assert_eq!(store.post_count(), 0);

        let saved = store.new_post(post(alice.id, None)).await.unwrap();
        let moved = store
            .update_post(
                saved.id,
                PostChanges {
                    text: "hello".to_owned(),
                    group_id: Some(404),
                    image: None,
                },
            )
            .await;
        assert!(moved.is_err());

        let comment = store
            .new_comment(NewComment {
                post_id: saved.id,
                author_id: stranger,
                text: "hi".to_owned(),
            })
            .await;
        assert!(comment.is_err());
        assert!(store.comments_on(saved.id).is_empty());

        let follow = store
            .new_follow(NewFollow {
                user_id: stranger,
                author_id: alice.id,
            })
            .await;
        assert!(follow.is_err());
        assert_eq!(store.follow_count(), 0);
    }
}
