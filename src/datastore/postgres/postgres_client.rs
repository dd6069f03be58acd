use crate::datastore::{
    postfilters::PostFilters,
    postgres::{
        errors::{conflict, BlockingResp, DbPoolResult},
        PostgresStore,
    },
    structs::{
        Comment, CommentCard, Follow, Group, NewComment, NewFollow, NewGroup, NewPost, NewUser,
        Post, PostCard, PostChanges, User,
    },
    tables::{comments, follows, groups, posts, users},
    Client,
};
use crate::twoface::Fallible;
use actix_web::web::block;
use async_trait::async_trait;
use diesel::{
    dsl::exists,
    expression::BoxableExpression,
    pg::Pg,
    query_dsl::{QueryDsl, RunQueryDsl},
    sql_types::Bool,
    ExpressionMethods, OptionalExtension,
};
use std::collections::HashMap;
use uuid::Uuid;

#[async_trait]
impl Client for PostgresStore {
    async fn new_user(&self, new_user: NewUser) -> Fallible<User> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(users::table)
                .values(&new_user)
                .get_result::<User>(&conn)
                .map_err(conflict("That username is already taken"))
        })
        .await
        .to_resp()
    }

    async fn find_user(&self, username: &str) -> Fallible<Option<User>> {
        let conn = self.pool.get()?;
        let username = username.to_owned();
        let query_result: DbPoolResult<_> = block(move || {
            users::table
                .filter(users::username.eq(username))
                .first::<User>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn new_group(&self, new_group: NewGroup) -> Fallible<Group> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(groups::table)
                .values(&new_group)
                .get_result::<Group>(&conn)
                .map_err(conflict("A group with that slug already exists"))
        })
        .await
        .to_resp()
    }

    async fn list_groups(&self) -> Fallible<Vec<Group>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> =
            block(move || groups::table.order_by(groups::title).load::<Group>(&conn)).await;
        query_result.to_resp()
    }

    async fn find_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let conn = self.pool.get()?;
        let slug = slug.to_owned();
        let query_result: DbPoolResult<_> = block(move || {
            groups::table
                .filter(groups::slug.eq(slug))
                .first::<Group>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn delete_group(&self, slug: &str) -> Fallible<Option<Group>> {
        let conn = self.pool.get()?;
        let slug = slug.to_owned();
        // posts.group_id is ON DELETE SET NULL, so the group's posts survive.
        let query_result: DbPoolResult<_> = block(move || {
            diesel::delete(groups::table.filter(groups::slug.eq(slug)))
                .get_result::<Group>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn new_post(&self, new_post: NewPost) -> Fallible<Post> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(posts::table)
                .values(&new_post)
                .get_result::<Post>(&conn)
                .map_err(conflict("The post refers to a group or author that doesn't exist"))
        })
        .await
        .to_resp()
    }

    async fn count_posts(&self, filters: PostFilters) -> Fallible<i64> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let mut query = posts::table.into_boxed();
            for filter in filters.as_sql_where() {
                query = query.filter(filter);
            }
            query.count().get_result::<i64>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn list_posts(
        &self,
        filters: PostFilters,
        offset: i64,
        limit: i64,
    ) -> Fallible<Vec<PostCard>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let mut query = posts::table.into_boxed();
            for filter in filters.as_sql_where() {
                query = query.filter(filter);
            }
            let posts: Vec<Post> = query
                .order_by((posts::pub_date.desc(), posts::id.desc()))
                .offset(offset)
                .limit(limit)
                .load(&conn)?;

            // Fetch the authors and groups for this page in one query each.
            let author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
            let authors: Vec<User> = users::table
                .filter(users::id.eq_any(author_ids))
                .load(&conn)?;
            let group_ids: Vec<i32> = posts.iter().filter_map(|p| p.group_id).collect();
            let groups: Vec<Group> = groups::table
                .filter(groups::id.eq_any(group_ids))
                .load(&conn)?;

            Ok(assemble_cards(posts, authors, groups))
        })
        .await;
        query_result.to_resp()
    }

    async fn find_post(&self, post_id: i32) -> Fallible<Option<PostCard>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let row: Option<(Post, User, Option<Group>)> = posts::table
                .inner_join(users::table)
                .left_join(groups::table)
                .filter(posts::id.eq(post_id))
                .first(&conn)
                .optional()?;

            guard!(let Some((post, author, group)) = row else {
                return Ok(None);
            });

            Ok(Some(PostCard {
                post,
                author,
                group,
            }))
        })
        .await;
        query_result.to_resp()
    }

    async fn update_post(&self, post_id: i32, changes: PostChanges) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::update(posts::table.find(post_id))
                .set(&changes)
                .get_result::<Post>(&conn)
                .optional()
                .map_err(conflict("The post refers to a group that doesn't exist"))
        })
        .await
        .to_resp()
    }

    async fn delete_post(&self, post_id: i32) -> Fallible<Option<Post>> {
        let conn = self.pool.get()?;
        // comments.post_id is ON DELETE CASCADE.
        let query_result: DbPoolResult<_> = block(move || {
            diesel::delete(posts::table.find(post_id))
                .get_result::<Post>(&conn)
                .optional()
        })
        .await;
        query_result.to_resp()
    }

    async fn new_comment(&self, new_comment: NewComment) -> Fallible<Comment> {
        let conn = self.pool.get()?;
        block(move || {
            diesel::insert_into(comments::table)
                .values(&new_comment)
                .get_result::<Comment>(&conn)
                .map_err(conflict("The comment refers to a post or author that doesn't exist"))
        })
        .await
        .to_resp()
    }

    async fn list_comments(&self, post_id: i32) -> Fallible<Vec<CommentCard>> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let rows: Vec<(Comment, User)> = comments::table
                .inner_join(users::table)
                .filter(comments::post_id.eq(post_id))
                .order_by((comments::created.desc(), comments::id.desc()))
                .load(&conn)?;
            Ok(rows
                .into_iter()
                .map(|(comment, author)| CommentCard { comment, author })
                .collect())
        })
        .await;
        query_result.to_resp()
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            diesel::select(exists(
                follows::table
                    .filter(follows::user_id.eq(user_id))
                    .filter(follows::author_id.eq(author_id)),
            ))
            .get_result::<bool>(&conn)
        })
        .await;
        query_result.to_resp()
    }

    async fn new_follow(&self, new_follow: NewFollow) -> Fallible<Follow> {
        let conn = self.pool.get()?;
        // unique_follow and author_not_user are the last line of defence here.
        block(move || {
            diesel::insert_into(follows::table)
                .values(&new_follow)
                .get_result::<Follow>(&conn)
                .map_err(conflict("You can't follow yourself or follow an author twice"))
        })
        .await
        .to_resp()
    }

    async fn delete_follow(&self, user_id: Uuid, author_id: Uuid) -> Fallible<bool> {
        let conn = self.pool.get()?;
        let query_result: DbPoolResult<_> = block(move || {
            let target = follows::table
                .filter(follows::user_id.eq(user_id))
                .filter(follows::author_id.eq(author_id));
            let deleted = diesel::delete(target).execute(&conn)?;
            Ok(deleted > 0)
        })
        .await;
        query_result.to_resp()
    }
}

/// Pair each post with its author and group. Posts whose author is missing are dropped, which
/// can only happen if the user was deleted between the two queries.
fn assemble_cards(posts: Vec<Post>, authors: Vec<User>, groups: Vec<Group>) -> Vec<PostCard> {
    let authors: HashMap<Uuid, User> = authors.into_iter().map(|u| (u.id, u)).collect();
    let groups: HashMap<i32, Group> = groups.into_iter().map(|g| (g.id, g)).collect();
    posts
        .into_iter()
        .filter_map(|post| {
            let author = authors.get(&post.author_id)?.clone();
            let group = post.group_id.and_then(|id| groups.get(&id).cloned());
            Some(PostCard {
                post,
                author,
                group,
            })
        })
        .collect()
}

impl PostFilters {
    pub fn as_sql_where(
        &self,
    ) -> Vec<Box<dyn BoxableExpression<posts::table, Pg, SqlType = Bool>>> {
        let mut wheres: Vec<Box<dyn BoxableExpression<posts::table, Pg, SqlType = Bool>>> =
            Vec::new();
        if let Some(group_id) = self.group_id {
            wheres.push(Box::new(posts::group_id.eq(group_id)))
        }
        if let Some(author_id) = self.author_id {
            wheres.push(Box::new(posts::author_id.eq(author_id)))
        }
        if let Some(user_id) = self.followed_by {
            let followed_authors = follows::table
                .filter(follows::user_id.eq(user_id))
                .select(follows::author_id);
            wheres.push(Box::new(posts::author_id.eq_any(followed_authors)))
        }
        wheres
    }
}
