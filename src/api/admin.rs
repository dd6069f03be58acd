//! Admin endpoints. They're served on their own listener, behind a bearer token.
use crate::api::{observe, State};
use crate::datastore::{
    structs::{Group, NewGroup, NewUser, Post, User},
    Client,
};
use crate::twoface::{Cause, Describe, ExternalError, Fallible, OrNotFound};
use actix_web::{dev::ServiceRequest, web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use anyhow::anyhow;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

/// The bearer token admin requests must carry. Only its digest is kept.
#[derive(Clone, Debug)]
pub struct AdminToken {
    digest: Vec<u8>,
}

impl AdminToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Sha256::digest(token.as_bytes()).to_vec(),
        }
    }

    /// Takes the same time however much of `presented` is right.
    pub fn matches(&self, presented: &str) -> bool {
        let presented = Sha256::digest(presented.as_bytes());
        let difference = presented
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b));
        difference == 0 && presented.len() == self.digest.len()
    }
}

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/users").route(web::post().to(new_user::<DS>)))
        .service(
            web::resource("/groups")
                .route(web::get().to(list_groups::<DS>))
                .route(web::post().to(new_group::<DS>)),
        )
        .service(web::resource("/groups/{slug}").route(web::delete().to(delete_group::<DS>)))
        .service(web::resource("/posts/{post_id}").route(web::delete().to(delete_post::<DS>)))
        .service(web::resource("/cache").route(web::delete().to(clear_cache::<DS>)));
}

/// For `HttpAuthentication::bearer`.
pub async fn validate_admin(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, actix_web::Error> {
    let authorized = req
        .app_data::<web::Data<AdminToken>>()
        .map(|expected| expected.matches(credentials.token()))
        .unwrap_or(false);
    if authorized {
        return Ok(req);
    }
    let err = anyhow!("rejected admin token for {}", req.path()).describe(ExternalError {
        cause: Cause::UserBadAuth,
        text: "Invalid admin token",
    });
    Err(err.into())
}

#[derive(Deserialize)]
pub struct NewUserBody {
    /// The id the identity provider knows the user by. Generated if absent.
    pub id: Option<Uuid>,
    pub username: String,
}

async fn new_user<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<NewUserBody>,
) -> Fallible<web::Json<User>> {
    observe("admin_new_user", || async {
        let user = state
            .ds
            .new_user(NewUser {
                id: body.id.unwrap_or_else(Uuid::new_v4),
                username: body.username.clone(),
            })
            .await?;
        info!(username = &user.username[..], "user provisioned");
        Ok(web::Json(user))
    })
    .await
}

async fn list_groups<DS: Client>(state: web::Data<State<DS>>) -> Fallible<web::Json<Vec<Group>>> {
    observe("admin_list_groups", || async {
        let groups = state.ds.list_groups().await?;
        Ok(web::Json(groups))
    })
    .await
}

async fn new_group<DS: Client>(
    state: web::Data<State<DS>>,
    body: web::Json<NewGroup>,
) -> Fallible<web::Json<Group>> {
    observe("admin_new_group", || async {
        let group = state.ds.new_group(NewGroup::clone(&body)).await?;
        info!(slug = &group.slug[..], "group created");
        Ok(web::Json(group))
    })
    .await
}

async fn delete_group<DS: Client>(
    state: web::Data<State<DS>>,
    slug: web::Path<String>,
) -> Fallible<web::Json<Group>> {
    observe("admin_delete_group", || async {
        let group = state
            .ds
            .delete_group(&slug)
            .await?
            .or_not_found("No such group")?;
        info!(slug = &group.slug[..], "group deleted");
        Ok(web::Json(group))
    })
    .await
}

async fn delete_post<DS: Client>(
    state: web::Data<State<DS>>,
    post_id: web::Path<i32>,
) -> Fallible<web::Json<Post>> {
    observe("admin_delete_post", || async {
        let post = state
            .ds
            .delete_post(*post_id)
            .await?
            .or_not_found("No such post")?;
        info!(post_id = post.id, "post deleted");
        Ok(web::Json(post))
    })
    .await
}

async fn clear_cache<DS: Client>(state: web::Data<State<DS>>) -> Fallible<HttpResponse> {
    observe("admin_clear_cache", || async {
        state.index_cache.clear();
        info!("index page cache cleared");
        Ok(HttpResponse::NoContent().finish())
    })
    .await
}
