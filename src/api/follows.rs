//! Following authors, and the feed of posts from followed authors.
use crate::api::{html, load_page, observe, redirect, State};
use crate::auth::Viewer;
use crate::datastore::{postfilters::PostFilters, structs::NewFollow, Client};
use crate::pages;
use crate::paginator::PageQuery;
use crate::twoface::{Describe, ExternalError, Fallible, OrNotFound};
use actix_web::{web, HttpResponse};
use anyhow::anyhow;
use tracing::info;

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/follow/", web::get().to(follow_index::<DS>))
        .route(
            "/profile/{username}/follow/",
            web::get().to(profile_follow::<DS>),
        )
        .route(
            "/profile/{username}/unfollow/",
            web::get().to(profile_unfollow::<DS>),
        );
}

async fn follow_index<DS: Client>(
    state: web::Data<State<DS>>,
    viewer: Viewer,
    query: PageQuery,
) -> Fallible<HttpResponse> {
    observe("follow_index", || async {
        let page = load_page(
            &*state.ds,
            PostFilters::followed_by(viewer.id),
            query.page.as_deref(),
        )
        .await?;
        Ok(html(pages::follow(Some(&viewer), &page)))
    })
    .await
}

// Following yourself, or someone you already follow, does nothing.
async fn profile_follow<DS: Client>(
    state: web::Data<State<DS>>,
    username: web::Path<String>,
    viewer: Viewer,
) -> Fallible<HttpResponse> {
    observe("profile_follow", || async {
        let author = state
            .ds
            .find_user(&username)
            .await?
            .or_not_found("No such user")?;
        if author.id != viewer.id && !state.ds.is_following(viewer.id, author.id).await? {
            state
                .ds
                .new_follow(NewFollow {
                    user_id: viewer.id,
                    author_id: author.id,
                })
                .await?;
            info!(
                follower = &viewer.username[..],
                author = &author.username[..],
                "followed"
            );
        }
        Ok(redirect(&format!("/profile/{}/", author.username)))
    })
    .await
}

async fn profile_unfollow<DS: Client>(
    state: web::Data<State<DS>>,
    username: web::Path<String>,
    viewer: Viewer,
) -> Fallible<HttpResponse> {
    observe("profile_unfollow", || async {
        let author = state
            .ds
            .find_user(&username)
            .await?
            .or_not_found("No such user")?;
        let deleted = state.ds.delete_follow(viewer.id, author.id).await?;
        if !deleted {
            let text = "You don't follow this author";
            return Err(anyhow!("{} isn't following {}", viewer.username, author.username)
                .describe(ExternalError::not_found(text)));
        }
        info!(
            follower = &viewer.username[..],
            author = &author.username[..],
            "unfollowed"
        );
        Ok(redirect(&format!("/profile/{}/", author.username)))
    })
    .await
}

#[cfg(test)]
mod tests {
    use crate::api::testing::*;
    use crate::datastore::{mock, structs::NewFollow, Client as _};
    use actix_web::{http::StatusCode, test};
    use std::time::Duration;

    const CACHE: Duration = Duration::from_secs(20);

    #[actix_rt::test]
    async fn test_follow_then_unfollow() {
        let store = mock::Client::default();
        let author = user(&store, "auth").await;
        let reader = user(&store, "HasNoName").await;
        let mut app = crate::test_app!(state(&store, CACHE)).await;

        let req = login(test::TestRequest::get().uri("/profile/auth/follow/"), &reader)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(location(&resp), "/profile/auth/");
        assert_eq!(store.follow_count(), 1);
        assert!(store.is_following(reader.id, author.id).await.unwrap());

        let req = login(test::TestRequest::get().uri("/profile/auth/"), &reader).to_request();
        let body_profile = body(test::call_service(&mut app, req).await).await;
        assert!(body_profile.contains("/profile/auth/unfollow/"));

        let req = login(test::TestRequest::get().uri("/profile/auth/unfollow/"), &reader)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(store.follow_count(), 0);
        assert!(!store.is_following(reader.id, author.id).await.unwrap());
    }

    #[actix_rt::test]
    async fn test_following_twice_keeps_one_row() {
        let store = mock::Client::default();
        user(&store, "auth").await;
        let reader = user(&store, "HasNoName").await;
        let mut app = crate::test_app!(state(&store, CACHE)).await;

        for _ in 0..2 {
            let req = login(test::TestRequest::get().uri("/profile/auth/follow/"), &reader)
                .to_request();
            let resp = test::call_service(&mut app, req).await;
            assert_eq!(resp.status(), StatusCode::FOUND);
        }
        assert_eq!(store.follow_count(), 1);
    }

    #[actix_rt::test]
    async fn test_cannot_follow_yourself() {
        let store = mock::Client::default();
        let author = user(&store, "auth").await;
        let mut app = crate::test_app!(state(&store, CACHE)).await;

        let req = login(test::TestRequest::get().uri("/profile/auth/follow/"), &author)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(store.follow_count(), 0);

        // Going around the handler doesn't help either.
        let bypass = store
            .new_follow(NewFollow {
                user_id: author.id,
                author_id: author.id,
            })
            .await;
        assert!(bypass.is_err());
        assert_eq!(store.follow_count(), 0);
    }

    #[actix_rt::test]
    async fn test_unfollowing_stranger_is_not_found() {
        let store = mock::Client::default();
        user(&store, "auth").await;
        let reader = user(&store, "HasNoName").await;
        let mut app = crate::test_app!(state(&store, CACHE)).await;

        let req = login(test::TestRequest::get().uri("/profile/auth/unfollow/"), &reader)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = login(test::TestRequest::get().uri("/profile/nobody/follow/"), &reader)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_rt::test]
    async fn test_feed_shows_only_followed_authors() {
        let store = mock::Client::default();
        let author = user(&store, "auth").await;
        let stranger = user(&store, "stranger").await;
        let reader = user(&store, "HasNoName").await;
        for i in 0..12 {
            post(&store, &author, &format!("Пост автора {}", i), None).await;
        }
        post(&store, &stranger, "Пост незнакомца", None).await;
        let mut app = crate::test_app!(state(&store, CACHE)).await;

        let req = login(test::TestRequest::get().uri("/follow/"), &reader).to_request();
        let feed = body(test::call_service(&mut app, req).await).await;
        assert!(feed.contains("data-page=\"follow\""));
        assert_eq!(cards(&feed), 0);

        let req = login(test::TestRequest::get().uri("/profile/auth/follow/"), &reader)
            .to_request();
        test::call_service(&mut app, req).await;

        let req = login(test::TestRequest::get().uri("/follow/"), &reader).to_request();
        let feed = body(test::call_service(&mut app, req).await).await;
        assert_eq!(cards(&feed), 10);
        assert!(!feed.contains("Пост незнакомца"));

        let req = login(test::TestRequest::get().uri("/follow/?page=2"), &reader).to_request();
        let feed = body(test::call_service(&mut app, req).await).await;
        assert_eq!(cards(&feed), 2);

        let req = login(test::TestRequest::get().uri("/follow/?page=2&page=1"), &reader)
            .to_request();
        let resp = test::call_service(&mut app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(cards(&body(resp).await), 10);
    }

    #[actix_rt::test]
    async fn test_guests_are_sent_to_login() {
        let store = mock::Client::default();
        user(&store, "auth").await;
        let mut app = crate::test_app!(state(&store, CACHE)).await;

        for (uri, next) in &[
            ("/follow/", "%2Ffollow%2F"),
            ("/profile/auth/follow/", "%2Fprofile%2Fauth%2Ffollow%2F"),
            ("/profile/auth/unfollow/", "%2Fprofile%2Fauth%2Funfollow%2F"),
        ] {
            let req = test::TestRequest::get().uri(uri).to_request();
            let resp = test::call_service(&mut app, req).await;
            assert_eq!(resp.status(), StatusCode::FOUND, "{}", uri);
            assert_eq!(location(&resp), format!("/auth/login/?next={}", next));
        }
        assert_eq!(store.follow_count(), 0);
    }
}
