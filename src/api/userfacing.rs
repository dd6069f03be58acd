//! Pages anyone can browse, plus writing and editing posts and comments.
use crate::api::{html, load_page, observe, redirect, State};
use crate::auth::Viewer;
use crate::cache::{PageCache, INDEX_PAGE_PREFIX};
use crate::datastore::{
    postfilters::PostFilters,
    structs::{NewComment, NewPost, PostCard, PostChanges},
    Client,
};
use crate::forms::{CommentForm, FieldErrors, PostForm};
use crate::pages;
use crate::paginator::PageQuery;
use crate::twoface::{Fallible, OrNotFound};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::info;

pub fn configure<DS: Client + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(index::<DS>))
        .route("/group/{slug}/", web::get().to(group_posts::<DS>))
        .route("/profile/{username}/", web::get().to(profile::<DS>))
        .route("/posts/{post_id}/", web::get().to(post_detail::<DS>))
        .service(
            web::resource("/posts/{post_id}/edit/")
                .route(web::get().to(edit_form::<DS>))
                .route(web::post().to(post_edit::<DS>)),
        )
        .service(
            web::resource("/create/")
                .route(web::get().to(create_form::<DS>))
                .route(web::post().to(post_create::<DS>)),
        )
        .service(
            web::resource("/posts/{post_id}/comment/")
                .route(web::get().to(comment_redirect))
                .route(web::post().to(add_comment::<DS>)),
        );
}

/// Rendered for any path no route matches.
pub async fn not_found(req: HttpRequest) -> HttpResponse {
    let text = format!("There's nothing at {}", req.path());
    HttpResponse::NotFound()
        .content_type(pages::CONTENT_TYPE)
        .body(pages::not_found(&text))
}

const NO_SUCH_POST: &str = "No such post";

// Latest posts from everyone. The rendered page is cached for a while.
async fn index<DS: Client>(
    state: web::Data<State<DS>>,
    req: HttpRequest,
    viewer: Option<Viewer>,
    query: PageQuery,
) -> Fallible<HttpResponse> {
    observe("index", || async {
        let path = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let key = PageCache::key(
            INDEX_PAGE_PREFIX,
            path,
            viewer.as_ref().map(|v| v.username.as_str()),
        );
        let body = state
            .index_cache
            .get_or_render(key, || async {
                let page =
                    load_page(&*state.ds, PostFilters::default(), query.page.as_deref()).await?;
                Ok(pages::index(viewer.as_ref(), &page))
            })
            .await?;
        Ok(html(body))
    })
    .await
}

async fn group_posts<DS: Client>(
    state: web::Data<State<DS>>,
    slug: web::Path<String>,
    viewer: Option<Viewer>,
    query: PageQuery,
) -> Fallible<HttpResponse> {
    observe("group_posts", || async {
        let group = state
            .ds
            .find_group(&slug)
            .await?
            .or_not_found("No such group")?;
        let page = load_page(
            &*state.ds,
            PostFilters::group(group.id),
            query.page.as_deref(),
        )
        .await?;
        Ok(html(pages::group_list(viewer.as_ref(), &group, &page)))
    })
    .await
}

async fn profile<DS: Client>(
    state: web::Data<State<DS>>,
    username: web::Path<String>,
    viewer: Option<Viewer>,
    query: PageQuery,
) -> Fallible<HttpResponse> {
    observe("profile", || async {
        let author = state
            .ds
            .find_user(&username)
            .await?
            .or_not_found("No such user")?;
        let page = load_page(
            &*state.ds,
            PostFilters::author(author.id),
            query.page.as_deref(),
        )
        .await?;
        let following = match &viewer {
            Some(viewer) => Some(state.ds.is_following(viewer.id, author.id).await?),
            None => None,
        };
        Ok(html(pages::profile(
            viewer.as_ref(),
            &author,
            &page,
            following,
        )))
    })
    .await
}

/// The post page, with its comments and a comment form holding `form`.
async fn render_detail<DS: Client>(
    ds: &DS,
    viewer: Option<&Viewer>,
    card: &PostCard,
    form: &CommentForm,
    errors: &FieldErrors,
) -> Fallible<String> {
    let comments = ds.list_comments(card.post.id).await?;
    Ok(pages::post_detail(viewer, card, &comments, form, errors))
}

async fn post_detail<DS: Client>(
    state: web::Data<State<DS>>,
    post_id: web::Path<i32>,
    viewer: Option<Viewer>,
) -> Fallible<HttpResponse> {
    observe("post_detail", || async {
        let card = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found(NO_SUCH_POST)?;
        let body = render_detail(
            &*state.ds,
            viewer.as_ref(),
            &card,
            &CommentForm::default(),
            &FieldErrors::default(),
        )
        .await?;
        Ok(html(body))
    })
    .await
}

fn is_author(viewer: Option<&Viewer>, card: &PostCard) -> bool {
    viewer.map(|v| v.id) == Some(card.author.id)
}

// Only the author may edit. Everyone else just sees the post.
async fn edit_form<DS: Client>(
    state: web::Data<State<DS>>,
    post_id: web::Path<i32>,
    viewer: Option<Viewer>,
) -> Fallible<HttpResponse> {
    observe("edit_form", || async {
        let card = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found(NO_SUCH_POST)?;
        let body = if is_author(viewer.as_ref(), &card) {
            let groups = state.ds.list_groups().await?;
            pages::create_post(
                viewer.as_ref(),
                &PostForm::from_card(&card),
                &FieldErrors::default(),
                &groups,
                Some(card.post.id),
            )
        } else {
            render_detail(
                &*state.ds,
                viewer.as_ref(),
                &card,
                &CommentForm::default(),
                &FieldErrors::default(),
            )
            .await?
        };
        Ok(html(body))
    })
    .await
}

async fn post_edit<DS: Client>(
    state: web::Data<State<DS>>,
    post_id: web::Path<i32>,
    viewer: Option<Viewer>,
    form: web::Form<PostForm>,
) -> Fallible<HttpResponse> {
    observe("post_edit", || async {
        let card = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found(NO_SUCH_POST)?;
        if !is_author(viewer.as_ref(), &card) {
            let body = render_detail(
                &*state.ds,
                viewer.as_ref(),
                &card,
                &CommentForm::default(),
                &FieldErrors::default(),
            )
            .await?;
            return Ok(html(body));
        }

        let groups = state.ds.list_groups().await?;
        let clean = match form.clean(&groups) {
            Ok(clean) => clean,
            Err(errors) => {
                return Ok(html(pages::create_post(
                    viewer.as_ref(),
                    &form,
                    &errors,
                    &groups,
                    Some(card.post.id),
                )))
            }
        };
        let changes = PostChanges {
            text: clean.text,
            group_id: clean.group_id,
            image: clean.image,
        };
        state
            .ds
            .update_post(card.post.id, changes)
            .await?
            .or_not_found(NO_SUCH_POST)?;
        info!(post_id = card.post.id, "post edited");
        Ok(redirect(&format!("/posts/{}/", card.post.id)))
    })
    .await
}

async fn create_form<DS: Client>(
    state: web::Data<State<DS>>,
    viewer: Viewer,
) -> Fallible<HttpResponse> {
    observe("create_form", || async {
        let groups = state.ds.list_groups().await?;
        Ok(html(pages::create_post(
            Some(&viewer),
            &PostForm::default(),
            &FieldErrors::default(),
            &groups,
            None,
        )))
    })
    .await
}

async fn post_create<DS: Client>(
    state: web::Data<State<DS>>,
    viewer: Viewer,
    form: web::Form<PostForm>,
) -> Fallible<HttpResponse> {
    observe("post_create", || async {
        let groups = state.ds.list_groups().await?;
        let clean = match form.clean(&groups) {
            Ok(clean) => clean,
            Err(errors) => {
                return Ok(html(pages::create_post(
                    Some(&viewer),
                    &form,
                    &errors,
                    &groups,
                    None,
                )))
            }
        };
        let post = state
            .ds
            .new_post(NewPost {
                text: clean.text,
                author_id: viewer.id,
                group_id: clean.group_id,
                image: clean.image,
            })
            .await?;
        info!(post_id = post.id, author = &viewer.username[..], "post created");
        Ok(redirect(&format!("/profile/{}/", viewer.username)))
    })
    .await
}

// There's nothing to show at this URL, just send logged-in users back to the post.
async fn comment_redirect(_viewer: Viewer, post_id: web::Path<i32>) -> HttpResponse {
    redirect(&format!("/posts/{}/", *post_id))
}

async fn add_comment<DS: Client>(
    state: web::Data<State<DS>>,
    post_id: web::Path<i32>,
    viewer: Viewer,
    form: web::Form<CommentForm>,
) -> Fallible<HttpResponse> {
    observe("add_comment", || async {
        let card = state
            .ds
            .find_post(*post_id)
            .await?
            .or_not_found(NO_SUCH_POST)?;
        let text = match form.clean() {
            Ok(text) => text,
            Err(errors) => {
                let body =
                    render_detail(&*state.ds, Some(&viewer), &card, &form, &errors).await?;
                return Ok(html(body));
            }
        };
        state
            .ds
            .new_comment(NewComment {
                post_id: card.post.id,
                author_id: viewer.id,
                text,
            })
            .await?;
        Ok(redirect(&format!("/posts/{}/", card.post.id)))
    })
    .await
}
