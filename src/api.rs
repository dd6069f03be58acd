use crate::cache::PageCache;
use crate::datastore::{postfilters::PostFilters, structs::PostCard, Client};
use crate::metrics;
use crate::pages;
use crate::paginator::{Page, Window, PER_PAGE};
use crate::twoface::{Cause, Describe, ExternalError, Fallible};
use actix_web::{http::header, web, HttpResponse};
use anyhow::anyhow;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

pub mod admin;
pub mod follows;
pub mod userfacing;

/// Everything handlers share. Cloned into every worker.
pub struct State<DS> {
    pub ds: Arc<DS>,
    pub index_cache: PageCache,
}

impl<DS> Clone for State<DS> {
    fn clone(&self) -> Self {
        Self {
            ds: Arc::clone(&self.ds),
            index_cache: self.index_cache.clone(),
        }
    }
}

/// Load one page of the posts matching `filters`.
async fn load_page<DS: Client>(
    ds: &DS,
    filters: PostFilters,
    requested: Option<&str>,
) -> Fallible<Page<PostCard>> {
    let count = ds.count_posts(filters).await?;
    let window = Window::new(count, requested, PER_PAGE);
    let posts = ds
        .list_posts(filters, window.offset(), window.limit())
        .await?;
    Ok(Page::new(posts, window))
}

/// Form bodies that can't be read at all get the error page, not actix's plain-text 400.
pub fn form_config(limit: usize) -> web::FormConfig {
    web::FormConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            anyhow!("couldn't read form: {}", err)
                .describe(ExternalError {
                    cause: Cause::UserInvalidField,
                    text: "The form couldn't be read",
                })
                .into()
        })
}

fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(pages::CONTENT_TYPE)
        .body(body)
}

fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .header(header::LOCATION, location)
        .finish()
}

/// Execute the closure, then log its operational metrics, e.g. time taken, whether it returned Ok/Err, etc.
async fn observe<F, Fut, R>(name: &'static str, f: F) -> Fallible<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Fallible<R>>,
{
    let start = Instant::now();
    let return_val = f().await;
    let duration = start.elapsed();
    metrics::HANDLER_SECS
        .with_label_values(&[name])
        .observe(duration.as_secs_f64());
    metrics::RESPONSES
        .with_label_values(&[name, variant_name(&return_val)])
        .inc();
    return_val
}

fn variant_name<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "err"
    }
}
