//! Server-side HTML for every page of the site. Each page marks its `<main>` element with a
//! `data-page` name so clients (and tests) can tell which page they got.
use crate::auth::Viewer;
use crate::datastore::structs::{CommentCard, Group, PostCard, User};
use crate::forms::{CommentForm, FieldErrors, PostForm};
use crate::paginator::Page;
use actix_web::http::StatusCode;

pub const CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Escapes text for use in HTML element content and double-quoted attributes.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            c => escaped.push(c),
        }
    }
    escaped
}

fn layout(page: &str, title: &str, viewer: Option<&Viewer>, content: &str) -> String {
    let account = match viewer {
        Some(viewer) => format!(
            r#"<a href="/follow/">Following</a> <a href="/create/">New post</a> <a href="/profile/{name}/">{name}</a>"#,
            name = escape(&viewer.username)
        ),
        None => "<span>Guest</span>".to_owned(),
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="ru">
<head>
<meta charset="utf-8">
<title>{title}</title>
</head>
<body>
<header><nav><a href="/">Yatube</a> {account}</nav></header>
<main data-page="{page}">
{content}
</main>
</body>
</html>
"#,
        title = escape(title),
        account = account,
        page = page,
        content = content,
    )
}

fn paragraphs(text: &str) -> String {
    escape(text).replace('\n', "<br>")
}

fn post_card(card: &PostCard) -> String {
    let mut html = String::from("<article class=\"post\">\n<ul>\n");
    html.push_str(&format!(
        "<li>Author: <a href=\"/profile/{name}/\">{name}</a></li>\n",
        name = escape(&card.author.username)
    ));
    html.push_str(&format!(
        "<li>Published: <time>{}</time></li>\n",
        card.post.pub_date.format("%d %b %Y %H:%M")
    ));
    if let Some(group) = &card.group {
        html.push_str(&format!(
            "<li>Group: <a href=\"/group/{}/\">{}</a></li>\n",
            escape(&group.slug),
            escape(&group.title)
        ));
    }
    html.push_str("</ul>\n");
    if let Some(image) = &card.post.image {
        html.push_str(&format!("<img src=\"/media/{}\" alt=\"\">\n", escape(image)));
    }
    html.push_str(&format!("<p>{}</p>\n", paragraphs(&card.post.text)));
    html.push_str(&format!(
        "<a href=\"/posts/{}/\">Details</a>\n</article>\n",
        card.post.id
    ));
    html
}

fn post_list(page: &Page<PostCard>) -> String {
    let mut html: String = page.items.iter().map(post_card).collect();
    let window = page.window;
    if window.has_other_pages() {
        html.push_str("<nav class=\"pagination\">");
        if window.has_previous() {
            html.push_str(&format!(
                "<a href=\"?page=1\">First</a> <a href=\"?page={}\">Previous</a> ",
                window.number - 1
            ));
        }
        html.push_str(&format!(
            "<span>Page {} of {}</span>",
            window.number, window.num_pages
        ));
        if window.has_next() {
            html.push_str(&format!(
                " <a href=\"?page={}\">Next</a> <a href=\"?page={}\">Last</a>",
                window.number + 1,
                window.num_pages
            ));
        }
        html.push_str("</nav>\n");
    }
    html
}

fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .for_field(field)
        .map(|message| format!("<p class=\"error\">{}</p>\n", escape(message)))
        .collect()
}

pub fn index(viewer: Option<&Viewer>, page: &Page<PostCard>) -> String {
    let content = format!("<h1>Latest posts</h1>\n{}", post_list(page));
    layout("index", "Yatube", viewer, &content)
}

pub fn group_list(viewer: Option<&Viewer>, group: &Group, page: &Page<PostCard>) -> String {
    let content = format!(
        "<h1>{}</h1>\n<p>{}</p>\n{}",
        escape(&group.title),
        paragraphs(&group.description),
        post_list(page)
    );
    layout("group_list", &group.title, viewer, &content)
}

/// `following` is only known when someone is logged in.
pub fn profile(
    viewer: Option<&Viewer>,
    author: &User,
    page: &Page<PostCard>,
    following: Option<bool>,
) -> String {
    let name = escape(&author.username);
    let mut content = format!(
        "<h1>All posts by {}</h1>\n<h3>Posts: {}</h3>\n",
        name, page.window.count
    );
    match (viewer, following) {
        (Some(viewer), _) if viewer.id == author.id => {}
        (_, Some(true)) => content.push_str(&format!(
            "<a class=\"unfollow\" href=\"/profile/{}/unfollow/\">Unfollow</a>\n",
            name
        )),
        (_, Some(false)) => content.push_str(&format!(
            "<a class=\"follow\" href=\"/profile/{}/follow/\">Follow</a>\n",
            name
        )),
        (_, None) => {}
    }
    content.push_str(&post_list(page));
    layout("profile", &author.username, viewer, &content)
}

pub fn post_detail(
    viewer: Option<&Viewer>,
    card: &PostCard,
    comments: &[CommentCard],
    form: &CommentForm,
    errors: &FieldErrors,
) -> String {
    let mut content = post_card(card);
    if viewer.map(|v| v.id) == Some(card.author.id) {
        content.push_str(&format!(
            "<a class=\"edit\" href=\"/posts/{}/edit/\">Edit post</a>\n",
            card.post.id
        ));
    }
    if viewer.is_some() {
        content.push_str(&format!(
            "<form method=\"post\" action=\"/posts/{}/comment/\">\n{}<textarea name=\"text\">{}</textarea>\n<button type=\"submit\">Send</button>\n</form>\n",
            card.post.id,
            field_errors(errors, "text"),
            escape(&form.text)
        ));
    }
    content.push_str("<section class=\"comments\">\n");
    for c in comments {
        content.push_str(&format!(
            "<div class=\"comment\"><a href=\"/profile/{name}/\">{name}</a> <time>{date}</time><p>{text}</p></div>\n",
            name = escape(&c.author.username),
            date = c.comment.created.format("%d %b %Y %H:%M"),
            text = paragraphs(&c.comment.text)
        ));
    }
    content.push_str("</section>\n");
    layout("post_detail", &card.post.to_string(), viewer, &content)
}

/// The form for a new post, or for editing post `editing`.
pub fn create_post(
    viewer: Option<&Viewer>,
    form: &PostForm,
    errors: &FieldErrors,
    groups: &[Group],
    editing: Option<i32>,
) -> String {
    let (heading, action, button) = match editing {
        Some(post_id) => (
            "Edit post",
            format!("/posts/{}/edit/", post_id),
            "Save",
        ),
        None => ("New post", "/create/".to_owned(), "Add"),
    };
    let selected = form.group.as_deref().unwrap_or("");
    let mut options = String::from("<option value=\"\">---------</option>\n");
    for group in groups {
        let id = group.id.to_string();
        options.push_str(&format!(
            "<option value=\"{}\"{}>{}</option>\n",
            id,
            if id == selected { " selected" } else { "" },
            escape(&group.title)
        ));
    }
    let content = format!(
        r#"<h1>{heading}</h1>
<form method="post" action="{action}">
<label for="id_text">Text</label>
{text_errors}<textarea name="text" id="id_text">{text}</textarea>
<label for="id_group">Group</label>
{group_errors}<select name="group" id="id_group">
{options}</select>
<label for="id_image">Image</label>
{image_errors}<input type="text" name="image" id="id_image" value="{image}">
<button type="submit">{button}</button>
</form>
"#,
        heading = heading,
        action = action,
        text_errors = field_errors(errors, "text"),
        text = escape(&form.text),
        group_errors = field_errors(errors, "group"),
        options = options,
        image_errors = field_errors(errors, "image"),
        image = escape(form.image.as_deref().unwrap_or("")),
        button = button,
    );
    layout("create_post", heading, viewer, &content)
}

pub fn follow(viewer: Option<&Viewer>, page: &Page<PostCard>) -> String {
    let content = if page.is_empty() {
        "<h1>Following</h1>\n<p>No posts from the authors you follow yet.</p>\n".to_owned()
    } else {
        format!("<h1>Following</h1>\n{}", post_list(page))
    };
    layout("follow", "Following", viewer, &content)
}

pub fn not_found(text: &str) -> String {
    let content = format!(
        "<h1>Page not found</h1>\n<p>{}</p>\n<a href=\"/\">Back to the main page</a>\n",
        escape(text)
    );
    layout("not_found", "Page not found", None, &content)
}

pub fn error(status: StatusCode, text: &str) -> String {
    let content = format!(
        "<h1>{}</h1>\n<p>{}</p>\n",
        status,
        escape(text)
    );
    layout("error", status.canonical_reason().unwrap_or("Error"), None, &content)
}
