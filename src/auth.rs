//! Who is making the request. Accounts live with an external identity provider, which hands
//! users an HS256-signed session token; this service only verifies it.
use actix_web::{
    dev::Payload,
    http::{header, header::Header, StatusCode},
    web, FromRequest, HttpMessage, HttpRequest, HttpResponse,
};
use actix_web_httpauth::headers::authorization::{Authorization, Bearer};
use futures::future::{ready, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::form_urlencoded;
use uuid::Uuid;

/// Cookie the identity provider stores the session token in.
pub const SESSION_COOKIE: &str = "session";

/// Settings needed to authenticate requests, shared with every worker as app data.
#[derive(Clone, Debug)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub login_url: String,
}

/// What the identity provider signs into each session token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    /// Expiry, seconds since the epoch.
    pub exp: usize,
}

/// A logged-in user. Extracting a `Viewer` sends anonymous users to the login page; extract
/// `Option<Viewer>` on pages anyone can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub id: Uuid,
    pub username: String,
}

impl Viewer {
    fn from_request_parts(req: &HttpRequest, settings: &AuthSettings) -> Option<Self> {
        let token = session_token(req)?;
        let key = DecodingKey::from_secret(settings.jwt_secret.as_bytes());
        match decode::<Claims>(&token, &key, &Validation::default()) {
            Ok(data) => Some(Viewer {
                id: data.claims.sub,
                username: data.claims.username,
            }),
            Err(e) => {
                debug!(error = %e, "rejected session token");
                None
            }
        }
    }
}

/// The cookie wins over the Authorization header.
fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        return Some(cookie.value().to_owned());
    }
    Authorization::<Bearer>::parse(req)
        .ok()
        .map(|auth| auth.into_scheme().token().to_string())
}

impl FromRequest for Viewer {
    type Error = LoginRedirect;
    type Future = Ready<Result<Self, Self::Error>>;
    type Config = ();

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let settings = req.app_data::<web::Data<AuthSettings>>();
        let viewer = settings.and_then(|s| Viewer::from_request_parts(req, s));
        let login_url = settings
            .map(|s| s.login_url.as_str())
            .unwrap_or("/auth/login/");
        ready(viewer.ok_or_else(|| LoginRedirect::new(login_url, &next_target(req))))
    }
}

/// The path (and query, if any) to come back to after logging in.
fn next_target(req: &HttpRequest) -> String {
    req.uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| req.path().to_owned())
}

/// Sends an anonymous user to the login page, remembering where they were going.
#[derive(Debug)]
pub struct LoginRedirect {
    location: String,
}

impl LoginRedirect {
    pub fn new(login_url: &str, next: &str) -> Self {
        let query: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("next", next)
            .finish();
        Self {
            location: format!("{}?{}", login_url, query),
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Display for LoginRedirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "login required, redirecting to {}", self.location)
    }
}

impl actix_web::ResponseError for LoginRedirect {
    fn status_code(&self) -> StatusCode {
        StatusCode::FOUND
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::Found()
            .header(header::LOCATION, self.location.as_str())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use actix_web::test;

    #[test]
    fn test_login_redirect_encodes_next() {
        let redirect = LoginRedirect::new("/auth/login/", "/create/");
        assert_eq!(redirect.location(), "/auth/login/?next=%2Fcreate%2F");

        let redirect = LoginRedirect::new("/auth/login/", "/follow/?page=2");
        assert_eq!(
            redirect.location(),
            "/auth/login/?next=%2Ffollow%2F%3Fpage%3D2"
        );
    }

    #[actix_rt::test]
    async fn test_bearer_token_identifies_viewer() {
        let id = Uuid::new_v4();
        let req = test::TestRequest::get()
            .uri("/create/")
            .header("Authorization", format!("Bearer {}", token_for(id, "auth")))
            .data(settings())
            .to_http_request();
        let viewer = Viewer::extract(&req).await.unwrap();
        assert_eq!(
            viewer,
            Viewer {
                id,
                username: "auth".to_owned()
            }
        );
    }

    #[actix_rt::test]
    async fn test_bad_tokens_are_anonymous() {
        let id = Uuid::new_v4();
        let expired = token_with_exp(id, "auth", 1);
        for token in &["not-a-jwt".to_owned(), expired] {
            let req = test::TestRequest::get()
                .uri("/follow/")
                .header("Authorization", format!("Bearer {}", token))
                .data(settings())
                .to_http_request();
            let err = Viewer::extract(&req).await.unwrap_err();
            assert_eq!(err.location(), "/auth/login/?next=%2Ffollow%2F");
            assert!(Option::<Viewer>::extract(&req).await.unwrap().is_none());
        }
    }
}
