//! Splits ordered listings into fixed-size pages. A bad page number never fails: garbage falls
//! back to the first page and out-of-range numbers clamp to the last one.
use actix_web::{dev::Payload, FromRequest, HttpRequest};
use futures::future::{ok, Ready};
use url::form_urlencoded;

/// How many posts every listing page shows.
pub const PER_PAGE: i64 = 10;

/// The `?page=` query parameter. Kept as a raw string so malformed numbers can fall back to
/// page 1 instead of failing extraction. If `page` is repeated, the last one wins.
#[derive(Default, Debug, PartialEq, Eq)]
pub struct PageQuery {
    pub page: Option<String>,
}

impl PageQuery {
    pub fn from_query_string(query: &str) -> Self {
        let page = form_urlencoded::parse(query.as_bytes())
            .filter(|(key, _)| key == "page")
            .map(|(_, value)| value.into_owned())
            .last();
        Self { page }
    }
}

impl FromRequest for PageQuery {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;
    type Config = ();

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ok(Self::from_query_string(req.query_string()))
    }
}

/// Which slice of a listing a request is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    /// 1-based, always between 1 and `num_pages`.
    pub number: i64,
    pub num_pages: i64,
    /// Items in the whole listing.
    pub count: i64,
    pub per_page: i64,
}

impl Window {
    pub fn new(count: i64, requested: Option<&str>, per_page: i64) -> Self {
        // An empty listing still has one (empty) page.
        let num_pages = if count <= 0 {
            1
        } else {
            (count + per_page - 1) / per_page
        };
        let number = match parse_page_number(requested) {
            None => 1,
            Some(n) if n < 1 || n > num_pages => num_pages,
            Some(n) => n,
        };
        Self {
            number,
            num_pages,
            count: count.max(0),
            per_page,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_other_pages(&self) -> bool {
        self.has_next() || self.has_previous()
    }
}

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub window: Window,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, window: Window) -> Self {
        Self { items, window }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// An optional sign followed by digits. Numbers too big for an i64 saturate, so they still
/// land on the last page.
fn parse_page_number(requested: Option<&str>) -> Option<i64> {
    let requested = requested?.trim();
    let (negative, digits) = match requested.as_bytes().first()? {
        b'-' => (true, &requested[1..]),
        b'+' => (false, &requested[1..]),
        _ => (false, requested),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match requested.parse::<i64>() {
        Ok(n) => Some(n),
        Err(_) if negative => Some(i64::MIN),
        Err(_) => Some(i64::MAX),
    }
}
