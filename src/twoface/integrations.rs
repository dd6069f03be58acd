//! Integrate twoface with other libraries, like Actix-web or Diesel.

use crate::pages;
use crate::twoface::{Cause, TfError};
use actix_web::{http::StatusCode, HttpResponse};
use tracing::{error, warn};

// Twoface errors can be used as Actix-web errors.
// If a handler returns a Twoface error, the external portion will be shown to the user.
// The internal portion will only be logged.
impl actix_web::ResponseError for TfError {
    fn status_code(&self) -> StatusCode {
        self.external.cause.into()
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self.external.cause {
            Cause::NotFound => {
                warn!(error = %self.internal, "not found");
                pages::not_found(self.external.text)
            }
            Cause::ServerError => {
                error!("{:#}", self.internal);
                pages::error(self.status_code(), self.external.text)
            }
            _ => {
                warn!("{:#}", self.internal);
                pages::error(self.status_code(), self.external.text)
            }
        };
        HttpResponse::build(self.status_code())
            .content_type(pages::CONTENT_TYPE)
            .body(body)
    }
}
