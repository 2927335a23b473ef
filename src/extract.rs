// Request extractors whose rejections use the `{"error": ...}` body

use crate::error::LedgerError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON body; malformed or incomplete payloads become validation errors.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(LedgerError))]
pub struct JsonBody<T>(pub T);

/// Query string parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(LedgerError))]
pub struct QueryParams<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(LedgerError))]
pub struct PathParams<T>(pub T);
