//! Request extractors with the status codes clients expect.
//!
//! Axum's own `Json` and `Path` rejections answer with `415`/`422` and
//! `400`; here an empty or malformed body is always `400` and an id that is
//! not a positive integer is `404`, exactly like an id nothing is bound to.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use settlers_types::{ObjectId, ParseObjectIdError};

use crate::error::ApiError;

/// A JSON request body. Any content type is accepted.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::BadRequest(format!("unreadable body: {e}")))?;
        parse_body(&bytes).map(JsonBody)
    }
}

/// Parse a JSON body, refusing empty ones.
pub fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest(String::from("request body is empty")));
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::BadRequest(format!("invalid body: {e}")))
}

/// Parse an id taken from the path.
pub fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    raw.parse()
        .map_err(|e: ParseObjectIdError| ApiError::NotFound(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use settlers_types::NewGame;

    use super::*;

    #[test]
    fn empty_body_is_a_bad_request() {
        assert!(matches!(parse_body::<NewGame>(b""), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_body::<NewGame>(b"  \n"), Err(ApiError::BadRequest(_))));
        assert!(matches!(parse_body::<NewGame>(b"{"), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn empty_object_is_accepted() {
        let game: NewGame = parse_body(b"{}").unwrap();
        assert!(game.players.is_none());
    }

    #[test]
    fn ids_parse_or_are_not_found() {
        assert_eq!(parse_id("12").unwrap(), ObjectId::from_raw(12).unwrap());
        assert!(matches!(parse_id("0"), Err(ApiError::NotFound(_))));
        assert!(matches!(parse_id("abc"), Err(ApiError::NotFound(_))));
    }
}
