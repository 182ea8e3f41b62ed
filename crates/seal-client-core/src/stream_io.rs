//! Body read helpers for hyper responses.

use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;

use crate::error::{ClientError, Result};

/// Read a whole response body, refusing anything larger than `max_bytes`.
pub async fn read_body(body: Incoming, max_bytes: usize) -> Result<Bytes> {
    match Limited::new(body, max_bytes).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<http_body_util::LengthLimitError>().is_some() => {
            Err(ClientError::BodyTooLarge(max_bytes))
        }
        Err(e) => Err(ClientError::Body(e.to_string())),
    }
}
