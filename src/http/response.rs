//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hand the origin's status and headers to the client
//! - Stream the body without buffering it
//! - Log failures that happen after the status line is out
//!
//! # Design Decisions
//! - `transfer-encoding` is dropped; the local server owns message framing
//! - A streaming failure cannot change the status already sent, so it is only
//!   logged and the connection is cut

use axum::body::Body;
use axum::http::header::TRANSFER_ENCODING;
use axum::http::Response;
use futures_util::TryStreamExt;

pub fn into_client_response(upstream: Response<Body>) -> Response<Body> {
    let (mut parts, body) = upstream.into_parts();
    parts.headers.remove(TRANSFER_ENCODING);

    let status = parts.status;
    let stream = body.into_data_stream().inspect_err(move |e| {
        tracing::error!(status = %status, error = %e, "Failed to copy response body");
    });

    Response::from_parts(parts, Body::from_stream(stream))
}
