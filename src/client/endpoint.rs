//! Derivation of the WebSocket endpoint from a page origin.

use url::Url;

use crate::error::RealtimeError;

/// Builds the WebSocket URL for `path` on `origin`.
///
/// `http` maps to `ws` and `https` to `wss`; `ws`/`wss` origins are taken
/// as-is. Any path, query, or fragment on the origin is replaced.
///
/// # Errors
///
/// Returns [`RealtimeError::InvalidEndpoint`] if the origin does not parse
/// or uses another scheme.
pub fn websocket_url(origin: &str, path: &str) -> Result<String, RealtimeError> {
    let mut url = Url::parse(origin)
        .map_err(|e| RealtimeError::InvalidEndpoint(format!("{origin:?}: {e}")))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RealtimeError::InvalidEndpoint(format!(
                "unsupported scheme {other:?}"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| RealtimeError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;

    if path.starts_with('/') {
        url.set_path(path);
    } else {
        url.set_path(&format!("/{path}"));
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.into())
}
