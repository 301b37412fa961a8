//! Describes the failures which can occur when serving or fetching a cached value.
//!
//! The server side of the peer protocol translates each error into a status code via
//! [CacheError::status_code] and sends its message as plain text body. The client side reports
//! network problems and unexpected responses of a peer as [CacheError::Transport] or
//! [CacheError::Status]. None of these are retried.
use hyper::StatusCode;

/// Enumerates all errors raised by the cache core.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The request path doesn't consist of exactly a group name and a key.
    #[error("bad request")]
    BadRequest,

    /// No group with the given name is registered on this node.
    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// The group failed to produce a value. The message of the underlying error is kept as is.
    #[error("{0}")]
    Upstream(String),

    /// A request was routed to the peer handler which doesn't even match the base path.
    ///
    /// This indicates a wiring bug of the deployment rather than a misbehaving client.
    #[error("serving unexpected path: {0}")]
    UnexpectedPath(String),

    /// A peer couldn't be reached or its response couldn't be read.
    #[error("{0}")]
    Transport(String),

    /// A peer answered with a status other than 200.
    #[error("server returned: {0}")]
    Status(String),
}

impl CacheError {
    /// Returns the HTTP status code used to report this error to a peer.
    pub fn status_code(&self) -> StatusCode {
        match self {
            CacheError::BadRequest => StatusCode::BAD_REQUEST,
            CacheError::NoSuchGroup(_) => StatusCode::NOT_FOUND,
            CacheError::Transport(_) | CacheError::Status(_) => StatusCode::BAD_GATEWAY,
            CacheError::Upstream(_) | CacheError::UnexpectedPath(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
