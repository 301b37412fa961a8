use crate::lru::ByteSize;
use bytes::Bytes;
use std::fmt;

/// Provides an immutable view on a cached value.
///
/// Internally this is a reference counted [Bytes](bytes::Bytes) buffer, so handing a value out of
/// the cache (or into an HTTP response) never copies the underlying data.
///
/// # Examples
/// ```
/// # use ringcache::lru::ByteView;
/// let view = ByteView::from("630");
/// assert_eq!(view.len(), 3);
/// assert_eq!(view.as_slice(), b"630");
/// assert_eq!(view.to_string(), "630");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Returns the length of the value in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Determines if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Provides read access to the raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Returns a copy of the raw bytes which can be freely modified.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Returns the underlying buffer (without copying it).
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl ByteSize for ByteView {
    fn byte_len(&self) -> usize {
        self.data.len()
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        ByteView { data }
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        ByteView { data: data.into() }
    }
}

impl From<String> for ByteView {
    fn from(data: String) -> Self {
        ByteView { data: data.into() }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        ByteView {
            data: Bytes::copy_from_slice(data.as_bytes()),
        }
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.data))
    }
}
