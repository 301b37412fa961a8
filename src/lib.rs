//! ringcache is a distributed, size constrained key/value cache.
//!
//! # Introduction
//! Each node of a **ringcache** cluster keeps a set of named **groups**. A group is a cache
//! namespace which is backed by a byte budgeted LRU store and a loader which knows how to
//! produce a value on a cache miss. The cluster itself is a set of peers which agree on key
//! ownership via a **consistent hashing ring**. Therefore a key is only ever loaded and cached by
//! a single node. Every other node which receives a lookup for this key forwards it to its owner
//! via a tiny HTTP based protocol.
//!
//! # Features
//! * **Consistent hashing** with virtual nodes (see [consistenthash]). Adding a node only moves
//!   the keys which now land on one of its virtual nodes.
//! * **Byte budgeted LRU store** (see [lru]) which evicts the least recently used entries once
//!   the sum of key and value lengths exceeds its budget. Evictions can be observed via a callback.
//! * **Peer routing** (see [http]) which decides whether a key is served locally or forwarded to
//!   the owning peer. Both the server and the client side of the protocol are provided.
//! * **Reload-aware config facility** (see [config]) which permits to change the peer set or the
//!   memory budgets of groups during operation.
//!
//! # Protocol
//! A peer serves `GET <base_path><group>/<key>` (both parts are URL escaped). A successful lookup
//! answers with **200** and the raw value as `application/octet-stream`. A malformed path yields
//! **400**, an unknown group **404** and a failing loader **500** with the error message as body.
//!
//! # Examples
//! A complete node can be found in **ringcache-node**. A short example on how to initialize the
//! library can be found here [Builder](builder::Builder).
#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_results
)]
use simplelog::{format_description, ConfigBuilder, LevelFilter, SimpleLogger};
use std::sync::Once;

pub mod builder;
pub mod config;
pub mod consistenthash;
pub mod error;
pub mod fmt;
pub mod group;
pub mod http;
pub mod lru;
pub mod peers;
pub mod platform;
pub mod server;
pub mod signals;

/// Contains the version of the ringcache library.
pub const RINGCACHE_VERSION: &str = "DEVELOPMENT-SNAPSHOT";

/// Contains the git commit hash of the ringcache build being used.
pub const RINGCACHE_REVISION: &str = "NO-REVISION";

/// Initializes the logging system.
///
/// Note that most probably the simplest way is to use a [Builder](builder::Builder) to set up the
/// framework, which will also set up logging if enabled.
pub fn init_logging() {
    static INIT_LOGGING: Once = Once::new();

    // Tests build several platforms within one process, so this must only ever run once...
    INIT_LOGGING.call_once(|| {
        if let Err(error) = SimpleLogger::init(
            LevelFilter::Debug,
            ConfigBuilder::new()
                .set_time_format_custom(format_description!(
                    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]"
                ))
                .set_thread_level(LevelFilter::Trace)
                .set_target_level(LevelFilter::Error)
                .set_location_level(LevelFilter::Trace)
                .build(),
        ) {
            panic!("Failed to initialize logging system: {}", error);
        }
    });
}

/// Provides a simple macro to execute an async lambda within `tokio::spawn`.
///
/// The returned join handle is dropped, so the task runs detached.
///
/// # Example
/// ```rust
/// # #[macro_use] extern crate ringcache;
/// # #[tokio::main]
/// # async fn main() {
/// spawn!(async move {
///     // perform some async stuff here...
/// });
/// # }
/// ```
#[macro_export]
macro_rules! spawn {
    ($e:expr) => {{
        std::mem::drop(tokio::spawn($e));
    }};
}

#[cfg(test)]
mod testing {
    use std::sync::Mutex;

    lazy_static::lazy_static! {
        /// Guards the local ports on which tests start peer servers. Tests which bind a socket
        /// acquire this lock, everything else keeps running in parallel.
        pub static ref SHARED_TEST_RESOURCES: Mutex<()> = Mutex::new(());
    }

    /// Executes async code within a single threaded tokio runtime.
    pub fn test_async<F: std::future::Future>(future: F) {
        use tokio::runtime;

        let rt = runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let _ = rt.block_on(future);
    }
}
