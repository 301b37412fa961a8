//! Provides a builder which can be used to setup and initialize a ringcache node.
//!
//! This creates and sets up the central components of a node. As some of them are optional (or
//! might be replaced in tests), a builder permits to selectively enable or disable them.
//!
//! # Example
//! Setting up a node with all features enabled:
//! ```no_run
//! # use bytes::Bytes;
//! # use ringcache::builder::Builder;
//! # use ringcache::group::{Group, GetterFn, GroupRegistry};
//! # use ringcache::server::Server;
//! #[tokio::main]
//! async fn main() {
//!     // Enable all features and build the platform...
//!     let platform = Builder::new().enable_all().build().await;
//!
//!     // Register the groups of this node here...
//!     let _ = platform.require::<GroupRegistry>().register(Group::new(
//!         "scores",
//!         2 << 10,
//!         GetterFn(|key: &str| Ok(Bytes::from(key.to_owned()))),
//!     ));
//!
//!     // Start the main event loop of the server...
//!     platform.require::<Server>().event_loop().await;
//! }
//! ```
use std::sync::Arc;

use crate::group::GroupRegistry;
use crate::http::HttpPool;
use crate::platform::Platform;
use crate::server::Server;
use crate::{init_logging, RINGCACHE_REVISION, RINGCACHE_VERSION};

/// Initializes a node by creating and installing all enabled components.
#[derive(Default)]
pub struct Builder {
    setup_logging: bool,
    enable_signals: bool,
    setup_config: bool,
    setup_groups: bool,
    setup_server: bool,
}

impl Builder {
    /// Creates a new builder with all components disabled.
    pub fn new() -> Self {
        Builder::default()
    }

    /// Enables all features.
    ///
    /// Note that using this method (and then maybe disabling selected components) is quite
    /// convenient, but be aware that new components which might be added in a library update
    /// will then also be enabled by default.
    pub fn enable_all(mut self) -> Self {
        self.setup_logging = true;
        self.enable_signals = true;
        self.setup_config = true;
        self.setup_groups = true;
        self.setup_server = true;

        self
    }

    /// Enables the automatic setup of the logging system.
    ///
    /// This initializes **simplelog** to log to stdout, which is all that is needed when running
    /// in a container.
    pub fn enable_logging(mut self) -> Self {
        self.setup_logging = true;
        self
    }

    /// Disables the automatic setup of the logging system after [enable_all()](Builder::enable_all)
    /// has been used.
    pub fn disable_logging(mut self) -> Self {
        self.setup_logging = false;
        self
    }

    /// Installs a signal listener which terminates the node once **CTRL-C** or **SIGHUP**
    /// is received.
    ///
    /// For more details see: [signals](crate::signals)
    pub fn enable_signals(mut self) -> Self {
        self.enable_signals = true;
        self
    }

    /// Disables installing the signal listener after [enable_all()](Builder::enable_all)
    /// has been used.
    pub fn disable_signals(mut self) -> Self {
        self.enable_signals = false;
        self
    }

    /// Installs [config::Config](crate::config::Config) and loads the **settings.yml**.
    ///
    /// For more details see: [config](crate::config)
    pub fn enable_config(mut self) -> Self {
        self.setup_config = true;
        self
    }

    /// Disables setting up a **Config** instance after [enable_all()](Builder::enable_all)
    /// has been used.
    pub fn disable_config(mut self) -> Self {
        self.setup_config = false;
        self
    }

    /// Creates and installs a [GroupRegistry](crate::group::GroupRegistry).
    ///
    /// For more details see: [group](crate::group)
    pub fn enable_groups(mut self) -> Self {
        self.setup_groups = true;
        self
    }

    /// Disables setting up a **GroupRegistry** after [enable_all()](Builder::enable_all) has been
    /// used. Note that the registry is still installed if the server is enabled.
    pub fn disable_groups(mut self) -> Self {
        self.setup_groups = false;
        self
    }

    /// Creates and installs an [HttpPool](crate::http::HttpPool) along with a
    /// [Server](crate::server::Server) instance.
    ///
    /// Note that still, the main event loop has to be invoked manually via:
    /// `platform.require::<Server>().event_loop().await`.
    pub fn enable_server(mut self) -> Self {
        self.setup_server = true;
        self
    }

    /// Disables setting up the **HttpPool** and the **Server** after
    /// [enable_all()](Builder::enable_all) has been used.
    pub fn disable_server(mut self) -> Self {
        self.setup_server = false;
        self
    }

    /// Builds the [Platform](crate::platform::Platform) registry with all the enabled components
    /// being registered.
    pub async fn build(self) -> Arc<Platform> {
        let platform = Platform::new();

        if self.setup_logging {
            init_logging();
        }

        log::info!(
            "||. RINGCACHE (v {} - rev {}) running on {} core(s) in {} CPU(s)",
            RINGCACHE_VERSION,
            RINGCACHE_REVISION,
            num_cpus::get(),
            num_cpus::get_physical()
        );

        if self.enable_signals {
            crate::signals::install(platform.clone());
        }

        if self.setup_config {
            crate::config::install(platform.clone()).await;
        }

        if self.setup_groups || self.setup_server {
            let _ = GroupRegistry::install(&platform);
        }

        if self.setup_server {
            let _ = HttpPool::install(&platform);
            let _ = Server::install(&platform);
        }

        platform
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::Builder;
    use crate::group::GroupRegistry;
    use crate::http::HttpPool;
    use crate::peers::PeerPicker;
    use crate::server::Server;
    use crate::testing::test_async;

    #[test]
    fn only_enabled_components_are_installed() {
        test_async(async {
            let platform = Builder::new().enable_groups().build().await;
            assert_eq!(platform.find::<GroupRegistry>().is_some(), true);
            assert_eq!(platform.find::<HttpPool>().is_none(), true);
            assert_eq!(platform.find::<Server>().is_none(), true);
        });
    }

    #[test]
    fn the_server_brings_its_pool_and_registry() {
        test_async(async {
            let platform = Builder::new()
                .enable_all()
                .disable_config()
                .disable_signals()
                .disable_groups()
                .build()
                .await;

            let pool = platform.require::<HttpPool>();
            assert_eq!(pool.self_addr(), "http://0.0.0.0:8001");
            assert_eq!(pool.base_path(), "/_ringcache/");
            assert_eq!(pool.pick_peer("Tom").is_none(), true);
            assert_eq!(platform.find::<GroupRegistry>().is_some(), true);
            assert_eq!(platform.find::<Server>().is_some(), true);
        });
    }
}
