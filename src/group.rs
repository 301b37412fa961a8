//! Provides named cache namespaces (groups) and the registry which keeps them.
//!
//! A [Group] combines a byte budgeted [LRUStore](crate::lru::LRUStore) with a [Getter] which
//! loads a value on a cache miss. Once peers are registered via [Group::register_peers], a miss
//! for a key owned by another node is forwarded to that node instead of being loaded locally.
//! Values fetched from a peer are not cached locally, as the owner already keeps them.
//!
//! Note that concurrent misses for the same key are not deduplicated. Each of them invokes the
//! loader (or the owning peer).
//!
//! The [GroupRegistry] replaces any global lookup of groups. It is created once per node, kept in
//! the [Platform](crate::platform::Platform) and consulted by the [HttpPool](crate::http::HttpPool)
//! when serving requests of other peers.
//!
//! # Configuration
//! The memory budget of each group can be overwritten in the system config. This is re-applied
//! whenever the config changes:
//!
//! ```yaml
//! groups:
//!     scores:
//!         # Supports common suffixes like: k, m, g, t. Use 0 to disable the limit.
//!         max_memory: 64m
//! ```
//!
//! # Examples
//!
//! ```
//! # use ringcache::group::{Group, GetterFn};
//! # use bytes::Bytes;
//! # #[tokio::main]
//! # async fn main() {
//! let group = Group::new(
//!     "scores",
//!     2 << 10,
//!     GetterFn(|key: &str| match key {
//!         "Tom" => Ok(Bytes::from_static(b"630")),
//!         _ => Err(anyhow::anyhow!("{} not exist", key)),
//!     }),
//! );
//!
//! assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
//! assert_eq!(group.get("Sam").await.unwrap_err().to_string(), "Sam not exist");
//! # }
//! ```
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use yaml_rust::Yaml;

use crate::config::{Config, Handle};
use crate::error::CacheError;
use crate::fmt::{format_size, parse_size};
use crate::lru::{ByteView, LRUStore};
use crate::peers::PeerPicker;
use crate::platform::Platform;
use crate::spawn;

/// Specifies how long the config listener waits before re-checking if the platform is still
/// running.
const CONFIG_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Loads the value of a key on a cache miss.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Produces the value for the given key.
    ///
    /// The message of a returned error is reported verbatim to the requesting peer.
    async fn load(&self, key: &str) -> anyhow::Result<Bytes>;
}

/// Adapts a plain function or closure into a [Getter].
pub struct GetterFn<F>(pub F);

#[async_trait]
impl<F> Getter for GetterFn<F>
where
    F: Fn(&str) -> anyhow::Result<Bytes> + Send + Sync,
{
    async fn load(&self, key: &str) -> anyhow::Result<Bytes> {
        (self.0)(key)
    }
}

/// Represents a named cache namespace.
pub struct Group {
    name: String,
    getter: Box<dyn Getter>,
    main_cache: Mutex<LRUStore<ByteView>>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
}

impl Group {
    /// Creates a new group which caches up to **max_bytes** (0 means unlimited) of keys and values.
    pub fn new(name: impl Into<String>, max_bytes: usize, getter: impl Getter + 'static) -> Self {
        Group {
            name: name.into(),
            getter: Box::new(getter),
            main_cache: Mutex::new(LRUStore::new(max_bytes)),
            peers: OnceLock::new(),
        }
    }

    /// Returns the name of this group.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Installs the picker which determines the owning peer of a key.
    ///
    /// A picker can only be registered once.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> anyhow::Result<()> {
        self.peers.set(peers).map_err(|_| {
            anyhow::anyhow!("Peers of group {} have already been registered.", self.name)
        })
    }

    /// Returns the value for the given key.
    ///
    /// The local cache is consulted first. On a miss, the value is either fetched from the owning
    /// peer or loaded (and then cached) locally. If the owning peer fails, the value is loaded
    /// locally as well.
    pub async fn get(&self, key: &str) -> Result<ByteView, CacheError> {
        if key.is_empty() {
            return Err(CacheError::Upstream("key is required".to_owned()));
        }

        if let Some(value) = self.lookup(key) {
            log::debug!("[{}] cache hit for {}", self.name, key);
            return Ok(value);
        }

        self.load(key).await
    }

    async fn load(&self, key: &str) -> Result<ByteView, CacheError> {
        if let Some(peer) = self.peers.get().and_then(|peers| peers.pick_peer(key)) {
            match peer.get(&self.name, key).await {
                Ok(data) => return Ok(ByteView::from(data)),
                Err(error) => log::warn!(
                    "[{}] Failed to fetch {} from peer {}: {}",
                    self.name,
                    key,
                    peer.address(),
                    error
                ),
            }
        }

        self.load_locally(key).await
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView, CacheError> {
        let value = self
            .getter
            .load(key)
            .await
            .map(ByteView::from)
            .map_err(|error| CacheError::Upstream(error.to_string()))?;

        self.main_cache
            .lock()
            .unwrap()
            .add(key.to_owned(), value.clone());

        Ok(value)
    }

    fn lookup(&self, key: &str) -> Option<ByteView> {
        self.main_cache.lock().unwrap().get(key).cloned()
    }

    /// Returns the memory budget of the local cache.
    pub fn max_bytes(&self) -> usize {
        self.main_cache.lock().unwrap().max_bytes()
    }

    /// Changes the memory budget of the local cache, evicting entries if necessary.
    pub fn set_max_bytes(&self, max_bytes: usize) {
        self.main_cache.lock().unwrap().set_max_bytes(max_bytes);
    }

    /// Returns the number of locally cached entries.
    pub fn cached_entries(&self) -> usize {
        self.main_cache.lock().unwrap().len()
    }

    /// Returns the number of bytes occupied by the locally cached keys and values.
    pub fn cached_bytes(&self) -> usize {
        self.main_cache.lock().unwrap().bytes()
    }
}

/// Keeps all groups of a node by name.
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
    config: Option<Arc<Config>>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
}

impl GroupRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        GroupRegistry::default()
    }

    /// Creates an empty registry which applies the **groups** section of the given config to
    /// each group being registered.
    pub fn with_config(config: Arc<Config>) -> Self {
        GroupRegistry {
            groups: RwLock::new(HashMap::new()),
            config: Some(config),
            peers: OnceLock::new(),
        }
    }

    /// Creates and installs a **GroupRegistry** into the given **Platform**.
    ///
    /// If a [Config](crate::config::Config) is present, the memory budgets of all groups are
    /// kept in sync with it.
    pub fn install(platform: &Arc<Platform>) -> Arc<Self> {
        let config = platform.find::<Config>();
        let registry = Arc::new(match config.clone() {
            Some(config) => GroupRegistry::with_config(config),
            None => GroupRegistry::new(),
        });
        platform.register::<GroupRegistry>(registry.clone());

        if let Some(config) = config {
            run_config_listener(platform.clone(), registry.clone(), config);
        }

        registry
    }

    /// Installs the peer picker into all known groups and into every group registered later on.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> anyhow::Result<()> {
        self.peers
            .set(peers.clone())
            .map_err(|_| anyhow::anyhow!("Peers have already been registered."))?;

        for group in self.groups.read().unwrap().values() {
            attach_peers(group, peers.clone());
        }

        Ok(())
    }

    /// Registers the given group and returns a shared handle to it.
    ///
    /// A group with the same name is replaced.
    pub fn register(&self, group: Group) -> Arc<Group> {
        let group = Arc::new(group);
        if let Some(config) = &self.config {
            apply_group_config(&group, &config.current());
        }
        if let Some(peers) = self.peers.get() {
            attach_peers(&group, peers.clone());
        }

        let previous = self
            .groups
            .write()
            .unwrap()
            .insert(group.name().to_owned(), group.clone());
        if previous.is_some() {
            log::info!("Replaced group {}.", group.name());
        } else {
            log::info!(
                "Registered group {} ({}).",
                group.name(),
                format_size(group.max_bytes())
            );
        }

        group
    }

    /// Resolves the group with the given name.
    pub fn lookup(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().unwrap().get(name).cloned()
    }

    /// Lists the names of all known groups.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    fn apply_config(&self, handle: &Handle) {
        for group in self.groups.read().unwrap().values() {
            apply_group_config(group, handle);
        }
    }
}

fn attach_peers(group: &Group, peers: Arc<dyn PeerPicker>) {
    if let Err(error) = group.register_peers(peers) {
        log::warn!("{}", error);
    }
}

fn run_config_listener(platform: Arc<Platform>, registry: Arc<GroupRegistry>, config: Arc<Config>) {
    spawn!(async move {
        let mut config_changed = config.notifier();

        while platform.is_running() {
            match tokio::time::timeout(CONFIG_WAIT_TIMEOUT, config_changed.recv()).await {
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => return,
                Ok(_) => registry.apply_config(&config.current()),
                Err(_) => (),
            }
        }
    });
}

/// Applies the configured memory budget on the given group.
///
/// An invalid setting is logged and leaves the current budget untouched.
fn apply_group_config(group: &Group, handle: &Handle) {
    let setting = &handle.config()["groups"][group.name()]["max_memory"];
    let max_bytes = match setting {
        Yaml::BadValue | Yaml::Null => return,
        Yaml::Integer(value) if *value >= 0 => Ok(*value as usize),
        Yaml::String(value) => parse_size(value),
        other => Err(anyhow::anyhow!("Unexpected value: {:?}", other)),
    };

    match max_bytes {
        Ok(max_bytes) if max_bytes != group.max_bytes() => {
            log::info!(
                "Updating max_memory of {} from {} to {}.",
                group.name(),
                format_size(group.max_bytes()),
                format_size(max_bytes)
            );
            group.set_max_bytes(max_bytes);
        }
        Ok(_) => (),
        Err(error) => log::error!(
            "Not going to update {}. Failed to parse 'max_memory': {}",
            group.name(),
            error
        ),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::error::CacheError;
    use crate::group::{Group, GetterFn, GroupRegistry};
    use crate::peers::{PeerGetter, PeerPicker};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn scores(loads: Arc<AtomicUsize>) -> Group {
        Group::new(
            "scores",
            2 << 10,
            GetterFn(move |key: &str| {
                let _ = loads.fetch_add(1, Ordering::SeqCst);
                match key {
                    "Tom" => Ok(Bytes::from_static(b"630")),
                    "Jack" => Ok(Bytes::from_static(b"589")),
                    _ => Err(anyhow::anyhow!("{} not exist", key)),
                }
            }),
        )
    }

    struct FixedPeer {
        response: Result<Bytes, CacheError>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PeerGetter for FixedPeer {
        async fn get(&self, _group: &str, _key: &str) -> Result<Bytes, CacheError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            self.response.clone()
        }

        fn address(&self) -> &str {
            "http://remote:8001"
        }
    }

    struct AlwaysRemote(Arc<FixedPeer>);

    impl PeerPicker for AlwaysRemote {
        fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
            Some(self.0.clone())
        }
    }

    #[test]
    fn values_are_loaded_once_and_then_cached() {
        crate::testing::test_async(async {
            let loads = Arc::new(AtomicUsize::new(0));
            let group = scores(loads.clone());

            assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
            assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
            assert_eq!(loads.load(Ordering::SeqCst), 1);

            assert_eq!(group.get("Jack").await.unwrap().to_string(), "589");
            assert_eq!(loads.load(Ordering::SeqCst), 2);
            assert_eq!(group.cached_entries(), 2);
            assert_eq!(group.cached_bytes(), 3 + 3 + 4 + 3);
        });
    }

    #[test]
    fn loader_errors_are_reported_verbatim() {
        crate::testing::test_async(async {
            let group = scores(Arc::new(AtomicUsize::new(0)));

            assert_eq!(
                group.get("Sam").await,
                Err(CacheError::Upstream("Sam not exist".to_owned()))
            );
            assert_eq!(
                group.get("").await,
                Err(CacheError::Upstream("key is required".to_owned()))
            );
            assert_eq!(group.cached_entries(), 0);
        });
    }

    #[test]
    fn remote_keys_are_fetched_from_their_owner() {
        crate::testing::test_async(async {
            let loads = Arc::new(AtomicUsize::new(0));
            let group = scores(loads.clone());
            let peer = Arc::new(FixedPeer {
                response: Ok(Bytes::from_static(b"remote")),
                calls: AtomicUsize::new(0),
            });
            group
                .register_peers(Arc::new(AlwaysRemote(peer.clone())))
                .unwrap();

            assert_eq!(group.get("Tom").await.unwrap().to_string(), "remote");
            assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
            assert_eq!(loads.load(Ordering::SeqCst), 0);

            // The owner keeps the value, so it isn't cached here...
            assert_eq!(group.cached_entries(), 0);
        });
    }

    #[test]
    fn failing_peers_fall_back_to_the_local_loader() {
        crate::testing::test_async(async {
            let loads = Arc::new(AtomicUsize::new(0));
            let group = scores(loads.clone());
            let peer = Arc::new(FixedPeer {
                response: Err(CacheError::Transport("connection refused".to_owned())),
                calls: AtomicUsize::new(0),
            });
            group
                .register_peers(Arc::new(AlwaysRemote(peer.clone())))
                .unwrap();

            assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
            assert_eq!(peer.calls.load(Ordering::SeqCst), 1);
            assert_eq!(loads.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn peers_can_only_be_registered_once() {
        let group = scores(Arc::new(AtomicUsize::new(0)));
        let peer = Arc::new(FixedPeer {
            response: Ok(Bytes::new()),
            calls: AtomicUsize::new(0),
        });

        assert_eq!(
            group
                .register_peers(Arc::new(AlwaysRemote(peer.clone())))
                .is_ok(),
            true
        );
        assert_eq!(
            group.register_peers(Arc::new(AlwaysRemote(peer))).is_err(),
            true
        );
    }

    #[test]
    fn registry_resolves_groups_by_name() {
        let registry = GroupRegistry::new();
        let _ = registry.register(scores(Arc::new(AtomicUsize::new(0))));

        assert_eq!(registry.lookup("scores").unwrap().name(), "scores");
        assert_eq!(registry.lookup("unknown").is_none(), true);
        assert_eq!(registry.names(), vec!["scores".to_owned()]);
    }

    #[test]
    fn registry_hands_peers_to_all_groups() {
        crate::testing::test_async(async {
            let loads = Arc::new(AtomicUsize::new(0));
            let peer = Arc::new(FixedPeer {
                response: Ok(Bytes::from_static(b"remote")),
                calls: AtomicUsize::new(0),
            });

            let registry = GroupRegistry::new();
            let early = registry.register(scores(loads.clone()));
            registry
                .register_peers(Arc::new(AlwaysRemote(peer.clone())))
                .unwrap();
            let late = registry.register(Group::new(
                "late",
                0,
                GetterFn(|_: &str| Ok(Bytes::from_static(b"local"))),
            ));

            assert_eq!(early.get("Tom").await.unwrap().to_string(), "remote");
            assert_eq!(late.get("Tom").await.unwrap().to_string(), "remote");
            assert_eq!(peer.calls.load(Ordering::SeqCst), 2);
            assert_eq!(loads.load(Ordering::SeqCst), 0);
            assert_eq!(
                registry
                    .register_peers(Arc::new(AlwaysRemote(peer)))
                    .is_err(),
                true
            );
        });
    }

    #[test]
    fn configured_budgets_are_applied() {
        let config = Arc::new(Config::new("test_settings.yml"));
        config
            .load_from_string("groups:\n  scores:\n    max_memory: 1k\n", None)
            .unwrap();

        let registry = GroupRegistry::with_config(config.clone());
        let group = registry.register(scores(Arc::new(AtomicUsize::new(0))));
        assert_eq!(group.max_bytes(), 1024);

        config
            .load_from_string("groups:\n  scores:\n    max_memory: 16\n", None)
            .unwrap();
        registry.apply_config(&config.current());
        assert_eq!(group.max_bytes(), 16);

        // An invalid setting leaves the budget untouched...
        config
            .load_from_string("groups:\n  scores:\n    max_memory: lots\n", None)
            .unwrap();
        registry.apply_config(&config.current());
        assert_eq!(group.max_bytes(), 16);
    }
}
