//! Provides the HTTP based peer protocol.
//!
//! The [HttpPool] owns the cluster membership (as [HashRing]) along with one [HttpGetter] per
//! peer. It decides which peer owns a key ([PeerPicker]) and serves the requests other peers send
//! to this node. An [HttpGetter] is the client side which fetches a value from a remote peer.
//!
//! A request is a plain `GET <base_path><group>/<key>` where both, the group name and the key
//! are URL escaped. The answers are:
//! * **200** with the raw value as `application/octet-stream`
//! * **400** if the path doesn't contain a group and a key
//! * **404** with `no such group: <name>` if the group is unknown
//! * **500** with the error message of the group if the value cannot be produced
//!
//! # Configuration
//! ```yaml
//! cluster:
//!     # The base URL of this node as it is listed in "peers".
//!     self: http://10.0.0.1:8001
//!     peers:
//!         - http://10.0.0.1:8001
//!         - http://10.0.0.2:8001
//!     base_path: /_ringcache/
//!     timeout: 5s
//! ```
//!
//! The list of peers is re-applied whenever the config changes. All other settings are only read
//! on startup.
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::client::HttpConnector;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use yaml_rust::Yaml;

use crate::config::{Config, Handle};
use crate::consistenthash::HashRing;
use crate::error::CacheError;
use crate::fmt::parse_duration;
use crate::group::GroupRegistry;
use crate::lru::ByteView;
use crate::peers::{PeerGetter, PeerPicker};
use crate::platform::Platform;
use crate::spawn;

/// Contains the path prefix which is used if no other is configured.
pub const DEFAULT_BASE_PATH: &str = "/_ringcache/";

/// Contains the number of virtual nodes each peer places on the ring.
pub const DEFAULT_REPLICAS: usize = 50;

/// Contains the time a peer may take to answer a request if no other timeout is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Specifies how long the config listener waits before re-checking if the platform is still
/// running.
const CONFIG_WAIT_TIMEOUT: Duration = Duration::from_millis(500);

type HttpClient = Client<HttpsConnector<HttpConnector>>;

/// Fetches values from a single remote peer.
pub struct HttpGetter {
    base_url: String,
    client: HttpClient,
    timeout: Duration,
}

impl HttpGetter {
    /// Creates a getter for the given base URL which already contains the base path
    /// (e.g. `http://10.0.0.2:8001/_ringcache/`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        HttpGetter::with_client(base_url, new_client(), timeout)
    }

    fn with_client(base_url: impl Into<String>, client: HttpClient, timeout: Duration) -> Self {
        HttpGetter {
            base_url: base_url.into(),
            client,
            timeout,
        }
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, CacheError> {
        let uri = Uri::from_str(url)
            .map_err(|error| CacheError::Transport(format!("invalid url {}: {}", url, error)))?;
        let response = self
            .client
            .get(uri)
            .await
            .map_err(|error| CacheError::Transport(error.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(CacheError::Status(response.status().to_string()));
        }

        hyper::body::to_bytes(response.into_body())
            .await
            .map_err(|error| CacheError::Transport(format!("reading response body: {}", error)))
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    async fn get(&self, group: &str, key: &str) -> Result<Bytes, CacheError> {
        let url = format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        );

        match tokio::time::timeout(self.timeout, self.fetch(&url)).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Transport(format!(
                "request to {} timed out after {}ms",
                url,
                self.timeout.as_millis()
            ))),
        }
    }

    fn address(&self) -> &str {
        &self.base_url
    }
}

fn new_client() -> HttpClient {
    Client::builder().build::<_, Body>(HttpsConnector::new())
}

struct PeerSet {
    ring: HashRing,
    getters: HashMap<String, Arc<dyn PeerGetter>>,
    addresses: Vec<String>,
}

impl PeerSet {
    fn empty() -> Self {
        PeerSet {
            ring: HashRing::with_replicas(DEFAULT_REPLICAS),
            getters: HashMap::new(),
            addresses: Vec::new(),
        }
    }
}

/// Routes keys to their owning peers and serves the requests of other peers.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use ringcache::group::GroupRegistry;
/// # use ringcache::http::HttpPool;
/// # use ringcache::peers::PeerPicker;
/// let registry = Arc::new(GroupRegistry::new());
/// let pool = HttpPool::new("http://10.0.0.1:8001", &registry);
///
/// // Without any peers, everything is served locally...
/// assert_eq!(pool.pick_peer("Tom").is_none(), true);
///
/// pool.set_peers(&["http://10.0.0.1:8001", "http://10.0.0.2:8001"]).unwrap();
/// assert_eq!(pool.peers().len(), 2);
///
/// // A peer list which doesn't contain the node itself is rejected...
/// assert_eq!(pool.set_peers(&["http://10.0.0.2:8001"]).is_err(), true);
/// ```
pub struct HttpPool {
    self_addr: String,
    base_path: String,
    timeout: Duration,
    client: HttpClient,
    peers: Mutex<PeerSet>,
    registry: Weak<GroupRegistry>,
}

impl HttpPool {
    /// Creates a pool for the node with the given base URL which serves the groups of the given
    /// registry.
    ///
    /// The pool starts without any peers so that every key is served locally until
    /// [set_peers](HttpPool::set_peers) is invoked.
    pub fn new(self_addr: impl Into<String>, registry: &Arc<GroupRegistry>) -> Self {
        HttpPool {
            self_addr: self_addr.into(),
            base_path: DEFAULT_BASE_PATH.to_owned(),
            timeout: DEFAULT_TIMEOUT,
            client: new_client(),
            peers: Mutex::new(PeerSet::empty()),
            registry: Arc::downgrade(registry),
        }
    }

    /// Replaces the path prefix of the protocol. This has to be called before any peer is set.
    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Replaces the timeout applied when fetching values from peers. This has to be called
    /// before any peer is set.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL of this node.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Returns the path prefix of the protocol.
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Lists the addresses of all peers (including this node) as given to the last
    /// [set_peers](HttpPool::set_peers).
    pub fn peers(&self) -> Vec<String> {
        self.peers.lock().unwrap().addresses.clone()
    }

    /// Replaces the cluster membership.
    ///
    /// Both the ring and the peer getters are rebuilt from scratch and then swapped in as a whole,
    /// so that a concurrent [pick_peer](PeerPicker::pick_peer) either sees the old or the new
    /// membership.
    ///
    /// A non-empty peer list has to contain the address of this node itself. Otherwise the keys
    /// owned by this node would be forwarded to itself over and over again. Such a list is
    /// rejected and the current membership is kept.
    pub fn set_peers<S: AsRef<str>>(&self, peers: &[S]) -> anyhow::Result<()> {
        if !peers.is_empty() && !peers.iter().any(|peer| peer.as_ref() == self.self_addr) {
            return Err(anyhow::anyhow!(
                "Refusing to use the peers {} as they do not contain this node ({}).",
                peers
                    .iter()
                    .map(|peer| peer.as_ref())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.self_addr
            ));
        }

        let mut ring = HashRing::with_replicas(DEFAULT_REPLICAS);
        ring.add(peers);

        let mut getters = HashMap::with_capacity(peers.len());
        let mut addresses = Vec::with_capacity(peers.len());
        for peer in peers {
            let peer = peer.as_ref();
            let getter: Arc<dyn PeerGetter> = Arc::new(HttpGetter::with_client(
                format!("{}{}", peer, self.base_path),
                self.client.clone(),
                self.timeout,
            ));
            let _ = getters.insert(peer.to_owned(), getter);
            addresses.push(peer.to_owned());
        }

        log::info!(
            "[Server {}] Using {} peer(s): {}",
            self.self_addr,
            addresses.len(),
            addresses.join(", ")
        );

        *self.peers.lock().unwrap() = PeerSet {
            ring,
            getters,
            addresses,
        };

        Ok(())
    }

    /// Serves a request sent by another peer (or any other HTTP client).
    ///
    /// The method of the request is not checked. Errors are reported with the status code of the
    /// respective [CacheError] and its message as plain text body.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let path = request.uri().path().to_owned();
        log::debug!(
            "[Server {}] {} {}",
            self.self_addr,
            request.method(),
            &path
        );

        match self.serve(&path).await {
            Ok(value) => {
                let mut response = Response::new(Body::from(value.bytes()));
                let _ = response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                response
            }
            Err(error) => {
                if let CacheError::UnexpectedPath(_) = error {
                    log::error!("[Server {}] {}", self.self_addr, error);
                }

                let mut response = Response::new(Body::from(error.to_string()));
                *response.status_mut() = error.status_code();
                let _ = response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; charset=utf-8"),
                );
                response
            }
        }
    }

    async fn serve(&self, path: &str) -> Result<ByteView, CacheError> {
        let (group_name, key) = parse_route(&self.base_path, path)?;
        let group = self
            .registry
            .upgrade()
            .and_then(|registry| registry.lookup(&group_name))
            .ok_or(CacheError::NoSuchGroup(group_name))?;

        group.get(&key).await
    }

    /// Creates and installs an **HttpPool** into the given **Platform**.
    ///
    /// Requires a [GroupRegistry] to be present. The pool is handed to all of its groups as peer
    /// picker. If a [Config](crate::config::Config) is present, the **cluster** section is applied
    /// and the peers are kept in sync with it.
    pub fn install(platform: &Arc<Platform>) -> Arc<Self> {
        let registry = platform.require::<GroupRegistry>();
        let config = platform.find::<Config>();
        let handle = config.as_ref().map(|config| config.current());

        let pool = Arc::new(
            HttpPool::new(configured_self_addr(handle.as_ref()), &registry)
                .with_base_path(
                    handle
                        .as_ref()
                        .and_then(|handle| handle.query("cluster.base_path").as_str())
                        .unwrap_or(DEFAULT_BASE_PATH),
                )
                .with_timeout(request_timeout(handle.as_ref())),
        );
        platform.register::<HttpPool>(pool.clone());

        if let Err(error) = registry.register_peers(pool.clone()) {
            log::error!("Cannot install the peer pool: {}", error);
        }

        if let Some(config) = config {
            pool.apply_config(&config.current());
            run_config_listener(platform.clone(), pool.clone(), config);
        }

        pool
    }

    fn apply_config(&self, handle: &Handle) {
        let peers: Vec<String> = match handle.query("cluster.peers") {
            Yaml::Array(peers) => peers
                .iter()
                .filter_map(|peer| peer.as_str())
                .map(|peer| peer.to_owned())
                .collect(),
            _ => Vec::new(),
        };

        if peers != self.peers() {
            if let Err(error) = self.set_peers(&peers) {
                log::error!(
                    "[Server {}] {} Check cluster.self and cluster.peers.",
                    self.self_addr,
                    error
                );
            }
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let peers = self.peers.lock().unwrap();
        match peers.ring.get(key) {
            Some(owner) if owner != self.self_addr => {
                log::debug!("[Server {}] Pick peer {}", self.self_addr, owner);
                peers.getters.get(owner).cloned()
            }
            _ => None,
        }
    }
}

/// Splits a request path into the (unescaped) group name and key.
fn parse_route(base_path: &str, path: &str) -> Result<(String, String), CacheError> {
    let route = path
        .strip_prefix(base_path)
        .ok_or_else(|| CacheError::UnexpectedPath(path.to_owned()))?;
    let (group, key) = route.split_once('/').ok_or(CacheError::BadRequest)?;

    Ok((unescape(group)?, unescape(key)?))
}

fn unescape(value: &str) -> Result<String, CacheError> {
    urlencoding::decode(value)
        .map(|value| value.into_owned())
        .map_err(|_| CacheError::BadRequest)
}

fn configured_self_addr(handle: Option<&Handle>) -> String {
    match handle.and_then(|handle| handle.query("cluster.self").as_str()) {
        Some(addr) => addr.to_owned(),
        None => {
            let (host, port) = crate::server::host_and_port(handle);
            format!("http://{}:{}", host, port)
        }
    }
}

fn request_timeout(handle: Option<&Handle>) -> Duration {
    let setting = match handle {
        Some(handle) => handle.query("cluster.timeout"),
        None => return DEFAULT_TIMEOUT,
    };

    match setting {
        Yaml::Integer(millis) if *millis > 0 => Duration::from_millis(*millis as u64),
        Yaml::String(expression) => parse_duration(expression).unwrap_or_else(|error| {
            log::error!("Invalid cluster.timeout: {}", error);
            DEFAULT_TIMEOUT
        }),
        _ => DEFAULT_TIMEOUT,
    }
}

fn run_config_listener(platform: Arc<Platform>, pool: Arc<HttpPool>, config: Arc<Config>) {
    spawn!(async move {
        let mut config_changed = config.notifier();

        while platform.is_running() {
            match tokio::time::timeout(CONFIG_WAIT_TIMEOUT, config_changed.recv()).await {
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => return,
                Ok(_) => pool.apply_config(&config.current()),
                Err(_) => (),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use crate::config::Config;
    use crate::consistenthash::HashRing;
    use crate::error::CacheError;
    use crate::group::{GetterFn, Group, GroupRegistry};
    use crate::http::{parse_route, HttpGetter, HttpPool, DEFAULT_REPLICAS};
    use crate::peers::{PeerGetter, PeerPicker};
    use crate::testing::test_async;
    use bytes::Bytes;
    use hyper::service::{make_service_fn, service_fn};
    use hyper::{Body, Request, StatusCode};
    use std::convert::Infallible;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> Arc<GroupRegistry> {
        let registry = Arc::new(GroupRegistry::new());
        let _ = registry.register(Group::new(
            "scores",
            2 << 10,
            GetterFn(|key: &str| match key {
                "Tom" => Ok(Bytes::from_static(b"630")),
                "Jack" => Ok(Bytes::from_static(b"589")),
                "Sam" => Ok(Bytes::from_static(b"567")),
                _ => Err(anyhow::anyhow!("{} not exist", key)),
            }),
        ));
        let _ = registry.register(Group::new(
            "echo",
            0,
            GetterFn(|key: &str| Ok(Bytes::from(key.to_owned()))),
        ));

        registry
    }

    async fn request(pool: &HttpPool, path: &str) -> (StatusCode, String) {
        let response = pool
            .handle(Request::get(path).body(Body::empty()).unwrap())
            .await;
        let status = response.status();
        let body = hyper::body::to_bytes(response.into_body()).await.unwrap();

        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn routes_are_split_into_group_and_key() {
        assert_eq!(
            parse_route("/_ringcache/", "/_ringcache/scores/Tom"),
            Ok(("scores".to_owned(), "Tom".to_owned()))
        );
        assert_eq!(
            parse_route("/_ringcache/", "/_ringcache/scores/a%20b%2Fc/d"),
            Ok(("scores".to_owned(), "a b/c/d".to_owned()))
        );
        assert_eq!(
            parse_route("/_ringcache/", "/_ringcache/scores/"),
            Ok(("scores".to_owned(), "".to_owned()))
        );
        assert_eq!(
            parse_route("/_ringcache/", "/_ringcache/scores"),
            Err(CacheError::BadRequest)
        );
        assert_eq!(
            parse_route("/_ringcache/", "/other/scores/Tom"),
            Err(CacheError::UnexpectedPath("/other/scores/Tom".to_owned()))
        );
    }

    #[test]
    fn keys_are_routed_to_their_owner() {
        let registry = registry();
        let pool = HttpPool::new("A", &registry);
        pool.set_peers(&["A", "B"]).unwrap();

        let mut ring = HashRing::with_replicas(DEFAULT_REPLICAS);
        ring.add(&["A", "B"]);

        let mut remote = 0;
        let mut local = 0;
        for i in 0..100 {
            let key = format!("key-{}", i);
            match pool.pick_peer(&key) {
                Some(peer) => {
                    assert_eq!(ring.get(&key), Some("B"));
                    assert_eq!(peer.address(), "B/_ringcache/");
                    remote += 1;
                }
                None => {
                    assert_eq!(ring.get(&key), Some("A"));
                    local += 1;
                }
            }
        }

        assert_eq!(remote > 0, true);
        assert_eq!(local > 0, true);
    }

    #[test]
    fn replacing_peers_takes_effect_immediately() {
        let registry = registry();
        let pool = HttpPool::new("A", &registry);
        assert_eq!(pool.pick_peer("Tom").is_none(), true);

        pool.set_peers(&["A", "B"]).unwrap();
        assert_eq!(pool.peers(), vec!["A".to_owned(), "B".to_owned()]);
        assert_eq!(
            (0..100).any(|i| pool.pick_peer(&format!("key-{}", i)).is_some()),
            true
        );

        pool.set_peers(&["A"]).unwrap();
        assert_eq!(
            (0..100).all(|i| pool.pick_peer(&format!("key-{}", i)).is_none()),
            true
        );
        assert_eq!(pool.peers(), vec!["A".to_owned()]);
    }

    #[test]
    fn peer_lists_without_this_node_are_rejected() {
        let registry = registry();
        let pool = HttpPool::new("http://0.0.0.0:8001", &registry);

        // The node would otherwise forward the keys it owns to its own routable address...
        assert_eq!(pool.set_peers(&["http://127.0.0.1:8001"]).is_err(), true);
        assert_eq!(pool.peers().is_empty(), true);
        assert_eq!(
            (0..100).all(|i| pool.pick_peer(&format!("key-{}", i)).is_none()),
            true
        );

        // The same applies to a config which doesn't list cluster.self...
        let config = Config::new("test_settings.yml");
        config
            .load_from_string(
                "cluster:\n  peers:\n    - http://127.0.0.1:8001\n    - http://10.0.0.2:8001\n",
                None,
            )
            .unwrap();
        pool.apply_config(&config.current());
        assert_eq!(pool.peers().is_empty(), true);

        // ..whereas an empty list is fine and serves everything locally.
        assert_eq!(pool.set_peers::<&str>(&[]).is_ok(), true);
    }

    #[test]
    fn lookups_never_observe_a_partially_replaced_membership() {
        let registry = registry();
        let pool = HttpPool::new("A", &registry);
        pool.set_peers(&["A", "B"]).unwrap();

        let mut with_b = HashRing::with_replicas(DEFAULT_REPLICAS);
        with_b.add(&["A", "B"]);
        let mut with_c = HashRing::with_replicas(DEFAULT_REPLICAS);
        with_c.add(&["A", "C"]);

        std::thread::scope(|scope| {
            let writer = scope.spawn(|| {
                for round in 0..200 {
                    if round % 2 == 0 {
                        pool.set_peers(&["A", "C"]).unwrap();
                    } else {
                        pool.set_peers(&["A", "B"]).unwrap();
                    }
                }
            });

            for _ in 0..4 {
                let _ = scope.spawn(|| {
                    for i in 0..2000 {
                        let key = format!("key-{}", i % 100);
                        match pool.pick_peer(&key).map(|peer| peer.address().to_owned()) {
                            Some(address) if address == "B/_ringcache/" => {
                                assert_eq!(with_b.get(&key), Some("B"))
                            }
                            Some(address) if address == "C/_ringcache/" => {
                                assert_eq!(with_c.get(&key), Some("C"))
                            }
                            Some(address) => panic!("Unexpected peer {}", address),
                            None => assert_eq!(
                                with_b.get(&key) == Some("A") || with_c.get(&key) == Some("A"),
                                true
                            ),
                        }
                    }
                });
            }

            writer.join().unwrap();
        });
    }

    #[test]
    fn peers_are_read_from_the_config() {
        let registry = registry();
        let pool = HttpPool::new("http://a:8001", &registry).with_base_path("/cache/");
        let config = Config::new("test_settings.yml");
        config
            .load_from_string(
                "cluster:\n  peers:\n    - http://a:8001\n    - http://b:8001\n",
                None,
            )
            .unwrap();

        pool.apply_config(&config.current());
        assert_eq!(
            pool.peers(),
            vec!["http://a:8001".to_owned(), "http://b:8001".to_owned()]
        );
        assert_eq!(
            pool.pick_peer("Tom")
                .map(|peer| peer.address().starts_with("http://b:8001/cache/"))
                .unwrap_or(true),
            true
        );

        config.load_from_string("cluster: {}", None).unwrap();
        pool.apply_config(&config.current());
        assert_eq!(pool.peers().is_empty(), true);
    }

    #[test]
    fn requests_are_answered_with_proper_status_codes() {
        test_async(async {
            let registry = registry();
            let pool = HttpPool::new("http://localhost:8001", &registry);

            assert_eq!(
                request(&pool, "/_ringcache/scores/Tom").await,
                (StatusCode::OK, "630".to_owned())
            );
            assert_eq!(
                request(&pool, "/_ringcache/echo/a%20b%2Fc").await,
                (StatusCode::OK, "a b/c".to_owned())
            );
            assert_eq!(
                request(&pool, "/_ringcache/scores").await,
                (StatusCode::BAD_REQUEST, "bad request".to_owned())
            );
            assert_eq!(
                request(&pool, "/_ringcache/unknown/Tom").await,
                (StatusCode::NOT_FOUND, "no such group: unknown".to_owned())
            );
            assert_eq!(
                request(&pool, "/_ringcache/scores/Kate").await,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Kate not exist".to_owned()
                )
            );
            assert_eq!(
                request(&pool, "/_ringcache/scores/").await,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "key is required".to_owned()
                )
            );
            assert_eq!(
                request(&pool, "/elsewhere/scores/Tom").await,
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "serving unexpected path: /elsewhere/scores/Tom".to_owned()
                )
            );
        });
    }

    #[test]
    fn successful_responses_carry_raw_bytes() {
        test_async(async {
            let registry = registry();
            let pool = HttpPool::new("http://localhost:8001", &registry);

            let response = pool
                .handle(
                    Request::get("/_ringcache/scores/Jack")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await;
            assert_eq!(
                response
                    .headers()
                    .get(hyper::header::CONTENT_TYPE)
                    .unwrap()
                    .to_str()
                    .unwrap(),
                "application/octet-stream"
            );
        });
    }

    #[test]
    fn values_can_be_fetched_from_a_remote_peer() {
        // We want exclusive access to the 7979 port on which we fire up a peer...
        log::info!("Acquiring shared resources...");
        let _guard = crate::testing::SHARED_TEST_RESOURCES.lock().unwrap();
        log::info!("Successfully acquired shared resources.");

        test_async(async {
            let registry = registry();
            let pool = Arc::new(HttpPool::new("http://127.0.0.1:7979", &registry));

            let server_addr: SocketAddr = "127.0.0.1:7979"
                .parse::<SocketAddr>()
                .expect("Unable to parse socket address");
            let served_pool = pool.clone();
            let make_svc = make_service_fn(move |_conn| {
                let pool = served_pool.clone();
                async move {
                    Ok::<_, Infallible>(service_fn(move |req| {
                        let pool = pool.clone();
                        async move { Ok::<_, Infallible>(pool.handle(req).await) }
                    }))
                }
            });
            let server = hyper::server::Server::try_bind(&server_addr)
                .unwrap()
                .serve(make_svc);
            let (tx, rx) = tokio::sync::oneshot::channel::<()>();
            let server_task = tokio::spawn(server.with_graceful_shutdown(async {
                let _ = rx.await;
            }));

            let getter =
                HttpGetter::new("http://127.0.0.1:7979/_ringcache/", Duration::from_secs(5));
            assert_eq!(
                getter.get("scores", "Tom").await,
                Ok(Bytes::from_static(b"630"))
            );
            assert_eq!(
                getter.get("echo", "a b/c?d=e&f").await,
                Ok(Bytes::from_static(b"a b/c?d=e&f"))
            );
            assert_eq!(
                getter.get("scores", "Kate").await,
                Err(CacheError::Status("500 Internal Server Error".to_owned()))
            );
            assert_eq!(
                getter.get("unknown", "Tom").await,
                Err(CacheError::Status("404 Not Found".to_owned()))
            );

            let _ = tx.send(());
            let _ = server_task.await;

            // Once the peer is gone, the transport fails...
            match getter.get("scores", "Tom").await {
                Err(CacheError::Transport(_)) => (),
                other => panic!("Expected a transport error but got {:?}", other),
            }
        });
    }
}
