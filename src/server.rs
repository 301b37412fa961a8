//! Contains the server component of ringcache.
//!
//! Opens a server-socket on the specified port (**server.port** in the config or 8001 as fallback)
//! and binds it to the selected IP (**server.host** in the config or 0.0.0.0 as fallback). Each
//! incoming HTTP request is handed to the [HttpPool](crate::http::HttpPool) which answers the
//! requests of the other peers.
//!
//! Note that the server periodically tries to bind the socket to the selected port. Therefore a
//! "new" instance can be started while the "old" one bleeds out and the port is "handed through"
//! with minimal downtime. Also, this listens to change events of the config and relocates to
//! another port or host if changed.
//!
//! # Example
//!
//! ```no_run
//! use ringcache::builder::Builder;
//! use ringcache::config::Config;
//! use ringcache::server::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     //  Setup and create a platform...
//!     let platform = Builder::new().enable_all().build().await;
//!
//!     // Specify a minimal config so that we run on a different port than a
//!     // production instance.
//!     platform.require::<Config>().load_from_string("
//!         server:
//!             port: 1503
//!     ", None).unwrap();
//!
//!     // Run the platform...
//!     platform.require::<Server>().event_loop().await;
//! }
//! ```
use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use hyper::service::{make_service_fn, service_fn};
use tokio::net::TcpListener;

use crate::config::{Config, Handle};
use crate::http::HttpPool;
use crate::platform::Platform;
use crate::spawn;

/// Contains the port being used if none is configured.
pub const DEFAULT_PORT: u16 = 8001;

/// Contains the host (IP) being used if none is configured.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Specifies the interval in which the shutdown conditions are re-checked.
///
/// While serving we need to interrupt waiting for config changes every once in a while so that
/// we can check if the platform has been shut down.
const SHUTDOWN_CHECK_INTERVAL: Duration = Duration::from_millis(500);

/// Represents the server which binds the socket and dispatches all requests to the
/// [HttpPool](crate::http::HttpPool).
pub struct Server {
    running: AtomicBool,
    current_address: Mutex<Option<String>>,
    platform: Arc<Platform>,
}

impl Server {
    /// Creates and installs a **Server** into the given **Platform**.
    ///
    /// Note that this is called by the [Builder](crate::builder::Builder) unless disabled.
    ///
    /// Also note, that this will not technically start the server. This has to be done manually
    /// via [event_loop](Server::event_loop) as it is most probable done in the main thread.
    pub fn install(platform: &Arc<Platform>) -> Arc<Self> {
        let server = Arc::new(Server {
            running: AtomicBool::new(false),
            current_address: Mutex::new(None),
            platform: platform.clone(),
        });

        platform.register::<Server>(server.clone());

        server
    }

    /// Returns the address the server socket is currently bound to.
    pub fn current_address(&self) -> Option<String> {
        self.current_address.lock().unwrap().clone()
    }

    /// Determines if the server socket should keep listening for incoming connections.
    ///
    /// In contrast to **Platform::is_running** this is not used to control the shutdown of the
    /// server. Rather we toggle this flag to false if a config and therefore address change was
    /// detected. This way **server_loop** will exit and a new server socket for the appropriate
    /// address will be setup by the **event_loop**.
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Determines the server address based on the current configuration.
    fn address(&self) -> String {
        let handle = self.platform.find::<Config>().map(|config| config.current());
        let (host, port) = host_and_port(handle.as_ref());

        format!("{}:{}", host, port)
    }

    /// Starts the event loop in a separate task.
    ///
    /// This is most probably used by test scenarios where the tests itself run in the main thread.
    pub fn fork(server: &Arc<Server>) {
        let cloned_server = server.clone();
        spawn!(async move {
            cloned_server.event_loop().await;
        });
    }

    /// Starts the event loop in a separate task and waits until the server socket is bound.
    ///
    /// Just like **fork** this is intended to be used in test environments.
    pub async fn fork_and_await(server: &Arc<Server>) {
        Server::fork(server);

        while server.current_address().is_none() {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Tries to open a server socket on the specified address to serve incoming requests.
    ///
    /// The task of this loop is to bind the server socket to the specified address. Once this was
    /// successful, we enter the [server_loop](Server::server_loop) to actually serve requests.
    /// Once this loop returns, either the platform is no longer running and we should exit, or the
    /// config has changed and we should try to bind the server to the new address.
    pub async fn event_loop(&self) {
        let mut address = String::new();
        let mut last_bind_error_reported = Instant::now();

        while self.platform.is_running() {
            // If the sever is started for the first time or if it has been restarted due to a
            // config change, we need to reload the address...
            if !self.is_running() {
                address = self.address();
                self.running.store(true, Ordering::Release);
            }

            match TcpListener::bind(&address).await {
                Ok(listener) => {
                    log::info!("Opened server socket on {}...", &address);
                    *self.current_address.lock().unwrap() = Some(address.clone());
                    self.server_loop(listener).await;
                    *self.current_address.lock().unwrap() = None;
                    log::info!("Closing server socket on {}.", &address);
                }
                Err(error) => {
                    // We retry every 500ms but only report the problem every 5s...
                    if last_bind_error_reported.elapsed().as_secs() > 5 {
                        log::error!(
                            "Cannot open server address: {} ({}). Retrying every 500ms...",
                            &address,
                            error
                        );
                        last_bind_error_reported = Instant::now();
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    /// Serves all incoming requests until either the platform shuts down or the server address
    /// changes.
    ///
    /// Requests which are still being processed are completed before this returns.
    async fn server_loop(&self, listener: TcpListener) {
        let pool = match self.platform.find::<HttpPool>() {
            Some(pool) => pool,
            None => {
                log::error!("No HttpPool is installed - cannot serve any requests!");
                self.await_shutdown().await;
                return;
            }
        };

        let builder = match listener
            .into_std()
            .map_err(anyhow::Error::from)
            .and_then(|listener| hyper::Server::from_tcp(listener).map_err(anyhow::Error::from))
        {
            Ok(builder) => builder,
            Err(error) => {
                log::error!("Cannot serve requests: {}", error);
                return;
            }
        };

        let make_svc = make_service_fn(move |_conn| {
            let pool = pool.clone();
            async move {
                Ok::<_, Infallible>(service_fn(move |request| {
                    let pool = pool.clone();
                    async move { Ok::<_, Infallible>(pool.handle(request).await) }
                }))
            }
        });

        if let Err(error) = builder
            .serve(make_svc)
            .with_graceful_shutdown(self.await_shutdown())
            .await
        {
            log::error!("An error occurred while serving requests: {}", error);
        }
    }

    /// Completes once the platform is terminated or the configured address has changed.
    async fn await_shutdown(&self) {
        let mut config_changed = self.platform.find::<Config>().map(|config| config.notifier());

        while self.platform.is_running() && self.is_running() {
            let notifier = match config_changed.as_mut() {
                Some(notifier) => notifier,
                None => {
                    tokio::time::sleep(SHUTDOWN_CHECK_INTERVAL).await;
                    continue;
                }
            };

            match tokio::time::timeout(SHUTDOWN_CHECK_INTERVAL, notifier.recv()).await {
                Ok(Err(tokio::sync::broadcast::error::RecvError::Closed)) => config_changed = None,
                Ok(_) => self.check_address(),
                Err(_) => (),
            }
        }
    }

    fn check_address(&self) {
        let new_address = self.address();
        if let Some(current_address) = &*self.current_address.lock().unwrap() {
            if current_address != &new_address {
                log::info!("Server address has changed. Restarting server socket...");

                // Force the event_loop to re-evaluate the expected server address...
                self.running.store(false, Ordering::Release);
            }
        }
    }
}

/// Reads **server.host** and **server.port** from the given config, using the defaults for
/// missing or invalid values.
pub(crate) fn host_and_port(handle: Option<&Handle>) -> (String, u16) {
    let host = handle
        .and_then(|handle| handle.query("server.host").as_str())
        .unwrap_or(DEFAULT_HOST)
        .to_owned();
    let port = handle
        .and_then(|handle| handle.query("server.port").as_i64())
        .and_then(|port| u16::try_from(port).ok())
        .filter(|port| *port > 0)
        .unwrap_or(DEFAULT_PORT);

    (host, port)
}
