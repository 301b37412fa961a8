//! Provides a tiny registry which keeps the central components of a node.
//!
//! A node consists of a handful of long living components: the [Config](crate::config::Config),
//! the [GroupRegistry](crate::group::GroupRegistry), the [HttpPool](crate::http::HttpPool) and the
//! [Server](crate::server::Server). Instead of keeping any of these in global state, they are
//! registered here (keyed by their type) and handed around explicitly. The platform also carries
//! the central **is_running** flag which is toggled to *false* once
//! [Platform::terminate](Platform::terminate) is invoked.
//!
//! Note that once the shutdown is initiated, the internal map is cleared so that all components
//! are dropped. Code which might run after [Platform::terminate](Platform::terminate) should
//! therefore use [Platform::find](Platform::find) and handle the **None** case.
//!
//! # Examples
//!
//! ```
//! # use std::sync::Arc;
//! # use ringcache::platform::Platform;
//! # use ringcache::group::GroupRegistry;
//! let platform = Platform::new();
//! platform.register::<GroupRegistry>(Arc::new(GroupRegistry::new()));
//!
//! assert_eq!(platform.require::<GroupRegistry>().names().len(), 0);
//!
//! platform.terminate();
//! assert_eq!(platform.find::<GroupRegistry>().is_none(), true);
//! assert_eq!(platform.is_running(), false);
//! ```
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Provides a container to keep all central components in a single place.
pub struct Platform {
    services: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
    is_running: AtomicBool,
}

impl Platform {
    /// Creates a new and running platform.
    pub fn new() -> Arc<Self> {
        Arc::new(Platform {
            services: Mutex::new(HashMap::new()),
            is_running: AtomicBool::new(true),
        })
    }

    /// Registers a component. A previously registered component of the same type is replaced.
    pub fn register<T>(&self, service: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        let _ = self
            .services
            .lock()
            .unwrap()
            .insert(TypeId::of::<T>(), service);
    }

    /// Tries to resolve a previously registered component.
    pub fn find<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let services = self.services.lock().unwrap();
        services
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.clone().downcast::<T>().ok())
    }

    /// Resolves a component which is known to be registered.
    ///
    /// # Panics
    /// Panics if the requested component isn't available or if the platform is already shutting
    /// down.
    pub fn require<T>(&self) -> Arc<T>
    where
        T: Any + Send + Sync,
    {
        if !self.is_running() {
            panic!(
                "A required component ({}) has been requested but the node is already shutting down!",
                std::any::type_name::<T>()
            );
        }

        match self.find::<T>() {
            Some(service) => service,
            None => panic!(
                "A required component ({}) was not available in the platform registry!",
                std::any::type_name::<T>()
            ),
        }
    }

    /// Determines if the platform is still running or if [Platform::terminate](Platform::terminate)
    /// has already been called.
    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    /// Terminates the platform.
    ///
    /// All components are released immediately and all loops which check
    /// [is_running()](Platform::is_running) wind down.
    pub fn terminate(&self) {
        self.services.lock().unwrap().clear();
        self.is_running.store(false, Ordering::Release);
    }
}
