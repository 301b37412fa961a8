use std::collections::HashMap;

use bytes::Bytes;
use ringcache::builder::Builder;
use ringcache::group::{GetterFn, Group, GroupRegistry};
use ringcache::server::Server;

/// Serves as the "slow" data source behind the demo group.
fn database() -> HashMap<&'static str, &'static str> {
    HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")])
}

#[tokio::main]
async fn main() {
    // Build a platform and enable all features...
    let platform = Builder::new().enable_all().build().await;

    // Setup a demo group which is backed by the in-memory database...
    let db = database();
    let _ = platform.require::<GroupRegistry>().register(Group::new(
        "scores",
        2 << 10,
        GetterFn(move |key: &str| {
            log::info!("[SlowDB] search key {}", key);
            db.get(key)
                .copied()
                .map(|value| Bytes::from_static(value.as_bytes()))
                .ok_or_else(|| anyhow::anyhow!("{} not exist", key))
        }),
    ));

    platform.require::<Server>().event_loop().await;
}
