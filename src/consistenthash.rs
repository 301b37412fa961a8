//! Provides a consistent hashing ring which maps keys onto a set of nodes.
//!
//! Each node is placed onto the ring several times (once per replica). These virtual nodes are
//! derived by hashing `"<replica_index><node>"`, so that the positions are stable across
//! processes. A key is owned by the first virtual node whose hash is greater than or equal to
//! the hash of the key. Keys hashing above the largest virtual node wrap around to the first one.
//!
//! The ring only ever grows. To remove a node, a new ring has to be built from the remaining
//! node set (which is what [HttpPool::set_peers](crate::http::HttpPool::set_peers) does).
//!
//! # Examples
//!
//! ```
//! # use ringcache::consistenthash::HashRing;
//! let mut ring = HashRing::with_replicas(50);
//!
//! // An empty ring has no owner for any key...
//! assert_eq!(ring.get("Tom"), None);
//!
//! ring.add(&["http://node-a:8001", "http://node-b:8001"]);
//!
//! // ..once nodes are present, each key is deterministically assigned to one of them.
//! let owner = ring.get("Tom").unwrap().to_owned();
//! assert_eq!(ring.get("Tom"), Some(owner.as_str()));
//! ```
use std::collections::HashMap;

/// Computes the ring position of the given bytes.
pub type HashFn = fn(&[u8]) -> u32;

/// Provides a ring of virtual nodes along with the mapping to their real nodes.
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    keys: Vec<u32>,
    nodes: HashMap<u32, String>,
}

impl HashRing {
    /// Creates a ring which places each node **replicas** times and uses CRC-32 (IEEE) as hash.
    pub fn with_replicas(replicas: usize) -> Self {
        HashRing::with_hasher(replicas, crc32fast::hash)
    }

    /// Creates a ring which uses a custom hash function.
    ///
    /// # Examples
    ///
    /// Using a trivial hash makes the ring positions predictable:
    /// ```
    /// # use ringcache::consistenthash::HashRing;
    /// fn parse(data: &[u8]) -> u32 {
    ///     std::str::from_utf8(data).unwrap().parse().unwrap()
    /// }
    ///
    /// // Places virtual nodes at 2, 12, 22 and 4, 14, 24...
    /// let mut ring = HashRing::with_hasher(3, parse);
    /// ring.add(&["2", "4"]);
    ///
    /// assert_eq!(ring.get("3"), Some("4"));
    /// assert_eq!(ring.get("12"), Some("2"));
    ///
    /// // 25 lies beyond the last virtual node and therefore wraps around to 2...
    /// assert_eq!(ring.get("25"), Some("2"));
    /// ```
    pub fn with_hasher(replicas: usize, hash: HashFn) -> Self {
        HashRing {
            hash,
            replicas,
            keys: Vec::new(),
            nodes: HashMap::new(),
        }
    }

    /// Places the given nodes onto the ring.
    ///
    /// Calls are cumulative. If two virtual nodes collide, the one added last owns the position.
    pub fn add<S: AsRef<str>>(&mut self, nodes: &[S]) {
        for node in nodes {
            let node = node.as_ref();
            for replica in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", replica, node).as_bytes());
                self.keys.push(hash);
                let _ = self.nodes.insert(hash, node.to_owned());
            }
        }

        self.keys.sort_unstable();
    }

    /// Returns the node owning the given key or **None** if the ring is still empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let index = self.keys.partition_point(|position| *position < hash);

        self.nodes
            .get(&self.keys[index % self.keys.len()])
            .map(|node| node.as_str())
    }

    /// Returns the number of virtual nodes on the ring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Determines if no node has been added yet.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Returns the number of virtual nodes placed per node.
    pub fn replicas(&self) -> usize {
        self.replicas
    }
}
