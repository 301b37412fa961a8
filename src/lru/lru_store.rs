use std::collections::HashMap;

/// Returns the number of bytes a cached value accounts for.
pub trait ByteSize {
    /// Returns the length of the value in bytes.
    ///
    /// Together with the length of its key, this is what an entry contributes to the byte budget
    /// of an [LRUStore](LRUStore).
    fn byte_len(&self) -> usize;
}

impl ByteSize for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteSize for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteSize for bytes::Bytes {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

/// Invoked with the key and value of each entry which is evicted to enforce the byte budget.
pub type EvictionCallback<V> = Box<dyn FnMut(String, V) + Send>;

/// Provides a byte budgeted LRU store.
///
/// The store behaves like a map as long as the sum of all key and value lengths stays within
/// **max_bytes**. Once an insert exceeds this budget, the least recently used entries are evicted
/// one by one until it fits again. A **max_bytes** of 0 disables the budget completely.
///
/// Entries live in an arena and are addressed by their slot index. The recency order is a doubly
/// linked list threaded through these slots (most recently used at the head) and a hash map
/// resolves keys to slots. Therefore all operations run in constant time.
///
/// Note that the store performs no locking. Its owner has to serialize all accesses (a
/// [Group](crate::group::Group) keeps it behind a mutex).
///
/// # Examples
/// ```
/// # use ringcache::lru::LRUStore;
/// // Permits up to 16 bytes of keys and values...
/// let mut lru = LRUStore::new(16);
///
/// lru.add("Foo".to_owned(), "Bar".to_owned());
/// assert_eq!(lru.get("Foo").unwrap(), "Bar");
///
/// // this will still fit..
/// lru.add("Foo1".to_owned(), "X".repeat(4));
/// assert_eq!(lru.len(), 2);
///
/// // ..but this one will push "Foo" out, as it was the least recently used entry:
/// lru.add("Foo2".to_owned(), "X".repeat(4));
/// assert_eq!(lru.get("Foo"), None);
/// assert_eq!(lru.get("Foo1").is_some(), true);
/// assert_eq!(lru.get("Foo2").is_some(), true);
/// ```
pub struct LRUStore<V: ByteSize> {
    max_bytes: usize,
    bytes: usize,
    slots: Vec<Option<Slot<V>>>,
    free_slots: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    index: HashMap<String, usize>,
    on_evicted: Option<EvictionCallback<V>>,
}

struct Slot<V> {
    key: String,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<V: ByteSize> LRUStore<V> {
    /// Creates a new store which may occupy up to **max_bytes** (0 means unlimited).
    pub fn new(max_bytes: usize) -> Self {
        LRUStore {
            max_bytes,
            bytes: 0,
            slots: Vec::new(),
            free_slots: Vec::new(),
            head: None,
            tail: None,
            index: HashMap::new(),
            on_evicted: None,
        }
    }

    /// Installs a callback which receives each entry evicted by the LRU policy.
    ///
    /// # Examples
    /// ```
    /// # use ringcache::lru::LRUStore;
    /// # use std::sync::{Arc, Mutex};
    /// let evicted = Arc::new(Mutex::new(Vec::new()));
    /// let sink = evicted.clone();
    /// let mut lru = LRUStore::new(8).on_evicted(move |key, _value: String| {
    ///     sink.lock().unwrap().push(key);
    /// });
    ///
    /// lru.add("a".to_owned(), "123".to_owned());
    /// lru.add("b".to_owned(), "123".to_owned());
    /// lru.add("c".to_owned(), "123".to_owned());
    ///
    /// assert_eq!(*evicted.lock().unwrap(), vec!["a".to_owned()]);
    /// ```
    pub fn on_evicted<F>(mut self, callback: F) -> Self
    where
        F: FnMut(String, V) + Send + 'static,
    {
        self.on_evicted = Some(Box::new(callback));
        self
    }

    /// Returns the value stored for the given key and marks it as most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.move_to_front(slot);

        self.slots[slot].as_ref().map(|entry| &entry.value)
    }

    /// Stores the given value for the given key and marks it as most recently used.
    ///
    /// An existing value is replaced in place, so that only the new length is accounted for.
    /// Afterwards, least recently used entries are evicted until the byte budget is met again.
    /// Note that this might evict the new entry itself if it is larger than the whole budget.
    pub fn add(&mut self, key: String, value: V) {
        let value_len = value.byte_len();

        if let Some(&slot) = self.index.get(&key) {
            self.move_to_front(slot);
            if let Some(entry) = self.slots[slot].as_mut() {
                self.bytes = self.bytes - entry.value.byte_len() + value_len;
                entry.value = value;
            }
        } else {
            self.bytes += key.len() + value_len;
            let slot = self.allocate(Slot {
                key: key.clone(),
                value,
                prev: None,
                next: None,
            });
            self.push_front(slot);
            let _ = self.index.insert(key, slot);
        }

        self.enforce_budget();
    }

    /// Evicts the least recently used entry (if any) and reports it to the eviction callback.
    pub fn remove_oldest(&mut self) {
        if let Some(slot) = self.tail {
            let entry = self.release(slot);
            if let Some(callback) = self.on_evicted.as_mut() {
                callback(entry.key, entry.value);
            }
        }
    }

    /// Removes the entry for the given key and returns its value.
    ///
    /// In contrast to an eviction, this doesn't invoke the eviction callback.
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let slot = *self.index.get(key)?;
        Some(self.release(slot).value)
    }

    /// Returns the number of entries in the store.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Determines if the store is completely empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Returns the sum of all key and value lengths currently stored.
    pub fn bytes(&self) -> usize {
        self.bytes
    }

    /// Returns the byte budget of this store (0 means unlimited).
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Changes the byte budget of this store.
    ///
    /// If the budget shrinks, entries are evicted immediately until the store fits again.
    pub fn set_max_bytes(&mut self, max_bytes: usize) {
        self.max_bytes = max_bytes;
        self.enforce_budget();
    }

    fn enforce_budget(&mut self) {
        while self.max_bytes != 0 && self.bytes > self.max_bytes && self.tail.is_some() {
            self.remove_oldest();
        }
    }

    fn allocate(&mut self, entry: Slot<V>) -> usize {
        match self.free_slots.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                slot
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    /// Unlinks the given slot, drops it from the index and hands the entry back.
    fn release(&mut self, slot: usize) -> Slot<V> {
        self.unlink(slot);
        let entry = match self.slots[slot].take() {
            Some(entry) => entry,
            None => unreachable!("LRU index points to an empty slot!"),
        };
        self.free_slots.push(slot);
        let _ = self.index.remove(&entry.key);
        self.bytes -= entry.key.len() + entry.value.byte_len();

        entry
    }

    fn move_to_front(&mut self, slot: usize) {
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
    }

    fn push_front(&mut self, slot: usize) {
        let previous_head = self.head;
        if let Some(entry) = self.slots[slot].as_mut() {
            entry.prev = None;
            entry.next = previous_head;
        }

        match previous_head {
            Some(head) => {
                if let Some(entry) = self.slots[head].as_mut() {
                    entry.prev = Some(slot);
                }
            }
            None => self.tail = Some(slot),
        }

        self.head = Some(slot);
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.slots[slot].as_mut() {
            Some(entry) => (entry.prev.take(), entry.next.take()),
            None => return,
        };

        match prev {
            Some(prev) => {
                if let Some(entry) = self.slots[prev].as_mut() {
                    entry.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next) => {
                if let Some(entry) = self.slots[next].as_mut() {
                    entry.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }
}
