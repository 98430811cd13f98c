use std::cell::RefCell;

use tracing::{debug, warn};

/// Key the bearer token is persisted under.
pub const DEFAULT_SESSION_KEY: &str = "token";

/// A durable single-value slot that outlives one page load.
pub trait TokenSlot {
    fn load(&self) -> Option<String>;
    fn store(&self, token: &str);
    fn erase(&self);
}

/// Browser `localStorage` slot.
///
/// Storage that is unavailable (private mode, blocked by policy) degrades to
/// "no token" with a warning rather than failing the caller.
pub struct LocalStorageSlot {
    key: String,
}

impl LocalStorageSlot {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    fn storage(&self) -> Option<web_sys::Storage> {
        match web_sys::window().map(|w| w.local_storage()) {
            Some(Ok(Some(storage))) => Some(storage),
            Some(Err(e)) => {
                warn!("localStorage unavailable: {:?}", e);
                None
            }
            _ => {
                warn!("localStorage unavailable");
                None
            }
        }
    }
}

impl TokenSlot for LocalStorageSlot {
    fn load(&self) -> Option<String> {
        let storage = self.storage()?;
        match storage.get_item(&self.key) {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!("Failed to read '{}' from localStorage: {:?}", self.key, e);
                None
            }
        }
    }

    fn store(&self, token: &str) {
        if let Some(storage) = self.storage() {
            if let Err(e) = storage.set_item(&self.key, token) {
                warn!("Failed to persist '{}' to localStorage: {:?}", self.key, e);
            }
        }
    }

    fn erase(&self) {
        if let Some(storage) = self.storage() {
            if let Err(e) = storage.remove_item(&self.key) {
                warn!("Failed to remove '{}' from localStorage: {:?}", self.key, e);
            }
        }
    }
}

/// In-process slot for tests and non-browser targets.
#[derive(Debug, Default)]
pub struct MemorySlot {
    value: RefCell<Option<String>>,
}

impl MemorySlot {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            value: RefCell::new(Some(token.into())),
        }
    }
}

impl TokenSlot for MemorySlot {
    fn load(&self) -> Option<String> {
        self.value.borrow().clone()
    }

    fn store(&self, token: &str) {
        *self.value.borrow_mut() = Some(token.to_string());
    }

    fn erase(&self) {
        self.value.borrow_mut().take();
    }
}

/// Holder of the bearer credential. Contents are opaque; nothing here talks
/// to the network. The auth controller is the only writer.
pub struct SessionStore {
    slot: Box<dyn TokenSlot>,
}

impl SessionStore {
    pub fn new(slot: impl TokenSlot + 'static) -> Self {
        Self {
            slot: Box::new(slot),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemorySlot::default())
    }

    pub fn get(&self) -> Option<String> {
        self.slot.load()
    }

    pub fn set(&self, token: &str) {
        debug!("Storing session token");
        self.slot.store(token);
    }

    pub fn clear(&self) {
        debug!("Clearing session token");
        self.slot.erase();
    }

    pub fn has_token(&self) -> bool {
        self.get().is_some()
    }
}
