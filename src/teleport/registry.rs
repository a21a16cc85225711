/*!
 * Class Registry
 *
 * Memoized factory of endpoint classes keyed by `(direction, token size)`.
 * Classes are created on first request and kept for the life of the
 * process; lookups are linear scans over short, insertion-ordered lists and
 * only happen while a network is being wired.
 */

use super::endpoint::Endpoint;
use super::types::{Direction, EndpointClass};
use crate::core::errors::{TeleportError, TeleportResult};
use parking_lot::RwLock;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Process-wide registry, initialized on first use
static GLOBAL_REGISTRY: OnceLock<ClassRegistry> = OnceLock::new();

/// Append-only lists of receiver and sender classes
#[derive(Debug, Default)]
pub struct ClassRegistry {
    receivers: RwLock<Vec<Arc<EndpointClass>>>,
    senders: RwLock<Vec<Arc<EndpointClass>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry; idempotent
    pub fn global() -> &'static ClassRegistry {
        GLOBAL_REGISTRY.get_or_init(|| {
            debug!("Endpoint class registry initialized");
            ClassRegistry::new()
        })
    }

    pub fn receiver_class(&self, token_size: usize) -> TeleportResult<Arc<EndpointClass>> {
        self.class_for(Direction::Receiver, token_size)
    }

    pub fn sender_class(&self, token_size: usize) -> TeleportResult<Arc<EndpointClass>> {
        self.class_for(Direction::Sender, token_size)
    }

    /// Look up the class for `(direction, token_size)`, creating it on first use
    pub fn class_for(
        &self,
        direction: Direction,
        token_size: usize,
    ) -> TeleportResult<Arc<EndpointClass>> {
        if token_size == 0 {
            return Err(TeleportError::InvalidTokenSize(token_size));
        }

        let list = self.list(direction);
        if let Some(class) = find(&list.read(), token_size) {
            return Ok(class);
        }

        let mut classes = list.write();
        // Another thread may have created it between the two locks
        if let Some(class) = find(&classes, token_size) {
            return Ok(class);
        }
        let class = Arc::new(EndpointClass::new(direction, token_size));
        debug!(class = %class.name(), "Created endpoint class");
        classes.push(Arc::clone(&class));
        Ok(class)
    }

    /// Classes created so far for `direction`, oldest first
    pub fn classes(&self, direction: Direction) -> Vec<Arc<EndpointClass>> {
        self.list(direction).read().clone()
    }

    /// Whether `class` is one this registry handed out as a `direction` class
    pub fn is_registered(&self, direction: Direction, class: &Arc<EndpointClass>) -> bool {
        self.list(direction)
            .read()
            .iter()
            .any(|known| Arc::ptr_eq(known, class))
    }

    /// Bound port of a receiver instance (`None` if its setup failed)
    ///
    /// # Panics
    ///
    /// If `endpoint` is not an instance of a receiver class from this registry.
    pub fn receiver_port(&self, endpoint: &Endpoint) -> Option<u16> {
        assert!(
            self.is_registered(Direction::Receiver, endpoint.class()),
            "'{}' is not an instance of a registered receiver class",
            endpoint.instance_name()
        );
        endpoint.as_receiver().and_then(|receiver| receiver.port())
    }

    /// Tell a sender instance where its receiver lives
    ///
    /// # Panics
    ///
    /// If `endpoint` is not an instance of a sender class from this registry.
    pub fn set_sender_remote_address(&self, endpoint: &Endpoint, host: &str, port: u16) {
        assert!(
            self.is_registered(Direction::Sender, endpoint.class()),
            "'{}' is not an instance of a registered sender class",
            endpoint.instance_name()
        );
        if let Some(sender) = endpoint.as_sender() {
            sender.set_remote_address(host, port);
        }
    }

    fn list(&self, direction: Direction) -> &RwLock<Vec<Arc<EndpointClass>>> {
        match direction {
            Direction::Receiver => &self.receivers,
            Direction::Sender => &self.senders,
        }
    }
}

fn find(classes: &[Arc<EndpointClass>], token_size: usize) -> Option<Arc<EndpointClass>> {
    classes
        .iter()
        .find(|class| class.token_size() == token_size)
        .cloned()
}

/// Receiver class for `token_size` from the process-wide registry
pub fn get_receiver_class(token_size: usize) -> TeleportResult<Arc<EndpointClass>> {
    ClassRegistry::global().receiver_class(token_size)
}

/// Sender class for `token_size` from the process-wide registry
pub fn get_sender_class(token_size: usize) -> TeleportResult<Arc<EndpointClass>> {
    ClassRegistry::global().sender_class(token_size)
}

/// See [`ClassRegistry::receiver_port`]
pub fn receiver_port(endpoint: &Endpoint) -> Option<u16> {
    ClassRegistry::global().receiver_port(endpoint)
}

/// See [`ClassRegistry::set_sender_remote_address`]
pub fn set_sender_remote_address(endpoint: &Endpoint, host: &str, port: u16) {
    ClassRegistry::global().set_sender_remote_address(endpoint, host, port)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_same_size_same_class() {
        let registry = ClassRegistry::new();
        let a = registry.receiver_class(8).unwrap();
        let b = registry.receiver_class(8).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.classes(Direction::Receiver).len(), 1);
    }

    #[test]
    fn test_directions_are_separate() {
        let registry = ClassRegistry::new();
        let rx = registry.receiver_class(8).unwrap();
        let tx = registry.sender_class(8).unwrap();
        assert!(!Arc::ptr_eq(&rx, &tx));
        assert!(registry.is_registered(Direction::Receiver, &rx));
        assert!(!registry.is_registered(Direction::Sender, &rx));
    }

    #[test]
    fn test_insertion_order_kept() {
        let registry = ClassRegistry::new();
        for size in [16, 4, 8, 4] {
            registry.sender_class(size).unwrap();
        }
        let names: Vec<_> = registry
            .classes(Direction::Sender)
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, ["_sender_16B", "_sender_4B", "_sender_8B"]);
    }

    #[test]
    fn test_zero_size_rejected() {
        let registry = ClassRegistry::new();
        assert_eq!(
            registry.receiver_class(0),
            Err(TeleportError::InvalidTokenSize(0))
        );
        assert!(registry.classes(Direction::Receiver).is_empty());
    }

    #[test]
    fn test_concurrent_lookups_create_one_class() {
        let registry = Arc::new(ClassRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || registry.receiver_class(32).unwrap())
            })
            .collect();

        let classes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(classes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.classes(Direction::Receiver).len(), 1);
    }
}
