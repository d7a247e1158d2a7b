// ABOUTME: Global port -> owning-session map and ephemeral port allocator
// ABOUTME: One registry per router; sessions register/deregister ports as p-calls arrive

use crate::eventloop::SocketToken;
use crate::router::error::RouterError;
use rand::Rng;
use std::collections::HashMap;
use std::ops::Range;

/// Invariants: keys unique (`HashMap` gives us this for free); every
/// value names a session the router still believes is live — it is
/// the daemon's job to call `release_all` on disconnect so that
/// invariant holds.
#[derive(Debug, Default)]
pub struct PortRegistry {
    owners: HashMap<u64, SocketToken>,
}

impl PortRegistry {
    pub fn new() -> Self {
        PortRegistry {
            owners: HashMap::new(),
        }
    }

    pub fn contains(&self, port: u64) -> bool {
        self.owners.contains_key(&port)
    }

    pub fn owner(&self, port: u64) -> Option<SocketToken> {
        self.owners.get(&port).copied()
    }

    pub fn register(&mut self, port: u64, session: SocketToken) -> Result<(), RouterError> {
        if self.owners.contains_key(&port) {
            return Err(RouterError::DuplicatePort);
        }
        self.owners.insert(port, session);
        Ok(())
    }

    pub fn deregister(&mut self, port: u64, session: SocketToken) -> Result<(), RouterError> {
        match self.owners.get(&port) {
            None => Err(RouterError::BadPort(port)),
            Some(&owner) if owner != session => Err(RouterError::NotOwner(port)),
            Some(_) => {
                self.owners.remove(&port);
                Ok(())
            }
        }
    }

    /// Remove every port owned by `session`, returning them so the
    /// caller can log what was released. Used on disconnect.
    pub fn release_all(&mut self, session: SocketToken) -> Vec<u64> {
        let released: Vec<u64> = self
            .owners
            .iter()
            .filter(|(_, &owner)| owner == session)
            .map(|(&port, _)| port)
            .collect();
        for port in &released {
            self.owners.remove(port);
        }
        released
    }

    /// Choose a random port in `range`, resampling on collision. This
    /// is not atomic with the caller's subsequent `register` call (see
    /// DESIGN.md's open question on the TOCTOU gap); benign under the
    /// single-threaded event loop.
    pub fn allocate_ephemeral(&self, range: Range<u64>) -> Option<u64> {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let candidate = rng.gen_range(range.clone());
            if !self.owners.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        None
    }
}
