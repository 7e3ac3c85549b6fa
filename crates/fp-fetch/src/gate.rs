use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded-concurrency admission control keyed by origin host authority.
///
/// Gates are lazily created on first use; insertion into the table (a
/// first-seen host) is guarded by a short critical section, not held
/// across the subsequent `acquire` await.
pub struct HostGates {
    gates: RwLock<HashMap<String, Arc<Semaphore>>>,
    per_host_limit: usize,
}

impl HostGates {
    pub fn new(per_host_limit: usize) -> Self {
        Self {
            gates: RwLock::new(HashMap::new()),
            per_host_limit: per_host_limit.max(1),
        }
    }

    fn gate_for(&self, host: &str) -> Arc<Semaphore> {
        if let Some(gate) = self.gates.read().get(host) {
            return gate.clone();
        }
        self.gates
            .write()
            .entry(host.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }

    /// Acquire a permit for `host`, suspending the caller if `K` requests
    /// to that host are already in flight. The returned permit releases
    /// the slot when dropped, which happens on every exit path (success,
    /// timeout, transport error) because it's tied to the call stack.
    pub async fn acquire(&self, host: &str) -> OwnedSemaphorePermit {
        let gate = self.gate_for(host);
        gate.acquire_owned()
            .await
            .expect("host gate semaphore is never closed")
    }

    /// Number of hosts with at least one lazily-created gate so far.
    pub fn known_host_count(&self) -> usize {
        self.gates.read().len()
    }

    /// Per-host in-flight occupancy, for the `/v1/metrics` surface.
    /// Hosts with zero permits in use are omitted.
    pub fn occupancy(&self) -> Vec<(String, usize)> {
        self.gates
            .read()
            .iter()
            .filter_map(|(host, gate)| {
                let in_use = self.per_host_limit.saturating_sub(gate.available_permits());
                (in_use > 0).then(|| (host.clone(), in_use))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn caps_concurrency_per_host() {
        let gates = Arc::new(HostGates::new(2));
        let p1 = gates.acquire("a.example").await;
        let p2 = gates.acquire("a.example").await;

        // A third acquire for the same host must wait.
        let gates2 = gates.clone();
        let third = tokio::spawn(async move { gates2.acquire("a.example").await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!third.is_finished());

        drop(p1);
        let _p3 = third.await.unwrap();
        drop(p2);
    }

    #[tokio::test]
    async fn independent_hosts_do_not_block_each_other() {
        let gates = HostGates::new(1);
        let _a = gates.acquire("a.example").await;
        // Different host should acquire immediately even though "a.example"
        // already holds its one permit.
        let fut = gates.acquire("b.example");
        tokio::time::timeout(Duration::from_millis(50), fut)
            .await
            .expect("b.example should not block on a.example's gate");
    }

    #[tokio::test]
    async fn lazily_creates_gates_on_first_use() {
        let gates = HostGates::new(2);
        assert_eq!(gates.known_host_count(), 0);
        let _p = gates.acquire("a.example").await;
        assert_eq!(gates.known_host_count(), 1);
    }
}
