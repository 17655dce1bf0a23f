// src/load_balancer.rs
use crate::error::LbError;
use crate::service_registry::{ServiceInstance, ServiceRegistry};
use parking_lot::RwLock;
use rand::Rng;
use serde::Deserialize;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

/// How one instance is picked out of a non-empty candidate list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    RoundRobin,
    Random,
}

/// Client-side load balancer over a shared registry.
///
/// Round-robin state lives here, one counter per service id, so two
/// balancers over the same registry cycle independently.
pub struct LoadBalancer {
    registry: Arc<dyn ServiceRegistry>,
    counters: RwLock<HashMap<String, Arc<AtomicUsize>>>,
    default_strategy: Strategy,
}

impl LoadBalancer {
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self::with_strategy(registry, Strategy::default())
    }

    pub fn with_strategy(registry: Arc<dyn ServiceRegistry>, default_strategy: Strategy) -> Self {
        LoadBalancer {
            registry,
            counters: RwLock::new(HashMap::new()),
            default_strategy,
        }
    }

    pub fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    /// Snapshot of the instances currently registered for `service_id`.
    pub fn resolve_instances(&self, service_id: &str) -> Vec<ServiceInstance> {
        self.registry.list_instances(service_id)
    }

    /// Pick one instance of `service_id` with `strategy`.
    pub fn choose(&self, service_id: &str, strategy: Strategy) -> Result<ServiceInstance, LbError> {
        let mut instances = self.resolve_instances(service_id);
        if instances.is_empty() {
            return Err(LbError::NoInstanceAvailable {
                service_id: service_id.to_string(),
            });
        }
        let idx = match strategy {
            Strategy::RoundRobin => self.next_index(service_id, instances.len()),
            Strategy::Random => rand::thread_rng().gen_range(0..instances.len()),
        };
        log::debug!("{:?} picked #{} of {} for '{}'", strategy, idx, instances.len(), service_id);
        Ok(instances.swap_remove(idx))
    }

    pub fn choose_default(&self, service_id: &str) -> Result<ServiceInstance, LbError> {
        self.choose(service_id, self.default_strategy)
    }

    /// Restart round-robin for `service_id` from the first instance.
    pub fn reset(&self, service_id: &str) {
        self.counters.write().remove(service_id);
    }

    fn counter(&self, service_id: &str) -> Arc<AtomicUsize> {
        if let Some(c) = self.counters.read().get(service_id) {
            return c.clone();
        }
        self.counters
            .write()
            .entry(service_id.to_string())
            .or_insert_with(|| Arc::new(AtomicUsize::new(0)))
            .clone()
    }

    // Modulo is taken against the current count, so a shrinking or growing
    // instance set never yields an out-of-range index.
    fn next_index(&self, service_id: &str, len: usize) -> usize {
        let counter = self.counter(service_id);
        let prev = counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some((n + 1) % len))
            .unwrap_or_else(|n| n);
        prev % len
    }
}
