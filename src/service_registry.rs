// src/service_registry.rs
use parking_lot::RwLock;
use serde::Deserialize;
use std::{collections::HashMap, net::Ipv6Addr};

/// One reachable endpoint backing a logical service id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    service_id: String,
    host: String,
    port: u16,
    metadata: HashMap<String, String>,
}

impl ServiceInstance {
    pub fn new(service_id: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        ServiceInstance {
            service_id: service_id.into(),
            host: host.into(),
            port,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// `https` when the instance advertises `secure=true`, `http` otherwise.
    pub fn scheme(&self) -> &'static str {
        match self.metadata.get("secure").map(String::as_str) {
            Some("true") => "https",
            _ => "http",
        }
    }

    /// Base URI of the instance, e.g. `http://10.0.0.1:8080` or `http://[::1]:8080`.
    pub fn uri(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("{}://[{}]:{}", self.scheme(), self.host, self.port)
        } else {
            format!("{}://{}:{}", self.scheme(), self.host, self.port)
        }
    }
}

/// Instance entry as it appears in configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InstanceEntry {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl InstanceEntry {
    pub fn into_instance(self, service_id: &str) -> ServiceInstance {
        ServiceInstance::new(service_id, self.host, self.port).with_metadata(self.metadata)
    }
}

/// Read side of service discovery, as seen by the load balancer.
pub trait ServiceRegistry: Send + Sync {
    /// Current instances for `service_id`; empty when the id is unknown.
    fn list_instances(&self, service_id: &str) -> Vec<ServiceInstance>;
}

/// In-memory registry with interior mutability
#[derive(Debug, Default)]
pub struct StaticRegistry {
    services: RwLock<HashMap<String, Vec<ServiceInstance>>>,
}

impl StaticRegistry {
    pub fn new() -> Self {
        StaticRegistry {
            services: RwLock::new(HashMap::new()),
        }
    }

    /// Build a registry from `service id -> entries` as loaded from config.
    pub fn from_entries(entries: HashMap<String, Vec<InstanceEntry>>) -> Self {
        let registry = StaticRegistry::new();
        for (id, list) in entries {
            let instances = list.into_iter().map(|e| e.into_instance(&id)).collect();
            registry.replace(&id, instances);
        }
        registry
    }

    /// Add an instance under its service id
    pub fn register(&self, instance: ServiceInstance) {
        let mut svc = self.services.write();
        svc.entry(instance.service_id.clone()).or_default().push(instance);
    }

    /// Remove every instance of `service_id` listening on `host:port`
    pub fn deregister(&self, service_id: &str, host: &str, port: u16) {
        let mut svc = self.services.write();
        if let Some(vec) = svc.get_mut(service_id) {
            vec.retain(|i| !(i.host == host && i.port == port));
        }
    }

    /// Swap the whole instance set of `service_id` in one step.
    pub fn replace(&self, service_id: &str, instances: Vec<ServiceInstance>) {
        self.services.write().insert(service_id.to_string(), instances);
    }

    /// Known service ids, sorted
    pub fn service_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.services.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl ServiceRegistry for StaticRegistry {
    fn list_instances(&self, service_id: &str) -> Vec<ServiceInstance> {
        self.services.read().get(service_id).cloned().unwrap_or_default()
    }
}
