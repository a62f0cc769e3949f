//! Registry of diagnostic file categories per managed-VM role.
//!
//! Maps `(role, category)` to the default file list and description for
//! that category. Reads vastly outnumber writes (registration happens at
//! process start-up), so the registry keeps an immutable snapshot behind an
//! `RwLock` and swaps the whole `Arc` on registration — readers clone the
//! `Arc` and never contend.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

/// A diagnostics category definition for one managed-VM role.
///
/// Identity is `(role, category)`. `default_detail` is the ordered default
/// file list fetched when the caller supplies no explicit files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsKey {
    pub role: String,
    pub category: String,
    pub default_detail: Vec<String>,
    pub description: String,
}

/// One registered entry. `seq` records first-registration order so that
/// retrieve-defaults mode can union categories in the order they were
/// registered rather than alphabetically.
#[derive(Debug, Clone)]
struct Entry {
    key: DiagnosticsKey,
    seq: u64,
}

type Snapshot = BTreeMap<(String, String), Entry>;

/// Mutable registry state. Snapshot and sequence counter live under one
/// lock so a registration is a single atomic read-modify-write; readers
/// only ever clone the `Arc`.
#[derive(Debug, Default)]
struct Inner {
    snapshot: Arc<Snapshot>,
    next_seq: u64,
}

/// Process-wide registry of [`DiagnosticsKey`] definitions.
#[derive(Debug, Default)]
pub struct DiagnosticsKeyRegistry {
    inner: RwLock<Inner>,
}

impl DiagnosticsKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert by `(role, category)` identity.
    ///
    /// - No entry for the identity: insert it.
    /// - Entry exists with a different `default_detail` or description:
    ///   replace it (latest definition wins), keeping its registration order.
    /// - Entry exists unchanged: no-op.
    ///
    /// Never fails; every component owning a category calls this at start-up,
    /// possibly concurrently. The write lock is held across the whole
    /// read-modify-write so concurrent registrations cannot lose each other.
    pub fn register(&self, key: DiagnosticsKey) {
        let identity = (key.role.clone(), key.category.clone());
        let mut inner = self.inner.write().expect("registry lock poisoned");

        let existing_seq = match inner.snapshot.get(&identity) {
            Some(existing) if existing.key == key => return,
            Some(existing) => Some(existing.seq),
            None => None,
        };

        let seq = match existing_seq {
            Some(seq) => {
                tracing::debug!(
                    role = %key.role,
                    category = %key.category,
                    "Replacing diagnostics key definition"
                );
                seq
            }
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                tracing::debug!(
                    role = %key.role,
                    category = %key.category,
                    files = key.default_detail.len(),
                    "Registered diagnostics key"
                );
                seq
            }
        };

        let mut updated: Snapshot = (*inner.snapshot).clone();
        updated.insert(identity, Entry { key, seq });
        inner.snapshot = Arc::new(updated);
    }

    /// Current immutable snapshot; readers never contend beyond the clone.
    fn snapshot(&self) -> Arc<Snapshot> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .snapshot
            .clone()
    }

    /// Look up the definition for `(role, category)`.
    pub fn lookup(&self, role: &str, category: &str) -> Option<DiagnosticsKey> {
        self.snapshot()
            .get(&(role.to_string(), category.to_string()))
            .map(|entry| entry.key.clone())
    }

    /// All registered keys, ordered by role then category.
    pub fn list_all(&self) -> Vec<DiagnosticsKey> {
        self.snapshot()
            .values()
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// All categories registered for `role`, in first-registration order.
    ///
    /// Backs retrieve-defaults mode (a request with no category set).
    pub fn defaults_for_role(&self, role: &str) -> Vec<DiagnosticsKey> {
        let snapshot = self.snapshot();
        let mut entries: Vec<&Entry> = snapshot
            .values()
            .filter(|entry| entry.key.role == role)
            .collect();
        entries.sort_by_key(|entry| entry.seq);
        entries.into_iter().map(|entry| entry.key.clone()).collect()
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Built-in keys
// ---------------------------------------------------------------------------

/// Role name for console proxy system VMs.
pub const ROLE_CONSOLE_PROXY: &str = "ConsoleProxy";
/// Role name for secondary storage system VMs.
pub const ROLE_SECONDARY_STORAGE: &str = "SecondaryStorageVm";
/// Role name for virtual routers.
pub const ROLE_DOMAIN_ROUTER: &str = "DomainRouter";

/// The shipped category definitions, registered at every process start-up.
///
/// Stored diagnostics-key rows override these on hydration; registration is
/// idempotent either way.
pub fn builtin_keys() -> Vec<DiagnosticsKey> {
    fn key(role: &str, category: &str, detail: &[&str], description: &str) -> DiagnosticsKey {
        DiagnosticsKey {
            role: role.to_string(),
            category: category.to_string(),
            default_detail: detail.iter().map(|s| s.to_string()).collect(),
            description: description.to_string(),
        }
    }

    vec![
        key(
            ROLE_CONSOLE_PROXY,
            "logfiles",
            &["/var/log/cloud.log", "/var/log/patchsystemvm.log"],
            "Console proxy service logs",
        ),
        key(
            ROLE_CONSOLE_PROXY,
            "propertyfiles",
            &["agent.properties", "consoleproxy.properties"],
            "Console proxy agent property files",
        ),
        key(
            ROLE_CONSOLE_PROXY,
            "haproxy",
            &["haproxy.log", "haproxy.cfg"],
            "Console proxy load balancer state",
        ),
        key(
            ROLE_CONSOLE_PROXY,
            "iptables",
            &["/tmp/iptables.dump"],
            "Firewall rule dump",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "logfiles",
            &["/var/log/cloud.log", "/var/log/routerServiceMonitor.log"],
            "Virtual router service logs",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "haproxy",
            &["haproxy.log", "haproxy.cfg"],
            "Load balancer configuration and log",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "dhcp",
            &["/etc/dhcphosts.txt", "/var/log/dnsmasq.log"],
            "DHCP lease table and dnsmasq log",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "dns",
            &["/etc/dnsmasq.conf", "/etc/resolv.conf"],
            "DNS resolver configuration",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "userdata",
            &["/var/www/html/userdata/"],
            "Guest userdata served by the router",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "vpn",
            &["/var/log/charon.log", "/etc/ipsec.conf"],
            "Site-to-site VPN state",
        ),
        key(
            ROLE_DOMAIN_ROUTER,
            "iptables",
            &["/tmp/iptables.dump"],
            "Firewall rule dump",
        ),
        key(
            ROLE_SECONDARY_STORAGE,
            "logfiles",
            &["/var/log/cloud.log", "/var/log/agent.log"],
            "Secondary storage VM service logs",
        ),
        key(
            ROLE_SECONDARY_STORAGE,
            "propertyfiles",
            &["agent.properties", "ssvm.properties"],
            "Secondary storage VM property files",
        ),
        key(
            ROLE_SECONDARY_STORAGE,
            "iptables",
            &["/tmp/iptables.dump"],
            "Firewall rule dump",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
