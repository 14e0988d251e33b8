//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that verify the reconciliation
//! and runner contracts without talking to a real provider.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, Record, RecordType, UpdateClient};
use ddns_core::{AddressState, MemoryProvider};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub const ZONE_ID: &str = "44a6dc905d4ff61b";
pub const ZONE_NAME: &str = "example.org";
pub const DOMAIN: &str = "foo.example.org";

/// A memory provider holding the `example.org` zone
pub async fn provider_with_zone() -> MemoryProvider {
    let provider = MemoryProvider::new();
    provider.add_zone(ZONE_ID, ZONE_NAME).await;
    provider
}

/// Build an address state, panicking on invalid test input
pub fn state(domains: &[&str], ipv4: Option<&str>, ipv6: Option<&str>, proxied: bool) -> AddressState {
    let mut state = AddressState::new(proxied);
    state.set_domains(domains);
    if let Some(addr) = ipv4 {
        state.set_ipv4(addr).unwrap();
    }
    if let Some(addr) = ipv6 {
        state.set_ipv6(addr).unwrap();
    }
    state
}

/// An existing record with a provider ID
pub fn existing(record_type: RecordType, name: &str, content: &str, id: &str) -> Record {
    Record::new(record_type, name, content, false).with_id(id)
}

/// A provider that fails selected calls and delegates the rest
pub struct FaultyProvider {
    inner: MemoryProvider,
    /// Zone lookups for this domain fail
    fail_zone_for: Option<String>,
    /// Writes to this domain fail
    fail_write_for: Option<String>,
}

impl FaultyProvider {
    pub fn new(inner: MemoryProvider) -> Self {
        Self {
            inner,
            fail_zone_for: None,
            fail_write_for: None,
        }
    }

    pub fn failing_zone(mut self, domain: &str) -> Self {
        self.fail_zone_for = Some(domain.to_string());
        self
    }

    pub fn failing_write(mut self, domain: &str) -> Self {
        self.fail_write_for = Some(domain.to_string());
        self
    }
}

#[async_trait]
impl DnsProvider for FaultyProvider {
    async fn resolve_zone(&self, domain: &str) -> Result<String> {
        if self.fail_zone_for.as_deref() == Some(domain) {
            return Err(Error::zone_not_found(domain));
        }
        self.inner.resolve_zone(domain).await
    }

    async fn list_records(
        &self,
        zone_id: &str,
        name: &str,
        record_type: Option<RecordType>,
    ) -> Result<Vec<Record>> {
        self.inner.list_records(zone_id, name, record_type).await
    }

    async fn write_record(&self, zone_id: &str, record: &Record) -> Result<()> {
        if self.fail_write_for.as_deref() == Some(record.name.as_str()) {
            return Err(Error::transient("503 Service Unavailable"));
        }
        self.inner.write_record(zone_id, record).await
    }

    fn provider_name(&self) -> &'static str {
        "faulty"
    }
}

/// An update client that counts passes and can fail or stall them
pub struct ScriptedClient {
    data: AddressState,
    /// Number of update() calls started
    started: Arc<AtomicUsize>,
    /// Number of update() calls that ran to completion
    completed: Arc<AtomicUsize>,
    /// Every update fails with a transient error
    fail: Arc<AtomicBool>,
    /// Time each update takes
    delay: Duration,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            data: state(&[DOMAIN], Some("100.100.100.100"), None, false),
            started: Arc::new(AtomicUsize::new(0)),
            completed: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Create a handle that shares counters with this client
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            started: Arc::clone(&self.started),
            completed: Arc::clone(&self.completed),
        }
    }
}

#[async_trait]
impl UpdateClient for ScriptedClient {
    fn data(&self) -> &AddressState {
        &self.data
    }

    fn data_mut(&mut self) -> &mut AddressState {
        &mut self.data
    }

    async fn update(&self) -> Result<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::transient("connection refused"));
        }
        Ok(())
    }

    fn client_name(&self) -> &'static str {
        "scripted"
    }
}

/// Read side of a [`ScriptedClient`]'s counters
#[derive(Clone)]
pub struct ClientHandle {
    started: Arc<AtomicUsize>,
    completed: Arc<AtomicUsize>,
}

impl ClientHandle {
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}
