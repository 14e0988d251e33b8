// # ddns-core
//
// Core library for the DDNS reconciliation system.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **AddressState**: Desired domains, addresses and proxy flag
// - **DnsProvider**: Trait for reading and writing DNS records via provider APIs
// - **Reconciler**: Diffs provider records against the state and converges them
// - **UpdateClient**: Trait for anything that converges DNS (direct or relayed)
// - **Runner**: Drives an update client on a fixed interval until shutdown
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and
//    transport implementations
// 2. **Stateless Passes**: Every pass is computed fresh from the provider's
//    current records; nothing is persisted
// 3. **Minimal Writes**: Only records whose content differs are written
// 4. **Library-First**: All core functionality can be used as a library

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod runner;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use client::DirectClient;
pub use config::{ClientConfig, MetricsConfig, Mode, ServerConfig};
pub use engine::{PassReport, Reconciler};
pub use error::{Error, Result};
pub use memory::MemoryProvider;
pub use runner::Runner;
pub use state::AddressState;
pub use traits::{ChangeObserver, DnsProvider, IpSource, IpVersion, UpdateClient};
