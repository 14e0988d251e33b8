// # Update Client Trait
//
// The capability the `Runner` drives: expose the mutable address state and
// converge the provider towards it.
//
// ## Implementations
//
// - [`crate::client::DirectClient`]: reconciles against a `DnsProvider`
// - `ddns_relay::RelayClient`: forwards the state to a relay server
//
// The two share this contract only, never an implementation.

use crate::state::AddressState;
use async_trait::async_trait;

/// Trait for update client implementations
///
/// # Concurrency
///
/// `update()` must not run concurrently with mutation through `data_mut()`.
/// The borrow rules enforce this for a single owner; the `Runner` only
/// mutates between ticks.
#[async_trait]
pub trait UpdateClient: Send + Sync {
    /// Desired state for the next update
    fn data(&self) -> &AddressState;

    /// Mutable access for resolvers populating the state before a tick
    fn data_mut(&mut self) -> &mut AddressState;

    /// Converge DNS records towards [`UpdateClient::data`]
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The provider matches the desired state
    /// - `Err(Error)`: The first failure; earlier writes stay applied
    async fn update(&self) -> Result<(), crate::Error>;

    /// Get the client name (for logging/debugging)
    fn client_name(&self) -> &'static str;
}
