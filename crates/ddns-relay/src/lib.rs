// # ddns-relay
//
// Relay mode for the DDNS system: address resolution on one host, provider
// credential and reconciliation on another.
//
// ```text
//  ┌─────────────┐   GET /?domains=..&ipv4=..   ┌──────────────┐   API v4   ┌──────────┐
//  │ RelayClient │ ───────────────────────────▶ │ relay server │ ─────────▶ │ provider │
//  └─────────────┘ ◀─────────────────────────── └──────────────┘            └──────────┘
//                     {"success":..,"msg":..}     Reconciler
// ```

pub mod client;
pub mod server;
pub mod wire;

pub use client::RelayClient;
pub use server::{ApiError, AppState, PASS_TIMEOUT, router, serve};
pub use wire::{UpdateQuery, UpdateResponse};
