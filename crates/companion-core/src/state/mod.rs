// # Synced State
//
// Process-lifetime record of which hostnames have been reconciled against the
// DNS provider, and by which source priority.

pub mod synced;

pub use synced::SyncedState;
