// # Store Implementations
//
// This module provides the in-process implementation of the UserStore and
// DnsStore traits. The MySQL implementation lives in `uberdns-store-mysql`.

pub mod memory;

pub use memory::MemoryStore;
