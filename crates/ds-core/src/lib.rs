//! dirsweep Core Library
//!
//! This crate provides the directory filtering engine for dirsweep, a content
//! filter that removes blacklisted channels, categories and tags from a
//! streaming site's directory pages.
//!
//! # Architecture
//!
//! The engine is host-agnostic: all DOM access goes through the [`dom::Dom`]
//! trait and all persistence goes through the [`storage::KeyValueBackend`]
//! trait. The browser bindings crate supplies `web-sys` implementations; the
//! tests and the CLI use in-memory ones. Everything runs on one cooperative
//! execution context, so the re-entrancy guards in this crate protect against
//! overlapping timer callbacks, not parallelism.
//!
//! # Modules
//!
//! - `blacklist`: the three-type blacklist set with case-folded lookup
//! - `codec`: fragmentation codec between the blacklist and the key-value store
//! - `storage`: backend trait, in-memory backend, and the locked store
//! - `page`: URL path to page type classification
//! - `dom`: DOM trait, structured selectors, and the shared ancestor walk
//! - `extract`: page-type-specific item extraction
//! - `filter`: the keep/remove engine and scroll triggering
//! - `recommend`: sidebar recommendation filtering
//! - `lifecycle`: session state, polling contract, and orchestration

pub mod blacklist;
pub mod codec;
pub mod storage;
pub mod page;
pub mod dom;
pub mod extract;
pub mod filter;
pub mod recommend;
pub mod lifecycle;

#[cfg(test)]
pub mod testdom;

// Re-export commonly used types
pub use blacklist::{Blacklist, EntryKind, EntrySet};
pub use codec::{decode, encode, CodecError, EncodedBlacklist};
pub use storage::{BackendError, BlacklistStore, KeyValueBackend, MemoryBackend, StoreError};
pub use page::{classify, PageSet, PageType};
pub use dom::{Dom, NodeId, Selector};
pub use extract::{Extraction, Item, Parent};
pub use filter::{FilterEngine, PassReport, RemovalReason};
pub use lifecycle::{LifecycleController, PollTask, Scheduler, Session, TransportMessage};
