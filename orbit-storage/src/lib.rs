//! Orbit Storage - Collaborator Traits and Synchronization
//!
//! Async traits for the stores the core depends on, in-memory implementations
//! of each, and the synchronizer that keeps cached prompt states in step with
//! the action log.

pub mod memory;
pub mod synchronizer;
pub mod traits;

pub use memory::{InMemoryActionLogStore, InMemoryAttachmentStore, InMemoryPromptStateStore};
pub use synchronizer::{RecordOutcome, ReviewStateSynchronizer};
pub use traits::{ActionLogStore, AttachmentResolver, CachedPromptState, PromptStateStore};
