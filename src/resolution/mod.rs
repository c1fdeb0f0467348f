//! Relationship resolution.
//!
//! Turns placeholder endpoints written by the parsers (`resolve:` specifiers,
//! `external:` path guesses, untagged specifiers) into component ids or
//! external sentinels. [`RelationshipResolver`] runs one pass;
//! [`ResolveScheduler`] decides when passes run.
mod batch;
mod context;
mod locate;
mod namespace;
mod resolver;
mod scheduler;
mod source;
pub mod specifier;
mod stdlib;
mod target;

pub use batch::{process_in_batches, BatchBoundary, ItemResolver, PatchFlusher};
pub use context::{ResolutionContext, PREFETCH_CHUNK};
pub use namespace::ComposerResolver;
pub use resolver::RelationshipResolver;
pub use scheduler::{ResolveScheduler, SchedulerPhase};
pub use source::{best_guess, SourceResolutionEngine};
pub use stdlib::stdlib_name;
pub use target::TargetResolutionEngine;
