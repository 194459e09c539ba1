//! # Tether
//!
//! A schema-driven synchronization framework. Data entities ("things"),
//! mutations ("actions"), enumerations, and value types are declared once
//! in a schema; the resolver links that schema into an immutable,
//! strongly-typed graph; and the sync runtime keeps a local cache
//! consistent with a remote authoritative service by executing mutations
//! optimistically and reconciling results asynchronously.
//!
//! ## Core Components
//!
//! * `schema` - Schema type system, two-phase resolver, and query facade
//! * `reactive` - Recomputes locally-derivable fields from their declared
//!   dependencies, without network I/O
//! * `sync` - Cancelable one-shot operations over the local cache and the
//!   remote boundary
//! * `config` - Runtime configuration and resolved defaults
//!
//! ## Architecture
//!
//! The resolver supports cyclic references between things by allocating
//! stable identities for every declared name before linking. Field types
//! form a closed algebra; the open types (interfaces and varieties) answer
//! their concrete compatible thing set only once resolution has completed.
//! The runtime exposes every operation as a `PendingResult`: exactly one of
//! success or failure fires, then completion, exactly once, always, even
//! under cancellation.

pub mod config;
pub mod reactive;
pub mod schema;
pub mod sync;

// Re-export main types for convenience
pub use config::{load_runtime_config, DispatcherKind, RuntimeConfig, RuntimeDefaults};
pub use reactive::{ReactiveEvaluator, ReactiveRegistry};
pub use schema::types::JsonSchemaDefinition;
pub use schema::{resolve, SchemaCore, SchemaError, SchemaGraph, SchemaResult};
pub use sync::{
    ActionInvocation, LocalCache, MemoryCache, PendingResult, RemoteBoundary, RemoteRequest,
    SaveOutcome, SaveReport, SledCache, SyncError, SyncResult, SyncRuntime, ThingQuery,
    ThingRecord,
};

#[cfg(feature = "mock")]
pub use sync::MockRemote;
