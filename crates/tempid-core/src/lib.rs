//! # Temp-ID Core
//!
//! Resolution and caching engine for page-scoped temp-IDs: placeholders that
//! stand in for values (pseudonyms, patient identifiers) which must not be
//! embedded in a page directly.
//!
//! ## Architecture
//!
//! ```text
//! tempid-core/src/
//! ├── cache/      # Bounded (subject, key) -> value store, memory + persistent
//! ├── resolver/   # Batched, per-key and custom resolver strategies
//! ├── engine/     # Sessions, dedup, completion tracking, write-through
//! ├── transport/  # Transport boundary + reqwest implementation
//! └── config.rs   # Loading EngineConfig from JSON
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use tempid_core::ResolutionEngine;
//! use tempid_types::EngineConfig;
//!
//! # async fn run() -> tempid_core::CoreResult<()> {
//! let engine = ResolutionEngine::from_config(&EngineConfig::default())?;
//!
//! let mut session = engine.start_input(Some(Box::new(|| println!("all resolved"))));
//! session.resolve("patientName", "t-17", |value| println!("t-17 = {}", value));
//! session.end_input().join().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(test, allow(clippy::panic, clippy::print_stdout, clippy::expect_used))]

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod transport;

pub use cache::{MemoryCache, PersistentCache, TempIdCache};
pub use config::load_config;
pub use engine::{
    open_cache, CompletionCallback, ResolutionEngine, ResolutionEngineBuilder, ResolutionSession,
};
pub use error::{CoreError, CoreResult};
pub use resolver::{BatchedResolver, Dispatch, PerKeyResolver, Resolver, ResolverInput};
pub use transport::{HttpTransport, Transport, TransportRequest};
