//! callstream-core - shared library for the CallStream server.
//!
//! This crate implements the call-stream processor: a TETRA trunked-radio
//! event collector that decodes signaling and voice frames off a UDP feed,
//! assembles complete calls, persists them to a relational store, and
//! routes live voice to interception feeders and finished recordings to
//! playback clients.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`wire`]: Frame parsing off the raw UDP byte stream
//! - [`model`]: Decoded events, in-progress calls, and party identities
//! - [`bus`]: The Internal Bus connecting the four workers
//! - [`worker`]: The Ingestor, Persister, Media Router, and Tracer loops
//! - [`storage`]: Persistence trait plus in-memory and Postgres backends
//! - [`config`]: Nested configuration tree and environment overrides
//! - [`bootstrap`]: Wires the above into a running system
//! - [`error`]: Centralized error types
//!
//! # Abstraction Traits
//!
//! - [`storage::Storage`]: the relational persistence boundary
//! - [`alarm::AlarmRaiser`]: external alarm notification
//! - [`worker::TracePublisher`]: external trace sink
//!
//! Each has an in-memory or no-op implementation suitable for tests.

#![warn(clippy::all)]

pub mod alarm;
pub mod bootstrap;
pub mod bus;
pub mod child;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol_constants;
pub mod storage;
pub mod utils;
pub mod wav;
pub mod wire;
pub mod worker;

// Re-export the wiring entry point at the crate root.
pub use bootstrap::{bootstrap, BootstrappedServices};

// Re-export error types.
pub use error::{AppError, AppResult, ErrorKind};

// Re-export configuration.
pub use config::Config;

// Re-export the Internal Bus.
pub use bus::{Bus, Publication, RecvOutcome, Subscription};

// Re-export the decoded domain model.
pub use model::{
    Call, CallAction, CallKind, Event, Feeder, GroupCallAction, LiveCall, Number,
    PartyIdentity, PayloadKind, Player, Pool, ReceivedAt, ReleaseCause, StreamOriginator, Tsi,
};

// Re-export storage types.
pub use storage::{MemoryStorage, PostgresStorage, Storage};
