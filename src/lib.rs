pub mod account;
pub mod collector;
pub mod commands;
pub mod config;
pub mod delay_manager;
pub mod error;
pub mod export;
pub mod extractor;
pub mod input_loader;
pub mod logger;
pub mod network;
pub mod resume_manager;
pub mod scheduler;
pub mod session;
pub mod testing;

// Exporting types for convenience
pub use account::{Account, Edge, Profile};
pub use collector::{CollectOutcome, Collector, CollectorOptions, ListView, SeenSet, StopReason};
pub use config::Config;
pub use delay_manager::{Pacing, StopSignal, Wait};
pub use error::{CollectError, ExtractionError, PersistenceError, RunError, SessionError};
pub use network::{Ranking, RelationshipGraph};
pub use resume_manager::{CheckpointStore, CsvCheckpointStore};
pub use scheduler::{BatchReport, Scheduler};
pub use session::{Candidate, HttpSession, ItemExtractor, SessionProvider};
