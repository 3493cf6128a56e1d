//! Mr. Learning - voice question-and-answer companion for children
//!
//! A child taps to talk, asks a question in Cantonese, and hears a short
//! answer read back. Parents manage a banned-word list, review the question
//! history and change the dashboard PIN behind a four-digit gate.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              Terminal UI  │  Parent dashboard         │
//! └───────────────┬──────────────────────┬───────────────┘
//!                 │ toggle / view        │ PIN gate
//! ┌───────────────▼───────────┐  ┌───────▼───────────────┐
//! │     SessionController     │  │      ParentGate       │
//! │ silence timer │ filter    │  │                       │
//! └──┬──────────┬──────────┬──┘  └───────┬───────────────┘
//!    │          │          │             │
//! ┌──▼─────┐ ┌──▼─────┐ ┌──▼────────┐ ┌──▼───────────────┐
//! │ Speech │ │ Speech │ │  Answer   │ │  SharedSettings  │
//! │ Source │ │  Sink  │ │ Provider  │ │  (SQLite kv)     │
//! └────────┘ └────────┘ └───────────┘ └──────────────────┘
//! ```

pub mod answer;
pub mod config;
pub mod db;
pub mod error;
pub mod filter;
pub mod history;
pub mod parent;
pub mod session;
pub mod settings;
pub mod store;
pub mod voice;

pub use answer::{AnswerProvider, ChatCompletionsProvider, FALLBACK_ANSWERS, fallback_answer};
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use history::{HistoryEntry, HistoryLog, MAX_HISTORY_ENTRIES};
pub use parent::{ParentError, ParentGate};
pub use session::{Reply, SessionController, SessionHandle, SessionState, SessionView};
pub use settings::{Settings, SharedSettings};
pub use store::{KeyValueStore, SqliteStore};
