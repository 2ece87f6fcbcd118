//! Trading Session
//!
//! Orchestration around the risk engine: the execution boundary, a paper
//! executor, user notifications and the session loop.

mod executor;
mod notify;
mod session;
mod settings;

pub use executor::{ContractExecutor, PaperExecutor, PaperExecutorConfig};
pub use notify::{Notification, StopReason};
pub use session::{SessionConfig, SessionReport, TradingSession};
pub use settings::{load_settings, Settings};
