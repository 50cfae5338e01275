//! Library exports for the regime engine.

pub mod analytics; // Dynamic Liquidity Analyzer
pub mod classifier; // Market regime classifier
pub mod config; // Configuration management
pub mod engine; // Orchestrator
pub mod error;
pub mod http; // Health/status/performance + whale webhook
pub mod ingest; // Order book, derivatives, whale intake
pub mod logging; // Stateful dedupe logger
pub mod notifier; // Telegram sink
pub mod scheduler; // Task scheduler + worker pool
