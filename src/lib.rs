//! # Media Dashboard Sync
//!
//! Preload and background synchronization core for a personal media-server
//! dashboard.
//!
//! On boot the core decides whether the state cached by a previous run can
//! be trusted. If it can, only cheap, fast-changing data is refreshed (the
//! fast path); otherwise every library section is rebuilt from the media
//! server, posters included (the full path). Once ready, a content monitor
//! periodically merges newly added media into the cache.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌────────────┐   ┌──────────────────┐
//! │ Orchestrator │──▶│ Evaluator  │──▶│ Fast │ Full       │
//! └──────┬───────┘   └────────────┘   │ preload pipeline │
//!        │ ready                      └────────┬─────────┘
//!        ▼                                     ▼
//! ┌──────────────┐                     ┌──────────────┐
//! │   Content    │────────────────────▶│ Cache store  │──▶ SQLite snapshot
//! │   monitor    │                     │ + posters    │
//! └──────────────┘                     └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mdsync init                   # create database
//! mdsync preload                # warm the cache
//! mdsync run                    # preload, then watch for new media
//! mdsync resync                 # force a full rebuild on next boot
//! mdsync status
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Sections, media items, section caches, markers |
//! | [`upstream`] | Media-server and poster-cache traits |
//! | [`http`] | HTTP media-server client |
//! | [`normalize`] | Upstream payload → model mapping |
//! | [`cache`] | In-memory cache store with SQLite snapshots |
//! | [`markers`] | Persistent preload markers |
//! | [`posters`] | Poster cache backends |
//! | [`evaluator`] | Fast-path decision |
//! | [`pipeline`] | Fast and full preload pipelines |
//! | [`monitor`] | Content monitor |
//! | [`scheduler`] | Periodic task runner |
//! | [`orchestrator`] | Boot-to-ready state machine |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod cache;
pub mod config;
pub mod context;
pub mod db;
pub mod enrich;
pub mod error;
pub mod evaluator;
pub mod events;
pub mod fingerprint;
pub mod http;
pub mod markers;
pub mod migrate;
pub mod models;
pub mod monitor;
pub mod normalize;
pub mod orchestrator;
pub mod pipeline;
pub mod posters;
pub mod progress;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod upstream;
