//! # Tiro
//!
//! A local-first personal content archive with relevance decay and
//! similarity relations.
//!
//! Tiro ingests extracted web articles and email newsletters into a
//! three-store library: markdown document units on disk, a relational
//! metadata store (SQLite), and an independent vector index for semantic
//! similarity. The ingestion pipeline keeps the stores convergent through
//! ordered writes, compensating deletes, and a reconcile sweep.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────┐   ┌─────────────────────────┐
//! │ Extracted │──▶│  Ingestion   │──▶│  Document Store (.md)   │
//! │  content  │   │   pipeline   │   │  Metadata Store (SQLite)│
//! └───────────┘   │ dedup/enrich │   │  Vector Index  (SQLite) │
//!                 └──────┬───────┘   └───────────┬─────────────┘
//!                        │                       │
//!                        ▼                       ▼
//!                 ┌──────────────┐        ┌──────────────┐
//!                 │  Relations   │        │  CLI (tiro)  │
//!                 │  KNN + notes │        │ list/rate/…  │
//!                 └──────────────┘        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tiro init                          # create the library
//! tiro ingest article.json          # ingest one extracted unit
//! tiro list --tier must-read        # browse the archive
//! tiro rate 12 love                 # rate (grants decay immunity)
//! tiro decay                        # recalculate relevance weights
//! tiro reconcile                    # converge the three stores
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`archive`] | Handle over the three stores |
//! | [`ingest`] | Ingestion pipeline and compensation logic |
//! | [`docstore`] | Markdown document units with front matter |
//! | [`metastore`] | Relational metadata operations |
//! | [`vector`] | Vector index and KNN queries |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`enrich`] | Tag/entity/summary extraction, connection notes |
//! | [`dedup`] | Advisory duplicate detection |
//! | [`decay`] | Relevance decay engine |
//! | [`relations`] | Similarity edge computation |
//! | [`reconcile`] | Cross-store consistency sweep |
//! | [`stats`] | Daily reading-stats aggregates |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod archive;
pub mod config;
pub mod db;
pub mod decay;
pub mod dedup;
pub mod docstore;
pub mod embedding;
pub mod enrich;
pub mod error;
pub mod ingest;
pub mod metastore;
pub mod migrate;
pub mod models;
pub mod reconcile;
pub mod relations;
pub mod stats;
pub mod vector;
