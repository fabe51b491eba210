//! Local semantic memory for AI agents, served over MCP.
//!
//! memvault stores free-text memories with an embedding each, and retrieves
//! them by meaning. Memories are never physically removed: deleting one
//! leaves a tombstone, and revising one links the old record to its
//! replacement. Search runs over every stored embedding, old versions
//! included, but answers only with current versions.
//!
//! # Architecture
//!
//! - **Storage**: SQLite with [sqlite-vec](https://github.com/asg017/sqlite-vec)
//!   for nearest-neighbor search, or an in-memory store with a pluggable index
//! - **Embeddings**: Local ONNX Runtime with all-MiniLM-L6-v2 (384 dimensions),
//!   behind an LRU cache
//! - **Transport**: MCP over stdio or streamable HTTP
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, and health checks
//! - [`embedding`]: text-to-vector pipeline
//! - [`memory`]: the memory store contract, backends, and [`memory::MemoryService`]
//! - [`tools`]: MCP tool surface
//! - [`server`]: transports

pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod memory;
pub mod server;
pub mod tools;
