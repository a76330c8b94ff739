//! # lessgoext
//!
//! Extension kit for axum services: a dynamic SQL engine driven by XML model
//! files, a registry of named SQLite pools, a set of HTTP middleware, a Swagger 2.0
//! generator and small config/file helpers.
//!
//! ## Modules
//!
//! - [`bitconv`]: byte size strings (`"4M"`, `"10MB"`) to numbers and back
//! - [`dbservice`]: named connection pools with a switchable default
//! - [`directsql`]: model registry, watcher and statement execution
//! - [`middleware`]: CORS, gzip, body limit, basic auth, trailing slash, method
//!   override, secure headers, static files and IP allowlists
//! - [`swagger`]: API description tree, `/swagger.json` and `/apidoc/`
//! - [`myconfig`]: keeps a serde struct in sync with an ini file
//! - [`copyfiles`]: recursive copy with suffix filter and transform hook
//! - [`routes`], [`app`], [`state`]: the demo server wiring
//! - [`config`], [`error`], [`metrics`], [`types`]: shared plumbing

pub mod app;
pub mod bitconv;
pub mod config;
pub mod copyfiles;
pub mod dbservice;
pub mod directsql;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod myconfig;
pub mod routes;
pub mod state;
pub mod swagger;
pub mod types;

#[cfg(test)]
mod tests;
