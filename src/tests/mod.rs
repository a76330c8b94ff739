//! Integration tests that need a database, model files or the assembled router.
//!
//! - **support**: shared fixture (temp SQLite database plus a demo model file)
//! - **directsql_tests**: engine operations called directly
//! - **directsql_api_tests**: the DirectSQL HTTP endpoints
//! - **health_api_tests**: health, readiness and metrics endpoints
//! - **middleware_tests**: configured middleware on the full app
//! - **swagger_api_tests**: `/swagger.json` and `/apidoc`
//! - **config_tests**: configuration loading and validation
//! - **error_tests**: error mapping and response bodies

pub mod support;

pub mod health_api_tests;
pub mod middleware_tests;
