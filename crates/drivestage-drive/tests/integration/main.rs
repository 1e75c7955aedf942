//! Integration tests for drivestage-drive
//!
//! Uses wiremock to simulate the Drive, Pub/Sub, token and metadata
//! endpoints and verifies the adapters end to end.

mod common;

mod test_auth;
mod test_files;
mod test_provider;
mod test_relay;
