//! Integration tests for evtrack-http
//!
//! Uses wiremock to simulate the sync server and verifies status and
//! error classification of the HttpTransport.

mod common;

mod test_transport;
