//! Integration tests for sitesync-dropbox
//!
//! Uses wiremock to simulate the Dropbox API v2 (RPC and content hosts) and
//! verifies member selection, chunked upload sessions, streamed downloads
//! and the retry contract of the provider.

mod common;

mod test_connect;
mod test_files;
mod test_transfer;
