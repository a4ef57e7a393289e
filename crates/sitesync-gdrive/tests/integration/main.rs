//! Integration tests for sitesync-gdrive
//!
//! Uses wiremock to simulate the Drive v3 API and verifies end-to-end
//! behavior of root discovery, the folder tree, chunked transfers and the
//! soft failure contract of the provider.

mod common;

mod test_auth;
mod test_transfer;
mod test_tree;
