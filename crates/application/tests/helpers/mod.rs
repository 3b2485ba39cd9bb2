#![allow(dead_code)]

mod mock_upstream;

pub use mock_upstream::{query_message, MockUpstream, TableProcessor};
