#![allow(dead_code)]

mod builders;
mod mock_upstream;
mod zone_processor;

pub use builders::{a, aaaa, cname, query, txt};
pub use mock_upstream::{responder, MockUpstream, Reply, Responder};
pub use zone_processor::ZoneProcessor;
