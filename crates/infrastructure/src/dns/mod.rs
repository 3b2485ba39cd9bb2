pub mod cache;
pub mod codec;
pub mod handler;
pub mod replace;
pub mod resolver;
pub mod server;
pub mod transport;

pub use cache::{Clock, ManualClock, RecordCache, SystemClock};
pub use resolver::{Resolver, RetryPolicy};
pub use server::{DnsServer, ServerHandle, DEFAULT_TCP_IDLE_TIMEOUT};
