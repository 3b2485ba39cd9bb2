mod query_processor;
mod upstream_resolver;

pub use query_processor::QueryProcessor;
pub use upstream_resolver::UpstreamResolver;
