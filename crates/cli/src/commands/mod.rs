mod resolve;
mod serve;

pub use resolve::resolve;
pub use serve::serve;
