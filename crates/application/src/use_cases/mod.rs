pub mod transaction;

pub use transaction::{PassthroughOptions, RespondOptions, Section, Transaction};
