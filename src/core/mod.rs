pub mod item;
pub mod logger;
pub mod query;
pub mod query_processor;

pub use item::*;
pub use query::*;
pub use query_processor::*;
