pub mod market;
pub mod record;

pub use market::*;
pub use record::*;
