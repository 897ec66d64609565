pub mod processor;
pub mod retry;
pub mod store;
pub mod topology;

pub use processor::*;
pub use retry::*;
pub use store::*;
pub use topology::*;
