pub mod traits;

pub use traits::{Evicted, Store};
