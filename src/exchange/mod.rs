pub mod paper;
pub mod traits;

pub use paper::PaperExecutor;
pub use traits::{Executor, Fill, OpenRequest};
