pub mod resume;

pub use resume::{Document, Resume};
