pub mod project;
pub mod sync;
