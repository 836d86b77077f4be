//! File pipeline: streams of files and the stages that move them between
//! the source, intermediate, and output directories.

mod stages;
pub mod stream;

pub use stages::{Pipeline, Stage};
pub use stream::SourceFile;
