//! Window planning: overlapping segmentation and batch grouping.

pub mod batch;
pub mod segmenter;

pub use batch::BatchScheduler;
pub use segmenter::{Segmenter, SegmenterConfig, Window};
