//! 掩膜后处理流程集合.

mod footprint;
mod refine;

pub use footprint::{parse_footprint, Footprint, ParseFootprintError};

pub use refine::{label_components, refine_mask};
