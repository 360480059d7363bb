//! 🫐欢迎光临🧠
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{save_volume, MriScan, NiftiHeaderAttr};

pub use crate::consts::mask::{is_background, is_foreground, MASK_BACKGROUND, MASK_FOREGROUND};
pub use crate::consts::{INTENSITY_PERCENTILE, NORMALIZED_MAX, PROB_THRESHOLD, WORKING_RESOLUTION};

pub use crate::dataset::{scan_walker, ScanWalker};
pub use crate::model::{binarize, MaskingModel, PredictError, ThresholdModel};
pub use crate::normalize::{normalize_slice, normalize_volume};
pub use crate::output::{output_file_name, parse_overlay_list, OverlayRecipe, OverlaySpec};
pub use crate::pipeline::{process, PipelineError, Report};
pub use crate::post_proc::{label_components, parse_footprint, refine_mask, Footprint};
pub use crate::resample::resize_volume;
