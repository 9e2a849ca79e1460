pub mod classifier;
pub mod config;
pub mod csv_loader;
pub mod decision;
pub mod error;
pub mod logger;
pub mod normalizer;
pub mod pipeline;
pub mod segmenter;
pub mod shaper;
pub mod types;
pub mod worker;

pub use classifier::{ClassifierError, GestureModel};
pub use config::{MLConfig, ModelAssets, NormalizationParams};
pub use decision::ClassificationResult;
pub use error::PipelineError;
pub use pipeline::{GesturePipeline, PipelineEvent};
pub use segmenter::{SegmentStatus, SegmenterParams, SegmenterState};
pub use types::SensorFrame;
