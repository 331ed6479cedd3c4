//! Email processing pipeline: normalize → analyze → persist.

pub mod analyzer;
pub mod ingest;
pub mod normalizer;

pub use analyzer::{AiAnalyzer, AnalysisResult, AnalysisSource};
pub use ingest::EmailPipeline;
pub use normalizer::ContentNormalizer;
