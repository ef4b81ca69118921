// Conversion pipeline: sampled frames -> labeled frames -> slide deck

pub mod annotate;
pub mod orchestrator;
