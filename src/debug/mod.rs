// Debug module - opt-in diagnostics for the analysis pipeline

pub mod pipeline_tracer;
