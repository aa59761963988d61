pub mod activity;
pub mod queue;
pub mod recipients;
pub mod sequences;
pub mod templates;
