pub mod archive;
pub mod context;
pub mod docx;
pub mod error;
pub mod pipeline;
pub mod progress;
pub mod tables;
