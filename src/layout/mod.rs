pub mod engine;
pub mod metrics;
pub mod pdf;
pub mod wrap;

pub use engine::{Document, LayoutEngine};
pub use pdf::PdfRenderer;
