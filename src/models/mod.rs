pub mod batch;
pub mod document;

pub use batch::{Batch, BatchKind, BatchPlan, OrderEntry, PlanMode};
pub use document::{Document, DocumentQueue, Group, Page, SharedQueue};
