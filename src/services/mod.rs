pub mod batch_planner;
pub mod pause;
pub mod rasterizer;
pub mod rate_limit;
pub mod transcript_writer;

pub use pause::{PauseController, PauseState, Tick};
pub use rasterizer::{PdftoppmRasterizer, Rasterizer};
pub use rate_limit::Classification;
pub use transcript_writer::TranscriptWriter;
