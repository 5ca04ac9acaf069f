pub mod batch_ctx;
pub mod checkpoint;
pub mod control;
pub mod events;
pub mod retry_engine;

pub use batch_ctx::BatchCtx;
pub use checkpoint::Checkpoint;
pub use control::{ControlInbox, ControlRequest, ControlSender, Halt};
pub use events::{EventSink, WorkerEvent};
pub use retry_engine::{Execution, Outcome, RetryEngine, RetryPolicy};
