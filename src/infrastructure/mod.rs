pub mod js_executor;
pub mod locator;

pub use js_executor::JsExecutor;
pub use locator::LocatorList;
