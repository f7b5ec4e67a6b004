// Calibration: historical effort data and the fuzzy lookup over it.
// The store is loaded once at startup and shared read-only; nothing on the request path mutates it.

pub mod handlers;
pub mod loader;
pub mod matcher;
pub mod normalizer;
pub mod store;

pub use matcher::CalibrationMatcher;
pub use store::{round1, CalibrationStore};
