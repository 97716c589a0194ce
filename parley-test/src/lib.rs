//! Test helpers shared by the Parley crates.

mod app;
pub mod keys;

pub use app::{TestApp, TestRequest, TestResponse};
