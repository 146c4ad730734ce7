mod admin;
mod lessons;
mod progress;
pub mod utils;

pub use utils::{test_db, test_utils};
