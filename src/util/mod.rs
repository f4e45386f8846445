//! Utility modules

mod tracing_setup;
mod view;

pub use tracing_setup::init_tracing;
pub use view::{bytes_as_str, bytes_to_string, str_as_bytes};
