mod clear_cache;
mod ensure;
mod render;
mod status;

pub use clear_cache::run_clear_cache;
pub use ensure::run_ensure;
pub use render::run_render;
pub use status::run_status;
