//! Built-in task executors.

mod pull_file;
mod pull_icon;
mod render;

pub use pull_file::PullFileExecutor;
pub use pull_icon::PullIconExecutor;
pub use render::RenderExecutor;
