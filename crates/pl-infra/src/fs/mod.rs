mod atomic;
mod paths;

pub use atomic::write_atomic;
pub use paths::UserDataPathProvider;
