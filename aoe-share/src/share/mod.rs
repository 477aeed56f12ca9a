pub mod handle;
pub mod lifecycle;

pub use handle::Share;
pub use lifecycle::AoeShareController;
