pub mod list;
pub mod types;
pub mod upload;

pub use types::*;

pub use list::list_files;
pub use upload::upload_files;
