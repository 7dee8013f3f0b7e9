mod filters;
mod tasks;
mod users;

pub use filters::*;
pub use tasks::*;
pub use users::*;
