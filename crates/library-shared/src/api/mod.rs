mod auth;
mod books;
mod users;

pub use auth::*;
pub use books::*;
pub use users::*;
