mod book;
mod user;

pub use book::*;
pub use user::*;
