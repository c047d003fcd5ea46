pub mod comment;
pub mod post;
pub mod profile;
pub mod user;
