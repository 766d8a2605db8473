pub mod auth;
pub mod letters;
pub mod resource;
