pub mod auth;
pub mod objects;
pub mod serve;
