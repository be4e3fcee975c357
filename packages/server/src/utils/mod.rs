pub mod filename;
pub mod hash;
pub mod session;
