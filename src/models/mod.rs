pub mod achievement;
pub mod cat;
pub mod user;
