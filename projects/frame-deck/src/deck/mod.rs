pub mod builder;
pub mod package;
pub mod parts;
