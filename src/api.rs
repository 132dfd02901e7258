pub mod greet;
pub mod root;
pub mod version;
