pub mod probe;
pub mod resolve;
pub mod version;
