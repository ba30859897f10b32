pub mod document;
pub mod inverted;
pub mod posting;
pub mod manifest;
