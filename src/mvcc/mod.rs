pub mod controller;

pub use controller::{Generation, LiveSegment, MVCCController};
