pub mod frame_cell;

pub use frame_cell::{FrameCell, FrameCellStats};
