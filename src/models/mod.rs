//! Database row models

mod booking;
mod partner;
mod seat;

pub use booking::*;
pub use partner::*;
pub use seat::*;
