pub mod keywords;
pub mod normalize;
pub mod overlay;
pub mod rank;
pub mod record;
pub mod sample;
pub mod suggest;
pub mod time_serde;

mod error;

pub use error::{Error, Result};
