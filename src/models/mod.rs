pub mod decode;
pub mod set;
pub mod workout;

pub use decode::parse_timestamp;
pub use set::RawSet;
pub use workout::RawWorkout;
