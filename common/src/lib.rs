pub mod hash;
pub mod serializer;
pub mod time;

pub use hash::Hash;
pub use serializer::{Reader, ReaderError, Serializer, Writer};
pub use time::{get_current_time_in_millis, TimestampMillis};
