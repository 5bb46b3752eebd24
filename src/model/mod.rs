//! 定义了整个库通用的、与具体平台无关的核心数据模型。

pub mod aggregate;
pub mod record;

pub use aggregate::{AggregateRecord, ReviewStats};
pub use record::{NewTrack, StoredTrack, TrackFilter, TrackPatch, TrackRecord};
