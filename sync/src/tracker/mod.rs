mod delivery;
mod sync_tracker;

pub use delivery::DeliveryTracker;
pub use sync_tracker::SyncTracker;
