pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod modifier;
pub mod network;
pub mod peer;
pub mod synchronizer;
pub mod tracker;
pub mod view;

pub use cache::{CacheCleanupReport, ModifiersCache};
pub use codec::{InvMessage, Message, ModifiersMessage, RequestMessage, SyncInfoMessage};
pub use config::SynchronizerConfig;
pub use error::SyncError;
pub use event::SyncEvent;
pub use modifier::{
    is_transaction_type, Modifier, ModifierBox, ModifierId, ModifierStatus, ModifierTypeId,
    PeerSyncStatus, SyncInfo, TRANSACTION_TYPE_ID,
};
pub use network::{NetworkController, SendTarget};
pub use peer::PeerHandle;
pub use synchronizer::Synchronizer;
pub use tracker::{DeliveryTracker, SyncTracker};
pub use view::{ApplicableResult, HistoryReader, MempoolReader, ModifierCodec, PenalizeHooks, ViewHolder};
