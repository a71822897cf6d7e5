//! Library loading: the coordinator state machine and its notices.

mod coordinator;
#[cfg(test)]
pub(crate) mod fakes;
mod notice;

pub use coordinator::{ActiveAsset, AssetOrigin, LoadCoordinator, LoadState};
pub use notice::{LogNotifier, Notice, Notifier};
