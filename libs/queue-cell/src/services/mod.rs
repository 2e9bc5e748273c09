pub mod notifier;
pub mod ranking;
pub mod visits;
