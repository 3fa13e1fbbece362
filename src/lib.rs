pub mod campaign;
pub mod config;
pub mod link_sync;
pub mod notifier;
pub mod short_link;
