pub mod client;
pub mod progress;
pub mod webdav;

pub use client::SyncClient;
pub use progress::ProgressFn;
pub use webdav::WebDavClient;
