//! Adapters for the remote dialogue service port.

mod http;

pub use http::HttpDialogueService;
