//! Upload transports.
//!
//! A transport uploads one file at a time using a two-step protocol:
//! acquire an upload destination, then submit the file to it. Step 2 is
//! cancellable through a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! owned by the caller.
//!
//! # Example
//!
//! ```ignore
//! use filedrop_core::transport::{FileHandle, HttpTransport, UploadTransport};
//!
//! let transport = HttpTransport::new(config.transport.clone())?;
//! let cancel = CancellationToken::new();
//! transport.upload(&FileHandle::from_path("report.pdf"), &cancel).await?;
//! ```

mod http;
mod timeout;
mod types;

pub use http::HttpTransport;
pub use timeout::TimeoutTransport;
pub use types::{FileHandle, FileSource, UploadDestination, UploadError, UploadTransport};
