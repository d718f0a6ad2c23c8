pub mod download;
pub mod resolver;
pub mod ytdlp;

pub use download::AttachmentDownloader;
pub use resolver::{infer_kind, MediaReference, MediaResolver, ResolveError};
pub use ytdlp::YtDlpResolver;
