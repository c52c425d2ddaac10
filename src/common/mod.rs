pub mod compression;
pub mod http;

pub use compression::{ContentEncoding, detect_encodings, read_body};
pub use http::{HyperClient, TlsOptions, build_hyper_client};
