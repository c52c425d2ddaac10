pub mod multistatus;
pub mod session;
pub mod types;
pub mod uri;
pub mod xml;

pub use multistatus::{DavProps, DavResource, parse_multistatus};
pub use session::DavSession;
pub use types::{DavOutcome, DavRequest, DavResponse, Depth};
pub use uri::{DavUri, escape, normalize_path, unescape};
pub use xml::escape_xml;
