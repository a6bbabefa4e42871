//! Vless protocol things

pub mod option;
pub use option::{Fallback, VlessOutboundSettings, VlessServer, VlessSettings, VlessUser};

pub mod link;
pub use link::{build_share_link, parse_share_link, parse_share_link_with, ShareLink};

pub mod error;
pub use error::ShareLinkError;
