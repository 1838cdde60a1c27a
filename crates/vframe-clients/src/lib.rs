//! Clients for the internal video-record and user-record services.

pub mod config;
pub mod error;
pub mod user;
pub mod video;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use user::{HttpUserServiceClient, UserService};
pub use video::{HttpVideoServiceClient, VideoService};
