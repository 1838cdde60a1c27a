//! Notification worker.
//!
//! Consumes notification jobs, resolves the user and video they refer to,
//! renders an HTML email and sends it over SMTP. Every attempt is recorded
//! as a notification row.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mailer;
pub mod templates;

pub use config::{MailConfig, NotifierConfig};
pub use dispatcher::{NotificationDeps, NotificationDispatcher};
pub use error::{MailError, NotifyError, NotifyResult};
pub use mailer::{Mailer, SmtpMailer};
pub use templates::{EmailData, Templates};
