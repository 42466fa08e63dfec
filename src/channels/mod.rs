//! I/O edges of the service: attachment download, outbound mail, and the
//! webhook HTTP surface.

pub mod attachments;
pub mod dispatch;
pub mod mailgun;
pub mod smtp;
pub mod webhook;

pub use attachments::{AttachmentFetcher, HttpAttachmentFetcher};
pub use dispatch::MailDispatcher;
pub use mailgun::MailgunDispatcher;
pub use smtp::SmtpDispatcher;
pub use webhook::webhook_routes;
