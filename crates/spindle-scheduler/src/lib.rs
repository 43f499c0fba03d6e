//! Publishing engines for Spindle.
//!
//! This crate provides:
//! - The scheduled-job engine: claim, generate or load content, publish as a
//!   reply chain, record posts, reschedule
//! - The comment-campaign engine: keyword search and generated replies
//! - Operator controls for jobs (pause, resume, run now, requeue)
//! - A fixed-interval poller driving both engines with graceful shutdown
//! - Stale-lease reclaiming for jobs whose run never finished

mod campaign;
mod clock;
mod config;
mod control;
mod error;
mod guard;
mod job;
mod notify;
mod poller;
mod recurrence;

pub use campaign::{CampaignEngine, CampaignRunSummary, SNIPPET_CHARS};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SchedulerConfig;
pub use control::JobControl;
pub use error::EngineError;
pub use job::{JobEngine, JobRunReport};
pub use notify::{EventType, LogNotifier, NotificationEvent, Notifier, WebhookNotifier};
pub use poller::Poller;
pub use recurrence::Recurrence;
