pub mod config;
pub mod dispatch;
pub mod registry;
pub mod scheduler;
pub mod universe;

pub use config::{
    SchedulerConfig, Subscription, DEFAULT_FIRST_DELAY, DEFAULT_FUNDING_THRESHOLD,
    DEFAULT_SCAN_INTERVAL,
};
pub use dispatch::{AlertEvent, ChannelAlertSink, IAlertSink, LogAlertSink};
pub use registry::{
    Activation, Completion, CycleGuard, CycleTicket, SubscriberId, SubscriberRegistry,
    SubscriberScanState,
};
pub use scheduler::{CycleOutcome, Scheduler};
pub use universe::InstrumentUniverse;
