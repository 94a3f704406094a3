//! Engine commands and external service integrations.

pub mod calendar;
pub mod contribution;
pub mod cycle;
pub mod dividend;
pub mod email;
pub mod engine;
pub mod group;
pub mod loan;
pub mod meeting;
pub mod notification;
pub mod wallet;

pub use calendar::HttpCalendarService;
pub use contribution::ContributionService;
pub use cycle::CycleService;
pub use dividend::DividendService;
pub use email::EmailService;
pub use engine::EngineContext;
pub use group::GroupService;
pub use loan::LoanService;
pub use meeting::MeetingService;
pub use notification::NotificationService;
pub use wallet::WalletService;
