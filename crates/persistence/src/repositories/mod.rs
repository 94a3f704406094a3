//! Repository implementations for database operations.
//!
//! Each module pairs a pool-backed repository for reads with free functions
//! that take `&mut PgConnection` and run inside a [`crate::UnitOfWork`].

pub mod dividend;
pub mod group;
pub mod invitation;
pub mod ledger;
pub mod loan;
pub mod meeting;
pub mod notification;
pub mod rotating_payout;

pub use dividend::DividendRepository;
pub use group::GroupRepository;
pub use invitation::{InvitationRepository, NewInvitation};
pub use ledger::LedgerRepository;
pub use loan::{LoanRepository, NewLoan};
pub use meeting::MeetingRepository;
pub use notification::NotificationRepository;
pub use rotating_payout::CycleRepository;
