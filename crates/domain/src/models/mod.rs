//! Domain models for the chama group financial engine.

pub mod contribution;
pub mod dividend;
pub mod group;
pub mod invitation;
pub mod loan;
pub mod meeting;
pub mod notification;
pub mod rotating_payout;
pub mod wallet;

pub use contribution::{ContributeRequest, ContributionType};
pub use dividend::{DividendDeclaration, DividendPayment, ShareHolding};
pub use group::{Group, MemberRole, Membership};
pub use invitation::Invitation;
pub use loan::{Guarantee, Loan, LoanStatus};
pub use meeting::{Meeting, MeetingStatus};
pub use notification::{FeedItem, StoredNotification};
pub use rotating_payout::{AdvanceOutcome, RotatingPayoutCycle};
pub use wallet::{LedgerEntry, PaymentMethod, TransactionStatus, Wallet, WalletKind};
