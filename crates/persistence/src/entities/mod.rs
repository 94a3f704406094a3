//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod dividend;
pub mod group;
pub mod invitation;
pub mod loan;
pub mod meeting;
pub mod notification;
pub mod rotating_payout;
pub mod wallet;

pub use dividend::{DeclarationEntity, DividendPaymentEntity, ShareHoldingEntity};
pub use group::{GroupEntity, GroupSummaryEntity, MemberRoleDb, MembershipEntity};
pub use invitation::InvitationEntity;
pub use loan::{GuaranteeEntity, LoanEntity};
pub use meeting::{AttendanceEntity, MeetingEntity, MinutesEntity};
pub use notification::{
    GuaranteeSourceRow, InvitationSourceRow, LoanSourceRow, MeetingSourceRow,
    MemberJoinSourceRow, NotificationEntity, SupportSourceRow, TransactionSourceRow,
    WelfareSourceRow,
};
pub use rotating_payout::{CycleEntity, ParticipantEntity};
pub use wallet::{LedgerEntryEntity, WalletEntity};
