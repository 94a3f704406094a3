pub mod callbacks;
pub mod contributions;
pub mod cycles;
pub mod dividends;
pub mod groups;
pub mod health;
pub mod invitations;
pub mod loans;
pub mod meetings;
pub mod notifications;
pub mod wallets;
