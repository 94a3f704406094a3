//! Builders for stored notifications written after a command commits.

use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::models::dividend::DividendPayment;
use crate::models::group::Group;
use crate::models::invitation::Invitation;
use crate::models::loan::{Guarantee, GuaranteeStatus, Loan, LoanStatus};
use crate::models::notification::{NewNotification, NotificationType};
use crate::models::rotating_payout::RotatingPayoutCycle;

pub fn guarantee_request(loan: &Loan, guarantee: &Guarantee) -> NewNotification {
    NewNotification {
        user_id: guarantee.guarantor_id,
        notification_type: NotificationType::GuaranteeRequest,
        title: "Guarantee request".into(),
        message: format!(
            "You have been asked to guarantee {} of a {} loan",
            guarantee.pledged_amount, loan.amount
        ),
        data: json!({
            "loan_id": loan.id,
            "guarantee_id": guarantee.id,
            "group_id": loan.group_id,
            "pledged_amount": guarantee.pledged_amount.to_string(),
        }),
    }
}

pub fn guarantee_response(loan: &Loan, guarantee: &Guarantee) -> NewNotification {
    let verb = match guarantee.status {
        GuaranteeStatus::Accepted => "accepted",
        GuaranteeStatus::Declined => "declined",
        GuaranteeStatus::Pending => "updated",
    };
    NewNotification {
        user_id: loan.borrower_id,
        notification_type: NotificationType::GuaranteeResponse,
        title: format!("Guarantee {}", verb),
        message: format!("A guarantor {} your loan request", verb),
        data: json!({
            "loan_id": loan.id,
            "guarantee_id": guarantee.id,
            "status": guarantee.status,
            "loan_status": loan.status,
        }),
    }
}

pub fn loan_decision(loan: &Loan) -> NewNotification {
    let (title, message) = match loan.status {
        LoanStatus::Approved => (
            "Loan approved".to_string(),
            format!("Your loan of {} was approved", loan.amount),
        ),
        LoanStatus::Rejected => (
            "Loan rejected".to_string(),
            format!(
                "Your loan of {} was rejected: {}",
                loan.amount,
                loan.rejection_reason.as_deref().unwrap_or("no reason given")
            ),
        ),
        other => (
            "Loan updated".to_string(),
            format!("Your loan is now {}", other),
        ),
    };
    NewNotification {
        user_id: loan.borrower_id,
        notification_type: NotificationType::LoanDecision,
        title,
        message,
        data: json!({ "loan_id": loan.id, "status": loan.status }),
    }
}

pub fn loan_disbursed(loan: &Loan, transaction_id: Uuid) -> NewNotification {
    NewNotification {
        user_id: loan.borrower_id,
        notification_type: NotificationType::LoanDisbursed,
        title: "Loan disbursed".into(),
        message: format!("{} has been credited to your wallet", loan.amount),
        data: json!({ "loan_id": loan.id, "transaction_id": transaction_id }),
    }
}

pub fn invitation(invitation: &Invitation, group: &Group) -> NewNotification {
    NewNotification {
        user_id: invitation.invitee_user_id,
        notification_type: NotificationType::Invitation,
        title: "Group invitation".into(),
        message: format!("You have been invited to join {}", group.name),
        data: json!({
            "invitation_id": invitation.id,
            "group_id": group.id,
            "role": invitation.role,
        }),
    }
}

pub fn payout_round(cycle: &RotatingPayoutCycle, recipient: Uuid) -> NewNotification {
    NewNotification {
        user_id: recipient,
        notification_type: NotificationType::PayoutRound,
        title: "Your payout round".into(),
        message: format!(
            "You are the recipient for round {} of {}",
            cycle.current_round, cycle.name
        ),
        data: json!({
            "cycle_id": cycle.id,
            "round": cycle.current_round,
            "next_payout_date": cycle.next_payout_date,
        }),
    }
}

pub fn dividend_paid(payment: &DividendPayment, group_id: Uuid) -> NewNotification {
    NewNotification {
        user_id: payment.member_id,
        notification_type: NotificationType::DividendPaid,
        title: "Dividend paid".into(),
        message: format!("{} dividend has been credited to your wallet", payment.amount),
        data: json!({
            "declaration_id": payment.declaration_id,
            "group_id": group_id,
            "amount": payment.amount.to_string(),
        }),
    }
}

pub fn contribution_received(
    recipient: Uuid,
    amount: Decimal,
    cycle: &RotatingPayoutCycle,
) -> NewNotification {
    NewNotification {
        user_id: recipient,
        notification_type: NotificationType::ContributionReceived,
        title: "Contribution received".into(),
        message: format!("{} received for round {}", amount, cycle.current_round),
        data: json!({
            "cycle_id": cycle.id,
            "amount": amount.to_string(),
        }),
    }
}
