//! Membership and role predicates.
//!
//! Every command resolves the caller's membership first and asks one of these
//! before it touches any state.

use crate::error::{EngineError, EngineResult};
use crate::models::group::{MemberRole, Membership};

/// Returns the membership when it exists and is active.
pub fn require_active_member(membership: Option<&Membership>) -> EngineResult<&Membership> {
    match membership {
        Some(m) if m.is_active => Ok(m),
        _ => Err(EngineError::NotAMember),
    }
}

pub fn require_officer(membership: Option<&Membership>) -> EngineResult<&Membership> {
    require_role(membership, MemberRole::is_officer, "officer role required")
}

/// Chairperson or treasurer.
pub fn require_loan_approver(membership: Option<&Membership>) -> EngineResult<&Membership> {
    require_role(
        membership,
        MemberRole::can_approve_loans,
        "chairperson or treasurer role required",
    )
}

/// Chairperson or secretary.
pub fn require_meeting_closer(membership: Option<&Membership>) -> EngineResult<&Membership> {
    require_role(
        membership,
        MemberRole::can_end_meeting,
        "chairperson or secretary role required",
    )
}

pub fn require_chairperson(membership: Option<&Membership>) -> EngineResult<&Membership> {
    require_role(
        membership,
        MemberRole::can_manage_roles,
        "chairperson role required",
    )
}

fn require_role<'a>(
    membership: Option<&'a Membership>,
    predicate: fn(&MemberRole) -> bool,
    reason: &str,
) -> EngineResult<&'a Membership> {
    let m = require_active_member(membership)?;
    if predicate(&m.role) {
        Ok(m)
    } else {
        Err(EngineError::InsufficientRole(reason.to_string()))
    }
}

/// Attendance may be written by the attendee or by someone who can end the meeting.
pub fn can_record_attendance_for(caller: &Membership, attendee: uuid::Uuid) -> bool {
    caller.user_id == attendee || caller.role.can_end_meeting()
}

/// Demoting the only chairperson would leave the group without one.
pub fn check_role_change(
    current: MemberRole,
    next: MemberRole,
    chairperson_count: i64,
) -> EngineResult<()> {
    if current == MemberRole::Chairperson && next != MemberRole::Chairperson && chairperson_count <= 1
    {
        return Err(EngineError::Validation(
            "A group must keep at least one chairperson".into(),
        ));
    }
    Ok(())
}
