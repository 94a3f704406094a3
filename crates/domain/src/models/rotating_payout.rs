//! Rotating payout ("merry-go-round") cycle models and round rules.

use chrono::{DateTime, Duration, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;
use validator::Validate;

use crate::error::{EngineError, EngineResult};
use shared::validation::validate_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payout_frequency", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PayoutFrequency {
    Weekly,
    Monthly,
}

impl PayoutFrequency {
    /// Date of the `periods`-th payout after `start`.
    pub fn offset(self, start: DateTime<Utc>, periods: u32) -> Option<DateTime<Utc>> {
        match self {
            PayoutFrequency::Weekly => {
                start.checked_add_signed(Duration::days(7 * i64::from(periods)))
            }
            PayoutFrequency::Monthly => start.checked_add_months(Months::new(periods)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "cycle_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RotatingPayoutCycle {
    pub id: Uuid,
    pub group_id: Uuid,
    pub name: String,
    pub amount_per_round: Decimal,
    pub frequency: PayoutFrequency,
    pub total_participants: i32,
    pub current_round: i32,
    pub status: CycleStatus,
    pub start_date: DateTime<Utc>,
    pub next_payout_date: DateTime<Utc>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Participant {
    pub cycle_id: Uuid,
    pub user_id: Uuid,
    pub position: i32,
    pub has_received: bool,
}

/// Request payload for creating a cycle. Participants are in payout order.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct CreateCycleRequest {
    #[validate(length(
        min = 1,
        max = 100,
        message = "Name must be between 1 and 100 characters"
    ))]
    pub name: String,

    #[validate(custom(function = "validate_money"))]
    pub amount_per_round: Decimal,

    pub frequency: PayoutFrequency,

    pub start_date: Option<DateTime<Utc>>,

    pub participants: Vec<Uuid>,
}

/// Result of evaluating round advancement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    RoundInProgress { round: i32, contributions: i64 },
    Advanced { round: i32 },
    CycleCompleted,
}

/// Checks participant ordering: at least two, no duplicates.
pub fn validate_participants(participants: &[Uuid]) -> EngineResult<()> {
    if participants.len() < 2 {
        return Err(EngineError::Validation(
            "A cycle needs at least two participants".into(),
        ));
    }
    let distinct: HashSet<&Uuid> = participants.iter().collect();
    if distinct.len() != participants.len() {
        return Err(EngineError::Validation(
            "Participants must be distinct".into(),
        ));
    }
    Ok(())
}

/// Number of contributors that completes a round: everyone but the recipient.
pub fn contributions_to_complete(total_participants: i32) -> i64 {
    i64::from(total_participants) - 1
}

impl RotatingPayoutCycle {
    /// Decides the next state of the cycle given the distinct completed
    /// contributor count for the current round, and applies it.
    pub fn advance(&mut self, contributions: i64) -> EngineResult<AdvanceOutcome> {
        if self.status != CycleStatus::Active {
            return Err(EngineError::NoActiveCycle);
        }
        let round = self.current_round;
        if contributions < contributions_to_complete(self.total_participants) {
            return Ok(AdvanceOutcome::RoundInProgress {
                round,
                contributions,
            });
        }
        if round >= self.total_participants {
            self.status = CycleStatus::Completed;
            return Ok(AdvanceOutcome::CycleCompleted);
        }

        let next = round + 1;
        let periods = u32::try_from(next)
            .map_err(|_| EngineError::Internal("round index out of range".into()))?;
        self.next_payout_date = self
            .frequency
            .offset(self.start_date, periods)
            .ok_or_else(|| EngineError::Internal("payout date out of range".into()))?;
        self.current_round = next;
        Ok(AdvanceOutcome::Advanced { round: next })
    }
}

/// Cycle with participants and the current recipient.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct CycleDetail {
    #[serde(flatten)]
    pub cycle: RotatingPayoutCycle,
    pub participants: Vec<Participant>,
    pub current_recipient: Option<Uuid>,
    pub contributors_this_round: Vec<Uuid>,
    pub remaining_contributors: Vec<Uuid>,
}

impl CycleDetail {
    pub fn new(
        cycle: RotatingPayoutCycle,
        participants: Vec<Participant>,
        contributors_this_round: Vec<Uuid>,
    ) -> Self {
        let current_recipient = participants
            .iter()
            .find(|p| p.position == cycle.current_round)
            .map(|p| p.user_id);
        let remaining_contributors = if cycle.status == CycleStatus::Active {
            participants
                .iter()
                .map(|p| p.user_id)
                .filter(|u| Some(*u) != current_recipient && !contributors_this_round.contains(u))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            cycle,
            participants,
            current_recipient,
            contributors_this_round,
            remaining_contributors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn cycle(n: i32, frequency: PayoutFrequency) -> RotatingPayoutCycle {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
        RotatingPayoutCycle {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            name: "Round robin".into(),
            amount_per_round: dec!(500),
            frequency,
            total_participants: n,
            current_round: 1,
            status: CycleStatus::Active,
            start_date: start,
            next_payout_date: frequency.offset(start, 1).unwrap(),
            created_by: Uuid::new_v4(),
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn test_round_in_progress_until_n_minus_one() {
        let mut c = cycle(3, PayoutFrequency::Monthly);
        assert_eq!(
            c.advance(1).unwrap(),
            AdvanceOutcome::RoundInProgress {
                round: 1,
                contributions: 1
            }
        );
        assert_eq!(c.current_round, 1);
    }

    #[test]
    fn test_advance_moves_round_and_payout_date() {
        let mut c = cycle(3, PayoutFrequency::Monthly);
        assert_eq!(c.advance(2).unwrap(), AdvanceOutcome::Advanced { round: 2 });
        assert_eq!(c.current_round, 2);
        assert_eq!(
            c.next_payout_date,
            Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_weekly_payout_date() {
        let mut c = cycle(4, PayoutFrequency::Weekly);
        c.advance(3).unwrap();
        assert_eq!(
            c.next_payout_date,
            Utc.with_ymd_and_hms(2024, 1, 29, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_last_round_completes_cycle() {
        let mut c = cycle(2, PayoutFrequency::Weekly);
        c.current_round = 2;
        assert_eq!(c.advance(1).unwrap(), AdvanceOutcome::CycleCompleted);
        assert_eq!(c.status, CycleStatus::Completed);
        assert!(matches!(c.advance(1), Err(EngineError::NoActiveCycle)));
    }

    #[test]
    fn test_advance_without_new_contributions_is_noop() {
        let mut c = cycle(3, PayoutFrequency::Monthly);
        c.advance(2).unwrap();
        // Round 2 has no contributions yet.
        assert_eq!(
            c.advance(0).unwrap(),
            AdvanceOutcome::RoundInProgress {
                round: 2,
                contributions: 0
            }
        );
        assert_eq!(c.current_round, 2);
    }

    #[test]
    fn test_participant_validation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_participants(&[a, b]).is_ok());
        assert!(validate_participants(&[a]).is_err());
        assert!(validate_participants(&[a, b, a]).is_err());
    }

    #[test]
    fn test_cycle_detail_current_recipient_and_remaining() {
        let c = cycle(3, PayoutFrequency::Monthly);
        let users: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let participants: Vec<Participant> = users
            .iter()
            .enumerate()
            .map(|(i, u)| Participant {
                cycle_id: c.id,
                user_id: *u,
                position: i as i32 + 1,
                has_received: false,
            })
            .collect();
        let detail = CycleDetail::new(c, participants, vec![users[1]]);
        assert_eq!(detail.current_recipient, Some(users[0]));
        assert_eq!(detail.remaining_contributors, vec![users[2]]);
    }
}
