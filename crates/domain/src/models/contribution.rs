//! Contribution intake models and the payment-method policy matrix.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use super::group::{Group, MemberRole};
use super::wallet::{LedgerEntry, PaymentMethod};
use crate::error::{EngineError, EngineResult};
use shared::validation::validate_money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    Regular,
    Penalty,
    Special,
    RotatingPayout,
}

impl ContributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionType::Regular => "regular",
            ContributionType::Penalty => "penalty",
            ContributionType::Special => "special",
            ContributionType::RotatingPayout => "rotating_payout",
        }
    }
}

impl fmt::Display for ContributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CashType {
    Cash,
    Cheque,
}

/// Request payload for a contribution.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct ContributeRequest {
    #[validate(custom(function = "validate_money"))]
    pub amount: Decimal,

    #[serde(rename = "type", default = "default_contribution_type")]
    pub contribution_type: ContributionType,

    pub payment_method: PaymentMethod,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    #[validate(regex(
        path = *EXTERNAL_REFERENCE_REGEX,
        message = "External reference must be 1-100 letters, digits, '-' or '_'"
    ))]
    pub external_reference: Option<String>,

    pub on_behalf_of_user: Option<Uuid>,

    pub cash_type: Option<CashType>,

    #[serde(default)]
    pub is_anonymous: bool,
}

fn default_contribution_type() -> ContributionType {
    ContributionType::Regular
}

lazy_static::lazy_static! {
    static ref EXTERNAL_REFERENCE_REGEX: regex::Regex =
        regex::Regex::new(r"^[A-Za-z0-9_-]{1,100}$").unwrap();
}

/// Where the credit side of a contribution lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditTarget {
    GroupWallet,
    RecipientWallet,
    /// Mobile money: credited on confirmation.
    Deferred,
}

/// Outcome of checking a contribution against the payment-method matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContributionPlan {
    /// The member whose aggregates move.
    pub contributor: Uuid,
    pub debit_initiator: bool,
    pub credit_target: CreditTarget,
    pub recorded_by: Option<Uuid>,
}

/// Checks the request against the payment-method matrix and the
/// rotating-payout restrictions. Membership of the initiator (and of the
/// member paid for, for operator-recorded methods) is resolved by the caller
/// and passed in as roles.
pub fn plan_contribution(
    group: &Group,
    initiator: Uuid,
    initiator_role: MemberRole,
    request: &ContributeRequest,
    max_amount: Decimal,
) -> EngineResult<ContributionPlan> {
    if request.amount <= Decimal::ZERO {
        return Err(EngineError::InvalidAmount(
            "Amount must be greater than zero".into(),
        ));
    }
    if request.amount > max_amount {
        return Err(EngineError::InvalidAmount(format!(
            "Amount exceeds the maximum of {}",
            max_amount
        )));
    }

    let rotating = request.contribution_type == ContributionType::RotatingPayout;
    if rotating {
        if !matches!(
            request.payment_method,
            PaymentMethod::InternalWallet | PaymentMethod::MobileMoney
        ) {
            return Err(EngineError::InvalidPaymentMethod(format!(
                "{} is not accepted for rotating payouts",
                request.payment_method
            )));
        }
        if request.is_anonymous {
            return Err(EngineError::Validation(
                "Anonymous contributions are not allowed for rotating payouts".into(),
            ));
        }
    }
    if request.is_anonymous && group.is_rotating() {
        return Err(EngineError::Validation(
            "Anonymous contributions are not allowed in merry-go-round groups".into(),
        ));
    }

    let credit_target = if !request.payment_method.settles_immediately() {
        CreditTarget::Deferred
    } else if rotating {
        CreditTarget::RecipientWallet
    } else {
        CreditTarget::GroupWallet
    };

    match request.payment_method {
        PaymentMethod::InternalWallet => Ok(ContributionPlan {
            contributor: initiator,
            debit_initiator: true,
            credit_target,
            recorded_by: None,
        }),
        PaymentMethod::MobileMoney => {
            if request.external_reference.is_none() {
                return Err(EngineError::MissingRequiredField(
                    "external_reference".into(),
                ));
            }
            Ok(ContributionPlan {
                contributor: initiator,
                debit_initiator: false,
                credit_target,
                recorded_by: None,
            })
        }
        PaymentMethod::Cash | PaymentMethod::Cheque => {
            if !initiator_role.can_approve_loans() {
                return Err(EngineError::InsufficientRole(
                    "only the chairperson or treasurer can record cash and cheque payments".into(),
                ));
            }
            let member = request
                .on_behalf_of_user
                .ok_or_else(|| EngineError::MissingRequiredField("on_behalf_of_user".into()))?;
            Ok(ContributionPlan {
                contributor: member,
                debit_initiator: false,
                credit_target,
                recorded_by: Some(initiator),
            })
        }
    }
}

/// Round context attached to a rotating-payout contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundContext {
    pub cycle_id: Uuid,
    pub round: i32,
    pub recipient_id: Uuid,
}

/// Structured metadata stored on a contribution ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ContributionMetadata {
    #[serde(rename = "type")]
    pub kind: String,
    pub group_id: Uuid,
    pub contribution_type: ContributionType,
    pub contributor_id: Uuid,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recorded_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cash_type: Option<CashType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_id: Option<Uuid>,
}

impl ContributionMetadata {
    pub fn new(
        group_id: Uuid,
        request: &ContributeRequest,
        plan: &ContributionPlan,
        round: Option<RoundContext>,
    ) -> Self {
        Self {
            kind: "group_contribution".into(),
            group_id,
            contribution_type: request.contribution_type,
            contributor_id: plan.contributor,
            is_anonymous: request.is_anonymous,
            recorded_by: plan.recorded_by,
            cash_type: request.cash_type,
            cycle_id: round.map(|r| r.cycle_id),
            round: round.map(|r| r.round),
            recipient_id: round.map(|r| r.recipient_id),
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Response after a contribution is accepted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ContributionResponse {
    pub transaction: LedgerEntry,
    pub group_total_funds: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round: Option<super::rotating_payout::AdvanceOutcome>,
}

/// Gateway confirmation body.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "snake_case")]
pub struct MobileMoneyCallback {
    #[validate(regex(path = *EXTERNAL_REFERENCE_REGEX))]
    pub external_reference: String,
    pub status: CallbackStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::group::{ContributionFrequency, GroupCategory, ROTATING_SUBTYPE};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn group(subtype: Option<&str>) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "Test".into(),
            description: None,
            category: GroupCategory::Chama,
            subtype: subtype.map(String::from),
            contribution_amount: dec!(500),
            contribution_frequency: ContributionFrequency::Monthly,
            target_amount: None,
            payment_recipient_name: None,
            payment_recipient_account: None,
            is_public: false,
            max_members: 50,
            member_count: 3,
            total_funds: dec!(0),
            currency: "KES".into(),
            is_active: true,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn request(method: PaymentMethod) -> ContributeRequest {
        ContributeRequest {
            amount: dec!(1200),
            contribution_type: ContributionType::Regular,
            payment_method: method,
            description: None,
            external_reference: None,
            on_behalf_of_user: None,
            cash_type: None,
            is_anonymous: false,
        }
    }

    const CAP: Decimal = dec!(1000000);

    #[test]
    fn test_internal_wallet_debits_and_credits_group() {
        let me = Uuid::new_v4();
        let plan = plan_contribution(
            &group(None),
            me,
            MemberRole::Member,
            &request(PaymentMethod::InternalWallet),
            CAP,
        )
        .unwrap();
        assert_eq!(plan.contributor, me);
        assert!(plan.debit_initiator);
        assert_eq!(plan.credit_target, CreditTarget::GroupWallet);
    }

    #[test]
    fn test_mobile_money_requires_reference_and_defers_credit() {
        let me = Uuid::new_v4();
        let err = plan_contribution(
            &group(None),
            me,
            MemberRole::Member,
            &request(PaymentMethod::MobileMoney),
            CAP,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MissingRequiredField(_)));

        let mut req = request(PaymentMethod::MobileMoney);
        req.external_reference = Some("MPESA123".into());
        let plan = plan_contribution(&group(None), me, MemberRole::Member, &req, CAP).unwrap();
        assert!(!plan.debit_initiator);
        assert_eq!(plan.credit_target, CreditTarget::Deferred);
    }

    #[test]
    fn test_cash_requires_purse_holder() {
        let mut req = request(PaymentMethod::Cash);
        req.on_behalf_of_user = Some(Uuid::new_v4());
        let err = plan_contribution(
            &group(None),
            Uuid::new_v4(),
            MemberRole::Secretary,
            &req,
            CAP,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientRole(_)));
    }

    #[test]
    fn test_cash_attributes_contribution_to_member() {
        let treasurer = Uuid::new_v4();
        let member = Uuid::new_v4();
        let mut req = request(PaymentMethod::Cheque);
        req.on_behalf_of_user = Some(member);
        let plan =
            plan_contribution(&group(None), treasurer, MemberRole::Treasurer, &req, CAP).unwrap();
        assert_eq!(plan.contributor, member);
        assert_eq!(plan.recorded_by, Some(treasurer));
        assert!(!plan.debit_initiator);
        assert_eq!(plan.credit_target, CreditTarget::GroupWallet);
    }

    #[test]
    fn test_cash_without_member_is_missing_field() {
        let err = plan_contribution(
            &group(None),
            Uuid::new_v4(),
            MemberRole::Chairperson,
            &request(PaymentMethod::Cash),
            CAP,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::MissingRequiredField(_)));
    }

    #[test]
    fn test_amount_bounds() {
        let mut req = request(PaymentMethod::InternalWallet);
        req.amount = dec!(0);
        assert!(matches!(
            plan_contribution(&group(None), Uuid::new_v4(), MemberRole::Member, &req, CAP),
            Err(EngineError::InvalidAmount(_))
        ));
        req.amount = dec!(1000000.01);
        assert!(matches!(
            plan_contribution(&group(None), Uuid::new_v4(), MemberRole::Member, &req, CAP),
            Err(EngineError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_rotating_payout_rejects_cash_and_anonymous() {
        let mut req = request(PaymentMethod::Cash);
        req.contribution_type = ContributionType::RotatingPayout;
        req.on_behalf_of_user = Some(Uuid::new_v4());
        assert!(matches!(
            plan_contribution(
                &group(Some(ROTATING_SUBTYPE)),
                Uuid::new_v4(),
                MemberRole::Treasurer,
                &req,
                CAP
            ),
            Err(EngineError::InvalidPaymentMethod(_))
        ));

        let mut req = request(PaymentMethod::InternalWallet);
        req.contribution_type = ContributionType::RotatingPayout;
        req.is_anonymous = true;
        assert!(matches!(
            plan_contribution(
                &group(Some(ROTATING_SUBTYPE)),
                Uuid::new_v4(),
                MemberRole::Member,
                &req,
                CAP
            ),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn test_rotating_payout_credits_recipient() {
        let mut req = request(PaymentMethod::InternalWallet);
        req.contribution_type = ContributionType::RotatingPayout;
        let plan = plan_contribution(
            &group(Some(ROTATING_SUBTYPE)),
            Uuid::new_v4(),
            MemberRole::Member,
            &req,
            CAP,
        )
        .unwrap();
        assert_eq!(plan.credit_target, CreditTarget::RecipientWallet);
    }

    #[test]
    fn test_anonymous_rejected_in_rotating_group() {
        let mut req = request(PaymentMethod::InternalWallet);
        req.is_anonymous = true;
        assert!(plan_contribution(
            &group(Some(ROTATING_SUBTYPE)),
            Uuid::new_v4(),
            MemberRole::Member,
            &req,
            CAP
        )
        .is_err());
        assert!(
            plan_contribution(&group(None), Uuid::new_v4(), MemberRole::Member, &req, CAP).is_ok()
        );
    }

    #[test]
    fn test_metadata_roundtrips_round_context() {
        let req = request(PaymentMethod::InternalWallet);
        let plan = ContributionPlan {
            contributor: Uuid::new_v4(),
            debit_initiator: true,
            credit_target: CreditTarget::RecipientWallet,
            recorded_by: None,
        };
        let ctx = RoundContext {
            cycle_id: Uuid::new_v4(),
            round: 2,
            recipient_id: Uuid::new_v4(),
        };
        let meta = ContributionMetadata::new(Uuid::new_v4(), &req, &plan, Some(ctx));
        let value = meta.to_value();
        assert_eq!(value["round"], 2);
        assert!(value.get("is_anonymous").is_none());
        assert_eq!(ContributionMetadata::from_value(&value), Some(meta));
    }

    #[test]
    fn test_request_type_defaults_to_regular() {
        let req: ContributeRequest = serde_json::from_str(
            r#"{"amount":"100.00","payment_method":"internal_wallet"}"#,
        )
        .unwrap();
        assert_eq!(req.contribution_type, ContributionType::Regular);
    }

    #[test]
    fn test_external_reference_format() {
        let mut req = request(PaymentMethod::MobileMoney);
        req.external_reference = Some("MPESA-QX12_9".into());
        assert!(req.validate().is_ok());
        req.external_reference = Some("bad ref; drop".into());
        assert!(req.validate().is_err());
    }
}
