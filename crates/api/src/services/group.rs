//! Groups, roles and invitations.

use chrono::{Duration, Utc};
use domain::models::group::{
    CreateGroupRequest, Group, GroupDetail, GroupSummary, MemberRole, Membership,
    UpdateMemberRoleRequest,
};
use domain::models::invitation::{
    generate_invitation_token, Invitation, InvitationAction, InvitationStatus,
    RespondInvitationRequest, SendInvitationRequest, INVITATION_TTL_DAYS,
};
use domain::models::wallet::WalletKind;
use domain::services::{authorization, notification};
use domain::{EngineError, EngineResult};
use persistence::repositories::invitation as invitation_repo;
use persistence::repositories::{group as group_repo, ledger};
use persistence::repositories::{GroupRepository, InvitationRepository, NewInvitation};
use shared::crypto::sha256_hex;
use shared::pagination::PageParams;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use super::email::{EmailService, InvitationEmail};
use super::engine::{active_group, lock_active_group, membership, EngineContext};

#[derive(Clone)]
pub struct GroupService {
    ctx: EngineContext,
    groups: GroupRepository,
    invitations: InvitationRepository,
    email: EmailService,
}

impl GroupService {
    pub fn new(ctx: EngineContext, email: EmailService) -> Self {
        Self {
            groups: GroupRepository::new(ctx.pool.clone()),
            invitations: InvitationRepository::new(ctx.pool.clone()),
            ctx,
            email,
        }
    }

    /// Creates a group with the caller as chairperson and opens its wallet.
    pub async fn create(
        &self,
        user_id: Uuid,
        request: CreateGroupRequest,
    ) -> EngineResult<GroupDetail> {
        request.validate()?;

        let detail = self
            .ctx
            .run(|| self.create_once(user_id, &request))
            .await?;

        info!(
            group_id = %detail.group.id,
            user_id = %user_id,
            currency = %detail.group.currency,
            "Group created"
        );
        Ok(detail)
    }

    async fn create_once(
        &self,
        user_id: Uuid,
        request: &CreateGroupRequest,
    ) -> EngineResult<GroupDetail> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let limits = &self.ctx.config.limits;
        let currency = request
            .currency
            .clone()
            .unwrap_or_else(|| limits.default_currency.clone());
        let max_members = request.max_members.unwrap_or(limits.default_max_members);

        let mut group = Group::from(
            group_repo::insert_group(conn, request, &currency, max_members, user_id).await?,
        );
        let chair = Membership::from(
            group_repo::upsert_membership(conn, group.id, user_id, MemberRole::Chairperson)
                .await?,
        );
        group.member_count = group_repo::refresh_member_count(conn, group.id).await?;
        ledger::ensure_wallet(conn, group.id, WalletKind::Group, &group.currency).await?;

        self.ctx.commit(uow).await?;
        Ok(GroupDetail {
            group,
            your_membership: Some(chair),
        })
    }

    /// Group detail for a member, or for a system admin.
    pub async fn get(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        is_admin: bool,
    ) -> EngineResult<GroupDetail> {
        let group = self
            .groups
            .find_by_id(group_id)
            .await?
            .map(Group::from)
            .ok_or(EngineError::GroupNotFound)?;
        let caller = self
            .groups
            .find_membership(group_id, user_id)
            .await?
            .map(Membership::from)
            .filter(|m| m.is_active);

        if caller.is_none() && !is_admin {
            return Err(EngineError::NotAMember);
        }
        Ok(GroupDetail {
            group,
            your_membership: caller,
        })
    }

    pub async fn list_mine(
        &self,
        user_id: Uuid,
        page: PageParams,
    ) -> EngineResult<(Vec<GroupSummary>, i64)> {
        let groups = self
            .groups
            .find_user_groups(user_id, page.limit, page.offset)
            .await?
            .into_iter()
            .map(GroupSummary::from)
            .collect();
        let total = self.groups.count_user_groups(user_id).await?;
        Ok((groups, total))
    }

    /// Chairperson changes a member's role. The last chairperson cannot step down.
    pub async fn update_role(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        user_id: Uuid,
        request: UpdateMemberRoleRequest,
    ) -> EngineResult<Membership> {
        let updated = self
            .ctx
            .run(|| self.update_role_once(group_id, member_id, user_id, request.role))
            .await?;

        info!(
            group_id = %group_id,
            member_id = %member_id,
            user_id = %user_id,
            role = %updated.role,
            "Member role updated"
        );
        Ok(updated)
    }

    async fn update_role_once(
        &self,
        group_id: Uuid,
        member_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> EngineResult<Membership> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        lock_active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        authorization::require_chairperson(caller.as_ref())?;

        let target = group_repo::lock_membership(conn, group_id, member_id)
            .await?
            .map(Membership::from);
        let target = authorization::require_active_member(target.as_ref())?;
        let chairs = group_repo::count_chairpersons(conn, group_id).await?;
        authorization::check_role_change(target.role, role, chairs)?;

        let row = group_repo::update_member_role(conn, group_id, member_id, role).await?;
        self.ctx.commit(uow).await?;
        Ok(Membership::from(row))
    }

    /// Officer invites a user. Only the token's hash is stored; the token
    /// itself travels in the email sent after commit.
    pub async fn invite(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: SendInvitationRequest,
    ) -> EngineResult<Invitation> {
        request.validate()?;

        let invitation = self
            .ctx
            .run(|| self.invite_once(group_id, user_id, &request))
            .await?;

        info!(
            group_id = %group_id,
            invitation_id = %invitation.id,
            invited_by = %user_id,
            invitee = %invitation.invitee_user_id,
            "Invitation sent"
        );
        Ok(invitation)
    }

    async fn invite_once(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        request: &SendInvitationRequest,
    ) -> EngineResult<Invitation> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        let group = active_group(conn, group_id).await?;
        let caller = membership(conn, group_id, user_id).await?;
        authorization::require_officer(caller.as_ref())?;

        let existing = membership(conn, group_id, request.invitee_user_id).await?;
        if existing.is_some_and(|m| m.is_active) {
            return Err(EngineError::UniqueConstraintViolation(
                "user is already a member of this group".into(),
            ));
        }

        let token = generate_invitation_token();
        let token_hash = sha256_hex(&token);
        let invitation = Invitation::from(
            invitation_repo::insert_invitation(
                conn,
                &NewInvitation {
                    group_id,
                    invited_by: user_id,
                    invitee_user_id: request.invitee_user_id,
                    email: request.email.as_deref(),
                    role: request.role.unwrap_or(MemberRole::Member),
                    message: request.message.as_deref(),
                    token_hash: &token_hash,
                    expires_at: Utc::now() + Duration::days(INVITATION_TTL_DAYS),
                },
            )
            .await?,
        );

        if let Some(to) = invitation.email.clone().filter(|_| self.email.is_enabled()) {
            let email = self.email.clone();
            let message = InvitationEmail {
                to,
                group_name: group.name.clone(),
                role: invitation.role.as_str().to_string(),
                message: invitation.message.clone(),
                token,
            };
            uow.after_commit("invitation_email", async move {
                email
                    .send_invitation_email(message)
                    .await
                    .map_err(|e| e.to_string())
            });
        }
        self.ctx
            .notify(&mut uow, vec![notification::invitation(&invitation, &group)]);

        self.ctx.commit(uow).await?;
        Ok(invitation)
    }

    pub async fn list_invitations(
        &self,
        user_id: Uuid,
        page: PageParams,
    ) -> EngineResult<(Vec<Invitation>, i64)> {
        let invitations = self
            .invitations
            .list_pending_for_user(user_id, page.limit, page.offset)
            .await?
            .into_iter()
            .map(Invitation::from)
            .collect();
        let total = self.invitations.count_pending_for_user(user_id).await?;
        Ok((invitations, total))
    }

    /// Invitee accepts or declines. Accepting joins the group with the
    /// invited role, subject to the group's member cap.
    pub async fn respond_invitation(
        &self,
        invitation_id: Uuid,
        user_id: Uuid,
        request: RespondInvitationRequest,
    ) -> EngineResult<Invitation> {
        let invitation = self
            .ctx
            .run(|| self.respond_once(invitation_id, user_id, request.action))
            .await?;

        info!(
            invitation_id = %invitation.id,
            group_id = %invitation.group_id,
            user_id = %user_id,
            status = ?invitation.status,
            "Invitation answered"
        );
        Ok(invitation)
    }

    async fn respond_once(
        &self,
        invitation_id: Uuid,
        user_id: Uuid,
        action: InvitationAction,
    ) -> EngineResult<Invitation> {
        let mut uow = self.ctx.begin().await?;
        let conn = uow.conn();

        // Someone else's invitation is reported as missing.
        let invitation = invitation_repo::lock_invitation(conn, invitation_id)
            .await?
            .map(Invitation::from)
            .filter(|i| i.invitee_user_id == user_id)
            .ok_or(EngineError::InvitationNotFound)?;
        invitation.check_respondable(Utc::now())?;

        let status = match action {
            InvitationAction::Decline => InvitationStatus::Declined,
            InvitationAction::Accept => {
                let group = lock_active_group(conn, invitation.group_id).await?;
                if group.member_count >= group.max_members {
                    return Err(EngineError::GroupFull(group.max_members));
                }
                group_repo::upsert_membership(conn, group.id, user_id, invitation.role).await?;
                group_repo::refresh_member_count(conn, group.id).await?;
                InvitationStatus::Accepted
            }
        };

        let closed =
            Invitation::from(invitation_repo::close_invitation(conn, invitation.id, status).await?);
        self.ctx.commit(uow).await?;
        Ok(closed)
    }
}
