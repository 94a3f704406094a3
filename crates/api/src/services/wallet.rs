//! Wallet reads: personal wallet, ledger history and group wallet.

use domain::models::group::Membership;
use domain::models::wallet::{LedgerEntry, Wallet, WalletKind, WalletView};
use domain::services::authorization;
use domain::{EngineError, EngineResult};
use persistence::repositories::{ledger, GroupRepository, LedgerRepository};
use shared::pagination::PageParams;
use uuid::Uuid;

use super::engine::EngineContext;

const RECENT_ENTRIES: i64 = 10;

#[derive(Clone)]
pub struct WalletService {
    ctx: EngineContext,
    ledger: LedgerRepository,
    groups: GroupRepository,
}

impl WalletService {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ledger: LedgerRepository::new(ctx.pool.clone()),
            groups: GroupRepository::new(ctx.pool.clone()),
            ctx,
        }
    }

    /// The caller's personal wallet, opened on first access.
    pub async fn my_wallet(&self, user_id: Uuid) -> EngineResult<WalletView> {
        let wallet = match self.ledger.find_wallet(user_id, WalletKind::Personal).await? {
            Some(row) => Wallet::from(row),
            None => self.ctx.run(|| self.open_personal(user_id)).await?,
        };
        self.view(wallet).await
    }

    async fn open_personal(&self, user_id: Uuid) -> EngineResult<Wallet> {
        let mut uow = self.ctx.begin().await?;
        let row = ledger::ensure_wallet(
            uow.conn(),
            user_id,
            WalletKind::Personal,
            &self.ctx.config.limits.default_currency,
        )
        .await?;
        self.ctx.commit(uow).await?;
        Ok(Wallet::from(row))
    }

    /// Ledger entries the caller initiated or received, newest first.
    pub async fn transactions(
        &self,
        user_id: Uuid,
        page: PageParams,
    ) -> EngineResult<(Vec<LedgerEntry>, i64)> {
        let entries = self
            .ledger
            .list_user_entries(user_id, page.limit, page.offset)
            .await?
            .into_iter()
            .map(LedgerEntry::from)
            .collect();
        let total = self.ledger.count_user_entries(user_id).await?;
        Ok((entries, total))
    }

    /// The group's wallet. Members only.
    pub async fn group_wallet(&self, group_id: Uuid, user_id: Uuid) -> EngineResult<WalletView> {
        self.groups
            .find_by_id(group_id)
            .await?
            .ok_or(EngineError::GroupNotFound)?;
        let caller = self
            .groups
            .find_membership(group_id, user_id)
            .await?
            .map(Membership::from);
        authorization::require_active_member(caller.as_ref())?;

        let wallet = self
            .ledger
            .find_wallet(group_id, WalletKind::Group)
            .await?
            .map(Wallet::from)
            .ok_or(EngineError::WalletMissing)?;
        self.view(wallet).await
    }

    async fn view(&self, wallet: Wallet) -> EngineResult<WalletView> {
        let recent_transactions = self
            .ledger
            .recent_wallet_entries(wallet.id, RECENT_ENTRIES)
            .await?
            .into_iter()
            .map(LedgerEntry::from)
            .collect();
        Ok(WalletView {
            wallet,
            recent_transactions,
        })
    }
}
