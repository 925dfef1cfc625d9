use rand::Rng;
use tracing::info;

use super::ReviewService;
use crate::database::models::Member;
use crate::database::{ReviewStore, StoreTx};
use crate::error::Result;

impl<S: ReviewStore, R: Rng + Send> ReviewService<S, R> {
    /// Add a member to an existing team.
    pub async fn create_member(&self, member: &Member) -> Result<Member> {
        let mut tx = self.store.begin().await?;
        let created = tx.create_member(member).await?;
        tx.commit().await?;

        info!("Added member {} to team {}", created.id, created.team_name);
        Ok(created)
    }

    pub async fn get_member(&self, id: &str) -> Result<Member> {
        self.store.get_member(id).await
    }

    /// Toggle a single member. Unlike team deactivation this does not touch
    /// existing reviewer assignments.
    pub async fn set_member_active(&self, id: &str, is_active: bool) -> Result<Member> {
        let mut tx = self.store.begin().await?;
        let member = tx.set_member_active(id, is_active).await?;
        tx.commit().await?;

        info!("Set member {} active={}", id, is_active);
        Ok(member)
    }
}
