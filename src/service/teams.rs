use rand::Rng;
use tracing::info;

use super::ReviewService;
use crate::database::models::*;
use crate::database::{ReviewStore, StoreTx};
use crate::error::Result;

impl<S: ReviewStore, R: Rng + Send> ReviewService<S, R> {
    /// Create a team together with its initial roster. Either the team and
    /// every member are stored, or nothing is.
    pub async fn create_team(&self, name: &str, members: &[TeamMember]) -> Result<Team> {
        let mut tx = self.store.begin().await?;
        let team = self.create_team_in(&mut tx, name, members).await?;
        tx.commit().await?;

        info!("Created team {} with {} members", team.name, team.members.len());
        Ok(team)
    }

    pub async fn create_team_in(
        &self,
        tx: &mut S::Tx,
        name: &str,
        members: &[TeamMember],
    ) -> Result<Team> {
        tx.create_team(name).await?;
        for member in members {
            tx.create_member(&Member {
                id: member.user_id.clone(),
                username: member.username.clone(),
                team_name: name.to_string(),
                is_active: member.is_active,
            })
            .await?;
        }
        tx.get_team(name).await
    }

    /// Team with its current roster.
    pub async fn get_team(&self, name: &str) -> Result<Team> {
        self.store.get_team(name).await
    }

    pub async fn list_teams(&self) -> Result<Vec<String>> {
        self.store.list_teams().await
    }

    /// Deactivate every active member of the team and strip them from the
    /// reviewer lists of open pull requests. Merged pull requests keep their
    /// reviewers. Freed slots are not backfilled.
    pub async fn deactivate_team(&self, name: &str) -> Result<DeactivationResult> {
        let mut tx = self.store.begin().await?;
        let result = self.deactivate_team_in(&mut tx, name).await?;
        tx.commit().await?;

        info!(
            "Deactivated {} members of team {}, {} open pull requests affected",
            result.deactivated_members.len(),
            name,
            result.affected_prs.len()
        );
        Ok(result)
    }

    pub async fn deactivate_team_in(&self, tx: &mut S::Tx, name: &str) -> Result<DeactivationResult> {
        tx.get_team(name).await?;

        let deactivated_members = tx.deactivate_team_members(name).await?;
        if deactivated_members.is_empty() {
            return Ok(DeactivationResult {
                deactivated_members,
                affected_prs: Vec::new(),
            });
        }

        let member_ids: Vec<String> = deactivated_members.iter().map(|m| m.id.clone()).collect();
        let affected_prs = tx.remove_reviewers_from_open_prs(&member_ids).await?;

        Ok(DeactivationResult {
            deactivated_members,
            affected_prs,
        })
    }
}
