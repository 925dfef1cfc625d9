//! Storage port for teams, members, pull requests and reviewer links.
//!
//! The service layer is written against [`ReviewStore`] and [`StoreTx`].
//! Transactions are explicit handles: [`ReviewStore::begin`] opens one,
//! [`StoreTx::commit`] publishes it, and dropping an uncommitted handle rolls
//! it back. That covers early returns, panics and cancelled futures alike.

pub mod memory;
pub mod models;
pub mod queries;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use models::*;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// One atomic unit of work against the store.
///
/// Every method reports missing records as `NotFound` and unique-key
/// violations as `Conflict`; backend errors never leak through.
#[async_trait]
pub trait StoreTx: Send {
    async fn commit(self) -> Result<()>;

    async fn create_team(&mut self, name: &str) -> Result<()>;

    /// Team with its full roster, ordered by member id.
    async fn get_team(&mut self, name: &str) -> Result<Team>;

    async fn create_member(&mut self, member: &Member) -> Result<Member>;

    async fn get_member(&mut self, id: &str) -> Result<Member>;

    async fn active_team_members(&mut self, team_name: &str) -> Result<Vec<Member>>;

    async fn set_member_active(&mut self, id: &str, is_active: bool) -> Result<Member>;

    /// Flip every active member of the team to inactive and return exactly
    /// those members.
    async fn deactivate_team_members(&mut self, team_name: &str) -> Result<Vec<Member>>;

    async fn create_pull_request(&mut self, pr: &NewPullRequest) -> Result<PullRequest>;

    async fn get_pull_request(&mut self, id: &str) -> Result<PullRequest>;

    /// Locking read: no other transaction may modify this pull request until
    /// the current one ends.
    async fn get_pull_request_for_update(&mut self, id: &str) -> Result<PullRequest>;

    /// Set status to `MERGED` and stamp the merge time in one update.
    /// Returns the recorded timestamp.
    async fn mark_merged(&mut self, id: &str) -> Result<DateTime<Utc>>;

    async fn add_reviewers(&mut self, pr_id: &str, member_ids: &[String]) -> Result<()>;

    /// Fails with `ReviewerNotAssigned` when no link was removed.
    async fn remove_reviewer(&mut self, pr_id: &str, member_id: &str) -> Result<()>;

    /// Drop every link between the given members and currently open pull
    /// requests. Links on merged pull requests are kept. Returns the distinct
    /// pull requests that lost at least one reviewer, ordered by id.
    async fn remove_reviewers_from_open_prs(
        &mut self,
        member_ids: &[String],
    ) -> Result<Vec<PullRequestShort>>;
}

/// Storage backend. Reads on the store itself run outside any transaction.
#[async_trait]
pub trait ReviewStore: Send + Sync + 'static {
    type Tx: StoreTx + 'static;

    async fn begin(&self) -> Result<Self::Tx>;

    async fn get_team(&self, name: &str) -> Result<Team>;

    async fn list_teams(&self) -> Result<Vec<String>>;

    async fn get_member(&self, id: &str) -> Result<Member>;

    async fn get_pull_request(&self, id: &str) -> Result<PullRequest>;

    /// Pull requests the member reviews, newest first.
    async fn list_prs_by_reviewer(&self, member_id: &str) -> Result<Vec<PullRequestShort>>;

    /// Link counts per member id, ordered by member id.
    async fn reviewer_stats(&self) -> Result<Vec<AssignmentStats>>;
}
