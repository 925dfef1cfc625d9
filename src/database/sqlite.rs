//! SQLite-backed store.
//!
//! Write transactions are opened with `BEGIN IMMEDIATE`, which takes the
//! database write lock up front. Two transactions touching the same pull
//! request therefore run one after the other, and a transaction never has to
//! upgrade a stale read snapshot to a write.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use super::models::*;
use super::queries::Queries;
use super::{ReviewStore, StoreTx};
use crate::error::{Result, ReviewError};

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to `database_url`. Only `sqlite:` URLs are accepted; any other
    /// backend is reported as `TransactionUnsupported`.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let scheme = database_url.split(':').next().unwrap_or_default();
        if scheme != "sqlite" {
            return Err(ReviewError::TransactionUnsupported(format!(
                "unsupported database scheme '{}'",
                scheme
            )));
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        debug!("Connected to {}", database_url);

        Ok(Self { pool })
    }

    /// Private in-memory database. Held on a single connection that never
    /// expires, since every new SQLite connection would open an empty database.
    pub async fn new_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

pub struct SqliteTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl StoreTx for SqliteTx {
    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn create_team(&mut self, name: &str) -> Result<()> {
        Queries::insert_team(&mut self.tx, name).await
    }

    async fn get_team(&mut self, name: &str) -> Result<Team> {
        Queries::get_team(&mut self.tx, name).await
    }

    async fn create_member(&mut self, member: &Member) -> Result<Member> {
        Queries::insert_member(&mut self.tx, member).await
    }

    async fn get_member(&mut self, id: &str) -> Result<Member> {
        Queries::get_member(&mut self.tx, id).await
    }

    async fn active_team_members(&mut self, team_name: &str) -> Result<Vec<Member>> {
        Queries::active_team_members(&mut self.tx, team_name).await
    }

    async fn set_member_active(&mut self, id: &str, is_active: bool) -> Result<Member> {
        Queries::set_member_active(&mut self.tx, id, is_active).await
    }

    async fn deactivate_team_members(&mut self, team_name: &str) -> Result<Vec<Member>> {
        Queries::deactivate_team_members(&mut self.tx, team_name).await
    }

    async fn create_pull_request(&mut self, pr: &NewPullRequest) -> Result<PullRequest> {
        Queries::insert_pull_request(&mut self.tx, pr).await
    }

    async fn get_pull_request(&mut self, id: &str) -> Result<PullRequest> {
        Queries::get_pull_request(&mut self.tx, id).await
    }

    async fn get_pull_request_for_update(&mut self, id: &str) -> Result<PullRequest> {
        // The write lock was taken by BEGIN IMMEDIATE.
        Queries::get_pull_request(&mut self.tx, id).await
    }

    async fn mark_merged(&mut self, id: &str) -> Result<DateTime<Utc>> {
        Queries::mark_merged(&mut self.tx, id).await
    }

    async fn add_reviewers(&mut self, pr_id: &str, member_ids: &[String]) -> Result<()> {
        Queries::insert_reviewers(&mut self.tx, pr_id, member_ids).await
    }

    async fn remove_reviewer(&mut self, pr_id: &str, member_id: &str) -> Result<()> {
        Queries::delete_reviewer(&mut self.tx, pr_id, member_id).await
    }

    async fn remove_reviewers_from_open_prs(
        &mut self,
        member_ids: &[String],
    ) -> Result<Vec<PullRequestShort>> {
        Queries::remove_reviewers_from_open_prs(&mut self.tx, member_ids).await
    }
}

#[async_trait]
impl ReviewStore for SqliteStore {
    type Tx = SqliteTx;

    async fn begin(&self) -> Result<SqliteTx> {
        let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        Ok(SqliteTx { tx })
    }

    async fn get_team(&self, name: &str) -> Result<Team> {
        let mut conn = self.pool.acquire().await?;
        Queries::get_team(&mut conn, name).await
    }

    async fn list_teams(&self) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        Queries::list_teams(&mut conn).await
    }

    async fn get_member(&self, id: &str) -> Result<Member> {
        let mut conn = self.pool.acquire().await?;
        Queries::get_member(&mut conn, id).await
    }

    async fn get_pull_request(&self, id: &str) -> Result<PullRequest> {
        let mut conn = self.pool.acquire().await?;
        Queries::get_pull_request(&mut conn, id).await
    }

    async fn list_prs_by_reviewer(&self, member_id: &str) -> Result<Vec<PullRequestShort>> {
        let mut conn = self.pool.acquire().await?;
        Queries::list_prs_by_reviewer(&mut conn, member_id).await
    }

    async fn reviewer_stats(&self) -> Result<Vec<AssignmentStats>> {
        let mut conn = self.pool.acquire().await?;
        Queries::reviewer_stats(&mut conn).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_backends_without_transaction_support() {
        let result = SqliteStore::new("mysql://localhost/reviews", 5).await;
        assert!(matches!(
            result,
            Err(ReviewError::TransactionUnsupported(_))
        ));
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let store = SqliteStore::new_in_memory().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        tx.create_team("backend").await.unwrap();
        drop(tx);

        assert!(matches!(
            store.get_team("backend").await,
            Err(ReviewError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn merge_time_is_written_once() {
        let store = SqliteStore::new_in_memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.create_team("backend").await.unwrap();
        tx.create_member(&Member {
            id: "u1".to_string(),
            username: "Alice".to_string(),
            team_name: "backend".to_string(),
            is_active: true,
        })
        .await
        .unwrap();
        tx.create_pull_request(&NewPullRequest {
            id: "pr-1".to_string(),
            title: "Add cache".to_string(),
            author_id: "u1".to_string(),
            team_name: "backend".to_string(),
        })
        .await
        .unwrap();

        let first = tx.mark_merged("pr-1").await.unwrap();
        let second = tx.mark_merged("pr-1").await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(first, second);
        let pr = store.get_pull_request("pr-1").await.unwrap();
        assert_eq!(pr.status, PrStatus::Merged);
        assert_eq!(pr.merged_at, Some(first));
    }
}
