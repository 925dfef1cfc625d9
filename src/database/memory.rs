//! In-memory store.
//!
//! All tables live behind one async mutex. A transaction owns that mutex for
//! its whole lifetime and works on a private copy of the tables; commit swaps
//! the copy in, drop throws it away. Transactions are therefore fully
//! serialized, which trivially satisfies the locking read. All state is lost
//! on restart.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::*;
use super::{ReviewStore, StoreTx};
use crate::error::{Result, ReviewError};

#[derive(Debug, Clone)]
struct PrRecord {
    pr: PullRequest,
    /// Insertion order, breaks ties between equal creation times.
    seq: u64,
}

#[derive(Debug, Clone, Default)]
struct Tables {
    teams: BTreeSet<String>,
    members: BTreeMap<String, Member>,
    pull_requests: BTreeMap<String, PrRecord>,
    /// (pull request id, member id)
    reviewers: BTreeSet<(String, String)>,
    next_seq: u64,
}

impl Tables {
    fn team(&self, name: &str) -> Result<Team> {
        if !self.teams.contains(name) {
            return Err(ReviewError::not_found("team", name));
        }
        let members = self
            .members
            .values()
            .filter(|m| m.team_name == name)
            .cloned()
            .map(TeamMember::from)
            .collect();
        Ok(Team {
            name: name.to_string(),
            members,
        })
    }

    fn member(&self, id: &str) -> Result<Member> {
        self.members
            .get(id)
            .cloned()
            .ok_or_else(|| ReviewError::not_found("member", id))
    }

    fn reviewer_ids(&self, pr_id: &str) -> Vec<String> {
        self.reviewers
            .iter()
            .filter(|(pr, _)| pr == pr_id)
            .map(|(_, member)| member.clone())
            .collect()
    }

    fn pull_request(&self, id: &str) -> Result<PullRequest> {
        let record = self
            .pull_requests
            .get(id)
            .ok_or_else(|| ReviewError::not_found("pull request", id))?;
        let mut pr = record.pr.clone();
        pr.reviewers = self.reviewer_ids(id);
        Ok(pr)
    }

    fn prs_by_reviewer(&self, member_id: &str) -> Vec<PullRequestShort> {
        let mut records: Vec<&PrRecord> = self
            .reviewers
            .iter()
            .filter(|(_, member)| member == member_id)
            .filter_map(|(pr, _)| self.pull_requests.get(pr))
            .collect();
        records.sort_by(|a, b| {
            b.pr.created_at
                .cmp(&a.pr.created_at)
                .then(b.seq.cmp(&a.seq))
        });
        records.into_iter().map(|r| PullRequestShort::from(&r.pr)).collect()
    }

    fn stats(&self) -> Vec<AssignmentStats> {
        let mut counts: BTreeMap<&str, i64> = BTreeMap::new();
        for (_, member) in &self.reviewers {
            *counts.entry(member.as_str()).or_default() += 1;
        }
        counts
            .into_iter()
            .map(|(user_id, assignment_count)| AssignmentStats {
                user_id: user_id.to_string(),
                assignment_count,
            })
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn commit(self) -> Result<()> {
        let MemoryTx { mut guard, working } = self;
        *guard = working;
        Ok(())
    }

    async fn create_team(&mut self, name: &str) -> Result<()> {
        if !self.working.teams.insert(name.to_string()) {
            return Err(ReviewError::conflict("team", name));
        }
        Ok(())
    }

    async fn get_team(&mut self, name: &str) -> Result<Team> {
        self.working.team(name)
    }

    async fn create_member(&mut self, member: &Member) -> Result<Member> {
        if !self.working.teams.contains(&member.team_name) {
            return Err(ReviewError::not_found("team", &member.team_name));
        }
        if self.working.members.contains_key(&member.id) {
            return Err(ReviewError::conflict("member", &member.id));
        }
        self.working
            .members
            .insert(member.id.clone(), member.clone());
        Ok(member.clone())
    }

    async fn get_member(&mut self, id: &str) -> Result<Member> {
        self.working.member(id)
    }

    async fn active_team_members(&mut self, team_name: &str) -> Result<Vec<Member>> {
        Ok(self
            .working
            .members
            .values()
            .filter(|m| m.team_name == team_name && m.is_active)
            .cloned()
            .collect())
    }

    async fn set_member_active(&mut self, id: &str, is_active: bool) -> Result<Member> {
        let member = self
            .working
            .members
            .get_mut(id)
            .ok_or_else(|| ReviewError::not_found("member", id))?;
        member.is_active = is_active;
        Ok(member.clone())
    }

    async fn deactivate_team_members(&mut self, team_name: &str) -> Result<Vec<Member>> {
        let mut deactivated = Vec::new();
        for member in self.working.members.values_mut() {
            if member.team_name == team_name && member.is_active {
                member.is_active = false;
                deactivated.push(member.clone());
            }
        }
        Ok(deactivated)
    }

    async fn create_pull_request(&mut self, new_pr: &NewPullRequest) -> Result<PullRequest> {
        if self.working.pull_requests.contains_key(&new_pr.id) {
            return Err(ReviewError::conflict("pull request", &new_pr.id));
        }
        if !self.working.members.contains_key(&new_pr.author_id) {
            return Err(ReviewError::not_found("member", &new_pr.author_id));
        }

        let pr = PullRequest {
            id: new_pr.id.clone(),
            title: new_pr.title.clone(),
            author_id: new_pr.author_id.clone(),
            team_name: new_pr.team_name.clone(),
            status: PrStatus::Open,
            reviewers: Vec::new(),
            created_at: Utc::now(),
            merged_at: None,
        };
        let seq = self.working.next_seq;
        self.working.next_seq += 1;
        self.working.pull_requests.insert(
            pr.id.clone(),
            PrRecord {
                pr: pr.clone(),
                seq,
            },
        );
        Ok(pr)
    }

    async fn get_pull_request(&mut self, id: &str) -> Result<PullRequest> {
        self.working.pull_request(id)
    }

    async fn get_pull_request_for_update(&mut self, id: &str) -> Result<PullRequest> {
        // The transaction already holds the only lock.
        self.working.pull_request(id)
    }

    async fn mark_merged(&mut self, id: &str) -> Result<DateTime<Utc>> {
        let record = self
            .working
            .pull_requests
            .get_mut(id)
            .ok_or_else(|| ReviewError::not_found("pull request", id))?;
        record.pr.status = PrStatus::Merged;
        let merged_at = *record.pr.merged_at.get_or_insert_with(Utc::now);
        Ok(merged_at)
    }

    async fn add_reviewers(&mut self, pr_id: &str, member_ids: &[String]) -> Result<()> {
        if !self.working.pull_requests.contains_key(pr_id) {
            return Err(ReviewError::not_found("pull request", pr_id));
        }
        for member_id in member_ids {
            if !self.working.members.contains_key(member_id) {
                return Err(ReviewError::not_found("member", member_id));
            }
            if !self
                .working
                .reviewers
                .insert((pr_id.to_string(), member_id.clone()))
            {
                return Err(ReviewError::Conflict(format!(
                    "reviewer already assigned to pull request '{}'",
                    pr_id
                )));
            }
        }
        Ok(())
    }

    async fn remove_reviewer(&mut self, pr_id: &str, member_id: &str) -> Result<()> {
        if !self
            .working
            .reviewers
            .remove(&(pr_id.to_string(), member_id.to_string()))
        {
            return Err(ReviewError::ReviewerNotAssigned {
                pr_id: pr_id.to_string(),
                reviewer_id: member_id.to_string(),
            });
        }
        Ok(())
    }

    async fn remove_reviewers_from_open_prs(
        &mut self,
        member_ids: &[String],
    ) -> Result<Vec<PullRequestShort>> {
        let tables = &mut self.working;
        let doomed: Vec<(String, String)> = tables
            .reviewers
            .iter()
            .filter(|(pr_id, member_id)| {
                member_ids.contains(member_id)
                    && tables
                        .pull_requests
                        .get(pr_id)
                        .is_some_and(|r| r.pr.status == PrStatus::Open)
            })
            .cloned()
            .collect();

        let mut affected = BTreeMap::new();
        for link in doomed {
            tables.reviewers.remove(&link);
            if let Some(record) = tables.pull_requests.get(&link.0) {
                affected.insert(link.0.clone(), PullRequestShort::from(&record.pr));
            }
        }
        Ok(affected.into_values().collect())
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx> {
        let guard = self.tables.clone().lock_owned().await;
        let working = (*guard).clone();
        Ok(MemoryTx { guard, working })
    }

    async fn get_team(&self, name: &str) -> Result<Team> {
        self.tables.lock().await.team(name)
    }

    async fn list_teams(&self) -> Result<Vec<String>> {
        Ok(self.tables.lock().await.teams.iter().cloned().collect())
    }

    async fn get_member(&self, id: &str) -> Result<Member> {
        self.tables.lock().await.member(id)
    }

    async fn get_pull_request(&self, id: &str) -> Result<PullRequest> {
        self.tables.lock().await.pull_request(id)
    }

    async fn list_prs_by_reviewer(&self, member_id: &str) -> Result<Vec<PullRequestShort>> {
        Ok(self.tables.lock().await.prs_by_reviewer(member_id))
    }

    async fn reviewer_stats(&self) -> Result<Vec<AssignmentStats>> {
        Ok(self.tables.lock().await.stats())
    }
}
