use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, info};

use super::{ReviewService, REVIEWERS_PER_PR};
use crate::database::models::*;
use crate::database::{ReviewStore, StoreTx};
use crate::error::{Result, ReviewError};

impl<S: ReviewStore, R: Rng + Send> ReviewService<S, R> {
    /// Open a pull request and assign up to two active teammates of the author
    /// as reviewers.
    pub async fn create_pull_request(
        &self,
        id: &str,
        title: &str,
        author_id: &str,
    ) -> Result<PullRequest> {
        let mut tx = self.store.begin().await?;
        let pr = self.create_pull_request_in(&mut tx, id, title, author_id).await?;
        tx.commit().await?;

        info!(
            "Created pull request {} by {} with reviewers {:?}",
            pr.id, pr.author_id, pr.reviewers
        );
        Ok(pr)
    }

    pub async fn create_pull_request_in(
        &self,
        tx: &mut S::Tx,
        id: &str,
        title: &str,
        author_id: &str,
    ) -> Result<PullRequest> {
        let author = tx.get_member(author_id).await?;

        let candidates: Vec<Member> = tx
            .active_team_members(&author.team_name)
            .await?
            .into_iter()
            .filter(|m| m.id != author.id)
            .collect();

        // A short pool is fine at creation time; the PR just gets fewer reviewers.
        let reviewer_ids: Vec<String> = self
            .engine
            .pick_random(&candidates, REVIEWERS_PER_PR)
            .into_iter()
            .map(|m| m.id)
            .collect();

        tx.create_pull_request(&NewPullRequest {
            id: id.to_string(),
            title: title.to_string(),
            author_id: author.id.clone(),
            team_name: author.team_name.clone(),
        })
        .await?;
        tx.add_reviewers(id, &reviewer_ids).await?;

        tx.get_pull_request(id).await
    }

    /// Mark the pull request merged. Merging an already merged pull request
    /// returns it unchanged.
    pub async fn merge_pull_request(&self, id: &str) -> Result<PullRequest> {
        let mut tx = self.store.begin().await?;
        let pr = self.merge_pull_request_in(&mut tx, id).await?;
        tx.commit().await?;
        Ok(pr)
    }

    pub async fn merge_pull_request_in(&self, tx: &mut S::Tx, id: &str) -> Result<PullRequest> {
        let pr = tx.get_pull_request_for_update(id).await?;
        if pr.is_merged() {
            debug!("Pull request {} already merged", id);
            return Ok(pr);
        }

        let merged_at = tx.mark_merged(id).await?;
        info!("Merged pull request {} at {}", id, merged_at);

        tx.get_pull_request(id).await
    }

    /// Replace one reviewer with a random active teammate who is neither the
    /// author nor already reviewing.
    pub async fn reassign_reviewer(&self, pr_id: &str, old_reviewer_id: &str) -> Result<Reassignment> {
        let mut tx = self.store.begin().await?;
        let reassignment = self
            .reassign_reviewer_in(&mut tx, pr_id, old_reviewer_id)
            .await?;
        tx.commit().await?;

        info!(
            "Reassigned pull request {}: {} replaced by {}",
            pr_id, old_reviewer_id, reassignment.replaced_by.id
        );
        Ok(reassignment)
    }

    pub async fn reassign_reviewer_in(
        &self,
        tx: &mut S::Tx,
        pr_id: &str,
        old_reviewer_id: &str,
    ) -> Result<Reassignment> {
        // Holding the lock from here to commit serializes reassignments and
        // merges of this pull request.
        let pr = tx.get_pull_request_for_update(pr_id).await?;

        if pr.is_merged() {
            return Err(ReviewError::PrAlreadyMerged(pr_id.to_string()));
        }
        if !pr.has_reviewer(old_reviewer_id) {
            return Err(ReviewError::ReviewerNotAssigned {
                pr_id: pr_id.to_string(),
                reviewer_id: old_reviewer_id.to_string(),
            });
        }

        let excluded: HashSet<&str> = [pr.author_id.as_str(), old_reviewer_id]
            .into_iter()
            .chain(pr.reviewers.iter().map(String::as_str))
            .collect();

        let candidates: Vec<Member> = tx
            .active_team_members(&pr.team_name)
            .await?
            .into_iter()
            .filter(|m| !excluded.contains(m.id.as_str()))
            .collect();

        let replacement = self
            .engine
            .pick_random(&candidates, 1)
            .into_iter()
            .next()
            .ok_or_else(|| ReviewError::NoCandidatesAvailable(pr_id.to_string()))?;

        tx.remove_reviewer(pr_id, old_reviewer_id).await?;
        tx.add_reviewers(pr_id, std::slice::from_ref(&replacement.id))
            .await?;

        let pr = tx.get_pull_request(pr_id).await?;
        Ok(Reassignment {
            pr,
            replaced_by: replacement,
        })
    }

    pub async fn get_pull_request(&self, id: &str) -> Result<PullRequest> {
        self.store.get_pull_request(id).await
    }
}
