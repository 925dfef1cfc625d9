//! Reviewer assignment service.
//!
//! Every mutating operation comes in two forms. `foo` opens a transaction,
//! runs `foo_in` and commits. `foo_in` takes a transaction the caller already
//! holds, so several operations can share one atomic unit instead of nesting
//! transactions.

mod members;
mod pull_requests;
mod teams;

use rand::rngs::StdRng;
use rand::Rng;

use crate::assignment::AssignmentEngine;
use crate::database::ReviewStore;
use crate::database::models::{AssignmentStats, PullRequestShort};
use crate::error::Result;

/// Reviewers picked for a freshly opened pull request.
pub const REVIEWERS_PER_PR: usize = 2;

pub struct ReviewService<S: ReviewStore, R = StdRng> {
    store: S,
    engine: AssignmentEngine<R>,
}

impl<S: ReviewStore> ReviewService<S, StdRng> {
    pub fn with_store(store: S) -> Self {
        Self::new(store, AssignmentEngine::from_entropy())
    }
}

impl<S: ReviewStore, R: Rng + Send> ReviewService<S, R> {
    pub fn new(store: S, engine: AssignmentEngine<R>) -> Self {
        Self { store, engine }
    }

    /// Open a transaction for use with the `*_in` operations.
    pub async fn begin(&self) -> Result<S::Tx> {
        self.store.begin().await
    }

    /// Pull requests the member is assigned to review, newest first.
    pub async fn list_prs_by_reviewer(&self, member_id: &str) -> Result<Vec<PullRequestShort>> {
        self.store.list_prs_by_reviewer(member_id).await
    }

    /// Assignment counts for every member that reviews at least one pull
    /// request, ordered by member id.
    pub async fn reviewer_stats(&self) -> Result<Vec<AssignmentStats>> {
        self.store.reviewer_stats().await
    }
}
