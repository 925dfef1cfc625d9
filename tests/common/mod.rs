#![allow(dead_code)]

use reviewer_app::assignment::AssignmentEngine;
use reviewer_app::database::models::TeamMember;
use reviewer_app::database::{MemoryStore, ReviewStore, SqliteStore};
use reviewer_app::service::ReviewService;
use tempfile::TempDir;

pub const TEAM: &str = "backend";
pub const AUTHOR: &str = "A";

pub fn member(id: &str, is_active: bool) -> TeamMember {
    TeamMember {
        user_id: id.to_string(),
        username: format!("user-{}", id.to_lowercase()),
        is_active,
    }
}

/// Author plus three active reviewers.
pub fn roster() -> Vec<TeamMember> {
    ["A", "R1", "R2", "R3"]
        .into_iter()
        .map(|id| member(id, true))
        .collect()
}

pub fn memory_service(seed: u64) -> ReviewService<MemoryStore> {
    ReviewService::new(MemoryStore::new(), AssignmentEngine::seeded(seed))
}

pub async fn sqlite_service(seed: u64) -> ReviewService<SqliteStore> {
    let store = SqliteStore::new_in_memory()
        .await
        .expect("Failed to create test database");
    ReviewService::new(store, AssignmentEngine::seeded(seed))
}

/// File-backed store, so concurrent transactions get their own connections.
/// Keep the returned directory alive for the whole test.
pub async fn file_sqlite_service(seed: u64) -> (TempDir, ReviewService<SqliteStore>) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("reviewers.db").display());
    let store = SqliteStore::new(&url, 5)
        .await
        .expect("Failed to open test database");
    store.run_migrations().await.expect("Failed to run migrations");
    (dir, ReviewService::new(store, AssignmentEngine::seeded(seed)))
}

pub async fn setup_team<S: ReviewStore>(service: &ReviewService<S>, members: &[TeamMember]) {
    service
        .create_team(TEAM, members)
        .await
        .expect("Failed to create team");
}
