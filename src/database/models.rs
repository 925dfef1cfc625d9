use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "MERGED")]
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrStatus::Open => "OPEN",
            PrStatus::Merged => "MERGED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(PrStatus::Open),
            "MERGED" => Some(PrStatus::Merged),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    #[serde(rename = "team_name")]
    pub name: String,
    pub members: Vec<TeamMember>,
}

/// A roster entry as seen from the team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    pub user_id: String,
    pub username: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    #[serde(rename = "user_id")]
    pub id: String,
    pub username: String,
    pub team_name: String,
    pub is_active: bool,
}

impl From<Member> for TeamMember {
    fn from(member: Member) -> Self {
        Self {
            user_id: member.id,
            username: member.username,
            is_active: member.is_active,
        }
    }
}

/// Fields supplied when opening a pull request. The store stamps `created_at`.
#[derive(Debug, Clone)]
pub struct NewPullRequest {
    pub id: String,
    pub title: String,
    pub author_id: String,
    pub team_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
    #[serde(skip)]
    pub team_name: String,
    pub status: PrStatus,
    /// Reviewer member ids, sorted.
    #[serde(rename = "assigned_reviewers")]
    pub reviewers: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "mergedAt")]
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn has_reviewer(&self, member_id: &str) -> bool {
        self.reviewers.iter().any(|id| id == member_id)
    }

    pub fn is_merged(&self) -> bool {
        self.status == PrStatus::Merged
    }
}

/// Pull request without its reviewer payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestShort {
    #[serde(rename = "pull_request_id")]
    pub id: String,
    #[serde(rename = "pull_request_name")]
    pub title: String,
    pub author_id: String,
    pub status: PrStatus,
}

impl From<&PullRequest> for PullRequestShort {
    fn from(pr: &PullRequest) -> Self {
        Self {
            id: pr.id.clone(),
            title: pr.title.clone(),
            author_id: pr.author_id.clone(),
            status: pr.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentStats {
    pub user_id: String,
    pub assignment_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivationResult {
    #[serde(rename = "deactivated_users")]
    pub deactivated_members: Vec<Member>,
    pub affected_prs: Vec<PullRequestShort>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reassignment {
    pub pr: PullRequest,
    pub replaced_by: Member,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_column_text() {
        for status in [PrStatus::Open, PrStatus::Merged] {
            assert_eq!(PrStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PrStatus::from_str("CLOSED"), None);
    }

    #[test]
    fn pull_request_serializes_with_api_field_names() {
        let pr = PullRequest {
            id: "pr-1".to_string(),
            title: "Add cache".to_string(),
            author_id: "u1".to_string(),
            team_name: "backend".to_string(),
            status: PrStatus::Open,
            reviewers: vec!["u2".to_string()],
            created_at: Utc::now(),
            merged_at: None,
        };

        let value = serde_json::to_value(&pr).unwrap();
        assert_eq!(value["pull_request_id"], "pr-1");
        assert_eq!(value["pull_request_name"], "Add cache");
        assert_eq!(value["status"], "OPEN");
        assert_eq!(value["assigned_reviewers"][0], "u2");
        assert!(value.get("team_name").is_none());
        assert!(value["mergedAt"].is_null());
    }
}
