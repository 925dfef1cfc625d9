//! SQL shared by the pool-backed reads and the transactional writes of
//! [`SqliteStore`](super::SqliteStore). Every query takes a plain connection so
//! the same code runs on a pooled connection or inside a transaction.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use crate::database::models::*;
use crate::error::{Result, ReviewError};

const MEMBER_COLUMNS: &str = "id, username, team_name, is_active";
const PR_COLUMNS: &str = "id, title, author_id, team_name, status, created_at, merged_at";

pub struct Queries;

impl Queries {
    pub async fn insert_team(conn: &mut SqliteConnection, name: &str) -> Result<()> {
        sqlx::query("INSERT INTO teams (name) VALUES (?)")
            .bind(name)
            .execute(conn)
            .await
            .map_err(|e| on_insert_error(e, "team", name))?;
        Ok(())
    }

    pub async fn get_team(conn: &mut SqliteConnection, name: &str) -> Result<Team> {
        let found: Option<String> = sqlx::query_scalar("SELECT name FROM teams WHERE name = ?")
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?;
        let name = found.ok_or_else(|| ReviewError::not_found("team", name))?;

        let members = Self::team_members(conn, &name)
            .await?
            .into_iter()
            .map(TeamMember::from)
            .collect();
        Ok(Team { name, members })
    }

    pub async fn list_teams(conn: &mut SqliteConnection) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM teams ORDER BY name")
            .fetch_all(conn)
            .await?;
        Ok(names)
    }

    pub async fn insert_member(conn: &mut SqliteConnection, member: &Member) -> Result<Member> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, username, team_name, is_active) VALUES (?, ?, ?, ?) \
             RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(&member.id)
        .bind(&member.username)
        .bind(&member.team_name)
        .bind(member.is_active)
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ReviewError::not_found("team", &member.team_name)
            }
            other => on_insert_error(other, "member", &member.id),
        })?;
        member_from_row(&row)
    }

    pub async fn get_member(conn: &mut SqliteConnection, id: &str) -> Result<Member> {
        let row = sqlx::query(&format!("SELECT {MEMBER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(conn)
            .await?
            .ok_or_else(|| ReviewError::not_found("member", id))?;
        member_from_row(&row)
    }

    pub async fn team_members(conn: &mut SqliteConnection, team_name: &str) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM users WHERE team_name = ? ORDER BY id"
        ))
        .bind(team_name)
        .fetch_all(conn)
        .await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn active_team_members(
        conn: &mut SqliteConnection,
        team_name: &str,
    ) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            "SELECT {MEMBER_COLUMNS} FROM users \
             WHERE team_name = ? AND is_active = TRUE ORDER BY id"
        ))
        .bind(team_name)
        .fetch_all(conn)
        .await?;
        rows.iter().map(member_from_row).collect()
    }

    pub async fn set_member_active(
        conn: &mut SqliteConnection,
        id: &str,
        is_active: bool,
    ) -> Result<Member> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_active = ? WHERE id = ? RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(is_active)
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ReviewError::not_found("member", id))?;
        member_from_row(&row)
    }

    pub async fn deactivate_team_members(
        conn: &mut SqliteConnection,
        team_name: &str,
    ) -> Result<Vec<Member>> {
        let rows = sqlx::query(&format!(
            "UPDATE users SET is_active = FALSE \
             WHERE team_name = ? AND is_active = TRUE RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(team_name)
        .fetch_all(conn)
        .await?;

        let mut members = rows.iter().map(member_from_row).collect::<Result<Vec<_>>>()?;
        // RETURNING yields rows in no particular order.
        members.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(members)
    }

    pub async fn insert_pull_request(
        conn: &mut SqliteConnection,
        pr: &NewPullRequest,
    ) -> Result<PullRequest> {
        let row = sqlx::query(&format!(
            "INSERT INTO pull_requests (id, title, author_id, team_name, status, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {PR_COLUMNS}"
        ))
        .bind(&pr.id)
        .bind(&pr.title)
        .bind(&pr.author_id)
        .bind(&pr.team_name)
        .bind(PrStatus::Open.as_str())
        .bind(Utc::now())
        .fetch_one(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                ReviewError::not_found("member", &pr.author_id)
            }
            other => on_insert_error(other, "pull request", &pr.id),
        })?;
        pull_request_from_row(&row, Vec::new())
    }

    /// Reads the pull request row and its reviewer ids. Under SQLite the
    /// surrounding `BEGIN IMMEDIATE` transaction already holds the write lock,
    /// so this doubles as the locking read.
    pub async fn get_pull_request(conn: &mut SqliteConnection, id: &str) -> Result<PullRequest> {
        let row = sqlx::query(&format!("SELECT {PR_COLUMNS} FROM pull_requests WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| ReviewError::not_found("pull request", id))?;

        let reviewers: Vec<String> = sqlx::query_scalar(
            "SELECT user_id FROM pr_reviewers WHERE pr_id = ? ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;

        pull_request_from_row(&row, reviewers)
    }

    pub async fn mark_merged(conn: &mut SqliteConnection, id: &str) -> Result<DateTime<Utc>> {
        // COALESCE keeps the first merge time if the row was already merged.
        let merged_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "UPDATE pull_requests SET status = ?, merged_at = COALESCE(merged_at, ?) \
             WHERE id = ? RETURNING merged_at",
        )
        .bind(PrStatus::Merged.as_str())
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ReviewError::not_found("pull request", id))?;

        merged_at.ok_or_else(|| ReviewError::Storage(format!("merge time of {} not recorded", id)))
    }

    pub async fn insert_reviewers(
        conn: &mut SqliteConnection,
        pr_id: &str,
        member_ids: &[String],
    ) -> Result<()> {
        if member_ids.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("INSERT INTO pr_reviewers (pr_id, user_id) ");
        builder.push_values(member_ids, |mut b, member_id| {
            b.push_bind(pr_id).push_bind(member_id.as_str());
        });

        builder
            .build()
            .execute(conn)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => ReviewError::Conflict(
                    format!("reviewer already assigned to pull request '{}'", pr_id),
                ),
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    ReviewError::NotFound(format!(
                        "pull request '{}' or one of its reviewers",
                        pr_id
                    ))
                }
                other => other.into(),
            })?;
        Ok(())
    }

    pub async fn delete_reviewer(
        conn: &mut SqliteConnection,
        pr_id: &str,
        member_id: &str,
    ) -> Result<()> {
        let result = sqlx::query("DELETE FROM pr_reviewers WHERE pr_id = ? AND user_id = ?")
            .bind(pr_id)
            .bind(member_id)
            .execute(conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ReviewError::ReviewerNotAssigned {
                pr_id: pr_id.to_string(),
                reviewer_id: member_id.to_string(),
            });
        }
        Ok(())
    }

    pub async fn remove_reviewers_from_open_prs(
        conn: &mut SqliteConnection,
        member_ids: &[String],
    ) -> Result<Vec<PullRequestShort>> {
        if member_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut select: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT DISTINCT pr.id, pr.title, pr.author_id, pr.status \
             FROM pull_requests pr JOIN pr_reviewers r ON r.pr_id = pr.id \
             WHERE pr.status = ",
        );
        select.push_bind(PrStatus::Open.as_str());
        select.push(" AND r.user_id IN ");
        push_id_list(&mut select, member_ids);
        select.push(" ORDER BY pr.id");

        let rows = select.build().fetch_all(&mut *conn).await?;
        let affected = rows
            .iter()
            .map(short_from_row)
            .collect::<Result<Vec<_>>>()?;

        let mut delete: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM pr_reviewers WHERE user_id IN ");
        push_id_list(&mut delete, member_ids);
        delete.push(" AND pr_id IN (SELECT id FROM pull_requests WHERE status = ");
        delete.push_bind(PrStatus::Open.as_str());
        delete.push(")");
        delete.build().execute(&mut *conn).await?;

        Ok(affected)
    }

    pub async fn list_prs_by_reviewer(
        conn: &mut SqliteConnection,
        member_id: &str,
    ) -> Result<Vec<PullRequestShort>> {
        let rows = sqlx::query(
            "SELECT pr.id, pr.title, pr.author_id, pr.status \
             FROM pull_requests pr JOIN pr_reviewers r ON r.pr_id = pr.id \
             WHERE r.user_id = ? \
             ORDER BY pr.created_at DESC, pr.rowid DESC",
        )
        .bind(member_id)
        .fetch_all(conn)
        .await?;
        rows.iter().map(short_from_row).collect()
    }

    pub async fn reviewer_stats(conn: &mut SqliteConnection) -> Result<Vec<AssignmentStats>> {
        let rows = sqlx::query(
            "SELECT user_id, COUNT(*) AS assignment_count \
             FROM pr_reviewers GROUP BY user_id ORDER BY user_id",
        )
        .fetch_all(conn)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AssignmentStats {
                    user_id: row.try_get("user_id")?,
                    assignment_count: row.try_get("assignment_count")?,
                })
            })
            .collect()
    }
}

fn push_id_list<'a>(builder: &mut QueryBuilder<'a, Sqlite>, ids: &'a [String]) {
    builder.push("(");
    let mut separated = builder.separated(", ");
    for id in ids {
        separated.push_bind(id.as_str());
    }
    separated.push_unseparated(")");
}

fn on_insert_error(err: sqlx::Error, what: &str, id: &str) -> ReviewError {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => ReviewError::conflict(what, id),
        other => other.into(),
    }
}

fn parse_status(raw: &str) -> Result<PrStatus> {
    PrStatus::from_str(raw)
        .ok_or_else(|| ReviewError::Storage(format!("Unknown pull request status: {}", raw)))
}

fn member_from_row(row: &SqliteRow) -> Result<Member> {
    Ok(Member {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        team_name: row.try_get("team_name")?,
        is_active: row.try_get("is_active")?,
    })
}

fn pull_request_from_row(row: &SqliteRow, reviewers: Vec<String>) -> Result<PullRequest> {
    let status: String = row.try_get("status")?;
    Ok(PullRequest {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author_id: row.try_get("author_id")?,
        team_name: row.try_get("team_name")?,
        status: parse_status(&status)?,
        reviewers,
        created_at: row.try_get("created_at")?,
        merged_at: row.try_get("merged_at")?,
    })
}

fn short_from_row(row: &SqliteRow) -> Result<PullRequestShort> {
    let status: String = row.try_get("status")?;
    Ok(PullRequestShort {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        author_id: row.try_get("author_id")?,
        status: parse_status(&status)?,
    })
}
