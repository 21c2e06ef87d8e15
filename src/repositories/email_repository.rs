use std::collections::HashMap;

use diesel::dsl::count_star;
use diesel::prelude::*;
use serde::Serialize;
use crate::{
    db,
    error::DbError,
    models::email_models::{
        ActionStatus, AgentAction, Email, EmailClassification, EmailFilters, EmailStatus,
        NewAgentAction, NewEmail, Tier,
    },
    schema::{agent_actions, agents, emails},
    DbPool,
};

pub struct EmailRepository {
    pool: DbPool,
}

/// Escapes LIKE wildcards so user text only matches literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Follow-up action reported by the classifier, before it is tied to a stored email.
#[derive(Clone, Debug)]
pub struct ActionDraft {
    pub action_type: String,
    pub payload: String,
    pub requires_approval: bool,
}

#[derive(Debug)]
pub struct UpsertOutcome {
    pub email: Email,
    pub created: bool,
    pub previous_status: Option<String>,
    pub actions_created: usize,
}

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailCounts {
    pub total: i64,
    pub pending_approval: i64,
    pub escalated: i64,
    pub flagged: i64,
    pub processed: i64,
    pub by_tier: HashMap<i32, i64>,
}

#[derive(Debug, Clone)]
pub enum Decision {
    Approve { draft_response: Option<String> },
    Reject { reason: Option<String> },
}

impl EmailRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Find-or-create by `(agent_id, gmail_id)`. A stored email gets its
    /// classification overwritten; when `actions` is given it replaces the
    /// email's still-pending actions. Once the owner has decided an email its
    /// status, draft and actions are left as they are. Runs in one
    /// transaction per email.
    pub fn upsert_email(&self, new_email: &NewEmail, actions: Option<&[ActionDraft]>) -> Result<UpsertOutcome, DbError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let existing = emails::table
                .filter(emails::agent_id.eq(new_email.agent_id))
                .filter(emails::gmail_id.eq(&new_email.gmail_id))
                .select(Email::as_select())
                .first(conn)
                .optional()?;

            let (email, previous_status, decided) = match existing {
                Some(found) => {
                    let mut changes = EmailClassification::from(new_email);
                    let decided = found.is_decided();
                    if decided {
                        changes.status = found.status.clone();
                        changes.draft_response = found.draft_response.clone();
                    }
                    let updated = diesel::update(emails::table.find(found.id))
                        .set(&changes)
                        .returning(Email::as_returning())
                        .get_result(conn)?;
                    (updated, Some(found.status), decided)
                }
                None => {
                    let inserted = diesel::insert_into(emails::table)
                        .values(new_email)
                        .returning(Email::as_returning())
                        .get_result(conn)?;
                    (inserted, None, false)
                }
            };
            let created = previous_status.is_none();

            let mut actions_created = 0;
            if let Some(drafts) = actions.filter(|_| !decided) {
                diesel::delete(
                    agent_actions::table
                        .filter(agent_actions::email_id.eq(email.id))
                        .filter(agent_actions::status.eq(ActionStatus::Pending.as_str())),
                )
                .execute(conn)?;
                let now = db::now();
                let rows: Vec<NewAgentAction> = drafts
                    .iter()
                    .map(|draft| NewAgentAction {
                        agent_id: email.agent_id,
                        email_id: email.id,
                        action_type: draft.action_type.clone(),
                        payload: draft.payload.clone(),
                        requires_approval: draft.requires_approval,
                        status: ActionStatus::Pending.as_str().to_string(),
                        created_at: now,
                        updated_at: now,
                    })
                    .collect();
                if !rows.is_empty() {
                    actions_created = diesel::insert_into(agent_actions::table)
                        .values(&rows)
                        .execute(conn)?;
                }
            }

            Ok(UpsertOutcome { email, created, previous_status, actions_created })
        })
    }

    pub fn find_by_gmail_id(&self, agent_id: i32, gmail_id: &str) -> Result<Option<Email>, DbError> {
        let mut conn = self.pool.get()?;
        let email = emails::table
            .filter(emails::agent_id.eq(agent_id))
            .filter(emails::gmail_id.eq(gmail_id))
            .select(Email::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(email)
    }

    /// Looks the email up through its agent so other users' mail stays invisible.
    pub fn find_for_user(&self, email_id: i32, user_id: i32) -> Result<Option<Email>, DbError> {
        let mut conn = self.pool.get()?;
        let email = emails::table
            .inner_join(agents::table)
            .filter(emails::id.eq(email_id))
            .filter(agents::user_id.eq(user_id))
            .filter(agents::deleted_at.is_null())
            .select(Email::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(email)
    }

    pub fn actions_for(&self, list: &[Email]) -> Result<Vec<Vec<AgentAction>>, DbError> {
        let mut conn = self.pool.get()?;
        let actions = AgentAction::belonging_to(list)
            .order(agent_actions::id.asc())
            .select(AgentAction::as_select())
            .load(&mut conn)?;
        Ok(actions.grouped_by(list))
    }

    /// Draft-tier emails still waiting for the owner's decision, newest first.
    pub fn approval_queue(&self, agent_id: i32) -> Result<Vec<Email>, DbError> {
        let mut conn = self.pool.get()?;
        let queue = emails::table
            .filter(emails::agent_id.eq(agent_id))
            .filter(emails::status.eq(EmailStatus::PendingApproval.as_str()))
            .filter(emails::tier.eq(Tier::Draft.as_i32()))
            .order((emails::received_at.desc(), emails::id.desc()))
            .select(Email::as_select())
            .load(&mut conn)?;
        Ok(queue)
    }

    pub fn search(&self, agent_ids: &[i32], filters: &EmailFilters, limit: i64, offset: i64) -> Result<Vec<Email>, DbError> {
        let mut conn = self.pool.get()?;
        let mut query = emails::table
            .filter(emails::agent_id.eq_any(agent_ids.to_vec()))
            .into_boxed();
        if let Some(tier) = filters.tier {
            query = query.filter(emails::tier.eq(tier));
        }
        if let Some(status) = filters.status {
            query = query.filter(emails::status.eq(status.as_str()));
        }
        if let Some(q) = filters.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_like(q));
            query = query.filter(
                emails::subject
                    .like(pattern.clone())
                    .escape('\\')
                    .or(emails::from_address.like(pattern.clone()).escape('\\'))
                    .or(emails::snippet.assume_not_null().like(pattern).escape('\\')),
            );
        }
        let found = query
            .order((emails::received_at.desc(), emails::id.desc()))
            .limit(limit)
            .offset(offset)
            .select(Email::as_select())
            .load(&mut conn)?;
        Ok(found)
    }

    pub fn counts(&self, agent_id: i32) -> Result<EmailCounts, DbError> {
        let mut conn = self.pool.get()?;
        let by_status: Vec<(String, i64)> = emails::table
            .filter(emails::agent_id.eq(agent_id))
            .group_by(emails::status)
            .select((emails::status, count_star()))
            .load(&mut conn)?;
        let by_tier: Vec<(i32, i64)> = emails::table
            .filter(emails::agent_id.eq(agent_id))
            .group_by(emails::tier)
            .select((emails::tier, count_star()))
            .load(&mut conn)?;

        let mut counts = EmailCounts::default();
        for (status, count) in by_status {
            counts.total += count;
            match status.parse::<EmailStatus>() {
                Ok(EmailStatus::PendingApproval) => counts.pending_approval += count,
                Ok(EmailStatus::Escalated) => counts.escalated += count,
                Ok(EmailStatus::Flagged) => counts.flagged += count,
                Ok(EmailStatus::Processed) => counts.processed += count,
                Err(e) => tracing::warn!("Skipping unexpected status in counts: {}", e),
            }
        }
        for tier in Tier::ALL {
            counts.by_tier.insert(tier.as_i32(), 0);
        }
        for (tier, count) in by_tier {
            counts.by_tier.insert(tier, count);
        }
        Ok(counts)
    }

    /// Applies an owner decision to a pending email. Returns `None` when the
    /// email is no longer pending.
    pub fn decide(&self, email_id: i32, decision: &Decision) -> Result<Option<Email>, DbError> {
        let mut conn = self.pool.get()?;
        let now = db::now();
        conn.transaction::<_, DbError, _>(|conn| {
            let current = emails::table
                .find(email_id)
                .filter(emails::status.eq(EmailStatus::PendingApproval.as_str()))
                .select(Email::as_select())
                .first(conn)
                .optional()?;
            let Some(current) = current else {
                return Ok(None);
            };

            let (draft_response, reasoning, action_status) = match decision {
                Decision::Approve { draft_response } => (
                    draft_response.clone().or(current.draft_response.clone()),
                    current.reasoning.clone(),
                    ActionStatus::Approved,
                ),
                Decision::Reject { reason } => {
                    let reasoning = match reason.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
                        Some(r) if current.reasoning.is_empty() => format!("Rejected: {}", r),
                        Some(r) => format!("{}\nRejected: {}", current.reasoning, r),
                        None => current.reasoning.clone(),
                    };
                    (current.draft_response.clone(), reasoning, ActionStatus::Rejected)
                }
            };

            let email = diesel::update(emails::table.find(email_id))
                .set((
                    emails::status.eq(EmailStatus::Processed.as_str()),
                    emails::draft_response.eq(draft_response),
                    emails::reasoning.eq(reasoning),
                    emails::reviewed_at.eq(Some(now)),
                    emails::updated_at.eq(now),
                ))
                .returning(Email::as_returning())
                .get_result(conn)?;

            diesel::update(
                agent_actions::table
                    .filter(agent_actions::email_id.eq(email_id))
                    .filter(agent_actions::status.eq(ActionStatus::Pending.as_str())),
            )
            .set((
                agent_actions::status.eq(action_status.as_str()),
                agent_actions::updated_at.eq(now),
            ))
            .execute(conn)?;

            Ok(Some(email))
        })
    }

    /// Replaces the draft on a pending email without deciding it.
    pub fn update_draft(&self, email_id: i32, draft_response: &str) -> Result<Option<Email>, DbError> {
        let mut conn = self.pool.get()?;
        let email = diesel::update(
            emails::table
                .filter(emails::id.eq(email_id))
                .filter(emails::status.eq(EmailStatus::PendingApproval.as_str())),
        )
        .set((
            emails::draft_response.eq(Some(draft_response)),
            emails::updated_at.eq(db::now()),
        ))
        .returning(Email::as_returning())
        .get_result(&mut conn)
        .optional()?;
        Ok(email)
    }

    /// Flags an email for the owner's attention. Counts as a decision, so a
    /// later re-sync leaves the status alone.
    pub fn flag(&self, email_id: i32) -> Result<Email, DbError> {
        let mut conn = self.pool.get()?;
        let now = db::now();
        let email = diesel::update(emails::table.find(email_id))
            .set((
                emails::status.eq(EmailStatus::Flagged.as_str()),
                emails::reviewed_at.eq(Some(now)),
                emails::updated_at.eq(now),
            ))
            .returning(Email::as_returning())
            .get_result(&mut conn)?;
        Ok(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50% off_now"), "50\\% off\\_now");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
        assert_eq!(escape_like("plain"), "plain");
    }
}
