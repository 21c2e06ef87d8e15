use diesel::prelude::*;
use diesel::sql_types::Text;
use crate::{
    db,
    error::DbError,
    models::agent_models::{Agent, AgentChanges, AgentVersion, NewAgent, NewAgentVersion},
    schema::{agent_versions, agents},
    DbPool,
};

diesel::define_sql_function! {
    fn lower(x: Text) -> Text;
}

pub struct AgentRepository {
    pool: DbPool,
}

fn record_version(conn: &mut SqliteConnection, agent: &Agent, created_by: i32) -> Result<AgentVersion, DbError> {
    let latest: Option<i32> = agent_versions::table
        .filter(agent_versions::agent_id.eq(agent.id))
        .select(diesel::dsl::max(agent_versions::version))
        .first(conn)?;
    let config = serde_json::to_string(&agent.config_snapshot())
        .unwrap_or_else(|_| "{}".to_string());
    let version = diesel::insert_into(agent_versions::table)
        .values(&NewAgentVersion {
            agent_id: agent.id,
            version: latest.unwrap_or(0) + 1,
            config,
            created_by,
            created_at: db::now(),
        })
        .returning(AgentVersion::as_returning())
        .get_result(conn)?;
    Ok(version)
}

impl AgentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Creates the agent together with its first version snapshot.
    pub fn create_agent(&self, new_agent: &NewAgent) -> Result<Agent, DbError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let agent = diesel::insert_into(agents::table)
                .values(new_agent)
                .returning(Agent::as_returning())
                .get_result(conn)?;
            record_version(conn, &agent, new_agent.user_id)?;
            Ok(agent)
        })
    }

    pub fn list_for_user(&self, user_id: i32) -> Result<Vec<Agent>, DbError> {
        let mut conn = self.pool.get()?;
        let list = agents::table
            .filter(agents::user_id.eq(user_id))
            .filter(agents::deleted_at.is_null())
            .order(agents::created_at.asc())
            .select(Agent::as_select())
            .load(&mut conn)?;
        Ok(list)
    }

    pub fn find_for_user(&self, agent_id: i32, user_id: i32) -> Result<Option<Agent>, DbError> {
        let mut conn = self.pool.get()?;
        let agent = agents::table
            .filter(agents::id.eq(agent_id))
            .filter(agents::user_id.eq(user_id))
            .filter(agents::deleted_at.is_null())
            .select(Agent::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(agent)
    }

    /// Mailbox lookup used by the sync integration; soft-deleted agents are invisible.
    pub fn find_live_by_email(&self, email: &str) -> Result<Option<Agent>, DbError> {
        let mut conn = self.pool.get()?;
        let agent = agents::table
            .filter(lower(agents::email).eq(lower(email.trim())))
            .filter(agents::deleted_at.is_null())
            .select(Agent::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(agent)
    }

    pub fn live_ids_for_user(&self, user_id: i32) -> Result<Vec<i32>, DbError> {
        let mut conn = self.pool.get()?;
        let ids = agents::table
            .filter(agents::user_id.eq(user_id))
            .filter(agents::deleted_at.is_null())
            .select(agents::id)
            .load(&mut conn)?;
        Ok(ids)
    }

    /// Applies the changes and snapshots the resulting configuration as the next version.
    pub fn update_agent(&self, agent_id: i32, changes: &AgentChanges, changed_by: i32) -> Result<Agent, DbError> {
        let mut conn = self.pool.get()?;
        conn.transaction::<_, DbError, _>(|conn| {
            let agent = diesel::update(agents::table.find(agent_id))
                .set(changes)
                .returning(Agent::as_returning())
                .get_result(conn)?;
            record_version(conn, &agent, changed_by)?;
            Ok(agent)
        })
    }

    pub fn soft_delete(&self, agent_id: i32) -> Result<(), DbError> {
        let mut conn = self.pool.get()?;
        let now = db::now();
        diesel::update(agents::table.find(agent_id))
            .set((
                agents::deleted_at.eq(Some(now)),
                agents::is_active.eq(false),
                agents::updated_at.eq(now),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn touch_last_run(&self, agent_id: i32) -> Result<i32, DbError> {
        let mut conn = self.pool.get()?;
        let now = db::now();
        diesel::update(agents::table.find(agent_id))
            .set(agents::last_run_at.eq(Some(now)))
            .execute(&mut conn)?;
        Ok(now)
    }

    pub fn list_versions(&self, agent_id: i32) -> Result<Vec<AgentVersion>, DbError> {
        let mut conn = self.pool.get()?;
        let versions = agent_versions::table
            .filter(agent_versions::agent_id.eq(agent_id))
            .order(agent_versions::version.desc())
            .select(AgentVersion::as_select())
            .load(&mut conn)?;
        Ok(versions)
    }
}
