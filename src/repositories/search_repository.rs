use diesel::prelude::*;
use crate::{
    error::DbError,
    models::user_models::{NewSavedEmailSearch, SavedEmailSearch},
    schema::saved_email_searches,
    DbPool,
};

pub struct SearchRepository {
    pool: DbPool,
}

impl SearchRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create(&self, new_search: &NewSavedEmailSearch) -> Result<SavedEmailSearch, DbError> {
        let mut conn = self.pool.get()?;
        let saved = diesel::insert_into(saved_email_searches::table)
            .values(new_search)
            .returning(SavedEmailSearch::as_returning())
            .get_result(&mut conn)?;
        Ok(saved)
    }

    pub fn list_for_user(&self, user_id: i32) -> Result<Vec<SavedEmailSearch>, DbError> {
        let mut conn = self.pool.get()?;
        let list = saved_email_searches::table
            .filter(saved_email_searches::user_id.eq(user_id))
            .order(saved_email_searches::created_at.desc())
            .select(SavedEmailSearch::as_select())
            .load(&mut conn)?;
        Ok(list)
    }

    pub fn find_for_user(&self, search_id: i32, user_id: i32) -> Result<Option<SavedEmailSearch>, DbError> {
        let mut conn = self.pool.get()?;
        let found = saved_email_searches::table
            .filter(saved_email_searches::id.eq(search_id))
            .filter(saved_email_searches::user_id.eq(user_id))
            .select(SavedEmailSearch::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(found)
    }

    /// Returns `false` when there was nothing of this user's to delete.
    pub fn delete_for_user(&self, search_id: i32, user_id: i32) -> Result<bool, DbError> {
        let mut conn = self.pool.get()?;
        let deleted = diesel::delete(
            saved_email_searches::table
                .filter(saved_email_searches::id.eq(search_id))
                .filter(saved_email_searches::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }
}
