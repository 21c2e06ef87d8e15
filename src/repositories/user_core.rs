use diesel::prelude::*;
use diesel::sql_types::Text;
use crate::{
    db,
    error::DbError,
    models::user_models::{NewUser, User},
    schema::users,
    DbPool,
};

diesel::define_sql_function! {
    fn lower(x: Text) -> Text;
}

pub struct UserCore {
    pool: DbPool
}

impl UserCore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn create_user(&self, new_user: &NewUser) -> Result<User, DbError> {
        let mut conn = self.pool.get()?;
        let user = diesel::insert_into(users::table)
            .values(new_user)
            .returning(User::as_returning())
            .get_result(&mut conn)?;
        Ok(user)
    }

    pub fn find_by_email(&self, search_email: &str) -> Result<Option<User>, DbError> {
        let mut conn = self.pool.get()?;
        let user = users::table
            .filter(lower(users::email).eq(lower(search_email)))
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    pub fn find_by_id(&self, user_id: i32) -> Result<Option<User>, DbError> {
        let mut conn = self.pool.get()?;
        let user = users::table
            .find(user_id)
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()?;
        Ok(user)
    }

    pub fn email_exists(&self, search_email: &str) -> Result<bool, DbError> {
        Ok(self.find_by_email(search_email)?.is_some())
    }

    pub fn mark_verified(&self, user_id: i32) -> Result<(), DbError> {
        let mut conn = self.pool.get()?;
        diesel::update(users::table.find(user_id))
            .set((
                users::verified.eq(true),
                users::time_to_live.eq::<Option<i32>>(None),
            ))
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn update_password(&self, user_id: i32, password_hash: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get()?;
        diesel::update(users::table.find(user_id))
            .set(users::password_hash.eq(password_hash))
            .execute(&mut conn)?;
        Ok(())
    }

    /// Removes accounts that never verified their email in time. Their agents
    /// and everything below them go with the cascade.
    pub fn delete_expired_unverified(&self) -> Result<usize, DbError> {
        let mut conn = self.pool.get()?;
        let deleted = diesel::delete(
            users::table
                .filter(users::verified.eq(false))
                .filter(users::time_to_live.lt(db::now())),
        )
        .execute(&mut conn)?;
        Ok(deleted)
    }
}
