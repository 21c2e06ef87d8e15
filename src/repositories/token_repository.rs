use diesel::prelude::*;
use rand::{thread_rng, Rng};
use crate::{
    db,
    error::DbError,
    models::user_models::{NewVerificationToken, TokenPurpose, VerificationToken},
    schema::verification_tokens,
    DbPool,
};

pub struct TokenRepository {
    pool: DbPool,
}

fn generate_token() -> String {
    let token_bytes: [u8; 32] = thread_rng().gen(); // 256-bit
    hex::encode(token_bytes)
}

impl TokenRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Issues a fresh single-use token, dropping any older token the user had
    /// for the same purpose.
    pub fn issue(&self, user_id: i32, purpose: TokenPurpose, ttl_seconds: i32) -> Result<String, DbError> {
        let mut conn = self.pool.get()?;
        let now = db::now();
        let token = generate_token();
        conn.transaction::<_, DbError, _>(|conn| {
            diesel::delete(
                verification_tokens::table
                    .filter(verification_tokens::user_id.eq(user_id))
                    .filter(verification_tokens::purpose.eq(purpose.as_str())),
            )
            .execute(conn)?;
            diesel::insert_into(verification_tokens::table)
                .values(&NewVerificationToken {
                    user_id,
                    token: token.clone(),
                    purpose: purpose.as_str().to_string(),
                    expires_at: now + ttl_seconds,
                    created_at: now,
                })
                .execute(conn)?;
            Ok(())
        })?;
        Ok(token)
    }

    pub fn insert(&self, new_token: &NewVerificationToken) -> Result<(), DbError> {
        let mut conn = self.pool.get()?;
        diesel::insert_into(verification_tokens::table)
            .values(new_token)
            .execute(&mut conn)?;
        Ok(())
    }

    pub fn find(&self, token: &str, purpose: TokenPurpose) -> Result<Option<VerificationToken>, DbError> {
        let mut conn = self.pool.get()?;
        let found = verification_tokens::table
            .filter(verification_tokens::token.eq(token))
            .filter(verification_tokens::purpose.eq(purpose.as_str()))
            .select(VerificationToken::as_select())
            .first(&mut conn)
            .optional()?;
        Ok(found)
    }

    pub fn delete(&self, token_id: i32) -> Result<(), DbError> {
        let mut conn = self.pool.get()?;
        diesel::delete(verification_tokens::table.find(token_id)).execute(&mut conn)?;
        Ok(())
    }

    pub fn delete_expired(&self) -> Result<usize, DbError> {
        let mut conn = self.pool.get()?;
        let deleted = diesel::delete(
            verification_tokens::table.filter(verification_tokens::expires_at.le(db::now())),
        )
        .execute(&mut conn)?;
        Ok(deleted)
    }
}
