use diesel::prelude::*;
use crate::schema::users;
use crate::schema::verification_tokens;
use crate::schema::saved_email_searches;

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct User {
    pub id: i32,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub verified: bool,
    pub time_to_live: Option<i32>, // unverified accounts get removed after this
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub verified: bool,
    pub time_to_live: Option<i32>,
    pub created_at: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = verification_tokens)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct VerificationToken {
    pub id: i32,
    pub user_id: i32,
    pub token: String,
    pub purpose: String, // email_verification, password_reset
    pub expires_at: i32,
    pub created_at: i32,
}

impl VerificationToken {
    pub fn is_expired(&self, now: i32) -> bool {
        self.expires_at <= now
    }
}

#[derive(Insertable)]
#[diesel(table_name = verification_tokens)]
pub struct NewVerificationToken {
    pub user_id: i32,
    pub token: String,
    pub purpose: String,
    pub expires_at: i32,
    pub created_at: i32,
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = saved_email_searches)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SavedEmailSearch {
    pub id: i32,
    pub user_id: i32,
    pub agent_id: Option<i32>,
    pub name: String,
    pub filters: String, // json encoded EmailFilters
    pub created_at: i32,
}

#[derive(Insertable)]
#[diesel(table_name = saved_email_searches)]
pub struct NewSavedEmailSearch {
    pub user_id: i32,
    pub agent_id: Option<i32>,
    pub name: String,
    pub filters: String,
    pub created_at: i32,
}
