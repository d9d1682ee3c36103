use std::future::Future;
use time::Duration;
use crate::models::session::Session;
use crate::models::user::{NewUser, User};

#[cfg(test)]
pub mod memory_repo;
pub mod postgres_repo;

pub trait UserRepo: Send + Sync {
    /// Stores the user, or returns `None` if the email is already taken.
    fn create_user(&self, user: &NewUser) -> impl Future<Output = anyhow::Result<Option<User>>> + Send;

    fn try_get_user_by_email(&self, email: &str) -> impl Future<Output = anyhow::Result<Option<User>>> + Send;
}

pub trait SessionRepo: Send + Sync {
    fn create_session(&self, uid: i32, ttl: Duration) -> impl Future<Output = anyhow::Result<Session>> + Send;

    /// The owner of an unexpired session.
    fn try_get_session_user(&self, token: &str) -> impl Future<Output = anyhow::Result<Option<User>>> + Send;

    fn delete_session(&self, token: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn delete_expired_sessions(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;
}
