use std::sync::Mutex;
use time::{Duration, OffsetDateTime};
use crate::models::session::Session;
use crate::models::user::{normalize_email, NewUser, User};
use crate::repositories::{SessionRepo, UserRepo};

#[derive(Default)]
pub struct MemoryRepo {
    users: Mutex<Vec<User>>,
    sessions: Mutex<Vec<Session>>,
}

impl MemoryRepo {
    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn expire_all_sessions(&self) {
        let past = OffsetDateTime::now_utc() - Duration::seconds(1);
        for session in self.sessions.lock().unwrap().iter_mut() {
            session.expires_at = past;
        }
    }
}

impl UserRepo for MemoryRepo {
    async fn create_user(&self, user: &NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Ok(None);
        }
        let created = User {
            uid: users.len() as i32 + 1,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
        };
        users.push(created.clone());
        Ok(Some(created))
    }

    async fn try_get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let email = normalize_email(email);
        Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
    }
}

impl SessionRepo for MemoryRepo {
    async fn create_session(&self, uid: i32, ttl: Duration) -> anyhow::Result<Session> {
        let session = Session::issue(uid, ttl);
        self.sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    async fn try_get_session_user(&self, token: &str) -> anyhow::Result<Option<User>> {
        let now = OffsetDateTime::now_utc();
        let uid = self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.token == token && !s.is_expired(now))
            .map(|s| s.uid);
        Ok(uid.and_then(|uid| self.users.lock().unwrap().iter().find(|u| u.uid == uid).cloned()))
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        self.sessions.lock().unwrap().retain(|s| s.token != token);
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> anyhow::Result<u64> {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.lock().unwrap();
        let before = sessions.len();
        sessions.retain(|s| !s.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let repo = MemoryRepo::default();
        let user = NewUser::new("ada", "lovelace", "ada@example.com", "engine1").unwrap();
        assert!(repo.create_user(&user).await.unwrap().is_some());

        let again = NewUser::new("Ada", "L", "ADA@example.com", "engine2").unwrap();
        assert!(repo.create_user(&again).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_sessions_are_ignored_and_purged() {
        let repo = MemoryRepo::default();
        let user = NewUser::new("ada", "lovelace", "ada@example.com", "engine1").unwrap();
        let user = repo.create_user(&user).await.unwrap().unwrap();
        let session = repo.create_session(user.uid, Duration::hours(1)).await.unwrap();
        assert!(repo.try_get_session_user(&session.token).await.unwrap().is_some());

        repo.expire_all_sessions();
        assert!(repo.try_get_session_user(&session.token).await.unwrap().is_none());
        assert_eq!(repo.delete_expired_sessions().await.unwrap(), 1);
        assert_eq!(repo.session_count(), 0);
    }
}
