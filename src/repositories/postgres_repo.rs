use anyhow::{anyhow, Context};
use bb8_postgres::bb8::{Pool, PooledConnection};
use bb8_postgres::tokio_postgres::{NoTls, Row};
use bb8_postgres::PostgresConnectionManager;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use crate::models::session::Session;
use crate::models::user::{normalize_email, NewUser, Password, User};
use crate::repositories::{SessionRepo, UserRepo};

pub const RETRY_LIMIT: usize = 5;

const MIGRATIONS: &str = "
    CREATE TABLE IF NOT EXISTS users (
        uid SERIAL PRIMARY KEY,
        firstname VARCHAR(100) NOT NULL,
        lastname VARCHAR(100) NOT NULL,
        email VARCHAR(120) NOT NULL UNIQUE,
        pwdhash TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS user_sessions (
        token VARCHAR(64) PRIMARY KEY,
        uid INTEGER NOT NULL REFERENCES users (uid) ON DELETE CASCADE,
        expires_at TIMESTAMPTZ NOT NULL
    );
    CREATE INDEX IF NOT EXISTS user_sessions_uid_idx ON user_sessions (uid);
";

pub struct PostgresConnectionRepo {
    postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresConnectionRepo {
    pub fn new(
        postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
    ) -> Self {
        Self {
            postgres_connection
        }
    }

    async fn get_postgres_connection(
        &self,
    ) -> anyhow::Result<PooledConnection<'_, PostgresConnectionManager<NoTls>>> {
        for _ in 0..RETRY_LIMIT {
            match self.postgres_connection.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!("Failed to retrieve postgres connection due to: {}, retrying in 3s", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
                    continue;
                }
            }
        }

        Err(anyhow!("Failed to retrieve a valid connection from postgres pool, BAILING"))
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.get_postgres_connection().await?;
        conn.batch_execute(MIGRATIONS)
            .await
            .context("Failed to create tables")?;
        info!("Database schema is up to date");
        Ok(())
    }
}

impl UserRepo for PostgresConnectionRepo {
    async fn create_user(&self, user: &NewUser) -> anyhow::Result<Option<User>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt(
                "INSERT INTO users (firstname, lastname, email, pwdhash) \
                VALUES ($1, $2, $3, $4) \
                ON CONFLICT (email) DO NOTHING \
                RETURNING uid;",
                &[&user.first_name, &user.last_name, &user.email, &user.password.as_ref()],
            )
            .await
            .with_context(|| format!("Failed to insert user: {}", user.email))?;

        Ok(row.map(|row| User {
            uid: row.get::<&str, i32>("uid"),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            password: user.password.clone(),
        }))
    }

    async fn try_get_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let conn = self.get_postgres_connection().await?;
        let email = normalize_email(email);
        let row = conn
            .query_opt(
                "SELECT uid, firstname, lastname, email, pwdhash FROM users WHERE email = $1;",
                &[&email],
            )
            .await
            .with_context(|| format!("Failed to retrieve user: {}", email))?;

        Ok(row.map(parse_row_into_user))
    }
}

impl SessionRepo for PostgresConnectionRepo {
    async fn create_session(&self, uid: i32, ttl: Duration) -> anyhow::Result<Session> {
        let conn = self.get_postgres_connection().await?;
        let session = Session::issue(uid, ttl);
        conn.execute(
            "INSERT INTO user_sessions (token, uid, expires_at) VALUES ($1, $2, $3);",
            &[&session.token, &session.uid, &session.expires_at],
        )
        .await
        .with_context(|| format!("Failed to store session for user: {}", uid))?;

        Ok(session)
    }

    async fn try_get_session_user(&self, token: &str) -> anyhow::Result<Option<User>> {
        let conn = self.get_postgres_connection().await?;
        let row = conn
            .query_opt(
                "SELECT u.uid, u.firstname, u.lastname, u.email, u.pwdhash \
                FROM user_sessions s JOIN users u ON u.uid = s.uid \
                WHERE s.token = $1 AND s.expires_at > $2;",
                &[&token, &OffsetDateTime::now_utc()],
            )
            .await
            .context("Failed to look up session")?;

        Ok(row.map(parse_row_into_user))
    }

    async fn delete_session(&self, token: &str) -> anyhow::Result<()> {
        let conn = self.get_postgres_connection().await?;
        conn.execute("DELETE FROM user_sessions WHERE token = $1;", &[&token])
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_expired_sessions(&self) -> anyhow::Result<u64> {
        let conn = self.get_postgres_connection().await?;
        conn.execute(
            "DELETE FROM user_sessions WHERE expires_at <= $1;",
            &[&OffsetDateTime::now_utc()],
        )
        .await
        .context("Failed to delete expired sessions")
    }
}

fn parse_row_into_user(
    row: Row,
) -> User {
    User {
        uid: row.get::<&str, i32>("uid"),
        first_name: row.get("firstname"),
        last_name: row.get("lastname"),
        email: row.get("email"),
        password: Password::from(row.get::<&str, String>("pwdhash")),
    }
}
