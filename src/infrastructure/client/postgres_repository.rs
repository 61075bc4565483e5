//! PostgreSQL client repository

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::domain::client::{
    ClientId, ClientIdentity, ClientRepository, ClientStatus, Role, Tier,
};
use crate::domain::DomainError;

const CLIENT_COLUMNS: &str = "id, display_name, credential_hash, tier, roles, status, \
     quota_override, created_at, updated_at, last_used_at";

/// Connection pool settings for the client table
#[derive(Debug, Clone)]
pub struct PostgresClientConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout: Duration,
}

impl PostgresClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }
}

#[derive(Debug, Clone)]
pub struct PostgresClientRepository {
    pool: PgPool,
}

impl PostgresClientRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and make sure the `clients` table exists
    pub async fn connect(config: &PostgresClientConfig) -> Result<Self, DomainError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        let repository = Self::new(pool);
        repository.ensure_schema().await?;
        Ok(repository)
    }

    pub async fn ensure_schema(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id              TEXT PRIMARY KEY,
                display_name    TEXT NOT NULL,
                credential_hash TEXT NOT NULL UNIQUE,
                tier            TEXT NOT NULL,
                roles           TEXT[] NOT NULL,
                status          TEXT NOT NULL,
                quota_override  INTEGER,
                created_at      TIMESTAMPTZ NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL,
                last_used_at    TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to create clients table: {}", e)))?;

        Ok(())
    }

    async fn fetch_one_where(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<ClientIdentity>, DomainError> {
        let sql = format!("SELECT {} FROM clients WHERE {} = $1", CLIENT_COLUMNS, column);

        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to get client: {}", e)))?;

        row.as_ref().map(row_to_client).transpose()
    }
}

#[async_trait]
impl ClientRepository for PostgresClientRepository {
    async fn get(&self, id: &ClientId) -> Result<Option<ClientIdentity>, DomainError> {
        self.fetch_one_where("id", id.as_str()).await
    }

    async fn get_by_credential_hash(
        &self,
        hash: &str,
    ) -> Result<Option<ClientIdentity>, DomainError> {
        self.fetch_one_where("credential_hash", hash).await
    }

    async fn create(&self, client: ClientIdentity) -> Result<ClientIdentity, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO clients (id, display_name, credential_hash, tier, roles, status,
                                 quota_override, created_at, updated_at, last_used_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(client.id().as_str())
        .bind(client.display_name())
        .bind(client.credential_hash())
        .bind(client.tier().as_str())
        .bind(roles_to_vec(&client))
        .bind(client.status().as_str())
        .bind(client.quota_override().map(|q| q as i32))
        .bind(client.created_at())
        .bind(client.updated_at())
        .bind(client.last_used_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                if msg.contains("credential_hash") {
                    DomainError::conflict("A client with this credential is already registered")
                } else {
                    DomainError::conflict(format!(
                        "Client with ID '{}' already exists",
                        client.id()
                    ))
                }
            } else {
                DomainError::storage(format!("Failed to create client: {}", e))
            }
        })?;

        Ok(client)
    }

    async fn update(&self, client: &ClientIdentity) -> Result<ClientIdentity, DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE clients
            SET display_name = $2, tier = $3, roles = $4, status = $5,
                quota_override = $6, updated_at = $7, last_used_at = $8
            WHERE id = $1
            "#,
        )
        .bind(client.id().as_str())
        .bind(client.display_name())
        .bind(client.tier().as_str())
        .bind(roles_to_vec(client))
        .bind(client.status().as_str())
        .bind(client.quota_override().map(|q| q as i32))
        .bind(client.updated_at())
        .bind(client.last_used_at())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to update client: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Client '{}' not found",
                client.id()
            )));
        }

        Ok(client.clone())
    }

    async fn delete(&self, id: &ClientId) -> Result<bool, DomainError> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to delete client: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, status: Option<ClientStatus>) -> Result<Vec<ClientIdentity>, DomainError> {
        let rows = match status {
            Some(s) => {
                let sql = format!(
                    "SELECT {} FROM clients WHERE status = $1 ORDER BY created_at",
                    CLIENT_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(s.as_str())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {} FROM clients ORDER BY created_at", CLIENT_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .map_err(|e| DomainError::storage(format!("Failed to list clients: {}", e)))?;

        rows.iter().map(row_to_client).collect()
    }

    async fn count(&self, status: Option<ClientStatus>) -> Result<usize, DomainError> {
        let count: i64 = match status {
            Some(s) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM clients WHERE status = $1")
                    .bind(s.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM clients")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| DomainError::storage(format!("Failed to count clients: {}", e)))?;

        Ok(count as usize)
    }

    async fn record_usage(&self, id: &ClientId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE clients SET last_used_at = NOW() WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to record client usage: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("Client '{}' not found", id)));
        }

        Ok(())
    }
}

fn roles_to_vec(client: &ClientIdentity) -> Vec<String> {
    client.roles().iter().map(|r| r.as_str().to_string()).collect()
}

fn parse_roles(values: &[String]) -> Result<Vec<Role>, DomainError> {
    values
        .iter()
        .map(|v| {
            v.parse::<Role>()
                .map_err(|_| DomainError::storage(format!("Invalid role '{}' in database", v)))
        })
        .collect()
}

fn row_to_client(row: &PgRow) -> Result<ClientIdentity, DomainError> {
    let id: String = row.get("id");
    let display_name: String = row.get("display_name");
    let credential_hash: String = row.get("credential_hash");
    let tier: String = row.get("tier");
    let roles: Vec<String> = row.get("roles");
    let status: String = row.get("status");
    let quota_override: Option<i32> = row.get("quota_override");
    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");
    let last_used_at: Option<DateTime<Utc>> = row.get("last_used_at");

    let id = ClientId::new(id)
        .map_err(|e| DomainError::storage(format!("Invalid client ID in database: {}", e)))?;
    let tier: Tier = tier
        .parse()
        .map_err(|e| DomainError::storage(format!("{} in database", e)))?;
    let status: ClientStatus = status
        .parse()
        .map_err(|_| DomainError::storage(format!("Invalid status '{}' in database", status)))?;

    Ok(ClientIdentity::new(id, display_name, credential_hash, tier)
        .with_roles(parse_roles(&roles)?)
        .with_status(status)
        .with_quota_override(quota_override.map(|q| q.max(0) as u32))
        .with_timestamps(created_at, updated_at, last_used_at))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roles() {
        let roles = parse_roles(&["read".to_string(), "admin".to_string()]).unwrap();
        assert_eq!(roles, vec![Role::Read, Role::Admin]);

        assert!(parse_roles(&["owner".to_string()]).is_err());
    }

    #[test]
    fn test_roles_to_vec_is_sorted() {
        let client = ClientIdentity::new(
            ClientId::new("acme").unwrap(),
            "Acme",
            "sha256$a",
            Tier::Enterprise,
        );

        assert_eq!(roles_to_vec(&client), vec!["read", "write", "admin"]);
    }

    #[tokio::test]
    #[ignore = "Requires running PostgreSQL instance (DATABASE_URL)"]
    async fn test_postgres_round_trip() {
        let url = std::env::var("DATABASE_URL").unwrap();
        let repo = PostgresClientRepository::connect(&PostgresClientConfig::new(url))
            .await
            .unwrap();

        let client = ClientIdentity::new(
            ClientId::generate(),
            "Round Trip",
            format!("sha256${}", uuid::Uuid::new_v4()),
            Tier::Standard,
        );
        repo.create(client.clone()).await.unwrap();

        let found = repo
            .get_by_credential_hash(client.credential_hash())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id(), client.id());
        assert_eq!(found.tier(), Tier::Standard);

        assert!(repo.delete(client.id()).await.unwrap());
    }
}
