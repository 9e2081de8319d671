//! Process-wide configuration, resolved from environment variables at
//! startup with CLI flag overrides for the pieces operators tend to
//! override per-invocation (bind address, database URL).
//!
//! The core does not verify OIDC tokens, make authorization decisions, or
//! emit lineage events itself -- those are external collaborators per the
//! engine's scope -- but this layer still parses and carries every input
//! a deployment needs to wire those collaborators up.

use std::env;

use dqe_db::config::DbConfig;

/// Multi-tenancy isolation strategy for the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    Namespace,
    Schema,
    Database,
}

impl IsolationLevel {
    fn from_env(raw: &str) -> Self {
        match raw {
            "schema" => Self::Schema,
            "database" => Self::Database,
            _ => Self::Namespace,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OidcConfig {
    pub issuer: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    pub store: Option<String>,
    pub host: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TenancyConfig {
    pub enabled: bool,
    pub isolation: IsolationLevel,
}

#[derive(Debug, Clone)]
pub struct LineageConfig {
    pub endpoint: Option<String>,
    pub namespace: Option<String>,
}

/// The fully resolved, process-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub host: String,
    pub port: u16,
    pub db_config: DbConfig,
    pub oidc: OidcConfig,
    pub authorization: AuthorizationConfig,
    pub tenancy: TenancyConfig,
    pub lineage: LineageConfig,
    /// Shared-secret bearer token gating non-public endpoints. `None` means
    /// no static secret is configured and any non-empty bearer token is
    /// accepted -- appropriate when a reverse proxy in front of this
    /// service already terminates OIDC.
    pub api_token: Option<String>,
}

impl EngineConfig {
    /// Resolve configuration from the environment, with `cli_db_url` and
    /// `cli_bind` taking precedence over their `DQE_*` env equivalents.
    pub fn resolve(cli_db_url: Option<&str>, cli_bind: Option<&str>) -> Self {
        let db_config = match cli_db_url {
            Some(url) => DbConfig::new(url.to_owned()),
            None => DbConfig::from_env(),
        };

        let (host, port) = match cli_bind {
            Some(bind) => split_bind(bind),
            None => (
                env::var("DQE_SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_owned()),
                env::var("DQE_SERVER_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            ),
        };

        Self {
            host,
            port,
            db_config,
            oidc: OidcConfig {
                issuer: env::var("DQE_OIDC_ISSUER").ok(),
                client_id: env::var("DQE_OIDC_CLIENT_ID").ok(),
                client_secret: env::var("DQE_OIDC_CLIENT_SECRET").ok(),
                redirect_uri: env::var("DQE_OIDC_REDIRECT_URI").ok(),
            },
            authorization: AuthorizationConfig {
                store: env::var("DQE_AUTHZ_STORE").ok(),
                host: env::var("DQE_AUTHZ_HOST").ok(),
                model: env::var("DQE_AUTHZ_MODEL").ok(),
            },
            tenancy: TenancyConfig {
                enabled: env::var("DQE_MULTI_TENANCY_ENABLED").ok().as_deref() == Some("true"),
                isolation: IsolationLevel::from_env(&env::var("DQE_TENANCY_ISOLATION").unwrap_or_default()),
            },
            lineage: LineageConfig {
                endpoint: env::var("DQE_LINEAGE_ENDPOINT").ok(),
                namespace: env::var("DQE_LINEAGE_NAMESPACE").ok(),
            },
            api_token: env::var("DQE_API_TOKEN").ok(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn split_bind(bind: &str) -> (String, u16) {
    match bind.rsplit_once(':') {
        Some((host, port)) => (host.to_owned(), port.parse().unwrap_or(8080)),
        None => (bind.to_owned(), 8080),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolation_level_defaults_to_namespace() {
        assert!(matches!(IsolationLevel::from_env("bogus"), IsolationLevel::Namespace));
        assert!(matches!(IsolationLevel::from_env(""), IsolationLevel::Namespace));
    }

    #[test]
    fn isolation_level_recognizes_schema_and_database() {
        assert!(matches!(IsolationLevel::from_env("schema"), IsolationLevel::Schema));
        assert!(matches!(IsolationLevel::from_env("database"), IsolationLevel::Database));
    }

    #[test]
    fn split_bind_parses_host_and_port() {
        assert_eq!(split_bind("0.0.0.0:9090"), ("0.0.0.0".to_owned(), 9090));
        assert_eq!(split_bind("localhost"), ("localhost".to_owned(), 8080));
    }
}
