//! Constructs a [`Connector`] for a [`DatasourceType`] from its raw
//! `connection` JSON bag (the dispatch rule). Used by `create_datasource`
//! before the registry calls `connect`/`ping`.

use std::sync::Arc;

use dqe_db::models::DatasourceType;
use serde_json::Value as Json;

use crate::connector::lakehouse::{delta::DeltaConnector, hdfs::HdfsConnector, hudi::HudiConnector, iceberg::IcebergConnector};
use crate::connector::object_store::{
    azure::AzureBlobConnector, gcs::GcsConnector, local::LocalFilesystemConnector, s3::S3Connector,
};
use crate::connector::sql::bigquery::BigqueryConnector;
use crate::connector::sql::clickhouse::ClickhouseConnector;
use crate::connector::sql::databricks::DatabricksConnector;
use crate::connector::sql::duckdb::DuckdbConnector;
use crate::connector::sql::mssql::MssqlConnector;
use crate::connector::sql::mysql::MysqlConnector;
use crate::connector::sql::oracle::OracleConnector;
use crate::connector::sql::postgres::PostgresConnector;
use crate::connector::sql::snowflake::SnowflakeConnector;
use crate::connector::sql::trino::TrinoConnector;
use crate::connector::Connector;
use crate::error::{Error, Result};

fn parse<T: serde::de::DeserializeOwned>(connection: &Json) -> Result<T> {
    serde_json::from_value(connection.clone()).map_err(|e| Error::Invalid(format!("invalid connection spec: {e}")))
}

/// Build (but do not connect) a connector for the given dialect. The
/// registry is responsible for calling `connect` then `ping` afterward and
/// aborting the datasource create on either failure.
pub fn build(datasource_type: DatasourceType, connection: &Json) -> Result<Arc<dyn Connector>> {
    Ok(match datasource_type {
        DatasourceType::Postgresql => Arc::new(PostgresConnector::new(parse(connection)?)),
        DatasourceType::Mysql => Arc::new(MysqlConnector::new(parse(connection)?)),
        DatasourceType::SqlServer => Arc::new(MssqlConnector::new(parse(connection)?)),
        DatasourceType::Oracle => Arc::new(OracleConnector::new(parse(connection)?)),
        DatasourceType::Snowflake => Arc::new(SnowflakeConnector::new(parse(connection)?)),
        DatasourceType::Databricks => Arc::new(DatabricksConnector::new(parse(connection)?)),
        DatasourceType::Bigquery => Arc::new(BigqueryConnector::new(parse(connection)?)),
        DatasourceType::Trino => Arc::new(TrinoConnector::new(parse(connection)?)),
        DatasourceType::Duckdb => Arc::new(DuckdbConnector::new(parse(connection)?)),
        DatasourceType::Clickhouse => Arc::new(ClickhouseConnector::new(parse(connection)?)),
        DatasourceType::Hdfs => Arc::new(HdfsConnector::new(parse(connection)?)),
        DatasourceType::DeltaLake => Arc::new(DeltaConnector::new(parse(connection)?)),
        DatasourceType::Iceberg => Arc::new(IcebergConnector::new(parse(connection)?)),
        DatasourceType::Hudi => Arc::new(HudiConnector::new(parse(connection)?)),
        DatasourceType::S3 => Arc::new(S3Connector::new(parse(connection)?)),
        DatasourceType::Gcs => Arc::new(GcsConnector::new(parse(connection)?)),
        DatasourceType::AzureBlob => Arc::new(AzureBlobConnector::new(parse(connection)?)),
        DatasourceType::LocalFilesystem => Arc::new(LocalFilesystemConnector::new(parse(connection)?)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_rejects_malformed_connection_spec() {
        let err = build(DatasourceType::Postgresql, &serde_json::json!({"host": 1})).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn build_accepts_well_formed_connection_spec() {
        let connection = serde_json::json!({
            "host": "localhost", "database": "d", "user": "u", "password": "p"
        });
        let connector = build(DatasourceType::Postgresql, &connection).unwrap();
        assert_eq!(connector.kind(), DatasourceType::Postgresql);
    }
}
