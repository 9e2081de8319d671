//! Per-format schema-and-row-count inference shared by every object-storage
//! connector: Parquet, Avro, CSV, JSON, ORC.

use std::io::Cursor;

use crate::connector::ColumnInfo;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Parquet,
    Avro,
    Csv,
    Json,
    Orc,
}

impl FileFormat {
    pub fn from_key(key: &str) -> Option<Self> {
        let ext = key.rsplit('.').next()?.to_ascii_lowercase();
        match ext.as_str() {
            "parquet" => Some(Self::Parquet),
            "avro" => Some(Self::Avro),
            "csv" => Some(Self::Csv),
            "json" | "ndjson" | "jsonl" => Some(Self::Json),
            "orc" => Some(Self::Orc),
            _ => None,
        }
    }
}

pub struct Inferred {
    pub columns: Vec<ColumnInfo>,
    pub row_count: i64,
}

/// Infer schema and row count from a file's full bytes. Object-storage
/// tables are assumed small enough in a data-quality deployment to fetch
/// wholesale; a production system would stream/sample instead.
pub fn infer(format: FileFormat, bytes: &[u8]) -> Result<Inferred> {
    match format {
        FileFormat::Parquet => infer_parquet(bytes),
        FileFormat::Avro => infer_avro(bytes),
        FileFormat::Csv => infer_csv(bytes),
        FileFormat::Json => infer_json(bytes),
        FileFormat::Orc => Err(Error::Unsupported("ORC schema/row-count inference requires a native reader not in this build".to_owned())),
    }
}

fn infer_parquet(bytes: &[u8]) -> Result<Inferred> {
    use parquet::file::reader::{FileReader, SerializedFileReader};

    let reader = SerializedFileReader::new(bytes::Bytes::copy_from_slice(bytes)).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
    let metadata = reader.metadata();
    let schema = metadata.file_metadata().schema_descr();
    let columns = schema
        .columns()
        .iter()
        .map(|col| ColumnInfo {
            name: col.name().to_owned(),
            data_type: format!("{:?}", col.physical_type()),
            nullable: col.self_type().is_optional(),
            default: None,
            primary_key: false,
        })
        .collect();
    let row_count = metadata.file_metadata().num_rows();
    Ok(Inferred { columns, row_count })
}

fn infer_avro(bytes: &[u8]) -> Result<Inferred> {
    use apache_avro::Reader;

    let reader = Reader::new(Cursor::new(bytes)).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
    let schema = reader.writer_schema().clone();
    let columns = match schema {
        apache_avro::schema::Schema::Record(record) => record
            .fields
            .iter()
            .map(|f| ColumnInfo {
                name: f.name.clone(),
                data_type: format!("{:?}", f.schema),
                nullable: matches!(f.schema, apache_avro::schema::Schema::Union(_)),
                default: None,
                primary_key: false,
            })
            .collect(),
        _ => vec![],
    };
    let row_count = Reader::new(Cursor::new(bytes)).map_err(|e| Error::ConnectionFailed(e.to_string()))?.count() as i64;
    Ok(Inferred { columns, row_count })
}

fn infer_csv(bytes: &[u8]) -> Result<Inferred> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(Cursor::new(bytes));
    let headers = reader.headers().map_err(|e| Error::ConnectionFailed(e.to_string()))?.clone();
    let columns = headers
        .iter()
        .map(|name| ColumnInfo {
            name: name.to_owned(),
            data_type: "text".to_owned(),
            nullable: true,
            default: None,
            primary_key: false,
        })
        .collect();
    let row_count = reader.records().count() as i64;
    Ok(Inferred { columns, row_count })
}

fn infer_json(bytes: &[u8]) -> Result<Inferred> {
    let text = String::from_utf8_lossy(bytes);
    let mut columns: Vec<ColumnInfo> = Vec::new();
    let mut row_count = 0i64;
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line).map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        if columns.is_empty() {
            if let serde_json::Value::Object(map) = &value {
                columns = map
                    .keys()
                    .map(|k| ColumnInfo {
                        name: k.clone(),
                        data_type: "json".to_owned(),
                        nullable: true,
                        default: None,
                        primary_key: false,
                    })
                    .collect();
            }
        }
        row_count += 1;
    }
    Ok(Inferred { columns, row_count })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_key_recognizes_extensions() {
        assert_eq!(FileFormat::from_key("data/part-0.parquet"), Some(FileFormat::Parquet));
        assert_eq!(FileFormat::from_key("data.csv"), Some(FileFormat::Csv));
        assert_eq!(FileFormat::from_key("events.jsonl"), Some(FileFormat::Json));
        assert_eq!(FileFormat::from_key("readme.txt"), None);
    }

    #[test]
    fn infer_csv_counts_rows_and_headers() {
        let bytes = b"id,name\n1,a\n2,b\n3,c\n";
        let inferred = infer_csv(bytes).unwrap();
        assert_eq!(inferred.columns.len(), 2);
        assert_eq!(inferred.row_count, 3);
    }

    #[test]
    fn infer_json_counts_lines_and_keys() {
        let bytes = b"{\"id\": 1, \"name\": \"a\"}\n{\"id\": 2, \"name\": \"b\"}\n";
        let inferred = infer_json(bytes).unwrap();
        assert_eq!(inferred.columns.len(), 2);
        assert_eq!(inferred.row_count, 2);
    }
}
