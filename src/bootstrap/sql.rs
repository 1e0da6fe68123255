//! Statement rendering for the engine's SQL dialect.
//!
//! Every statement is rendered on a single line; the control channel is
//! line oriented.

use crate::config::Credentials;

/// Quote a string literal, doubling embedded single quotes.
pub fn literal(value: &str) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    format!("'{}'", flat.replace('\'', "''"))
}

/// Quote an identifier, doubling embedded double quotes.
pub fn identifier(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// `SET name = value;`. Numeric and boolean values are emitted bare.
pub fn set(name: &str, value: &str) -> String {
    let bare = value.parse::<i64>().is_ok() || matches!(value, "true" | "false");
    if bare {
        format!("SET {name} = {value};")
    } else {
        format!("SET {name} = {};", literal(value))
    }
}

/// Plain extension names are emitted bare; anything else as a string literal.
pub fn install_and_load(extension: &str) -> String {
    let plain = !extension.is_empty()
        && extension.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let ext = if plain {
        extension.to_string()
    } else {
        literal(extension)
    };
    format!("INSTALL {ext}; LOAD {ext};")
}

/// A temporary (in-memory) S3 secret. Never written to the secrets directory.
pub fn create_secret(name: &str, region: &str, url_style: &str, credentials: &Credentials) -> String {
    format!(
        "CREATE OR REPLACE TEMPORARY SECRET {} (TYPE s3, PROVIDER config, KEY_ID {}, SECRET {}, ENDPOINT {}, REGION {}, URL_STYLE {}, USE_SSL {});",
        identifier(name),
        literal(credentials.access_key.expose()),
        literal(credentials.secret_key.expose()),
        literal(&credentials.endpoint),
        literal(region),
        literal(url_style),
        credentials.use_tls,
    )
}

pub fn glob_parquet(bucket: &str, prefix: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let pattern = if prefix.is_empty() {
        format!("s3://{bucket}/*.parquet")
    } else {
        format!("s3://{bucket}/{prefix}/*.parquet")
    };
    format!("SELECT file FROM glob({});", literal(&pattern))
}

pub fn create_view(name: &str, location: &str) -> String {
    format!(
        "CREATE OR REPLACE VIEW {} AS SELECT * FROM read_parquet({});",
        identifier(name),
        literal(location)
    )
}

pub fn start_ui(port: u16) -> String {
    format!("SET ui_local_port = {port}; CALL start_ui_server();")
}

/// Undo CSV quoting of a single-column row.
pub fn unquote_csv(field: &str) -> String {
    let field = field.trim();
    match field.strip_prefix('"').and_then(|f| f.strip_suffix('"')) {
        Some(inner) => inner.replace("\"\"", "\""),
        None => field.to_string(),
    }
}

/// View name for a discovered object: its file stem.
pub fn view_name_for(location: &str) -> Option<String> {
    let file = location.rsplit('/').next()?;
    let stem = file.strip_suffix(".parquet").unwrap_or(file);
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
