//! Bootstrap configurator.
//!
//! # Data Flow
//! ```text
//! EngineConfig + ui port
//!     → plan.rs (ordered directives, no secrets)
//!     → sql.rs (render with credentials bound)
//!     → control.rs (marker-acknowledged statements over stdin/stdout)
//! ```
//!
//! # Design Decisions
//! - Credentials are checked before the first statement is sent
//! - Every statement is `SET`, `INSTALL`/`LOAD` or `CREATE OR REPLACE`,
//!   so re-running the plan on a fresh engine converges to the same state
//! - Any failed directive aborts the plan; the caller restarts from scratch
//! - Auth is only ever disabled behind a loopback-only internal endpoint

pub mod control;
pub mod plan;
pub mod sql;

use thiserror::Error;

use crate::config::{Credentials, MissingConfiguration};
use crate::net::ServiceEndpoint;

pub use control::{ControlError, EngineControl, LineControl, ParkedControl};
pub use plan::{BootstrapPlan, Directive};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    MissingConfiguration(#[from] MissingConfiguration),

    #[error("bootstrap directive `{directive}` failed: {source}")]
    Directive {
        directive: String,
        #[source]
        source: ControlError,
    },

    #[error("refusing to disable UI auth: internal endpoint {endpoint} is not loopback-only")]
    UnsafeAuthDisable { endpoint: String },
}

impl BootstrapError {
    /// Whether relaunching the engine could help.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BootstrapError::Directive { .. })
    }
}

/// What a successful bootstrap left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub extensions: Vec<String>,
    pub views: Vec<String>,
    pub ui_port: Option<u16>,
}

/// Apply `plan` in order.
pub async fn apply_bootstrap<C>(
    plan: &BootstrapPlan,
    credentials: &Credentials,
    internal: &ServiceEndpoint,
    control: &mut C,
) -> Result<BootstrapReport, BootstrapError>
where
    C: EngineControl + ?Sized,
{
    credentials.validate()?;

    let mut report = BootstrapReport::default();
    for directive in plan.directives() {
        tracing::debug!(directive = %directive, "Applying");
        apply_directive(directive, credentials, internal, control, &mut report).await?;
    }

    tracing::info!(
        extensions = report.extensions.len(),
        views = report.views.len(),
        ui_port = ?report.ui_port,
        "Bootstrap applied"
    );
    Ok(report)
}

async fn apply_directive<C>(
    directive: &Directive,
    credentials: &Credentials,
    internal: &ServiceEndpoint,
    control: &mut C,
    report: &mut BootstrapReport,
) -> Result<(), BootstrapError>
where
    C: EngineControl + ?Sized,
{
    let failed = |source| BootstrapError::Directive {
        directive: directive.to_string(),
        source,
    };

    match directive {
        Directive::Set { name, value } => {
            control.execute(&sql::set(name, value)).await.map_err(failed)?;
        }
        Directive::EnableExtension { name } => {
            control
                .execute(&sql::install_and_load(name))
                .await
                .map_err(failed)?;
            report.extensions.push(name.clone());
        }
        Directive::CreateSecret {
            name,
            region,
            url_style,
        } => {
            let statement = sql::create_secret(name, region, url_style, credentials);
            control.execute(&statement).await.map_err(failed)?;
        }
        Directive::DiscoverViews { prefix } => {
            let rows = control
                .execute(&sql::glob_parquet(&credentials.bucket, prefix))
                .await
                .map_err(failed)?;
            for location in rows.iter().map(|row| sql::unquote_csv(row)) {
                let Some(name) = sql::view_name_for(&location) else {
                    continue;
                };
                control
                    .execute(&sql::create_view(&name, &location))
                    .await
                    .map_err(failed)?;
                report.views.push(name);
            }
        }
        Directive::CreateView { name, location } => {
            control
                .execute(&sql::create_view(name, location))
                .await
                .map_err(failed)?;
            report.views.push(name.clone());
        }
        Directive::DisableAuth { statement } => {
            if !internal.is_loopback() {
                return Err(BootstrapError::UnsafeAuthDisable {
                    endpoint: internal.to_string(),
                });
            }
            if let Some(statement) = statement {
                control.execute(statement).await.map_err(failed)?;
            }
        }
        Directive::StartUi { port } => {
            control.execute(&sql::start_ui(*port)).await.map_err(failed)?;
            report.ui_port = Some(*port);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, Secret};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, BTreeSet};

    /// Models the engine state the plan produces.
    #[derive(Default)]
    struct FakeEngine {
        calls: usize,
        settings: BTreeMap<String, String>,
        loaded: BTreeSet<String>,
        views: BTreeSet<String>,
        objects: Vec<String>,
        fail_containing: Option<&'static str>,
    }

    #[async_trait]
    impl EngineControl for FakeEngine {
        async fn execute(&mut self, statement: &str) -> Result<Vec<String>, ControlError> {
            self.calls += 1;
            if self.fail_containing.is_some_and(|f| statement.contains(f)) {
                return Err(ControlError::Closed);
            }
            if let Some(rest) = statement.strip_prefix("SET ") {
                if let Some((name, value)) = rest.trim_end_matches(';').split_once(" = ") {
                    self.settings.insert(name.to_string(), value.to_string());
                }
            } else if let Some(rest) = statement.strip_prefix("INSTALL ") {
                if let Some((name, _)) = rest.split_once(';') {
                    self.loaded.insert(name.to_string());
                }
            } else if let Some(rest) = statement.strip_prefix("CREATE OR REPLACE VIEW ") {
                if let Some((name, _)) = rest.split_once(" AS ") {
                    self.views.insert(name.to_string());
                }
            } else if statement.starts_with("SELECT file FROM glob(") {
                return Ok(self.objects.clone());
            }
            Ok(Vec::new())
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            endpoint: "minio:9000".into(),
            access_key: Secret::new("user"),
            secret_key: Secret::new("pass"),
            use_tls: true,
            bucket: "garment".into(),
        }
    }

    fn loopback() -> ServiceEndpoint {
        ServiceEndpoint::internal("localhost", 4213)
    }

    fn engine_with_objects() -> FakeEngine {
        FakeEngine {
            objects: vec![
                "s3://garment/db_zstd/orders.parquet".into(),
                "\"s3://garment/db_zstd/items.parquet\"".into(),
            ],
            ..FakeEngine::default()
        }
    }

    #[tokio::test]
    async fn applying_twice_converges() {
        let plan = BootstrapPlan::from_config(&EngineConfig::default(), 4213);
        let mut once = engine_with_objects();
        let mut twice = engine_with_objects();

        let report = apply_bootstrap(&plan, &credentials(), &loopback(), &mut once)
            .await
            .unwrap();
        apply_bootstrap(&plan, &credentials(), &loopback(), &mut twice)
            .await
            .unwrap();
        apply_bootstrap(&plan, &credentials(), &loopback(), &mut twice)
            .await
            .unwrap();

        assert_eq!(once.settings, twice.settings);
        assert_eq!(once.loaded, twice.loaded);
        assert_eq!(once.views, twice.views);
        assert_eq!(report.views, vec!["orders".to_string(), "items".to_string()]);
        assert_eq!(report.extensions, vec!["httpfs", "aws", "ui"]);
        assert_eq!(report.ui_port, Some(4213));
    }

    #[tokio::test]
    async fn missing_credential_sends_nothing() {
        let plan = BootstrapPlan::from_config(&EngineConfig::default(), 4213);
        for field in 0..4 {
            let mut creds = credentials();
            match field {
                0 => creds.endpoint.clear(),
                1 => creds.access_key = Secret::default(),
                2 => creds.secret_key = Secret::default(),
                _ => creds.bucket.clear(),
            }
            let mut engine = FakeEngine::default();
            let err = apply_bootstrap(&plan, &creds, &loopback(), &mut engine)
                .await
                .unwrap_err();
            assert!(matches!(err, BootstrapError::MissingConfiguration(_)));
            assert_eq!(engine.calls, 0);
        }
    }

    #[tokio::test]
    async fn failed_directive_aborts_the_rest() {
        let plan = BootstrapPlan::from_config(&EngineConfig::default(), 4213);
        let mut engine = FakeEngine {
            fail_containing: Some("INSTALL aws"),
            ..FakeEngine::default()
        };

        let err = apply_bootstrap(&plan, &credentials(), &loopback(), &mut engine)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("enable extension aws"));
        assert!(!engine.loaded.contains("aws"));
        assert!(engine.views.is_empty());
    }

    #[tokio::test]
    async fn auth_stays_on_for_non_loopback_endpoint() {
        let mut engine_config = EngineConfig::default();
        engine_config.view_prefix = None;
        let plan = BootstrapPlan::from_config(&engine_config, 4213);
        let exposed = ServiceEndpoint::internal("0.0.0.0", 4213);
        let mut engine = FakeEngine::default();

        let err = apply_bootstrap(&plan, &credentials(), &exposed, &mut engine)
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::UnsafeAuthDisable { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn secret_never_in_error_text() {
        let plan = BootstrapPlan::from_config(&EngineConfig::default(), 4213);
        let mut engine = FakeEngine {
            fail_containing: Some("SECRET"),
            ..FakeEngine::default()
        };

        let err = apply_bootstrap(&plan, &credentials(), &loopback(), &mut engine)
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("pass"));
    }
}
