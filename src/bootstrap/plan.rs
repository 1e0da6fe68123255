//! The ordered configuration sequence applied to a fresh engine.

use std::fmt;

use crate::config::EngineConfig;

/// One configuration step. Credentials are bound only when a directive is
/// rendered, so a plan can be logged freely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Set { name: String, value: String },
    EnableExtension { name: String },
    CreateSecret { name: String, region: String, url_style: String },
    /// Register one view per `*.parquet` object under the prefix.
    DiscoverViews { prefix: String },
    CreateView { name: String, location: String },
    /// Asserts the internal endpoint is loopback, then runs `statement` if any.
    DisableAuth { statement: Option<String> },
    StartUi { port: u16 },
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Set { name, .. } => write!(f, "set {name}"),
            Directive::EnableExtension { name } => write!(f, "enable extension {name}"),
            Directive::CreateSecret { name, .. } => write!(f, "create secret {name}"),
            Directive::DiscoverViews { prefix } => write!(f, "discover views under {prefix}"),
            Directive::CreateView { name, .. } => write!(f, "create view {name}"),
            Directive::DisableAuth { .. } => f.write_str("disable ui auth"),
            Directive::StartUi { port } => write!(f, "start ui on port {port}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    directives: Vec<Directive>,
}

impl BootstrapPlan {
    pub fn from_config(engine: &EngineConfig, ui_port: u16) -> Self {
        let mut directives = Vec::new();

        let mut set = |name: &str, value: String| {
            directives.push(Directive::Set {
                name: name.to_string(),
                value,
            })
        };
        set("home_directory", engine.home_directory.clone());
        set("memory_limit", engine.memory_limit.clone());
        set("threads", engine.threads.to_string());
        set("temp_directory", engine.temp_directory.clone());
        set("max_temp_directory_size", engine.max_temp_directory_size.clone());
        set("preserve_insertion_order", "false".into());
        set("enable_http_metadata_cache", "false".into());
        set("enable_object_cache", "false".into());
        set("enable_external_file_cache", "false".into());
        set("streaming_buffer_size", "256KB".into());
        set("profiling_output", String::new());
        set("enable_logging", "true".into());
        set("logging_level", "debug".into());
        set("ui_polling_interval", "0".into());
        for (name, value) in &engine.settings {
            set(name, value.clone());
        }

        directives.extend(engine.extensions.iter().map(|name| Directive::EnableExtension {
            name: name.clone(),
        }));

        directives.push(Directive::CreateSecret {
            name: engine.secret_name.clone(),
            region: engine.region.clone(),
            url_style: engine.url_style.clone(),
        });

        if let Some(prefix) = &engine.view_prefix {
            directives.push(Directive::DiscoverViews {
                prefix: prefix.clone(),
            });
        }
        directives.extend(engine.views.iter().map(|view| Directive::CreateView {
            name: view.name.clone(),
            location: view.location.clone(),
        }));

        directives.push(Directive::DisableAuth {
            statement: engine.disable_auth_statement.clone(),
        });
        directives.push(Directive::StartUi { port: ui_port });

        Self { directives }
    }

    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;

    #[test]
    fn default_plan_order() {
        let plan = BootstrapPlan::from_config(&EngineConfig::default(), 4213);
        let d = plan.directives();

        assert!(matches!(&d[0], Directive::Set { name, .. } if name == "home_directory"));
        for (name, value) in [
            ("enable_external_file_cache", "false"),
            ("streaming_buffer_size", "256KB"),
            ("profiling_output", ""),
            ("enable_logging", "true"),
            ("logging_level", "debug"),
            ("ui_polling_interval", "0"),
        ] {
            assert!(
                d.contains(&Directive::Set {
                    name: name.into(),
                    value: value.into(),
                }),
                "missing setting {name}"
            );
        }
        let first_ext = d
            .iter()
            .position(|d| matches!(d, Directive::EnableExtension { .. }))
            .unwrap();
        let secret = d
            .iter()
            .position(|d| matches!(d, Directive::CreateSecret { .. }))
            .unwrap();
        let discover = d
            .iter()
            .position(|d| matches!(d, Directive::DiscoverViews { .. }))
            .unwrap();
        assert!(first_ext < secret && secret < discover);

        assert!(matches!(d[d.len() - 2], Directive::DisableAuth { statement: None }));
        assert_eq!(d[d.len() - 1], Directive::StartUi { port: 4213 });
    }

    #[test]
    fn extra_settings_and_views_included() {
        let mut engine = EngineConfig::default();
        engine.settings.insert("s3_uploader_thread_limit".into(), "2".into());
        engine.view_prefix = None;
        engine.views.push(ViewConfig {
            name: "orders".into(),
            location: "s3://garment/orders.parquet".into(),
        });

        let plan = BootstrapPlan::from_config(&engine, 4213);
        assert!(plan.directives().contains(&Directive::Set {
            name: "s3_uploader_thread_limit".into(),
            value: "2".into(),
        }));
        assert!(!plan
            .directives()
            .iter()
            .any(|d| matches!(d, Directive::DiscoverViews { .. })));
        assert!(plan.directives().contains(&Directive::CreateView {
            name: "orders".into(),
            location: "s3://garment/orders.parquet".into(),
        }));
    }
}
