use std::env;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) ansi: bool,
    /// Warnings captured during config parsing so they can be logged after tracing is initialized.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    fn from_lookup<F>(component: &str, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = lookup("SERVICE_NAME")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = lookup("STAGE")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let ansi = match lookup("LOG_ANSI") {
            Some(raw) if !raw.trim().is_empty() => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "LOG_ANSI is invalid (value: {raw}); keeping colored output"
                ));
                true
            }),
            _ => true,
        };

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            ansi,
            warnings,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_component_and_unknown_stage() {
        let config = ObservabilityConfig::from_lookup(" rental-billing ", |_| None);
        assert_eq!(config.service_context.service_name, "rental-billing");
        assert_eq!(config.service_context.environment, "unknown");
        assert!(config.ansi);
        assert!(config.warnings.is_empty());
    }

    #[test]
    fn invalid_ansi_flag_is_a_warning_not_an_error() {
        let config = ObservabilityConfig::from_lookup("rental-billing", |key| {
            (key == "LOG_ANSI").then(|| "sometimes".to_string())
        });
        assert!(config.ansi);
        assert_eq!(config.warnings.len(), 1);

        let config = ObservabilityConfig::from_lookup("rental-billing", |key| {
            (key == "LOG_ANSI").then(|| "off".to_string())
        });
        assert!(!config.ansi);
    }
}
