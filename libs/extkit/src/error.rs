use thiserror::Error;

use crate::options::OptionError;

/// Structured errors for the configuration engine.
///
/// Every variant produced while running user callbacks names the offending
/// bundle, installer, extension, module or hook, so startup failures never
/// surface as an anonymous cause.
#[derive(Debug, Error)]
pub enum ExtkitError {
    #[error(transparent)]
    Option(#[from] OptionError),

    // Programming errors in bundles or in the host integration
    #[error("illegal configuration state: {0}")]
    IllegalConfigurationState(String),
    #[error("bundles registration loop detected: {}", path.join(" -> "))]
    BundleCycle { path: Vec<String> },

    // Pipeline errors
    #[error("no installers configured: extensions can't be recognized without at least one installer")]
    NoInstallersConfigured,
    #[error("installer '{installer}' failed to install extension '{extension}'")]
    InstallationFailure {
        installer: String,
        extension: String,
        #[source]
        source: anyhow::Error,
    },

    // Phase errors with item context
    #[error("bundle '{bundle}' failed during {phase}")]
    BundleInitialization {
        bundle: String,
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("module '{module}' failed to configure bindings")]
    ModuleConfiguration {
        module: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("configuration hook '{hook}' failed")]
    HookFailure {
        hook: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("extension '{extension}' could not be resolved from the injector")]
    ExtensionResolution {
        extension: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("injector creation failed")]
    InjectorCreation(#[source] anyhow::Error),
}

impl ExtkitError {
    pub(crate) fn illegal_state(msg: impl Into<String>) -> Self {
        Self::IllegalConfigurationState(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_renders_path() {
        let err = ExtkitError::BundleCycle {
            path: vec!["a::A".into(), "a::B".into(), "a::A".into()],
        };
        assert_eq!(
            err.to_string(),
            "bundles registration loop detected: a::A -> a::B -> a::A"
        );
    }

    #[test]
    fn installation_failure_keeps_cause() {
        let err = ExtkitError::InstallationFailure {
            installer: "inst::Managed".into(),
            extension: "app::Foo".into(),
            source: anyhow::anyhow!("boom"),
        };
        let msg = err.to_string();
        assert!(msg.contains("inst::Managed"));
        assert!(msg.contains("app::Foo"));
        let source = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
    }
}
