//! Choosing which model generates a job's content.

use spindle_store::LlmSetting;

use crate::ProviderConfig;

/// Outcome of provider selection, tagged with the rule that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResolution {
    /// The job named its own provider and model.
    Explicit(ProviderConfig),
    /// The owner's default setting.
    AccountDefault(ProviderConfig),
    /// No default; the first active setting.
    FirstActive(ProviderConfig),
    Unresolved,
}

impl ProviderResolution {
    pub fn config(&self) -> Option<&ProviderConfig> {
        match self {
            ProviderResolution::Explicit(c)
            | ProviderResolution::AccountDefault(c)
            | ProviderResolution::FirstActive(c) => Some(c),
            ProviderResolution::Unresolved => None,
        }
    }

    pub fn into_config(self) -> Option<ProviderConfig> {
        match self {
            ProviderResolution::Explicit(c)
            | ProviderResolution::AccountDefault(c)
            | ProviderResolution::FirstActive(c) => Some(c),
            ProviderResolution::Unresolved => None,
        }
    }

    /// Short label for logs.
    pub fn source(&self) -> &'static str {
        match self {
            ProviderResolution::Explicit(_) => "explicit",
            ProviderResolution::AccountDefault(_) => "account_default",
            ProviderResolution::FirstActive(_) => "first_active",
            ProviderResolution::Unresolved => "unresolved",
        }
    }
}

/// Pick the model for a job owned by the user whose `settings` are given.
///
/// Rules, first match wins:
/// 1. both `provider` and `model_id` set on the job; credentials come from a
///    stored setting with the same provider and model, else the same provider
/// 2. the owner's active default setting
/// 3. the owner's first active setting
///
/// Utility rows are never chosen by rules 2 and 3.
pub fn resolve_setting(
    provider: Option<&str>,
    model_id: Option<&str>,
    settings: &[LlmSetting],
) -> ProviderResolution {
    let usable = || settings.iter().filter(|s| s.is_active && !s.is_utility());

    if let (Some(provider), Some(model_id)) = (nonblank(provider), nonblank(model_id)) {
        let stored = settings
            .iter()
            .find(|s| s.provider == provider && s.model_id == model_id)
            .or_else(|| {
                settings
                    .iter()
                    .find(|s| s.provider == provider && s.api_key.is_some())
            });

        return ProviderResolution::Explicit(ProviderConfig {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            api_key: stored.and_then(|s| s.api_key.clone()),
            base_url: stored.and_then(|s| s.base_url.clone()),
        });
    }

    if let Some(default) = usable().find(|s| s.is_default) {
        return ProviderResolution::AccountDefault(default.into());
    }

    match usable().next() {
        Some(first) => ProviderResolution::FirstActive(first.into()),
        None => ProviderResolution::Unresolved,
    }
}

fn nonblank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
