//! Choose the model identifier sent upstream.
//!
//! The rule is deliberately narrow: one configured pattern of identifiers the
//! upstream is known to reject (by default, `google/` namespaced models) is
//! swapped for a fallback. Everything else is passed through untouched.

use crate::core::config::ModelPolicy;
use crate::core::metrics::get_metrics;
use regex::Regex;

/// Outcome of model resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Identifier to submit upstream
    pub model: String,
    /// Identifier the client asked for, if any
    pub requested: Option<String>,
    /// Whether `requested` was replaced by the fallback
    pub substituted: bool,
}

#[derive(Debug, Clone)]
pub struct ModelResolver {
    default_model: String,
    fallback_model: String,
    deny_pattern: Regex,
}

impl ModelResolver {
    pub fn new(policy: &ModelPolicy) -> Self {
        Self {
            default_model: policy.default_model.clone(),
            fallback_model: policy.fallback_model.clone(),
            deny_pattern: policy.deny_pattern.clone(),
        }
    }

    /// Resolve a client-requested identifier.
    ///
    /// Blank identifiers count as absent.
    pub fn resolve(&self, requested: Option<&str>) -> ResolvedModel {
        let requested = requested.map(str::trim).filter(|m| !m.is_empty());

        match requested {
            None => ResolvedModel {
                model: self.default_model.clone(),
                requested: None,
                substituted: false,
            },
            Some(model) if self.deny_pattern.is_match(model) => {
                tracing::warn!(
                    requested = %model,
                    fallback = %self.fallback_model,
                    "Requested model is not supported by the upstream, substituting fallback"
                );
                get_metrics().model_substitutions_total.inc();
                ResolvedModel {
                    model: self.fallback_model.clone(),
                    requested: Some(model.to_string()),
                    substituted: true,
                }
            }
            Some(model) => ResolvedModel {
                model: model.to_string(),
                requested: Some(model.to_string()),
                substituted: false,
            },
        }
    }
}
