//! Secret overlay
//!
//! Secrets are named `ERDDAP_SECRET_<datasetID>_<attribute>`. They are
//! applied to a copy of the registry that only exists to be rendered; the
//! canonical registry never sees a secret value.

use std::collections::BTreeMap;

use crate::model::{Dataset, Registry};
use crate::value::{Block, Value};

/// Prefix shared by every secret key
pub const SECRET_PREFIX: &str = "ERDDAP_SECRET_";

/// Secret key -> value, ordered by key
pub type Secrets = BTreeMap<String, String>;

/// Which secrets were applied and which matched nothing.
///
/// Only keys are recorded; values never leave the rendered copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretReport {
    pub applied: Vec<String>,
    pub unmatched: Vec<String>,
}

impl SecretReport {
    pub fn is_clean(&self) -> bool {
        self.unmatched.is_empty()
    }
}

/// Collect prefixed secrets from `(key, value)` pairs such as `std::env::vars()`.
pub fn secrets_from_vars<I, K, V>(vars: I) -> Secrets
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    vars.into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .filter(|(key, _)| key.starts_with(SECRET_PREFIX))
        .collect()
}

/// Return a copy of `registry` with every matching secret applied.
///
/// `registry` itself is not modified. Keys that do not resolve to an existing
/// dataset attribute are reported as unmatched and otherwise ignored.
pub fn merge_secrets(registry: &Registry, secrets: &Secrets) -> (Registry, SecretReport) {
    let mut rendered = registry.clone();
    let mut report = SecretReport::default();

    for (key, value) in secrets {
        let applied = split_key(&rendered, key)
            .and_then(|(id, attribute)| {
                let dataset = rendered.dataset_mut(&id)?;
                apply(dataset, &attribute, value).then_some(())
            })
            .is_some();

        if applied {
            report.applied.push(key.clone());
        } else {
            tracing::warn!(secret = %key, "Secret does not match any dataset attribute");
            report.unmatched.push(key.clone());
        }
    }

    if !report.applied.is_empty() {
        tracing::info!(secrets = ?report.applied, "Applied secrets to rendered registry");
    }
    (rendered, report)
}

/// Split a secret key into dataset id and attribute name.
///
/// Dataset ids may themselves contain underscores, so the longest id that is
/// followed by `_` wins.
fn split_key(registry: &Registry, key: &str) -> Option<(String, String)> {
    let rest = key.strip_prefix(SECRET_PREFIX)?;
    registry
        .ids()
        .filter_map(|id| {
            let attribute = rest.strip_prefix(id)?.strip_prefix('_')?;
            (!attribute.is_empty()).then_some((id, attribute))
        })
        .max_by_key(|(id, _)| id.len())
        .map(|(id, attribute)| (id.to_string(), attribute.to_string()))
}

fn apply(dataset: &mut Dataset, attribute: &str, secret: &str) -> bool {
    if let Some(value) = dataset.attributes.get_mut(attribute) {
        *value = secret.to_string();
        return true;
    }

    if let Some(value) = dataset.fields.get_mut(attribute) {
        match value {
            Value::Text(_) | Value::Number(_) => {
                *value = Value::Text(secret.to_string());
                return true;
            }
            Value::Block(block) => {
                block.text = secret.to_string();
                return true;
            }
            Value::List(_) => return false,
        }
    }

    // Named entries, e.g. <connectionProperty name="password">
    let mut applied = false;
    for value in dataset.fields.values_mut() {
        match value {
            Value::Block(block) => applied |= set_named(block, attribute, secret),
            Value::List(blocks) => {
                for block in blocks {
                    applied |= set_named(block, attribute, secret);
                }
            }
            Value::Text(_) | Value::Number(_) => {}
        }
    }
    applied
}

fn set_named(block: &mut Block, name: &str, secret: &str) -> bool {
    if block.attribute("name") == Some(name) {
        block.text = secret.to_string();
        true
    } else {
        false
    }
}
