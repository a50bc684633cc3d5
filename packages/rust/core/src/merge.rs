//! Injects a parent pipeline's SCM and action bindings into discovered
//! manifests.

use std::collections::BTreeMap;

use autobump_shared::{ActionConfig, GroupBy, ScmConfig, Spec};
use tracing::warn;

/// Title used when neither the action nor the parent pipeline has one.
pub const DEFAULT_ACTION_TITLE: &str = "deps: bumping various version";

/// Parent-side inputs to [`merge_parent_config`], captured once per parent.
#[derive(Debug, Clone, Default)]
pub struct ParentContext {
    pub name: String,
    pub pipeline_id: String,
    pub groupby: GroupBy,
    /// `autodiscovery.scmid`; also the key the action is stored under.
    pub scmid: String,
    /// Effective `autodiscovery.actionid` after migration.
    pub actionid: String,
    pub scms: BTreeMap<String, ScmConfig>,
    /// Resolved action, `None` when `actionid` is unset or unknown.
    pub action: Option<ActionConfig>,
}

/// Populate `spec` from `parent` before instantiation.
///
/// SCMs and the action are cloned; the child never aliases parent state.
pub fn merge_parent_config(spec: &mut Spec, parent: &ParentContext, engine_version: &str) {
    spec.scms = parent.scms.clone();

    if let Some(action) = &parent.action {
        let mut action = action.clone();

        if parent.groupby == GroupBy::All && action.title.is_empty() {
            action.title = if parent.name.is_empty() {
                warn!(
                    action = %parent.actionid,
                    "action has no title and its pipeline has no name, using {DEFAULT_ACTION_TITLE:?}"
                );
                DEFAULT_ACTION_TITLE.to_string()
            } else {
                parent.name.clone()
            };
        }

        spec.actions = BTreeMap::from([(parent.scmid.clone(), action)]);
    }

    if !spec.version.is_empty() {
        spec.version = engine_version.to_string();
    }
}
