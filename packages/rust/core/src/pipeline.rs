//! Runnable pipelines and their reports.
//!
//! [`Pipeline::init`] is the single construction path for hand-authored and
//! discovered manifests: it validates references between stages, SCMs, and
//! actions and either returns a complete pipeline or an error.

use std::collections::BTreeMap;

use autobump_shared::{ActionConfig, AutobumpError, PipelineConfig, ResourceConfig, Result, Spec};
use serde::Serialize;

use crate::identity;
use crate::scm::Scm;

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Outcome recorded on a pipeline after a discovery or execution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReportResult {
    #[default]
    Unset,
    Success,
    Failure,
}

impl std::fmt::Display for ReportResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unset => "-",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        };
        f.write_str(s)
    }
}

/// Mutable report attached to every pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub name: String,
    pub pipeline_id: String,
    pub result: ReportResult,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A validated, runnable pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Identity shared by every run of this pipeline.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resolved configuration (defaults applied).
    pub config: PipelineConfig,
    /// SCM handles keyed by SCM id.
    pub scms: BTreeMap<String, Scm>,
    /// Action configurations keyed by action id.
    pub actions: BTreeMap<String, ActionConfig>,
    pub report: Report,
}

impl Pipeline {
    /// Validate `config` and build a pipeline from it.
    pub fn init(mut config: PipelineConfig) -> Result<Self> {
        let spec = &mut config.spec;

        if spec.pipeline_id.is_empty() {
            spec.pipeline_id = identity::hex_digest(&spec.name);
        }

        let mut scms = BTreeMap::new();
        for (id, scm_config) in &spec.scms {
            scms.insert(id.clone(), Scm::new(id, scm_config.clone())?);
        }

        for (id, action) in &spec.actions {
            if action.kind.is_empty() {
                return Err(AutobumpError::validation(format!("action {id:?}: missing kind")));
            }
            check_scm_reference("action", id, &action.scmid, spec)?;
        }

        for (id, source) in &spec.sources {
            check_resource("source", id, source, spec)?;
        }

        let single_source = match spec.sources.keys().collect::<Vec<_>>().as_slice() {
            [only] => Some((*only).clone()),
            _ => None,
        };
        let source_ids: Vec<String> = spec.sources.keys().cloned().collect();

        for (stage, resources) in [
            ("condition", &mut spec.conditions),
            ("target", &mut spec.targets),
        ] {
            for (id, resource) in resources.iter_mut() {
                if resource.sourceid.is_empty() {
                    match &single_source {
                        Some(only) => resource.sourceid = only.clone(),
                        None => {
                            return Err(AutobumpError::validation(format!(
                                "{stage} {id:?}: sourceid is required when the pipeline declares {} sources",
                                source_ids.len()
                            )));
                        }
                    }
                } else if !source_ids.contains(&resource.sourceid) {
                    return Err(AutobumpError::validation(format!(
                        "{stage} {id:?}: source {:?} not declared",
                        resource.sourceid
                    )));
                }
            }
        }

        for (stage, resources) in [("condition", &spec.conditions), ("target", &spec.targets)] {
            for (id, resource) in resources {
                check_resource(stage, id, resource, spec)?;
            }
        }

        let id = spec.pipeline_id.clone();
        let name = spec.name.clone();
        let actions = spec.actions.clone();

        Ok(Self {
            report: Report {
                name: name.clone(),
                pipeline_id: id.clone(),
                result: ReportResult::Unset,
            },
            id,
            name,
            config,
            scms,
            actions,
        })
    }
}

fn check_resource(stage: &str, id: &str, resource: &ResourceConfig, spec: &Spec) -> Result<()> {
    if resource.kind.is_empty() {
        return Err(AutobumpError::validation(format!("{stage} {id:?}: missing kind")));
    }
    check_scm_reference(stage, id, &resource.scmid, spec)
}

fn check_scm_reference(stage: &str, id: &str, scmid: &str, spec: &Spec) -> Result<()> {
    if !scmid.is_empty() && !spec.scms.contains_key(scmid) {
        return Err(AutobumpError::validation(format!(
            "{stage} {id:?}: scm {scmid:?} not declared"
        )));
    }
    Ok(())
}
