//! Autodiscovery: turns each parent pipeline's crawler findings into new
//! pipelines.
//!
//! Parents are visited one at a time and their discovered manifests are
//! processed in discovery order. Only the crawler run leaves the async task;
//! grouping, hashing, and merging are synchronous.

use std::collections::BTreeMap;

use autobump_shared::{
    AutobumpError, AutodiscoverySpec, CrawlerSpec, DiscoveryOptions, PipelineConfig, Result, Spec,
};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::Engine;
use crate::identity;
use crate::merge::{ParentContext, merge_parent_config};
use crate::pipeline::ReportResult;

/// Display name of the implicit pipeline scanning the working directory.
pub const LOCAL_AUTODISCOVERY_NAME: &str = "Local AutoDiscovery";

impl Engine {
    /// Run autodiscovery over every pipeline currently loaded.
    ///
    /// Crawler failures, malformed discovered manifests, and conflicting
    /// autodiscovery settings abort the whole pass. A discovered manifest
    /// that fails to instantiate only marks its parent as failed.
    #[instrument(skip_all, fields(experimental = options.experimental))]
    pub async fn load_autodiscovery(&mut self, options: &DiscoveryOptions) -> Result<()> {
        if options.local_autodiscovery {
            debug!(crawlers = ?options.local_crawlers, "local autodiscovery enabled");
            if let Err(e) = self.push(local_autodiscovery_config(&options.local_crawlers)) {
                error!(error = %e, "failed to create the local autodiscovery pipeline");
            }
        }

        info!("Auto Discovery");

        // Pipelines appended below are never visited in this pass.
        let parent_count = self.pipelines.len();

        for id in 0..parent_count {
            let has_crawlers = self.pipelines[id]
                .config
                .spec
                .autodiscovery
                .as_ref()
                .is_some_and(|spec| spec.crawlers.is_some());
            if !has_crawlers {
                continue;
            }

            if !options.experimental {
                warn!(
                    "autodiscovery is experimental and requires the experimental flag, such as `autobump manifest show --experimental`"
                );
                return Ok(());
            }

            self.discover(id, options).await?;
        }

        Ok(())
    }

    #[instrument(skip_all, fields(parent = id))]
    async fn discover(&mut self, id: usize, options: &DiscoveryOptions) -> Result<()> {
        info!("{}", self.pipelines[id].name);

        let migrated = match self.pipelines[id].config.spec.autodiscovery.as_mut() {
            Some(spec) => migrate_pullrequest_id(spec),
            None => return Ok(()),
        };
        if let Err(e) = migrated {
            return Err(self.fail(id, e));
        }

        let parent = &self.pipelines[id];
        let Some(autodiscovery) = parent.config.spec.autodiscovery.clone() else {
            return Ok(());
        };

        let mut workdir = options.resolve_workdir()?;
        if !autodiscovery.scmid.is_empty() {
            match parent.scms.get(&autodiscovery.scmid) {
                Some(scm) => {
                    workdir = scm.directory().to_path_buf();
                    if !workdir.is_dir() {
                        warn!(
                            scmid = %autodiscovery.scmid,
                            directory = %workdir.display(),
                            "scm working copy not found, check the repository out there or set `spec.directory`"
                        );
                    }
                }
                None => warn!(
                    scmid = %autodiscovery.scmid,
                    "autodiscovery scm not declared, scanning {}",
                    workdir.display()
                ),
            }
        }

        let action = if autodiscovery.actionid.is_empty() {
            None
        } else {
            let found = parent.actions.get(&autodiscovery.actionid).cloned();
            if found.is_none() {
                warn!(actionid = %autodiscovery.actionid, "autodiscovery action not declared, no action attached");
            }
            found
        };

        let context = ParentContext {
            name: parent.name.clone(),
            pipeline_id: parent.config.spec.pipeline_id.clone(),
            groupby: autodiscovery.groupby,
            scmid: autodiscovery.scmid.clone(),
            actionid: autodiscovery.actionid.clone(),
            scms: parent
                .scms
                .iter()
                .map(|(scmid, scm)| (scmid.clone(), scm.config.clone()))
                .collect(),
            action,
        };

        debug!(workdir = %workdir.display(), groupby = %context.groupby, "running crawlers");

        let runner = match self.runners.build(&autodiscovery, &workdir) {
            Ok(runner) => runner,
            Err(e) => return Err(self.fail(id, e)),
        };
        let manifests = match tokio::task::spawn_blocking(move || runner.run()).await {
            Ok(Ok(manifests)) => manifests,
            Ok(Err(e)) => return Err(self.fail(id, e)),
            Err(e) => return Err(self.fail(id, AutobumpError::Task(e.to_string()))),
        };

        if manifests.is_empty() {
            info!("nothing detected");
        }

        let mut errors = Vec::new();
        for raw in &manifests {
            let mut spec: Spec = match serde_yaml::from_slice(raw) {
                Ok(spec) => spec,
                Err(e) => {
                    let e = AutobumpError::parse(format!("invalid discovered manifest: {e}"));
                    return Err(self.fail(id, e));
                }
            };

            spec.pipeline_id =
                identity::child_pipeline_id(context.groupby, &context.pipeline_id, &spec.name);
            merge_parent_config(&mut spec, &context, crate::VERSION);

            match self.instantiate(spec) {
                Ok(index) => debug!(pipeline = %self.pipelines[index].id, "pipeline generated"),
                Err(e) => errors.push(e),
            }

            if !errors.is_empty() {
                self.pipelines[id].report.result = ReportResult::Failure;
                error!("error(s) happened while generating pipeline manifests");
                for e in &errors {
                    error!("{e}");
                }
            }
        }

        let report = &mut self.pipelines[id].report;
        if report.result != ReportResult::Failure {
            report.result = ReportResult::Success;
        }
        info!(
            result = %report.result,
            discovered = manifests.len(),
            failed = errors.len(),
            "autodiscovery finished"
        );

        Ok(())
    }

    /// Mark the parent at `id` as failed and hand `e` back for propagation.
    fn fail(&mut self, id: usize, e: AutobumpError) -> AutobumpError {
        self.pipelines[id].report.result = ReportResult::Failure;
        error!(pipeline = %self.pipelines[id].name, error = %e, "autodiscovery failed");
        e
    }
}

/// Move the deprecated `pullrequestid` into `actionid`.
fn migrate_pullrequest_id(spec: &mut AutodiscoverySpec) -> Result<()> {
    if spec.pullrequestid.is_empty() {
        return Ok(());
    }

    if !spec.actionid.is_empty() {
        return Err(AutobumpError::config(
            "`autodiscovery.pullrequestid` and `autodiscovery.actionid` are mutually exclusive, \
             use only `autodiscovery.actionid` as `autodiscovery.pullrequestid` is deprecated",
        ));
    }

    warn!(
        pullrequestid = %spec.pullrequestid,
        "`autodiscovery.pullrequestid` is deprecated in favor of `autodiscovery.actionid`, please update this manifest"
    );
    spec.actionid = std::mem::take(&mut spec.pullrequestid);
    Ok(())
}

fn local_autodiscovery_config(crawlers: &[String]) -> PipelineConfig {
    let crawlers: BTreeMap<String, CrawlerSpec> = crawlers
        .iter()
        .map(|kind| (kind.clone(), CrawlerSpec::default()))
        .collect();

    PipelineConfig::new(Spec {
        name: LOCAL_AUTODISCOVERY_NAME.to_string(),
        autodiscovery: Some(AutodiscoverySpec {
            crawlers: Some(crawlers),
            ..AutodiscoverySpec::default()
        }),
        ..Spec::default()
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use autobump_crawler::ManifestRunner;
    use tracing_subscriber::fmt::MakeWriter;

    use super::*;
    use crate::engine::{CrawlerRunnerFactory, RunnerFactory};

    /// Log sink collecting formatted events for assertions.
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Capture WARN and above on the current thread until the guard drops.
    fn capture_warnings() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();
        (logs, tracing::subscriber::set_default(subscriber))
    }

    #[derive(Debug, Clone)]
    enum Canned {
        Manifests(Vec<String>),
        BuildError,
        RunError,
    }

    struct FakeRunner(Canned);

    impl ManifestRunner for FakeRunner {
        fn run(&self) -> Result<Vec<Vec<u8>>> {
            match &self.0 {
                Canned::Manifests(manifests) => {
                    Ok(manifests.iter().map(|m| m.clone().into_bytes()).collect())
                }
                _ => Err(AutobumpError::crawler("crawler exploded")),
            }
        }
    }

    struct FakeFactory {
        canned: Canned,
        workdirs: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl RunnerFactory for FakeFactory {
        fn build(&self, _spec: &AutodiscoverySpec, workdir: &Path) -> Result<Box<dyn ManifestRunner>> {
            self.workdirs.lock().unwrap().push(workdir.to_path_buf());
            match &self.canned {
                Canned::BuildError => Err(AutobumpError::crawler("unknown crawler")),
                other => Ok(Box::new(FakeRunner(other.clone()))),
            }
        }
    }

    const PARENT: &str = r#"
name: MyApp
pipelineid: local
scms:
  gh:
    kind: github
    spec: { owner: acme, repository: app }
  gl:
    kind: gitlab
    spec: { owner: acme, repository: lib }
actions:
  pr:
    kind: github/pullrequest
    scmid: gh
autodiscovery:
  scmid: gh
  actionid: pr
  crawlers:
    dockerfile: {}
"#;

    fn child(name: &str) -> String {
        format!(
            "name: {name}\nversion: 0.0.1\nsources:\n  image: {{ kind: dockerimage }}\ntargets:\n  dockerfile: {{ kind: dockerfile, scmid: gh }}\n"
        )
    }

    fn broken_child(name: &str) -> String {
        format!(
            "name: {name}\nsources:\n  image: {{ kind: dockerimage }}\ntargets:\n  dockerfile: {{ kind: dockerfile, scmid: missing }}\n"
        )
    }

    fn engine_with(parents: &[&str], canned: Canned) -> (Engine, Arc<Mutex<Vec<PathBuf>>>) {
        let workdirs = Arc::new(Mutex::new(Vec::new()));
        let mut engine = Engine::with_runner_factory(FakeFactory {
            canned,
            workdirs: Arc::clone(&workdirs),
        });
        for parent in parents {
            let spec: Spec = serde_yaml::from_str(parent).unwrap();
            engine.push(PipelineConfig::new(spec)).unwrap();
        }
        (engine, workdirs)
    }

    fn options(workdir: &Path) -> DiscoveryOptions {
        DiscoveryOptions {
            experimental: true,
            local_autodiscovery: false,
            local_crawlers: Vec::new(),
            workdir: Some(workdir.to_path_buf()),
        }
    }

    fn individual(parent: &str) -> String {
        parent.replace("  actionid: pr\n", "  actionid: pr\n  groupby: individual\n")
    }

    #[tokio::test]
    async fn individual_ids_are_stable_and_distinct() {
        let canned = Canned::Manifests(vec![child("service-a"), child("service-b")]);
        let parent = individual(PARENT);
        let (mut engine, _) = engine_with(&[parent.as_str()], canned);

        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        let pipelines = engine.pipelines();
        assert_eq!(pipelines.len(), 3);
        assert_eq!(engine.configurations().len(), 3);
        assert_eq!(
            pipelines[1].id,
            "093886a85f0141a11f6b04d8e00fba35513fbd3f7f2cab3c4e2f04891d060d24"
        );
        assert_ne!(pipelines[1].id, pipelines[2].id);
        assert_eq!(pipelines[0].report.result, ReportResult::Success);
        // No title defaulting outside `all` mode.
        assert_eq!(pipelines[1].actions["gh"].title, "");
    }

    #[tokio::test]
    async fn all_mode_reuses_parent_id_and_title() {
        let canned = Canned::Manifests(vec![child("service-a"), child("service-b")]);
        let (mut engine, _) = engine_with(&[PARENT], canned);

        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        for generated in &engine.pipelines()[1..] {
            assert_eq!(generated.id, "local");
            assert_eq!(generated.actions.keys().collect::<Vec<_>>(), ["gh"]);
            assert_eq!(generated.actions["gh"].title, "MyApp");
            assert_eq!(generated.config.spec.version, crate::VERSION);
        }
    }

    #[tokio::test]
    async fn failing_manifest_is_isolated() {
        let canned = Canned::Manifests(vec![
            child("service-a"),
            broken_child("service-b"),
            child("service-c"),
        ]);
        let (mut engine, _) = engine_with(&[PARENT], canned);

        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        let names: Vec<_> = engine.pipelines()[1..].iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["service-a", "service-c"]);
        assert_eq!(engine.pipelines()[0].report.result, ReportResult::Failure);
    }

    #[tokio::test]
    async fn actionid_and_pullrequestid_are_exclusive() {
        let parent = PARENT.replace("  actionid: pr\n", "  actionid: pr\n  pullrequestid: pr\n");
        let (mut engine, workdirs) = engine_with(&[parent.as_str()], Canned::Manifests(vec![child("a")]));

        let err = engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap_err();

        assert!(matches!(err, AutobumpError::Config { .. }));
        assert_eq!(engine.pipelines().len(), 1);
        assert_eq!(engine.pipelines()[0].report.result, ReportResult::Failure);
        assert!(workdirs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pullrequestid_migrates_to_actionid() {
        let parent = PARENT.replace("  actionid: pr\n", "  pullrequestid: pr\n");
        let (mut engine, _) = engine_with(&[parent.as_str()], Canned::Manifests(vec![child("a")]));

        let (logs, _guard) = capture_warnings();
        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        assert!(logs.contents().contains("`autodiscovery.pullrequestid` is deprecated"));
        let migrated = engine.pipelines()[0].config.spec.autodiscovery.as_ref().unwrap();
        assert_eq!(migrated.actionid, "pr");
        assert!(migrated.pullrequestid.is_empty());
        assert_eq!(engine.pipelines()[1].actions["gh"].kind, "github/pullrequest");
    }

    #[tokio::test]
    async fn disabled_gate_is_a_no_op() {
        let (mut engine, workdirs) = engine_with(&[PARENT], Canned::Manifests(vec![child("a")]));
        let mut options = options(Path::new("/tmp"));
        options.experimental = false;

        let (logs, _guard) = capture_warnings();
        engine.load_autodiscovery(&options).await.unwrap();

        assert!(logs.contents().contains("requires the experimental flag"));
        assert_eq!(engine.pipelines().len(), 1);
        assert_eq!(engine.pipelines()[0].report.result, ReportResult::Unset);
        assert!(workdirs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn crawler_failure_aborts_the_run() {
        for canned in [Canned::BuildError, Canned::RunError] {
            let second = PARENT.replace("pipelineid: local", "pipelineid: other");
            let (mut engine, workdirs) = engine_with(&[PARENT, second.as_str()], canned);

            let err = engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap_err();

            assert!(matches!(err, AutobumpError::Crawler(_)));
            assert_eq!(engine.pipelines()[0].report.result, ReportResult::Failure);
            assert_eq!(engine.pipelines()[1].report.result, ReportResult::Unset);
            assert_eq!(workdirs.lock().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn malformed_manifest_aborts_the_run() {
        let canned = Canned::Manifests(vec![child("a"), "name: [unterminated".into()]);
        let (mut engine, _) = engine_with(&[PARENT], canned);

        let err = engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap_err();

        assert!(matches!(err, AutobumpError::Parse { .. }));
        assert_eq!(engine.pipelines().len(), 2);
        assert_eq!(engine.pipelines()[0].report.result, ReportResult::Failure);
    }

    #[tokio::test]
    async fn empty_result_succeeds() {
        let (mut engine, _) = engine_with(&[PARENT], Canned::Manifests(Vec::new()));

        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        assert_eq!(engine.pipelines().len(), 1);
        assert_eq!(engine.pipelines()[0].report.result, ReportResult::Success);
    }

    #[tokio::test]
    async fn scan_directory_follows_scmid() {
        let without_scm = PARENT.replace("  scmid: gh\n  actionid", "  actionid");
        let (mut engine, workdirs) = engine_with(&[PARENT, without_scm.as_str()], Canned::Manifests(Vec::new()));

        engine.load_autodiscovery(&options(Path::new("/srv/work"))).await.unwrap();

        let workdirs = workdirs.lock().unwrap();
        assert_eq!(workdirs[0], engine.pipelines()[0].scms["gh"].directory());
        assert_eq!(workdirs[1], Path::new("/srv/work"));
    }

    #[tokio::test]
    async fn generated_scms_are_copies() {
        let (mut engine, _) = engine_with(&[PARENT], Canned::Manifests(vec![child("a")]));
        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        let generated = &mut engine.pipelines[1].config.spec.scms;
        assert_eq!(generated.keys().collect::<Vec<_>>(), ["gh", "gl"]);
        generated.get_mut("gh").unwrap().spec.owner = "mutated".into();

        assert_eq!(engine.pipelines[0].scms["gh"].config.spec.owner, "acme");
        assert_eq!(engine.pipelines[0].config.spec.scms["gh"].spec.owner, "acme");
    }

    #[tokio::test]
    async fn generated_pipelines_are_not_revisited() {
        let nested = format!("{}autodiscovery:\n  crawlers:\n    cargo: {{}}\n", child("nested"));
        let (mut engine, workdirs) = engine_with(&[PARENT], Canned::Manifests(vec![nested]));

        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        assert_eq!(engine.pipelines().len(), 2);
        assert_eq!(workdirs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn local_autodiscovery_scans_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n\n[dependencies]\nserde = \"1\"\nregex = { version = \"1.10\" }\n",
        )
        .unwrap();

        let mut engine = Engine::new();
        let options = DiscoveryOptions {
            experimental: true,
            local_autodiscovery: true,
            local_crawlers: vec!["cargo".into()],
            workdir: Some(dir.path().to_path_buf()),
        };
        engine.load_autodiscovery(&options).await.unwrap();

        let pipelines = engine.pipelines();
        assert_eq!(pipelines[0].name, LOCAL_AUTODISCOVERY_NAME);
        assert_eq!(pipelines[0].id, identity::hex_digest(LOCAL_AUTODISCOVERY_NAME));
        assert_eq!(pipelines[0].report.result, ReportResult::Success);
        assert_eq!(pipelines.len(), 3);
        assert!(pipelines[1..].iter().all(|p| p.id == pipelines[0].id));
    }

    #[tokio::test]
    async fn missing_scm_working_copy_is_explained() {
        let (mut engine, _) = engine_with(&[PARENT], Canned::Manifests(Vec::new()));

        let (logs, _guard) = capture_warnings();
        engine.load_autodiscovery(&options(Path::new("/tmp"))).await.unwrap();

        let logs = logs.contents();
        assert!(logs.contains("scm working copy not found"));
        assert!(logs.contains("autobump/github/acme/app"));
    }

    #[tokio::test]
    async fn individual_ids_are_unique_for_real_crawlers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Dockerfile"),
            "FROM golang:1.22 AS build\nFROM golang:1.22 AS test\nFROM alpine:3.19\nFROM alpine:3.19\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Cargo.toml"),
            "[dependencies]\nserde_yaml = \"0.9\"\nyaml = { package = \"serde_yaml\", version = \"0.8\" }\n",
        )
        .unwrap();

        let parent = "name: local\npipelineid: local\nautodiscovery:\n  groupby: individual\n  crawlers:\n    cargo: {}\n    dockerfile: {}\n";
        let mut engine = Engine::with_runner_factory(CrawlerRunnerFactory);
        engine
            .push(PipelineConfig::new(serde_yaml::from_str(parent).unwrap()))
            .unwrap();

        engine.load_autodiscovery(&options(dir.path())).await.unwrap();

        let ids: std::collections::HashSet<_> =
            engine.pipelines()[1..].iter().map(|p| p.id.as_str()).collect();
        assert_eq!(engine.pipelines().len(), 1 + 4);
        assert_eq!(ids.len(), 4);
        assert_eq!(engine.pipelines()[0].report.result, ReportResult::Success);
    }
}
