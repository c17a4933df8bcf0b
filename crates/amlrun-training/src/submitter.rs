use crate::artifacts::{downloaded_artifact, plan_outputs, LaunchReport, OutputAction};
use crate::compute::resolve_compute;
use crate::datastore::bind_datastore;
use crate::error::{LaunchError, LaunchResult};
use crate::job::{RunSpec, RunStatus};
use crate::platform::{DatastoreRegistry, MlPlatform};
use crate::progress::{LaunchEvent, ProgressSink};
use crate::settings::LaunchSettings;
use tracing::{debug, warn};

/// Drives one launch end to end: resolve, submit, wait, collect outputs.
pub struct JobSubmitter<'a> {
    platform: &'a dyn MlPlatform,
    datastores: Option<&'a dyn DatastoreRegistry>,
}

impl<'a> JobSubmitter<'a> {
    #[must_use]
    pub fn new(platform: &'a dyn MlPlatform) -> Self {
        Self { platform, datastores: None }
    }

    /// Registry used when `bind_datastore` is enabled.
    #[must_use]
    pub fn with_datastores(mut self, registry: &'a dyn DatastoreRegistry) -> Self {
        self.datastores = Some(registry);
        self
    }

    pub async fn launch(&self, settings: &LaunchSettings, progress: &dyn ProgressSink) -> LaunchResult<LaunchReport> {
        settings.validate()?;
        debug!(platform = self.platform.id(), ?settings, "starting launch");

        let workspace = self.platform.resolve_workspace(&settings.config_path).await?;
        progress.on_event(LaunchEvent::WorkspaceResolved { workspace: workspace.name().to_string() });

        if settings.bind_datastore {
            let registry = self.datastores.ok_or_else(|| {
                LaunchError::InvalidSettings("datastore binding requested but no registry is configured".to_string())
            })?;
            bind_datastore(registry, &workspace, &settings.storage, progress).await?;
        }

        let compute = resolve_compute(self.platform, &workspace, &settings.cluster_name, progress).await?;

        let environment = self.platform.get_environment(&workspace, &settings.environment_name).await?;
        progress.on_event(LaunchEvent::EnvironmentResolved {
            name: environment.name.clone(),
            version: environment.version.clone(),
        });

        let spec = RunSpec::training(settings.source_dir.clone(), compute, environment);
        spec.validate()?;
        let run = self.platform.submit_run(&workspace, &settings.experiment_name, &spec).await?;
        progress.on_event(LaunchEvent::RunSubmitted {
            run_id: run.run_id.clone(),
            experiment: run.experiment.clone(),
        });

        let status = self.platform.wait_for_completion(&workspace, &run).await?;
        progress.on_event(LaunchEvent::RunFinished { run_id: run.run_id.clone(), status: status.to_string() });
        if status != RunStatus::Completed {
            return Err(LaunchError::RunFailed { run_id: run.run_id.0.clone(), status: status.to_string() });
        }

        let display_name = settings.display_name().map(str::to_string);
        if let Some(ref name) = display_name {
            self.platform.set_display_name(&workspace, &run, name).await?;
        }

        let download_dir = settings.download_dir();
        if let Some(ref dir) = download_dir {
            std::fs::create_dir_all(dir)?;
        }

        let files = self.platform.list_output_files(&workspace, &run).await?;
        let actions = plan_outputs(&files, download_dir.as_deref(), settings.register_model)?;
        if actions.is_empty() && !files.is_empty() {
            debug!(files = files.len(), "no output files selected for download or registration");
        }

        let mut report = LaunchReport {
            run_id: run.run_id.0.clone(),
            experiment: run.experiment.clone(),
            status: status.to_string(),
            display_name,
            compute: spec.compute.name.clone(),
            environment: format!("{}:{}", spec.environment.name, spec.environment.version),
            downloads: Vec::new(),
            models: Vec::new(),
            finished_at: chrono::Utc::now(),
        };

        for action in actions {
            match action {
                OutputAction::Download { remote, local } => {
                    progress.on_event(LaunchEvent::Downloading { remote: remote.clone(), local: local.clone() });
                    self.platform.download_file(&workspace, &run, &remote, &local).await?;
                    report.downloads.push(downloaded_artifact(remote, local)?);
                }
                OutputAction::Register { model_name, remote } => {
                    let model = self.platform.register_model(&workspace, &run, &model_name, &remote).await?;
                    progress.on_event(LaunchEvent::ModelRegistered {
                        model_name: model.name.clone(),
                        version: model.version.clone(),
                    });
                    report.models.push(model);
                }
            }
        }

        if settings.register_model && report.models.is_empty() {
            warn!(run_id = %report.run_id, "model registration enabled but no .h5/.hdf5 outputs were found");
        }

        Ok(report)
    }
}
