use crate::cli::args::{ConfigArgs, ServeArgs, SubmitArgs};
use crate::core::command::TokioCommandRunner;
use crate::core::config::{AppConfig, ConfigLoader, RuntimeSettings};
use crate::core::logger::LogSink;
use crate::core::pipeline::PatchPipeline;
use crate::server::{self, ServerOptions};
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

pub async fn serve(config_path: Option<&Path>, args: ServeArgs) -> Result<()> {
    let config = ConfigLoader::load(&ConfigLoader::config_path(config_path))?;
    let bind = ConfigLoader::server_bind(&config, args.bind.as_deref(), args.port)?;
    let pipeline = build_pipeline(config)?;

    let options = ServerOptions {
        bind: bind.bind,
        port: bind.port,
        frontend_dir: args.serve_frontend.then(|| args.frontend_dir.clone()),
    };
    tracing::info!(
        repo_root = %pipeline.cache().root().display(),
        "starting patchrelay service"
    );
    server::serve(pipeline, options).await?;
    Ok(())
}

pub async fn submit(config_path: Option<&Path>, args: SubmitArgs) -> Result<()> {
    let config = ConfigLoader::load(&ConfigLoader::config_path(config_path))?;
    let pipeline = build_pipeline(config)?;

    let patch = match &args.patch_file {
        Some(path) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read patch file {}", path.display()))?,
        ),
        None => None,
    };
    let fields = args.to_fields(patch);

    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{}", line);
        }
    });
    let logs = LogSink::with_observer(tx);
    let outcome = pipeline.process_submission(&fields, &logs).await;
    drop(logs);
    printer.await.context("log printer failed")?;

    if outcome.success {
        Ok(())
    } else {
        Err(anyhow!("submission failed"))
    }
}

pub async fn config(config_path: Option<&Path>, args: ConfigArgs) -> Result<()> {
    let config = ConfigLoader::load(&ConfigLoader::config_path(config_path))?;
    let summary = serde_json::to_string_pretty(&config.summary())?;
    println!("{}", summary);
    if args.show_env {
        println!();
        for line in ConfigLoader::env_var_documentation() {
            println!("{}", line);
        }
    }
    Ok(())
}

fn build_pipeline(config: AppConfig) -> Result<PatchPipeline> {
    let settings: RuntimeSettings = ConfigLoader::runtime_settings(&config)?;
    std::fs::create_dir_all(&settings.repo_root).with_context(|| {
        format!(
            "failed to create repository root {}",
            settings.repo_root.display()
        )
    })?;
    let runner = Arc::new(TokioCommandRunner::with_timeout(settings.command_timeout));
    Ok(PatchPipeline::new(Arc::new(config), settings, runner))
}
