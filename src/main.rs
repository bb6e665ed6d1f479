use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use recmd_worker::{
    archive,
    cli::{self, Command, LogFormat, RunArgs},
    config,
    files::InputFileRef,
    logging,
    progress::TracingReporter,
    task::{self, RecmdTask, TaskConfig, TaskRequest},
};

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.log_format == LogFormat::Json);

    match cli_opts.command {
        Command::Metadata => {
            println!("{}", serde_json::to_string_pretty(&task::task_metadata())?);
            Ok(())
        }
        Command::Run(args) => run(cli_opts.config_path.as_deref(), args),
    }
}

fn run(config_path: Option<&std::path::Path>, args: RunArgs) -> Result<()> {
    let loaded = config::load_config(config_path).context("loading worker config")?;
    let cfg = loaded.config;
    info!(
        "recmd-worker {} task={} extractor={:?} config_hash={}",
        env!("CARGO_PKG_VERSION"),
        cfg.task_name,
        cfg.extractor,
        loaded.config_hash
    );

    std::fs::create_dir_all(&args.output_path).with_context(|| {
        format!("creating output directory {}", args.output_path.display())
    })?;

    let extractor = archive::build_extractor(&cfg);
    let task = RecmdTask::new(cfg, extractor, Arc::new(TracingReporter));

    let request = TaskRequest {
        pipe_result: args.pipe_result,
        input_files: args
            .input_files
            .iter()
            .map(|path| InputFileRef::from_path(path))
            .collect(),
        output_path: args.output_path,
        workflow_id: args.workflow_id,
        task_config: TaskConfig {
            archive_password: args.archive_password,
        },
    };

    let result = task.run(request)?;
    info!(
        outputs = result.output_files.len(),
        logs = result.task_logs.len(),
        "task finished"
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.encode()?);
    }
    Ok(())
}
