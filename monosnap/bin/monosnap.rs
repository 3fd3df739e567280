use clap::{CommandFactory, Parser};
use monosnap::{
    cli::{AnsiStyles, MonosnapArgs, MonosnapSubcommand},
    config::MonosnapConfig,
    management, MonosnapResult,
};
use tracing_subscriber::{fmt, EnvFilter};

//--------------------------------------------------------------------------------------------------
// Functions: main
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() -> MonosnapResult<()> {
    let args = MonosnapArgs::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    fmt()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_env_filter(filter)
        .init();

    let config = load_config(&args)?;

    match args.subcommand {
        Some(MonosnapSubcommand::Plan { manifest }) => {
            tracing::trace!("planning image: manifest={manifest:?}");
            let plan = management::plan_image(&config, manifest).await?;
            if plan.is_existing() {
                println!("{}", "nothing to do".valid());
            }
            println!("{plan}");
        }
        Some(MonosnapSubcommand::Materialize { manifest }) => {
            tracing::trace!("materializing image: manifest={manifest:?}");
            let snapshot = management::materialize_image(&config, manifest).await?;
            println!("{} {}", "snapshot".header(), snapshot.get_snapshot_id().literal());
            println!("{} {}", "tag".header(), snapshot.get_rolling_hash());
            println!(
                "{} {}",
                "size".header(),
                monosnap::utils::human_size(snapshot.rolling_size()).placeholder()
            );
        }
        None => {
            MonosnapArgs::command().print_help()?;
        }
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Functions: *
//--------------------------------------------------------------------------------------------------

/// Loads the configuration file and applies the command line overrides.
fn load_config(args: &MonosnapArgs) -> MonosnapResult<MonosnapConfig> {
    let mut config = MonosnapConfig::load_or_default(args.config.as_deref())?;

    if let Some(volumes) = &args.volumes {
        config.set_volumes_dir(Some(volumes.clone()));
    }

    if let Some(blobs) = &args.blobs {
        config.set_blobs_dir(Some(blobs.clone()));
    }

    if let Some(threshold) = args.merge_threshold {
        config.set_merge_threshold(threshold);
    }

    if args.verify {
        config.set_verify_blobs(true);
    }

    tracing::debug!("configuration: {config:?}");
    Ok(config)
}
