use clap::Parser;
use reportd::cli::{Cli, Commands, commands};
use reportd::{Config, run};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match cli.command() {
        Commands::InitConfig => return commands::cmd_init_config(cli.config.as_deref()),
        Commands::CheckConfig => {
            let config = Config::load(cli.config.as_deref())?;
            return commands::cmd_check_config(&config);
        }
        Commands::Serve => Config::load(cli.config.as_deref())?,
    };

    let worker_threads = config.general.worker_threads;

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();

    if worker_threads > 0 {
        builder.worker_threads(worker_threads);
    }

    let runtime = builder.build()?;
    runtime.block_on(run(config))
}
