use clap::Parser;
use doorkey_cli::output::{CommandResult, ResultBuilder, print_result};
use doorkey_cli::{cli::Cli, commands, logging};
use tracing::debug;

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	logging::init_logging(cli.verbose);

	let name = cli.command.name();
	let format = cli.format;

	if let Err(err) = commands::dispatch(cli).await {
		debug!(target = "doorkey.cli", error = ?err, "command failed");
		let result: CommandResult<()> = ResultBuilder::new(name).error(err.code(), err.to_string()).build();
		print_result(&result, format);
		std::process::exit(1);
	}
}
