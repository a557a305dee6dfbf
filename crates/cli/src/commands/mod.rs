mod demo;
mod language;
mod pull;
mod serve;
mod setup;
mod status;
mod unlock;

use std::path::PathBuf;
use std::time::Instant;

use doorkey::CookieAttachment;
use serde::Serialize;

use crate::app::App;
use crate::cli::{Cli, Commands};
use crate::error::Result;
use crate::output::{OutputFormat, ResultBuilder, print_result};
use crate::settings::resolve_state_dir;

pub async fn dispatch(cli: Cli) -> Result<()> {
	let started = Instant::now();
	let name = cli.command.name();
	let format = cli.format;

	if let Commands::DemoId { seed } = &cli.command {
		emit(name, started, format, demo::run(seed));
		return Ok(());
	}

	let app = open_app(cli.state_dir)?;
	match cli.command {
		Commands::Setup { link } => emit(name, started, format, setup::run(&app, &link).await?),
		Commands::Unlock { explicit_cookie } => {
			let attachment = if explicit_cookie { CookieAttachment::Header } else { app.settings.cookie_attachment };
			emit(name, started, format, unlock::run(&app, attachment).await?)
		}
		Commands::Status => emit(name, started, format, status::run(&app)),
		Commands::Refresh => emit(name, started, format, unlock::refresh(&app).await?),
		Commands::Clear => emit(name, started, format, status::clear(&app)?),
		Commands::Serve { listen, token } => serve::run(app, listen, token, |report| emit(name, started, format, report)).await?,
		Commands::Pull { peer, token, unlock } => emit(name, started, format, pull::run(&app, peer, token, unlock).await?),
		Commands::Language { tag } => emit(name, started, format, language::run(&app, &tag)?),
		Commands::DemoId { .. } => {}
	}

	Ok(())
}

fn open_app(state_dir: Option<PathBuf>) -> Result<App> {
	App::open(resolve_state_dir(state_dir)?)
}

fn emit<T: Serialize>(command: &str, started: Instant, format: OutputFormat, data: T) {
	let result = ResultBuilder::new(command).started_at(started).data(data).build();
	print_result(&result, format);
}
