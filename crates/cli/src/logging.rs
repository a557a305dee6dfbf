use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Filter directive for a `-v` count. `RUST_LOG` wins when set.
pub fn default_directive(verbose: u8) -> &'static str {
	match verbose {
		0 => "warn",
		1 => "info",
		2 => "debug",
		_ => "trace",
	}
}

/// Installs the global subscriber. Logs go to stderr; stdout carries command output.
pub fn init_logging(verbose: u8) {
	let filter = std::env::var("RUST_LOG")
		.ok()
		.filter(|directive| !directive.is_empty())
		.and_then(|directive| EnvFilter::try_new(directive).ok())
		.unwrap_or_else(|| EnvFilter::new(default_directive(verbose)));

	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).with_target(false))
		.try_init();
}
