use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "doorkey")]
#[command(about = "Hotel door key - set up a room link, unlock, and sync a paired device")]
#[command(version)]
pub struct Cli {
	/// Increase verbosity (-v info, -vv debug, -vvv trace)
	#[arg(short, long, global = true, action = clap::ArgAction::Count)]
	pub verbose: u8,

	/// Directory holding settings.json and state.json
	#[arg(long, global = true, value_name = "DIR", env = "DOORKEY_STATE_DIR")]
	pub state_dir: Option<PathBuf>,

	/// Output format
	#[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
	pub format: OutputFormat,

	#[command(subcommand)]
	pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
	/// Resolve a room link and store the session it grants
	Setup {
		/// Link from the booking message, with or without scheme
		link: String,
	},

	/// Unlock the door once
	Unlock {
		/// Send the session cookie as an explicit Cookie header
		#[arg(long)]
		explicit_cookie: bool,
	},

	/// Show the stored session
	Status,

	/// Refresh the session cookie without unlocking
	Refresh,

	/// Forget the stored session
	Clear,

	/// Print the demo door id for a seed
	DemoId { seed: String },

	/// Serve the session to a paired device over WebSocket
	Serve {
		/// Address to bind; use 0.0.0.0:7878 to accept peers on the LAN
		#[arg(long, value_name = "ADDR")]
		listen: Option<String>,
		/// Shared token the paired device must present
		#[arg(long)]
		token: Option<String>,
	},

	/// Pull the session from a paired device
	Pull {
		/// Peer URL, e.g. ws://192.168.1.20:7878/sync
		#[arg(long, value_name = "URL")]
		peer: Option<String>,
		/// Shared token
		#[arg(long)]
		token: Option<String>,
		/// Unlock right after pulling
		#[arg(long)]
		unlock: bool,
	},

	/// Set the display language
	Language {
		/// Language tag, e.g. en, ja, zh-Hans
		tag: String,
	},
}

impl Commands {
	pub fn name(&self) -> &'static str {
		match self {
			Commands::Setup { .. } => "setup",
			Commands::Unlock { .. } => "unlock",
			Commands::Status => "status",
			Commands::Refresh => "refresh",
			Commands::Clear => "clear",
			Commands::DemoId { .. } => "demo-id",
			Commands::Serve { .. } => "serve",
			Commands::Pull { .. } => "pull",
			Commands::Language { .. } => "language",
		}
	}
}
