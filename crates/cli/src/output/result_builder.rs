use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::output::format::OutputFormat;
use crate::output::model::{CommandError, CommandResult, ErrorCode};

/// Builder for constructing command results.
pub struct ResultBuilder<T: Serialize> {
	command: String,
	data: Option<T>,
	error: Option<CommandError>,
	start_time: Instant,
}

impl<T: Serialize> ResultBuilder<T> {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			data: None,
			error: None,
			start_time: Instant::now(),
		}
	}

	/// Measures the duration from `start` instead of from construction.
	pub fn started_at(mut self, start: Instant) -> Self {
		self.start_time = start;
		self
	}

	pub fn data(mut self, data: T) -> Self {
		self.data = Some(data);
		self
	}

	pub fn error(mut self, code: ErrorCode, message: impl Into<String>) -> Self {
		self.error = Some(CommandError {
			code,
			message: message.into(),
		});
		self
	}

	pub fn build(self) -> CommandResult<T> {
		let ok = self.error.is_none() && self.data.is_some();
		CommandResult {
			ok,
			command: self.command,
			data: self.data,
			error: self.error,
			duration_ms: Some(self.start_time.elapsed().as_millis() as u64),
		}
	}
}

/// Print a command result in the specified format.
///
/// JSON always goes to stdout. Text failures go to stderr.
pub fn print_result<T: Serialize>(result: &CommandResult<T>, format: OutputFormat) {
	match format {
		OutputFormat::Json => {
			if let Ok(json) = serde_json::to_string_pretty(result) {
				println!("{json}");
			}
		}
		OutputFormat::Text => print_result_text(result),
	}
}

fn print_result_text<T: Serialize>(result: &CommandResult<T>) {
	if let Some(ref error) = result.error {
		print_error_stderr(error);
		return;
	}
	let Some(ref data) = result.data else {
		return;
	};
	let mut stdout = io::stdout().lock();
	match serde_json::to_value(data) {
		Ok(Value::Object(fields)) => {
			for (key, value) in &fields {
				let _ = writeln!(stdout, "{key}: {}", text_value(value));
			}
		}
		Ok(value) => {
			let _ = writeln!(stdout, "{}", text_value(&value));
		}
		Err(_) => {}
	}
}

fn text_value(value: &Value) -> String {
	match value {
		Value::Null => "-".into(),
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Print an error to stderr in human-readable format.
pub fn print_error_stderr(error: &CommandError) {
	eprintln!("Error [{}]: {}", error.code, error.message);
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn success_envelope_omits_error() {
		let result = ResultBuilder::new("status").data(json!({"configured": false})).build();
		let value = serde_json::to_value(&result).unwrap();
		assert_eq!(value["ok"], true);
		assert_eq!(value["command"], "status");
		assert_eq!(value["data"]["configured"], false);
		assert!(value.get("error").is_none());
	}

	#[test]
	fn failure_envelope_carries_code_and_message() {
		let result: CommandResult<()> = ResultBuilder::new("unlock").error(ErrorCode::SessionExpired, "expired").build();
		let value = serde_json::to_value(&result).unwrap();
		assert_eq!(value["ok"], false);
		assert_eq!(value["error"]["code"], "SESSION_EXPIRED");
		assert_eq!(value["error"]["message"], "expired");
		assert!(value.get("data").is_none());
	}

	#[test]
	fn text_values_are_unquoted() {
		assert_eq!(text_value(&json!("ROOM1")), "ROOM1");
		assert_eq!(text_value(&Value::Null), "-");
		assert_eq!(text_value(&json!(true)), "true");
	}
}
