use doorkey::demo::demo_door_id;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct DemoReport {
	pub seed: String,
	pub door_id: String,
}

pub fn run(seed: &str) -> DemoReport {
	DemoReport {
		seed: seed.to_string(),
		door_id: demo_door_id(seed),
	}
}
