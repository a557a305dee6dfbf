//! Offline demo sessions.
//!
//! Links whose host contains [`DEMO_HOST_MARKER`] never touch the network:
//! the walker derives a deterministic door id from the link text and the
//! unlock engine reports success immediately.

use url::Url;

/// Host substring that switches a link into demo mode.
pub const DEMO_HOST_MARKER: &str = "doorkey.demo";

pub fn is_demo_host(host: &str) -> bool {
	host.to_ascii_lowercase().contains(DEMO_HOST_MARKER)
}

pub fn is_demo_link(url: &Url) -> bool {
	url.host_str().is_some_and(is_demo_host)
}

/// Deterministic `NNNN-NNNN-XXN` identifier for `seed`.
///
/// Rolling `hash * 31 + char` over the seed's characters with wrapping
/// 32-bit signed arithmetic, then folded into the display format.
pub fn demo_door_id(seed: &str) -> String {
	let hash = seed.chars().fold(0i32, |hash, c| hash.wrapping_mul(31).wrapping_add(c as i32));
	let n = hash.unsigned_abs();
	format!("{:04}-{:04}-{:02x}{}", n % 10_000, (n / 10_000) % 10_000, (n >> 16) & 0xff, n % 10)
}

/// Synthetic cookie value planted for a demo door.
pub fn demo_cookie(door_id: &str) -> String {
	format!("demo-{door_id}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn same_seed_same_id() {
		let first = demo_door_id("https://doorkey.demo/abc");
		for _ in 0..5 {
			assert_eq!(demo_door_id("https://doorkey.demo/abc"), first);
		}
		assert_ne!(demo_door_id("https://doorkey.demo/abd"), first);
	}

	#[test]
	fn id_has_display_shape() {
		for seed in ["", "a", "room 12", "https://doorkey.demo/some/very/long/path?with=query"] {
			let id = demo_door_id(seed);
			let parts: Vec<&str> = id.split('-').collect();
			assert_eq!(parts.len(), 3, "{id}");
			assert_eq!(parts[0].len(), 4);
			assert_eq!(parts[1].len(), 4);
			assert!(parts[0].chars().chain(parts[1].chars()).all(|c| c.is_ascii_digit()), "{id}");
			assert_eq!(parts[2].len(), 3, "{id}");
			assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()), "{id}");
		}
	}

	#[test]
	fn known_values() {
		assert_eq!(demo_door_id(""), "0000-0000-000");
		// "a" hashes to 97.
		assert_eq!(demo_door_id("a"), "0097-0000-007");
	}

	#[test]
	fn demo_hosts() {
		assert!(is_demo_link(&Url::parse("https://doorkey.demo/abc").unwrap()));
		assert!(is_demo_link(&Url::parse("https://room.DoorKey.Demo/").unwrap()));
		assert!(!is_demo_link(&Url::parse("https://k3y.in/abc").unwrap()));
	}
}
