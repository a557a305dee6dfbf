use std::sync::Arc;

use super::*;
use crate::cookies::CookieJar;
use crate::fake_transport::FakeTransport;
use crate::transport::RawResponse;

fn walker(transport: FakeTransport) -> (RedirectWalker, Arc<FakeTransport>) {
	let transport = Arc::new(transport);
	let client = BrowserClient::new(transport.clone(), Arc::new(CookieJar::new()));
	(RedirectWalker::new(client), transport)
}

#[test]
fn links_are_forced_to_https() {
	assert_eq!(normalize_link("k3y.in/abc").unwrap().as_str(), "https://k3y.in/abc");
	assert_eq!(normalize_link("http://k3y.in/abc").unwrap().as_str(), "https://k3y.in/abc");
	assert_eq!(normalize_link("  HTTP://k3y.in/abc\n").unwrap().as_str(), "https://k3y.in/abc");
	assert_eq!(normalize_link("https://k3y.in/abc").unwrap().as_str(), "https://k3y.in/abc");
}

#[test]
fn unusable_links_are_rejected() {
	assert!(matches!(normalize_link("   "), Err(SessionError::InvalidLink(_))));
	assert!(matches!(normalize_link("https://"), Err(SessionError::InvalidLink(_))));
	assert!(matches!(normalize_link("not a link at all"), Err(SessionError::InvalidLink(_))));
}

#[test]
fn booking_marker_beats_door_marker_within_one_url() {
	let url = Url::parse("https://hotel.example/go/door/42/login/mybook/ROOM9/").unwrap();
	assert_eq!(extract_door_id(&url), Some(("ROOM9".to_string(), DoorIdSource::Booking)));
	let url = Url::parse("https://hotel.example/go/door/42/1/").unwrap();
	assert_eq!(extract_door_id(&url), Some(("42".to_string(), DoorIdSource::Door)));
	let url = Url::parse("https://hotel.example/login/mybook/").unwrap();
	assert_eq!(extract_door_id(&url), None);
}

#[tokio::test]
async fn scheme_less_link_is_requested_over_https() {
	let (walker, transport) = walker(
		FakeTransport::new()
			.on_get("https://k3y.in/abc", RawResponse::new(302).with_location("https://hotel.example/login/mybook/ROOM1/"))
			.on_get("https://hotel.example/login/mybook/ROOM1/", RawResponse::new(200)),
	);

	walker.resolve("http://k3y.in/abc").await.unwrap();
	let requests = transport.requests();
	assert!(requests.iter().all(|r| r.url.scheme() == "https"));
	assert_eq!(requests[0].url.as_str(), "https://k3y.in/abc");
}

#[tokio::test]
async fn door_id_comes_from_intermediate_location() {
	let (walker, _) = walker(
		FakeTransport::new()
			.on_get("https://k3y.in/abc", RawResponse::new(302).with_location("https://hotel.example/login/mybook/ROOM123/x"))
			.on_get("https://hotel.example/login/mybook/ROOM123/x", RawResponse::new(200)),
	);

	let resolution = walker.resolve("k3y.in/abc").await.unwrap();
	assert_eq!(resolution.door_id, "ROOM123");
	assert_eq!(resolution.source, DoorIdSource::Booking);
	assert_eq!(resolution.final_host, "hotel.example");
	assert_eq!(resolution.steps.len(), 2);
}

#[tokio::test]
async fn first_marker_in_chain_order_wins() {
	let (walker, _) = walker(
		FakeTransport::new()
			.on_get("https://k3y.in/abc", RawResponse::new(302).with_location("https://hotel.example/go/door/42/1/"))
			.on_get("https://hotel.example/go/door/42/1/", RawResponse::new(302).with_location("/login/mybook/ROOM9/"))
			.on_get("https://hotel.example/login/mybook/ROOM9/", RawResponse::new(200)),
	);

	let resolution = walker.resolve("https://k3y.in/abc").await.unwrap();
	assert_eq!(resolution.door_id, "42");
	assert_eq!(resolution.source, DoorIdSource::Door);
	assert_eq!(resolution.final_url.as_str(), "https://hotel.example/login/mybook/ROOM9/");
}

#[tokio::test]
async fn cookies_from_every_hop_reach_the_jar() {
	let (walker, transport) = walker(
		FakeTransport::new()
			.on_get(
				"https://k3y.in/abc",
				RawResponse::new(302).with_location("https://hotel.example/login/mybook/ROOM1/"),
			)
			.on_get(
				"https://hotel.example/login/mybook/ROOM1/",
				RawResponse::new(302)
					.with_location("/myaccount/")
					.with_set_cookie("PHPSESSID=s3ss10n; path=/; HttpOnly"),
			)
			.on_get("https://hotel.example/myaccount/", RawResponse::new(200)),
	);

	walker.resolve("k3y.in/abc").await.unwrap();
	assert_eq!(walker.client().jar().session_cookie("hotel.example").unwrap().value, "s3ss10n");
	let last = transport.requests().pop().unwrap();
	assert_eq!(last.header("Cookie"), Some("PHPSESSID=s3ss10n"));
}

#[tokio::test]
async fn exhausted_chain_without_marker_fails() {
	let mut transport = FakeTransport::new();
	for i in 0..6 {
		transport = transport.on_get(&format!("https://hotel.example/{i}"), RawResponse::new(302).with_location(format!("/{}", i + 1)));
	}
	let (walker, transport) = walker(transport);

	let err = walker.resolve("hotel.example/0").await.unwrap_err();
	assert!(matches!(err, SessionError::NoDoorIdFound), "{err:?}");
	assert_eq!(transport.requests().len(), MAX_HOPS);
}

#[tokio::test]
async fn custom_hop_limit_stops_before_the_marker() {
	let chain = || {
		FakeTransport::new()
			.on_get("https://hotel.example/0", RawResponse::new(302).with_location("/1"))
			.on_get("https://hotel.example/1", RawResponse::new(302).with_location("/2"))
			.on_get("https://hotel.example/2", RawResponse::new(302).with_location("/login/mybook/ROOM5/"))
			.on_get("https://hotel.example/login/mybook/ROOM5/", RawResponse::new(200))
	};

	let (short, transport) = walker(chain());
	let short = short.with_max_hops(2);
	let err = short.resolve("hotel.example/0").await.unwrap_err();
	assert!(matches!(err, SessionError::NoDoorIdFound), "{err:?}");
	assert_eq!(transport.requests().len(), 2);

	let (full, _) = walker(chain());
	assert_eq!(full.resolve("hotel.example/0").await.unwrap().door_id, "ROOM5");
}

#[tokio::test]
async fn short_link_fallback_uses_last_segment() {
	let (walker, _) = walker(FakeTransport::new().on_get("https://k3y.in/s/XyZ12", RawResponse::new(200)));

	let resolution = walker.resolve("k3y.in/s/XyZ12").await.unwrap();
	assert_eq!(resolution.door_id, "XyZ12");
	assert_eq!(resolution.source, DoorIdSource::ShortLinkFallback);
	assert_eq!(resolution.final_host, "k3y.in");
}

#[tokio::test]
async fn redirect_without_location_ends_the_walk() {
	let (walker, transport) = walker(
		FakeTransport::new()
			.on_get("https://k3y.in/abc", RawResponse::new(302).with_location("https://hotel.example/go/door/77/"))
			.on_get("https://hotel.example/go/door/77/", RawResponse::new(302)),
	);

	let resolution = walker.resolve("k3y.in/abc").await.unwrap();
	assert_eq!(resolution.door_id, "77");
	assert_eq!(resolution.final_host, "hotel.example");
	assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn unexpected_status_is_invalid_response() {
	let (walker, _) = walker(FakeTransport::new().on_get("https://k3y.in/abc", RawResponse::new(500)));
	assert!(matches!(walker.resolve("k3y.in/abc").await, Err(SessionError::InvalidResponse(_))));
}

#[tokio::test]
async fn transport_failure_is_invalid_response() {
	let (walker, _) = walker(FakeTransport::new().fail_get("https://k3y.in/abc", "connection reset"));
	assert!(matches!(walker.resolve("k3y.in/abc").await, Err(SessionError::InvalidResponse(_))));
}

#[tokio::test]
async fn demo_links_resolve_offline() {
	let (walker, transport) = walker(FakeTransport::new());

	let first = walker.resolve("doorkey.demo/lobby").await.unwrap();
	let second = walker.resolve("https://doorkey.demo/lobby").await.unwrap();

	assert_eq!(first.door_id, second.door_id);
	assert_eq!(first.source, DoorIdSource::Demo);
	assert_eq!(first.final_host, "doorkey.demo");
	assert!(walker.client().jar().session_cookie("doorkey.demo").is_some());
	assert!(transport.requests().is_empty());
}
