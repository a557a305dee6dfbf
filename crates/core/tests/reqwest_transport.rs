use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use doorkey::connectivity::ConnectivityMonitor;
use doorkey::{BrowserClient, CookieJar, FetchOptions, HttpRequest, ReqwestTransport, Transport, TransportError, UnlockOutcome, classify_unlock_response};
use url::Url;

async fn short_link() -> Response {
	(StatusCode::FOUND, [(header::LOCATION, "/login/mybook/ROOM5/"), (header::SET_COOKIE, "visit=1; Path=/")]).into_response()
}

async fn booking() -> Response {
	(StatusCode::FOUND, [(header::LOCATION, "/myaccount/"), (header::SET_COOKIE, "PHPSESSID=live; Path=/; HttpOnly")]).into_response()
}

async fn account() -> &'static str {
	"account"
}

async fn unlock(headers: HeaderMap) -> Response {
	let authorized = headers
		.get(header::COOKIE)
		.and_then(|v| v.to_str().ok())
		.is_some_and(|cookie| cookie.split("; ").any(|pair| pair == "PHPSESSID=live"));
	let target = if authorized { "/myaccount/key/" } else { "/login/" };
	(StatusCode::FOUND, [(header::LOCATION, target)]).into_response()
}

async fn slow() -> &'static str {
	tokio::time::sleep(Duration::from_secs(2)).await;
	"late"
}

async fn serve() -> Url {
	let app = Router::new()
		.route("/short", get(short_link))
		.route("/login/mybook/ROOM5/", get(booking))
		.route("/myaccount/", get(account))
		.route("/myaccount/key/unlock/", get(unlock))
		.route("/probe", get(account))
		.route("/slow", get(slow));
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app).await.unwrap();
	});
	Url::parse(&format!("http://{addr}/")).unwrap()
}

#[tokio::test]
async fn transport_reports_redirects_without_following() {
	let base = serve().await;
	let transport = ReqwestTransport::new().unwrap();

	let response = transport.send(&HttpRequest::get(base.join("short").unwrap())).await.unwrap();

	assert_eq!(response.status, 302);
	assert_eq!(response.location.as_deref(), Some("/login/mybook/ROOM5/"));
	assert_eq!(response.set_cookies, vec!["visit=1; Path=/".to_string()]);
}

#[tokio::test]
async fn client_collects_cookies_along_a_real_chain() {
	let base = serve().await;
	let jar = Arc::new(CookieJar::new());
	let client = BrowserClient::new(Arc::new(ReqwestTransport::new().unwrap()), jar.clone());

	let exchange = client.fetch(base.join("short").unwrap(), &FetchOptions::follow()).await.unwrap();

	assert_eq!(exchange.steps.len(), 3);
	assert_eq!(exchange.status(), 200);
	assert_eq!(exchange.final_url().path(), "/myaccount/");
	assert_eq!(jar.session_cookie("127.0.0.1").unwrap().value, "live");

	let unlock = client.fetch(base.join("myaccount/key/unlock/").unwrap(), &FetchOptions::manual()).await.unwrap();
	assert_eq!(classify_unlock_response(unlock.status(), unlock.location()), UnlockOutcome::Unlocked);
}

#[tokio::test]
async fn missing_cookie_lands_on_login() {
	let base = serve().await;
	let client = BrowserClient::new(Arc::new(ReqwestTransport::new().unwrap()), Arc::new(CookieJar::new()));

	let unlock = client.fetch(base.join("myaccount/key/unlock/").unwrap(), &FetchOptions::manual()).await.unwrap();
	assert_eq!(unlock.location(), Some("/login/"));
	assert!(!classify_unlock_response(unlock.status(), unlock.location()).is_unlocked());
}

#[tokio::test]
async fn head_probe_detects_a_live_endpoint() {
	let base = serve().await;
	let monitor = ConnectivityMonitor::new(Arc::new(ReqwestTransport::new().unwrap()), base.join("probe").unwrap());
	assert!(monitor.check_now().await);
}

#[tokio::test]
async fn per_request_timeout_is_reported_as_timeout() {
	let base = serve().await;
	let transport = ReqwestTransport::new().unwrap();

	let request = HttpRequest::get(base.join("slow").unwrap()).with_timeout(Duration::from_millis(100));
	let err = transport.send(&request).await.unwrap_err();
	assert!(matches!(err, TransportError::Timeout(_)), "{err:?}");
}
