use digtool::adapters::probes::gravatar::email_hash;
use digtool::adapters::probes::{
    AdobeProbe, GoogleProbe, GravatarProbe, SiteTemplate, SiteTemplateProbe,
};
use digtool::{HttpClient, Probe, ProbePolicy};
use httpmock::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn client() -> Arc<HttpClient> {
    let policy = ProbePolicy {
        timeout: Duration::from_secs(2),
        rate_limit: Duration::ZERO,
        user_agent: "digtool-test/1.0".to_string(),
        max_retries: 0,
    };
    Arc::new(HttpClient::new(Arc::new(policy)).unwrap())
}

#[tokio::test]
async fn test_gravatar_avatar_present() {
    let server = MockServer::start();
    let hash = email_hash("test@example.com");

    let avatar_mock = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/avatar/{}", hash))
            .query_param("d", "404");
        then.status(200)
            .header("Content-Type", "image/png")
            .body("\u{89}PNG");
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/{}.json", hash));
        then.status(404);
    });

    let probe = GravatarProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("test@example.com").await;

    avatar_mock.assert();
    assert_eq!(result.found(), Some(true));
    assert!(result.error().is_none());
    let data = result.data().unwrap();
    assert_eq!(data["avatar_url"], format!("{}/avatar/{}", server.base_url(), hash));
    assert_eq!(data["email_hash"], hash);
    assert!(data.get("display_name").is_none());
}

#[tokio::test]
async fn test_gravatar_normalizes_before_hashing() {
    let server = MockServer::start();
    let hash = email_hash("test@example.com");

    let avatar_mock = server.mock(|when, then| {
        when.method(GET).path(format!("/avatar/{}", hash));
        then.status(404);
    });

    let probe = GravatarProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("  TEST@Example.com ").await;

    avatar_mock.assert();
    assert_eq!(result.found(), Some(false));
    assert!(result.error().is_none());
}

#[tokio::test]
async fn test_gravatar_hit_enriched_with_profile() {
    let server = MockServer::start();
    let hash = email_hash("jane@example.com");

    server.mock(|when, then| {
        when.method(GET).path(format!("/avatar/{}", hash));
        then.status(200).header("Content-Type", "image/jpeg").body("jpg");
    });
    let profile_mock = server.mock(|when, then| {
        when.method(GET).path(format!("/{}.json", hash));
        then.status(200).json_body(serde_json::json!({
            "entry": [{
                "displayName": "Jane Doe",
                "preferredUsername": "jane",
                "accounts": [{"url": "https://github.com/jane"}]
            }]
        }));
    });

    let probe = GravatarProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("jane@example.com").await;

    profile_mock.assert();
    let data = result.data().unwrap();
    assert_eq!(data["display_name"], "Jane Doe");
    assert_eq!(data["username"], "jane");
    assert_eq!(data["accounts"][0], "https://github.com/jane");
}

#[tokio::test]
async fn test_gravatar_malformed_profile_falls_back() {
    let server = MockServer::start();
    let hash = email_hash("jane@example.com");

    server.mock(|when, then| {
        when.method(GET).path(format!("/avatar/{}", hash));
        then.status(200).header("Content-Type", "image/png").body("png");
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/{}.json", hash));
        then.status(200).body("<html>not json</html>");
    });

    let probe = GravatarProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("jane@example.com").await;

    assert_eq!(result.found(), Some(true));
    assert!(result.error().is_none());
    assert_eq!(result.evidence(), Some("avatar_found"));
}

#[tokio::test]
async fn test_gravatar_unexpected_status_is_unknown() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path_contains("/avatar/");
        then.status(500);
    });

    let probe = GravatarProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("test@example.com").await;

    assert_eq!(result.found(), None);
    assert_eq!(result.error(), Some("Unexpected status: 500"));
}

#[tokio::test]
async fn test_adobe_not_found_and_found() {
    let server = MockServer::start();

    let mut missing = server.mock(|when, then| {
        when.method(POST)
            .path("/signin/v2/users/accounts")
            .json_body(serde_json::json!({"username": "test@example.com"}));
        then.status(404);
    });

    let probe = AdobeProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("test@example.com").await;
    missing.assert();
    assert_eq!(result.found(), Some(false));
    assert!(result.error().is_none());
    missing.delete();

    server.mock(|when, then| {
        when.method(POST).path("/signin/v2/users/accounts");
        then.status(200).json_body(serde_json::json!([{"type": "individual"}]));
    });

    let result = probe.check("test@example.com").await;
    assert_eq!(result.found(), Some(true));
}

#[tokio::test]
async fn test_google_status_mapping() {
    let server = MockServer::start();
    let lookup = server.mock(|when, then| {
        when.method(POST)
            .path("/v3/signin/_/AccountsSignInUi/data/batchexecute")
            .header("content-type", "application/x-www-form-urlencoded");
        then.status(200).body(")]}'");
    });

    let probe = GoogleProbe::new(client()).with_base_url(server.base_url());
    let result = probe.check("someone@gmail.com").await;

    lookup.assert();
    assert_eq!(result.found(), Some(true));
}

#[tokio::test]
async fn test_site_template_reset_flow_hit() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/account/password/reset");
        then.status(200).body("<form></form>");
    });
    let reset = server.mock(|when, then| {
        when.method(POST)
            .path("/api/password_reset")
            .json_body(serde_json::json!({"email": "a@b.c"}));
        then.status(200)
            .body("<html><body><p>Email sent! Check your inbox.</p></body></html>");
    });
    let profile = server.mock(|when, then| {
        when.method(GET).path("/users/a@b.c");
        then.status(200);
    });

    let site = SiteTemplate::example().with_base_url(server.base_url());
    let probe = SiteTemplateProbe::new(client(), site);
    let result = probe.check("a@b.c").await;

    reset.assert();
    profile.assert_hits(0);
    assert_eq!(result.found(), Some(true));
    assert_eq!(result.evidence(), Some("password_reset_email_sent_message"));
}

#[tokio::test]
async fn test_site_template_falls_back_to_profile_redirect() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/account/password/reset");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/password_reset");
        then.status(429).body("Too many requests");
    });
    server.mock(|when, then| {
        when.method(GET).path("/users/a@b.c");
        then.status(301).header("Location", "/login");
    });

    let site = SiteTemplate::example().with_base_url(server.base_url());
    let probe = SiteTemplateProbe::new(client(), site);
    let result = probe.check("a@b.c").await;

    assert_eq!(result.found(), None);
    assert_eq!(result.evidence(), Some("redirect_301"));
    assert_eq!(result.data().unwrap()["location"], "/login");
}

#[tokio::test]
async fn test_site_template_unreachable_reports_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let site = SiteTemplate::example().with_base_url(format!("http://{}", addr));
    let probe = SiteTemplateProbe::new(client(), site);
    let result = probe.check("a@b.c").await;

    assert_eq!(result.found(), Some(false));
    assert!(result.error().unwrap().starts_with("Network error"));
}
