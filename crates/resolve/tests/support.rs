#![allow(dead_code)] // not every test binary uses every fixture

//! Loopback servers standing in for remote instances.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use axum::routing::get;
use axum::Router;
use fedifinder_resolve::{CandidateDomain, ClientConfig, Resolver, ResolverConfig};
use fedifinder_store::{InstanceRecord, InstanceStore};
use serde_json::json;
use tokio::net::TcpListener;

/// A loopback server plus its request counter.
pub struct Fixture {
    pub authority: String,
    hits: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Bind an ephemeral loopback port, then build the router against the final
/// authority so fixtures can link back to themselves.
pub async fn spawn_fixture(build: impl FnOnce(String, Arc<AtomicUsize>) -> Router) -> Fixture {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let authority = format!(
        "127.0.0.1:{}",
        listener.local_addr().expect("local addr").port()
    );
    let hits = Arc::new(AtomicUsize::new(0));
    let router = build(authority.clone(), hits.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve fixture");
    });
    Fixture { authority, hits }
}

/// Serve `body` as JSON on `path`, counting every request.
pub fn json_route(router: Router, path: &str, hits: Arc<AtomicUsize>, body: String) -> Router {
    router.route(
        path,
        get(move || {
            let hits = hits.clone();
            let body = body.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                ([(header::CONTENT_TYPE, "application/json")], body)
            }
        }),
    )
}

pub fn wellknown_body(authority: &str) -> String {
    json!({
        "links": [{
            "rel": "http://nodeinfo.diaspora.software/ns/schema/2.0",
            "href": format!("http://{authority}/nodeinfo/2.0")
        }]
    })
    .to_string()
}

pub fn nodeinfo_body(software: &str, users_total: u64) -> String {
    json!({
        "version": "2.0",
        "software": {"name": software, "version": "4.2.1"},
        "usage": {
            "users": {"total": users_total, "activeMonth": 80, "activeHalfyear": 200},
            "localPosts": 1234
        },
        "openRegistrations": false
    })
    .to_string()
}

/// A healthy federated instance serving both discovery steps.
pub async fn federated_host(software: &'static str) -> Fixture {
    spawn_fixture(move |authority, hits| {
        let router = json_route(
            Router::new(),
            "/.well-known/nodeinfo",
            hits.clone(),
            wellknown_body(&authority),
        );
        json_route(router, "/nodeinfo/2.0", hits, nodeinfo_body(software, 100))
    })
    .await
}

/// A federated instance whose reported user count changes on every info
/// fetch, so replaced records are distinguishable from cached ones.
pub async fn counting_federated_host() -> Fixture {
    spawn_fixture(|authority, hits| {
        let router = json_route(
            Router::new(),
            "/.well-known/nodeinfo",
            hits.clone(),
            wellknown_body(&authority),
        );
        router.route(
            "/nodeinfo/2.0",
            get(move || {
                let hits = hits.clone();
                async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst) as u64;
                    (
                        [(header::CONTENT_TYPE, "application/json")],
                        nodeinfo_body("mastodon", 100 + n),
                    )
                }
            }),
        )
    })
    .await
}

/// Answer every path with `status` and an empty body.
pub async fn status_host(status: StatusCode) -> Fixture {
    spawn_fixture(move |_authority, hits| {
        Router::new().fallback(move || {
            let hits = hits.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                status
            }
        })
    })
    .await
}

/// Well-known endpoint that 302s to itself forever.
pub async fn redirect_loop_host() -> Fixture {
    spawn_fixture(|authority, hits| {
        let target = format!("http://{authority}/.well-known/nodeinfo");
        Router::new().route(
            "/.well-known/nodeinfo",
            get(move || {
                let hits = hits.clone();
                let target = target.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::FOUND, [(header::LOCATION, target)])
                }
            }),
        )
    })
    .await
}

/// An authority nothing listens on.
pub async fn refused_authority() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback");
    let authority = format!(
        "127.0.0.1:{}",
        listener.local_addr().expect("local addr").port()
    );
    drop(listener);
    authority
}

/// Plain-http client settings pointing probes at loopback fixtures.
pub fn loopback_config() -> ResolverConfig {
    ResolverConfig {
        client: ClientConfig {
            timeout: Duration::from_secs(2),
            tls_only: false,
        },
        ..ResolverConfig::default()
    }
}

pub fn resolver_for(store: Arc<dyn InstanceStore>) -> Resolver {
    Resolver::new(store, loopback_config()).expect("build resolver")
}

/// Run a single candidate through the batch path.
pub async fn resolve_one(resolver: &Resolver, candidate: CandidateDomain) -> InstanceRecord {
    let mut rx = resolver.resolve_batch(vec![candidate]);
    rx.recv().await.expect("one record")
}

/// Drain a batch receiver to completion.
pub async fn collect(
    mut rx: tokio::sync::mpsc::Receiver<InstanceRecord>,
) -> Vec<InstanceRecord> {
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    records
}
