//! Black-box scenarios from spec §8 that need more than one module in
//! concert: single-flight admission across real OS threads (S4), TTL
//! eviction (S5), and the ACL boundary expressed as real status codes
//! (S6) — driven through `tower::ServiceExt::oneshot` against the
//! `axum::Router` where that's the natural boundary, and through
//! `QueryCache` directly where the scenario is about cache mechanics
//! rather than HTTP.

use jdbcx::acl::ServerAcl;
use jdbcx::cache::{QueryCache, QueryInfo, QueryState};
use jdbcx::compress::Compression;
use jdbcx::config::ConfigManager;
use jdbcx::extension::Registry;
use jdbcx::serialize::Format;
use jdbcx::server::{router, AppState};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn test_state(acl: ServerAcl) -> AppState {
    AppState::new(
        Registry::with_builtins(),
        QueryCache::new(100, Duration::from_secs(10)),
        acl,
        ConfigManager::load(None, HashMap::new()).unwrap(),
    )
}

/// S4: two callers admitting the same `qid` concurrently only ever run
/// the producing closure once, and both observe the same `QueryInfo`.
#[test]
fn s4_scenario_single_flight_runs_producer_once_under_concurrent_admission() {
    let cache = Arc::new(QueryCache::new(100, Duration::from_secs(10)));
    let runs = Arc::new(AtomicUsize::new(0));

    let spawn_admit = |cache: Arc<QueryCache>, runs: Arc<AtomicUsize>| {
        std::thread::spawn(move || {
            cache.admit("xyz".to_string(), || {
                runs.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                QueryInfo::new("xyz", "sleep(5000);select 1", Format::Csv, Compression::None)
            })
        })
    };

    let t1 = spawn_admit(cache.clone(), runs.clone());
    let t2 = spawn_admit(cache.clone(), runs.clone());
    let (first, _) = t1.join().unwrap();
    let (second, _) = t2.join().unwrap();

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&first, &second));
}

/// S5: a TTL'd entry that's never fetched disappears from the cache once
/// its TTL elapses, and `close()` ran exactly once via the eviction
/// listener.
#[test]
fn s5_scenario_ttl_eviction_closes_exactly_once() {
    let cache = QueryCache::new(100, Duration::from_millis(50));
    let closes = Arc::new(AtomicUsize::new(0));
    let closes2 = closes.clone();

    let (info, _) = cache.admit("ttl-qid".to_string(), || {
        QueryInfo::new("ttl-qid", "select 1", Format::Csv, Compression::None)
    });
    info.set_resources(vec![Arc::new(move || {
        closes2.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })])
    .unwrap();
    drop(info);

    std::thread::sleep(Duration::from_millis(120));
    cache.run_pending_tasks();

    assert!(cache.get("ttl-qid").is_none());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

/// S6: same ACL boundary, expressed at the HTTP layer — denied IPs get
/// 403, allowed IPs get through to a real response.
#[tokio::test]
async fn s6_scenario_acl_boundary_yields_403_or_200_by_client_ip() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let acl = ServerAcl::new().with_cidr_ranges(&["192.168.0.0/16".to_string()]);
    let app = router(test_state(acl));

    let denied_ip: IpAddr = "10.0.0.5".parse().unwrap();
    let denied_addr = SocketAddr::new(denied_ip, 12345);
    let request = Request::builder()
        .method("GET")
        .uri("/?q=select+1&m=d")
        .extension(axum::extract::ConnectInfo(denied_addr))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let allowed_ip: IpAddr = "192.168.1.7".parse().unwrap();
    let allowed_addr = SocketAddr::new(allowed_ip, 12345);
    let request = Request::builder()
        .method("GET")
        .uri("/?q=select+1&m=d")
        .extension(axum::extract::ConnectInfo(allowed_addr))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// Status probe: a direct-mode request runs the producer inline (awaited
/// before the response is sent), so a HEAD probe against the same `qid`
/// afterward reports the entry as ready without any polling.
#[tokio::test]
async fn head_probe_reports_ready_after_a_direct_mode_run() {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    let app = router(test_state(ServerAcl::new()));
    let run = Request::builder()
        .method("GET")
        .uri("/?q=select+1&m=d&qid=probe-me")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(run).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let probe = Request::builder()
        .method("HEAD")
        .uri("/probe-me.csv")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(probe).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn query_state_ready_is_reachable_via_public_cache_api() {
    let cache = QueryCache::new(10, Duration::from_secs(10));
    let (info, _) = cache.admit("s".to_string(), || {
        QueryInfo::new("s", "select 1", Format::Csv, Compression::None)
    });
    assert_eq!(info.state(), QueryState::New);
    info.transition(QueryState::Running);
    assert_eq!(info.state(), QueryState::Running);
}
