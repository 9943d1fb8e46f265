//! Directory behaviour end to end: routing priority, host scoping,
//! expiration and timer coalescing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use dynamic_namespaces::namespace::{
    BoxError, Channel, ChannelDirectory, DirectoryOptions, Resolution, Retirement, SetupState,
};
use dynamic_namespaces::net::Connection;
use dynamic_namespaces::routing::{HostRule, MatchInfo, NameRule, Setup, StandardNormalizer};

mod common;
use common::MockConnection;

fn directory() -> ChannelDirectory {
    ChannelDirectory::new(DirectoryOptions::default())
}

/// Init callback that records which rule ran, and for which channel.
fn tagged(
    log: &Arc<Mutex<Vec<(&'static str, String)>>>,
    tag: &'static str,
) -> impl Fn(&Arc<Channel>, &MatchInfo) -> Result<Setup, BoxError> {
    let log = Arc::clone(log);
    move |channel: &Arc<Channel>, _: &MatchInfo| {
        log.lock().push((tag, channel.full_name().to_string()));
        Ok(Setup::Accept)
    }
}

#[test]
fn exact_rule_beats_pattern() {
    let directory = directory();
    let log = Arc::new(Mutex::new(Vec::new()));
    directory.register_rule(NameRule::pattern("^/a").unwrap(), tagged(&log, "pattern")).unwrap();
    directory.register_rule("/a", tagged(&log, "exact")).unwrap();

    directory.resolve_channel("/a", None, Resolution::Auto).unwrap().unwrap();
    assert_eq!(*log.lock(), vec![("exact", "/a".to_string())]);
}

#[test]
fn newest_pattern_wins() {
    let directory = directory();
    let log = Arc::new(Mutex::new(Vec::new()));
    directory.register_rule(NameRule::pattern("^/dyn/").unwrap(), tagged(&log, "p1")).unwrap();
    directory.register_rule(NameRule::pattern("^/dyn/x").unwrap(), tagged(&log, "p2")).unwrap();

    directory.resolve_channel("/dyn/x", None, Resolution::Auto).unwrap().unwrap();
    directory.resolve_channel("/dyn/y", None, Resolution::Auto).unwrap().unwrap();
    assert_eq!(
        *log.lock(),
        vec![("p2", "/dyn/x".to_string()), ("p1", "/dyn/y".to_string())]
    );
}

#[test]
fn hello_and_howdy() {
    let directory = directory();
    let log = Arc::new(Mutex::new(Vec::new()));
    directory.register_rule("/hello", tagged(&log, "exact")).unwrap();
    directory.register_rule(NameRule::pattern(r"^/.*h.*$").unwrap(), tagged(&log, "pattern")).unwrap();

    let hello = directory.resolve_channel("/hello", None, Resolution::Auto).unwrap().unwrap();
    directory.resolve_channel("/howdy", None, Resolution::Auto).unwrap().unwrap();
    let again = directory.resolve_channel("/hello", None, Resolution::Auto).unwrap().unwrap();

    assert!(Arc::ptr_eq(&hello, &again));
    assert_eq!(
        *log.lock(),
        vec![("exact", "/hello".to_string()), ("pattern", "/howdy".to_string())]
    );
}

#[test]
fn repeated_resolution_never_duplicates() {
    let directory = directory();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    directory
        .register_rule("*", move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Setup::Accept)
        })
        .unwrap();
    // The catch-all back-filled the default channel.
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    for _ in 0..3 {
        for name in ["/a", "a", "/b"] {
            directory.resolve_channel(name, None, Resolution::Auto).unwrap().unwrap();
            directory.resolve_channel(name, Some("h.com"), Resolution::Auto).unwrap().unwrap();
        }
    }

    let mut names: Vec<_> = directory.channels().iter().map(|c| c.full_name().to_string()).collect();
    names.sort();
    assert_eq!(names, vec!["/", "//h.com/a", "//h.com/b", "/a", "/b"]);
    assert_eq!(calls.load(Ordering::SeqCst), 5);
}

#[test]
fn main_host_with_port_resolves_host_agnostic() {
    let directory = ChannelDirectory::new(
        DirectoryOptions::default()
            .with_main_host(HostRule::exact("example.com"))
            .with_normalizer(Arc::new(StandardNormalizer::new(true))),
    );
    directory.register_rule("/room", |_, _| Ok(Setup::Accept)).unwrap();

    let conn = MockConnection::new(Some("example.com:8080"));
    let mut session = directory.on_connection_arrived(conn.clone()).unwrap();
    session.connect("/room").unwrap();

    assert!(directory.contains("/room"));
    assert_eq!(directory.get("/room").unwrap().connection_ids(), vec![conn.id()]);
    assert_eq!(*conn.connected.lock(), vec!["/".to_string(), "/room".to_string()]);
}

#[test]
fn other_hosts_get_scoped_channels() {
    let directory = ChannelDirectory::new(
        DirectoryOptions::default().with_main_host(HostRule::exact("example.com")),
    );
    directory.register_rule(NameRule::pattern("/room$").unwrap(), |_, _| Ok(Setup::Accept)).unwrap();

    let conn = MockConnection::new(Some("Other.COM"));
    let mut session = directory.on_connection_arrived(conn.clone()).unwrap();
    session.connect("/room").unwrap();

    assert!(directory.contains("//other.com/room"));
    assert!(!directory.contains("/room"));
    // No rule covers "//other.com/", so the default channel was refused.
    assert_eq!(conn.errors.lock()[0], ("/".to_string(), "Invalid namespace".to_string()));
}

#[tokio::test(start_paused = true)]
async fn retired_channel_expires_and_permanent_one_stays() {
    let directory = directory();
    directory
        .register_rule_with_retirement(NameRule::pattern("^/dyn/").unwrap(), Retirement::from_millis(50), |_, _| {
            Ok(Setup::Accept)
        })
        .unwrap();
    let permanent = directory.of("/permanent", None).unwrap().unwrap();
    let dynamic = directory.resolve_channel("/dyn/x", None, Resolution::Auto).unwrap().unwrap();

    let expired = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&expired);
    dynamic.on_expire(move |channel| {
        sink.lock().push(channel.full_name().to_string());
        Ok(())
    });

    let conn = MockConnection::new(None);
    dynamic.attach(conn.clone()).unwrap();
    permanent.attach(conn.clone()).unwrap();
    dynamic.detach(conn.id());
    permanent.detach(conn.id());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!directory.contains("/dyn/x"));
    assert!(dynamic.is_expired());
    assert_eq!(*expired.lock(), vec!["/dyn/x".to_string()]);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(directory.contains("/permanent"));
    assert_eq!(permanent.connection_count(), 0);
    assert_eq!(expired.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reattach_cancels_countdown() {
    let directory = ChannelDirectory::new(DirectoryOptions::default().with_retirement(Retirement::from_millis(100)));
    directory.register_rule("/room", |_, _| Ok(Setup::Accept)).unwrap();
    let room = directory.resolve_channel("/room", None, Resolution::Auto).unwrap().unwrap();
    let conn = MockConnection::new(None);

    room.attach(conn.clone()).unwrap();
    room.detach(conn.id());
    assert!(room.expiration().is_some());

    tokio::time::sleep(Duration::from_millis(50)).await;
    room.attach(conn.clone()).unwrap();
    assert_eq!(room.expiration(), None);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(directory.contains("/room"));

    let detached_at = tokio::time::Instant::now();
    room.detach(conn.id());
    assert_eq!(room.expiration(), Some(detached_at + Duration::from_millis(100)));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!directory.contains("/room"));
}

#[tokio::test(start_paused = true)]
async fn one_timer_armed_for_earliest_deadline() {
    let directory = directory();
    for (name, ms) in [("/slow", 300), ("/medium", 200), ("/fast", 100)] {
        directory
            .register_rule_with_retirement(name, Retirement::from_millis(ms), |_, _| Ok(Setup::Accept))
            .unwrap();
    }

    let conn = MockConnection::new(None);
    let start = tokio::time::Instant::now();
    let mut deadlines = Vec::new();
    for name in ["/slow", "/medium", "/fast"] {
        let channel = directory.resolve_channel(name, None, Resolution::Auto).unwrap().unwrap();
        channel.attach(conn.clone()).unwrap();
        channel.detach(conn.id());
        deadlines.push(directory.pending_cleanup());
    }
    assert_eq!(
        deadlines,
        vec![
            Some(start + Duration::from_millis(300)),
            Some(start + Duration::from_millis(200)),
            Some(start + Duration::from_millis(100)),
        ]
    );

    // Each sweep evicts one channel and re-arms for the next deadline.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!directory.contains("/fast"));
    assert_eq!(directory.pending_cleanup(), Some(start + Duration::from_millis(200)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!directory.contains("/medium"));
    assert_eq!(directory.pending_cleanup(), Some(start + Duration::from_millis(300)));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!directory.contains("/slow"));
    assert_eq!(directory.pending_cleanup(), None);
}

#[tokio::test(start_paused = true)]
async fn later_deadline_does_not_replace_pending_timer() {
    let directory = directory();
    directory.register_rule_with_retirement("/fast", Retirement::from_millis(100), |_, _| Ok(Setup::Accept)).unwrap();
    directory.register_rule_with_retirement("/slow", Retirement::from_millis(500), |_, _| Ok(Setup::Accept)).unwrap();

    let conn = MockConnection::new(None);
    let start = tokio::time::Instant::now();
    for name in ["/fast", "/slow"] {
        let channel = directory.resolve_channel(name, None, Resolution::Auto).unwrap().unwrap();
        channel.attach(conn.clone()).unwrap();
        channel.detach(conn.id());
    }
    assert_eq!(directory.pending_cleanup(), Some(start + Duration::from_millis(100)));
}

#[tokio::test(start_paused = true)]
async fn failing_expire_callback_does_not_block_eviction() {
    let directory = directory();
    let fired = Arc::new(Mutex::new(Vec::new()));
    let record = |tag: &'static str| {
        let sink = Arc::clone(&fired);
        move |_: &Arc<Channel>| -> Result<(), BoxError> {
            sink.lock().push(tag);
            Ok(())
        }
    };

    let x = directory.of("/x", None).unwrap().unwrap();
    let y = directory.of("/y", None).unwrap().unwrap();
    for channel in [&x, &y] {
        channel.set_retirement(Retirement::from_millis(10));
    }

    x.on_expire(record("x1"));
    x.on_expire(|_| Err("listener exploded".into()));
    x.on_expire(record("x3"));
    x.on_expire(record("x4"));
    y.on_expire(record("y1"));

    let conn = MockConnection::new(None);
    for channel in [&x, &y] {
        channel.attach(conn.clone()).unwrap();
        channel.detach(conn.id());
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    let mut report = directory.sweep();
    report.expired.sort();
    assert_eq!(report.expired, vec!["/x".to_string(), "/y".to_string()]);
    assert_eq!(report.faults.len(), 1);
    assert!(!directory.contains("/x"));
    assert!(!directory.contains("/y"));

    // Per channel, callbacks run in registration order and skip none.
    let fired = fired.lock();
    let of_x: Vec<_> = fired.iter().copied().filter(|tag| tag.starts_with('x')).collect();
    assert_eq!(of_x, vec!["x1", "x3", "x4"]);
    assert!(fired.contains(&"y1"));
    assert_eq!(x.setup_state(), SetupState::Unset);
}
