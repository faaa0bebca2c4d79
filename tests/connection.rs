use std::sync::atomic::{AtomicUsize, Ordering};

use mybind::driver::DriverLibrary;
use mybind::driver::memory::{MemoryConnector, MemoryDriver, Script};
use mybind::prelude::*;
use pretty_assertions::assert_eq;

static TEARDOWNS: AtomicUsize = AtomicUsize::new(0);
static LIBRARY: DriverLibrary = DriverLibrary::new(
    || Ok(()),
    || {
        TEARDOWNS.fetch_add(1, Ordering::SeqCst);
    },
);

#[test]
fn test_library_lives_while_connections_do() {
    let server = MemoryConnector::with_library(&LIBRARY);
    let first: Connection<MemoryDriver> = Connection::open(&server, "host=a").unwrap();
    let second: Connection<MemoryDriver> = Connection::open(&server, "host=b").unwrap();
    assert_eq!(LIBRARY.live(), 2);

    first.close();
    assert_eq!(LIBRARY.live(), 1);
    assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 0);

    drop(second);
    assert_eq!(LIBRARY.live(), 0);
    assert_eq!(TEARDOWNS.load(Ordering::SeqCst), 1);
}

#[test]
fn test_failed_connect_releases_library() {
    static REFUSED: DriverLibrary = DriverLibrary::new(|| Ok(()), || {});
    let server = MemoryConnector::with_library(&REFUSED);
    server.refuse(DriverError::new(2003, "Can't connect to MySQL server on 'db'"));

    let err = Connection::open(&server, "Server=db").unwrap_err();
    assert_eq!(err.to_string(), "Can't connect to MySQL server on 'db'");
    assert_eq!(REFUSED.live(), 0);
}

#[test]
fn test_charset_sets_names() {
    let server = MemoryConnector::new();
    let conn = Connection::open(&server, "Server=db;Character Set=utf8mb4").unwrap();
    assert_eq!(conn.options().charset.as_deref(), Some("utf8mb4"));

    let executions = server.executions();
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].sql, "SET NAMES utf8mb4");
}

#[test]
fn test_connection_string_reaches_driver() {
    let server = MemoryConnector::new();
    let _conn = Connection::open(
        &server,
        "Data Source=db.internal; Port=3307; User Name=app; Password=pw; Initial Catalog=shop",
    )
    .unwrap();

    let options = &server.connections()[0];
    assert_eq!(options.host.as_deref(), Some("db.internal"));
    assert_eq!(options.port, Some(3307));
    assert_eq!(options.user.as_deref(), Some("app"));
    assert_eq!(options.password.as_deref(), Some("pw"));
    assert_eq!(server.database().as_deref(), Some("shop"));
}

#[test]
fn test_malformed_connection_string() {
    let server = MemoryConnector::new();
    let err = Connection::open(&server, "Server=db;oops").unwrap_err();
    assert!(matches!(err, BindError::Parse { position: 14, .. }));
    assert!(server.connections().is_empty());
}

#[test]
fn test_ping_and_change_database() {
    let server = MemoryConnector::new();
    let mut conn = Connection::open(&server, "Server=db;Database=shop").unwrap();
    conn.ping().unwrap();
    conn.change_database("audit").unwrap();
    assert_eq!(server.pings(), 1);
    assert_eq!(server.database().as_deref(), Some("audit"));
    assert_eq!(conn.options().database.as_deref(), Some("audit"));

    assert!(matches!(conn.change_database(""), Err(BindError::Driver(_))));
}

#[test]
fn test_open_from_config() {
    let server = MemoryConnector::new();
    let config = ClientConfig::builder()
        .connection_string("Server=db;Uid=app")
        .port(3308)
        .build();
    let conn = Connection::from_config(&server, &config).unwrap();
    assert_eq!(conn.options().port, Some(3308));
    assert_eq!(server.connections()[0].user.as_deref(), Some("app"));
}

#[test]
fn test_execute_non_query_with_values() {
    let server = MemoryConnector::new();
    server.script("DELETE FROM s WHERE at < ?", Script::new().affected(12));
    let mut conn = Connection::open(&server, "Server=db").unwrap();
    let cutoff = CalendarTime::from_ymd(2020, 1, 1).unwrap();

    let n = conn
        .execute_non_query_with("DELETE FROM s WHERE at < ?", params![cutoff])
        .unwrap();
    assert_eq!(n, 12);
    assert_eq!(server.executions()[0].params, vec![Value::DateTime(cutoff)]);
}
