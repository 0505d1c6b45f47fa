use std::sync::Arc;
use std::thread;
use std::time::Duration;

use host_config::vendor::{redact_url, VENDOR_REGISTRY};
use host_config::{ConnectionFactory, DbConnection, DbVendor, PoolError};

#[test]
fn vendor_is_detected_from_the_url() {
    let cases = [
        ("jdbc:h2:mem:test", DbVendor::H2),
        ("jdbc:mariadb://db:3306/transfer", DbVendor::MariaDb),
        ("jdbc:mysql://db:3306/transfer", DbVendor::MySql),
        ("jdbc:oracle:thin:@db:1521:xe", DbVendor::Oracle),
        ("postgresql://db/transfer", DbVendor::PostgreSql),
        ("JDBC:PostgreSQL://db/transfer", DbVendor::PostgreSql),
        ("sqlite://hostconfig.sqlite", DbVendor::Sqlite),
    ];
    for (url, vendor) in cases {
        let profile = DbVendor::detect(url).expect("known vendor");
        assert_eq!(profile.vendor, vendor, "{url}");
    }
    assert!(VENDOR_REGISTRY.len() >= 5);
}

#[test]
fn unknown_vendor_fails_before_connecting() {
    let factory = ConnectionFactory::new();
    let err = factory
        .initialize("foo://bar", "user", "secret")
        .expect_err("unsupported");
    assert!(matches!(err, PoolError::UnsupportedVendor(_)));
    assert!(!factory.is_initialized());
}

#[test]
fn recognized_vendor_without_driver_is_rejected() {
    let factory = ConnectionFactory::new();
    let err = factory
        .initialize("jdbc:mariadb://db:3306/transfer", "user", "secret")
        .expect_err("no driver");
    match err {
        PoolError::NoDriver(vendor) => assert_eq!(vendor, DbVendor::MariaDb),
        other => panic!("unexpected error {other}"),
    }
    assert!(!factory.is_initialized());
}

#[test]
fn unsupported_vendor_error_hides_credentials() {
    let err = DbVendor::detect("foo://admin:secret@db/x").expect_err("unsupported");
    assert!(!err.to_string().contains("secret"));
    assert_eq!(redact_url("foo://admin:secret@db/x"), "foo://***@db/x");
    assert_eq!(redact_url("sqlite://file.db"), "sqlite://file.db");
}

#[test]
fn connection_before_initialize_is_refused() {
    let factory = ConnectionFactory::new();
    assert!(matches!(
        factory.get_connection(),
        Err(PoolError::Uninitialized)
    ));
}

#[test]
fn sqlite_memory_pool_hands_out_one_connection() {
    let factory = ConnectionFactory::with_acquire_timeout(Duration::from_millis(200));
    factory
        .initialize("sqlite://:memory:", "", "")
        .expect("initialize");
    assert_eq!(factory.vendor(), Some(DbVendor::Sqlite));
    assert_eq!(factory.max_connections(), Some(1));

    let mut conn = factory.get_connection().expect("connection");
    assert_eq!(conn.vendor(), DbVendor::Sqlite);
    match &mut *conn {
        DbConnection::Sqlite(sqlite) => {
            sqlite
                .execute_batch("CREATE TABLE marker (id INTEGER)")
                .expect("create");
        }
        DbConnection::Postgres(_) => panic!("expected sqlite"),
    }
    assert!(matches!(
        factory.get_connection(),
        Err(PoolError::ConnectionUnavailable(_))
    ));
    drop(conn);

    let conn = factory.get_connection().expect("connection returned to pool");
    let DbConnection::Sqlite(sqlite) = &*conn else {
        panic!("expected sqlite");
    };
    let count: i64 = sqlite
        .query_row("SELECT COUNT(*) FROM marker", [], |row| row.get(0))
        .expect("same database");
    assert_eq!(count, 0);
}

#[test]
fn second_initialize_is_ignored() {
    let factory = ConnectionFactory::new();
    factory
        .initialize("sqlite://:memory:", "", "")
        .expect("initialize");
    factory
        .initialize("foo://ignored", "", "")
        .expect("already initialized");
    assert_eq!(factory.vendor(), Some(DbVendor::Sqlite));
}

#[test]
fn close_is_repeatable_and_allows_reinitialize() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("pool.sqlite").display());
    let factory = ConnectionFactory::new();
    factory.initialize(&url, "", "").expect("initialize");
    assert_eq!(factory.max_connections(), Some(50));

    factory.close();
    factory.close();
    assert!(!factory.is_initialized());
    assert!(matches!(
        factory.get_connection(),
        Err(PoolError::Uninitialized)
    ));

    factory.initialize(&url, "", "").expect("reinitialize");
    assert!(factory.get_connection().is_ok());
}

#[test]
fn waiting_acquirer_gets_a_released_connection() {
    let factory = Arc::new(ConnectionFactory::with_acquire_timeout(Duration::from_secs(5)));
    factory
        .initialize("sqlite://:memory:", "", "")
        .expect("initialize");
    let held = factory.get_connection().expect("connection");

    let waiter = {
        let factory = Arc::clone(&factory);
        thread::spawn(move || factory.get_connection().map(|_| ()))
    };
    thread::sleep(Duration::from_millis(50));
    drop(held);

    waiter
        .join()
        .expect("waiter panicked")
        .expect("connection after release");
}

#[test]
fn file_pool_hands_out_concurrent_validated_connections() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("shared.sqlite").display());
    let factory = ConnectionFactory::new();
    factory.initialize(&url, "", "").expect("initialize");

    let first = factory.get_connection().expect("first connection");
    let second = factory.get_connection().expect("second connection");
    let DbConnection::Sqlite(writer) = &*first else {
        panic!("expected sqlite");
    };
    writer
        .execute_batch("CREATE TABLE marker (id INTEGER); INSERT INTO marker VALUES (7);")
        .expect("write");
    let DbConnection::Sqlite(reader) = &*second else {
        panic!("expected sqlite");
    };
    let id: i64 = reader
        .query_row("SELECT id FROM marker", [], |row| row.get(0))
        .expect("same file");
    assert_eq!(id, 7);
}

#[test]
fn zero_acquire_timeout_still_builds_a_pool() {
    let factory = ConnectionFactory::with_acquire_timeout(Duration::ZERO);
    factory
        .initialize("sqlite://:memory:", "", "")
        .expect("initialize");
    assert_eq!(factory.max_connections(), Some(1));
}
