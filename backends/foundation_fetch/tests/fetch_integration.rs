//! Fetch engine integration tests using foundation_testing::TestHttpServer.
//!
//! WHY: Validates the fetcher against a real HTTP server (no mocks), so framing,
//! keep-alive reuse and redirect handling are exercised over actual sockets.
//!
//! WHAT: Integration tests for redirects, caching, connection pooling, body
//! framing and error handling.
//!
//! HOW: Each test starts its own TestHttpServer and uses the server's request
//! and connection counters to observe what went over the wire.

use foundation_fetch::{
    CodecError, Endpoint, FetchConfig, FetchError, HttpFetcher, Resource, StaticSocketAddr,
};
use foundation_testing::http::{HttpRequest, HttpResponse, TestHttpServer};
use ntest::timeout;
use std::sync::{Arc, Mutex};
use tracing_test::traced_test;

fn endpoint(server: &TestHttpServer, path: &str) -> Endpoint {
    Endpoint::parse(&server.url(path)).unwrap()
}

/// Serves `/hop/N` as a redirect to `/hop/N+1` until `N == redirects`, then "Final".
fn hop_server(redirects: usize) -> TestHttpServer {
    TestHttpServer::with_response(move |req: &HttpRequest| {
        let hop: usize = req
            .path
            .strip_prefix("/hop/")
            .and_then(|n| n.parse().ok())
            .unwrap_or(0);
        if hop < redirects {
            HttpResponse::redirect(&format!("/hop/{}", hop + 1))
        } else {
            HttpResponse::ok("Final")
        }
    })
}

// ========================================================================
// Redirects
// ========================================================================

/// WHY: Root-relative redirects must be followed to the final body
/// WHAT: /step1 -> /step2 -> /step3 (200 "Final") resolves to "Final"
#[test]
#[traced_test]
fn test_redirect_chain_resolves_final_body() {
    let server = TestHttpServer::with_response(|req: &HttpRequest| match req.path.as_str() {
        "/step1" => HttpResponse::redirect("/step2"),
        "/step2" => HttpResponse::redirect("/step3"),
        "/step3" => HttpResponse::ok("Final"),
        _ => HttpResponse::status(404, "Not Found"),
    });
    let fetcher = HttpFetcher::new();

    let body = fetcher.fetch(&endpoint(&server, "/step1")).unwrap();

    assert_eq!(body, "Final");
    assert_eq!(server.request_count(), 3);
    assert!(logs_contain("Redirect 1"));
    assert!(logs_contain("Redirect 2"));
}

/// WHY: The hop bound counts exchanges, so ten exchanges may still end in success
#[test]
#[timeout(10000)]
fn test_nine_redirects_fit_within_bound() {
    let server = hop_server(9);
    let fetcher = HttpFetcher::new();

    assert_eq!(fetcher.fetch(&endpoint(&server, "/hop/0")).unwrap(), "Final");
    assert_eq!(server.request_count(), 10);
}

/// WHY: Redirect loops must terminate with an identifiable error
/// WHAT: A chain of 11 hops fails after exactly 10 exchanges
#[test]
#[timeout(10000)]
fn test_eleven_hop_chain_hits_redirect_limit() {
    let server = hop_server(11);
    let fetcher = HttpFetcher::new();

    let err = fetcher.fetch(&endpoint(&server, "/hop/0")).unwrap_err();

    assert!(err.is_redirect_limit());
    assert!(err.to_string().contains("redirect"));
    assert!(err.to_string().contains("10"));
    assert_eq!(server.request_count(), 10);
}

#[test]
#[timeout(10000)]
fn test_configured_redirect_bound() {
    let server = hop_server(3);
    let fetcher = HttpFetcher::new().with_config(FetchConfig {
        max_redirects: 3,
        ..FetchConfig::default()
    });

    let err = fetcher.fetch(&endpoint(&server, "/hop/0")).unwrap_err();
    assert!(matches!(err, FetchError::TooManyRedirects(3)));
}

/// WHY: A redirect without a target cannot be followed
/// WHAT: 3xx without Location fails with an error naming "Location"
#[test]
#[timeout(10000)]
fn test_missing_location_fails() {
    let server = TestHttpServer::with_response(|_req| HttpResponse::status(301, "Moved"));
    let fetcher = HttpFetcher::new();

    let err = fetcher.fetch(&endpoint(&server, "/")).unwrap_err();

    assert!(matches!(err, FetchError::MissingLocation { status: 301 }));
    assert!(err.to_string().contains("Location"));
}

#[test]
#[timeout(10000)]
fn test_relative_location_is_unsupported() {
    let server = TestHttpServer::with_response(|_req| HttpResponse::redirect("next-page"));
    let fetcher = HttpFetcher::new();

    let err = fetcher.fetch(&endpoint(&server, "/dir/page")).unwrap_err();
    assert!(matches!(err, FetchError::UnsupportedLocation(location) if location == "next-page"));
}

/// WHY: Absolute Location URLs switch host; the resolver decides where that lands
/// WHAT: A redirect to a named host reaches the local server through StaticSocketAddr
#[test]
#[timeout(10000)]
fn test_absolute_location_via_static_resolver() {
    let hosts = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&hosts);
    let server = TestHttpServer::with_response(move |req: &HttpRequest| {
        seen.lock()
            .unwrap()
            .push(req.header("host").unwrap_or_default().to_string());
        if req.path.starts_with("/start/") {
            let port = req.path.trim_start_matches("/start/");
            HttpResponse::redirect(&format!("http://elsewhere.test:{port}/final"))
        } else {
            HttpResponse::ok("Elsewhere")
        }
    });
    let resolver = StaticSocketAddr::new(server.address().parse().unwrap());
    let fetcher = HttpFetcher::with_resolver(resolver);

    let port = server.port();
    let start = Endpoint::parse(&format!("http://origin.test:{port}/start/{port}")).unwrap();
    assert_eq!(fetcher.fetch(&start).unwrap(), "Elsewhere");

    assert_eq!(*hosts.lock().unwrap(), vec!["origin.test", "elsewhere.test"]);
    assert_eq!(fetcher.pool().idle_count(&format!("elsewhere.test:{port}")), 1);
}

// ========================================================================
// Caching
// ========================================================================

/// WHY: A warm cache must answer without touching the network
/// WHAT: The second identical fetch returns the same body with no new request
#[test]
#[timeout(10000)]
fn test_warm_cache_performs_no_network_exchange() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::ok("cached body").with_header("Cache-Control", "max-age=60")
    });
    let fetcher = HttpFetcher::new();
    let target = endpoint(&server, "/page");

    let first = fetcher.fetch(&target).unwrap();
    assert_eq!(server.request_count(), 1);

    let second = fetcher.fetch(&target).unwrap();
    assert_eq!(second, first);
    assert_eq!(server.request_count(), 1);
}

#[test]
#[timeout(10000)]
fn test_no_store_is_refetched() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::ok("fresh").with_header("Cache-Control", "no-store")
    });
    let fetcher = HttpFetcher::new();
    let target = endpoint(&server, "/");

    fetcher.fetch(&target).unwrap();
    fetcher.fetch(&target).unwrap();

    assert_eq!(server.request_count(), 2);
    assert!(fetcher.cache().is_empty());
}

/// WHY: Unknown directives make the response ineligible for caching
#[test]
#[traced_test]
fn test_unrecognized_directive_is_not_cached() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::ok("private").with_header("Cache-Control", "private, max-age=60")
    });
    let fetcher = HttpFetcher::new();

    fetcher.fetch(&endpoint(&server, "/")).unwrap();

    assert!(fetcher.cache().is_empty());
    assert!(logs_contain("unsupported directive"));
}

#[test]
#[timeout(10000)]
fn test_non_200_final_response_is_returned_but_not_cached() {
    let server = TestHttpServer::with_response(|_req| {
        let mut response = HttpResponse::status(404, "Not Found");
        response.body = b"missing".to_vec();
        response
    });
    let fetcher = HttpFetcher::new();

    assert_eq!(fetcher.fetch(&endpoint(&server, "/gone")).unwrap(), "missing");
    assert!(fetcher.cache().is_empty());
}

/// WHY: After a redirect the body is stored under the endpoint the caller asked for
/// WHAT: The original URL hits the cache; the final URL does not
#[test]
#[timeout(10000)]
fn test_redirected_response_cached_under_original_endpoint() {
    let server = TestHttpServer::with_response(|req: &HttpRequest| {
        if req.path == "/old" {
            HttpResponse::redirect("/new")
        } else {
            HttpResponse::ok("moved content")
        }
    });
    let fetcher = HttpFetcher::new();
    let old = endpoint(&server, "/old");
    let new = endpoint(&server, "/new");

    fetcher.fetch(&old).unwrap();

    assert!(fetcher.cache().lookup(&old.cache_key()).is_some());
    assert!(fetcher.cache().lookup(&new.cache_key()).is_none());
    assert_eq!(fetcher.cache().len(), 1);
}

// ========================================================================
// Connection reuse and framing
// ========================================================================

/// WHY: Keep-alive connections must be reused across fetches
/// WHAT: Three fetches to one address share a single TCP connection
#[test]
#[timeout(10000)]
fn test_keep_alive_reuses_one_connection() {
    let server = TestHttpServer::with_response(|req: &HttpRequest| {
        HttpResponse::ok(req.path.clone()).with_header("Cache-Control", "no-store")
    });
    let fetcher = HttpFetcher::new();

    for path in ["/a", "/b", "/c"] {
        assert_eq!(fetcher.fetch(&endpoint(&server, path)).unwrap(), path);
    }

    assert_eq!(server.request_count(), 3);
    assert_eq!(server.connection_count(), 1);
    assert_eq!(fetcher.pool().idle_count(server.address()), 1);
}

/// WHY: Chunked bodies must be reassembled and leave the connection reusable
#[test]
#[timeout(10000)]
fn test_chunked_body_over_the_wire() {
    let server = TestHttpServer::with_response(|_req| HttpResponse::chunked(["Hello", " World"]));
    let fetcher = HttpFetcher::new();

    assert_eq!(fetcher.fetch(&endpoint(&server, "/")).unwrap(), "Hello World");
    assert_eq!(fetcher.pool().idle_count(server.address()), 1);
}

/// WHY: A read-until-close body consumes the connection
/// WHAT: The connection is not pooled and the next fetch opens a new one
#[test]
#[timeout(10000)]
fn test_close_delimited_body_is_not_pooled() {
    let server = TestHttpServer::with_response(|req: &HttpRequest| {
        HttpResponse::until_close(format!("tail of {}", req.path))
    });
    let fetcher = HttpFetcher::new();

    assert_eq!(fetcher.fetch(&endpoint(&server, "/1")).unwrap(), "tail of /1");
    assert_eq!(fetcher.pool().idle_count(server.address()), 0);

    assert_eq!(fetcher.fetch(&endpoint(&server, "/2")).unwrap(), "tail of /2");
    assert_eq!(server.connection_count(), 2);
}

#[test]
#[timeout(10000)]
fn test_connection_close_header_is_honoured() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::ok("bye").with_header("Connection", "close")
    });
    let fetcher = HttpFetcher::new();

    assert_eq!(fetcher.fetch(&endpoint(&server, "/")).unwrap(), "bye");
    assert_eq!(fetcher.pool().idle_count(server.address()), 0);
}

#[test]
#[timeout(10000)]
fn test_request_carries_user_agent_and_host() {
    let server = TestHttpServer::with_response(|req: &HttpRequest| {
        HttpResponse::ok(format!(
            "{} {} {}",
            req.method,
            req.header("user-agent").unwrap_or_default(),
            req.header("host").unwrap_or_default()
        ))
    });
    let fetcher = HttpFetcher::new();

    let body = fetcher.fetch(&endpoint(&server, "/")).unwrap();
    assert_eq!(body, "GET EweFetch/1.0 127.0.0.1");
}

// ========================================================================
// Failures
// ========================================================================

/// WHY: A malformed response must fail the fetch and never reach the pool
#[test]
#[traced_test]
fn test_malformed_status_line_fails_and_closes() {
    let server = TestHttpServer::with_response(|_req| HttpResponse::raw("garbage\r\n\r\n"));
    let fetcher = HttpFetcher::new();

    let err = fetcher.fetch(&endpoint(&server, "/")).unwrap_err();

    assert!(matches!(
        err,
        FetchError::Codec {
            source: CodecError::MalformedStatusLine(_),
            ..
        }
    ));
    assert_eq!(fetcher.pool().idle_count(server.address()), 0);
    assert!(logs_contain("closing connection"));
}

/// WHY: A failed fetch never returns a partially read body
#[test]
#[timeout(10000)]
fn test_truncated_body_is_an_error() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::raw("HTTP/1.1 200 OK\r\nContent-Length: 10\r\n\r\nshort")
    });
    let fetcher = HttpFetcher::new();

    let err = fetcher.fetch(&endpoint(&server, "/")).unwrap_err();

    assert!(matches!(
        err,
        FetchError::Codec {
            source: CodecError::Io(_),
            ..
        }
    ));
    assert!(fetcher.cache().is_empty());
}

/// WHY: A peer hanging up inside the headers must not produce an empty success
/// WHAT: The fetch fails and nothing is cached or pooled
#[test]
#[timeout(10000)]
fn test_truncated_headers_fail_and_are_not_cached() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::raw("HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n")
    });
    let fetcher = HttpFetcher::new();

    let err = fetcher.fetch(&endpoint(&server, "/")).unwrap_err();

    assert!(matches!(
        err,
        FetchError::Codec {
            source: CodecError::TruncatedHeaders,
            ..
        }
    ));
    assert!(fetcher.cache().is_empty());
    assert_eq!(fetcher.pool().idle_count(server.address()), 0);
}

/// WHY: A pooled connection whose peer has gone away fails on its next use
/// WHAT: The failing fetch is not retried, the socket is discarded and the
/// following fetch dials a fresh connection
#[test]
#[timeout(10000)]
fn test_dead_pooled_connection_fails_once_then_reconnects() {
    let server = TestHttpServer::with_response(|_req| {
        HttpResponse::raw("HTTP/1.1 200 OK\r\nCache-Control: no-store\r\nContent-Length: 2\r\n\r\nhi")
    });
    let fetcher = HttpFetcher::new();

    assert_eq!(fetcher.fetch(&endpoint(&server, "/first")).unwrap(), "hi");
    assert_eq!(fetcher.pool().idle_count(server.address()), 1);

    let err = fetcher.fetch(&endpoint(&server, "/second")).unwrap_err();
    assert!(matches!(
        err,
        FetchError::Codec {
            source: CodecError::EmptyResponse | CodecError::Io(_),
            ..
        }
    ));
    assert_eq!(fetcher.pool().idle_count(server.address()), 0);

    assert_eq!(fetcher.fetch(&endpoint(&server, "/third")).unwrap(), "hi");
    assert_eq!(server.connection_count(), 2);
    assert_eq!(server.request_count(), 2);
}

#[test]
#[timeout(10000)]
fn test_connection_refused() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let fetcher = HttpFetcher::new();
    let target = Endpoint::parse(&format!("http://127.0.0.1:{port}/")).unwrap();

    let err = fetcher.fetch(&target).unwrap_err();
    assert!(matches!(err, FetchError::ConnectionFailed { .. }));
}

// ========================================================================
// Resources
// ========================================================================

/// WHY: view-source over http returns the fetched text unchanged
#[test]
#[timeout(10000)]
fn test_view_source_resource_over_http() {
    let server = TestHttpServer::with_response(|_req| HttpResponse::ok("<p>markup</p>"));
    let fetcher = HttpFetcher::new();

    let resource = Resource::parse(&format!("view-source:{}", server.url("/"))).unwrap();

    assert!(resource.is_view_source());
    assert_eq!(resource.load(&fetcher).unwrap(), "<p>markup</p>");
}
