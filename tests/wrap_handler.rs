//! Instrumentation of synchronous handlers and dispatchers.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use axum::http::{HeaderValue, StatusCode};

use http_telemetry::event::fields;
use http_telemetry::{
    wrap_handler, wrap_handler_fn, Handler, Instrumentation, MemorySink, ServeMux,
};

mod common;
use common::{get, serve, size_of, status_of};

#[test]
fn test_wrap_handler_fn_noop_defaults_to_200() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(|_, _| {}, sink.clone());

    let w = serve(&h, &get("/hello"));
    assert_eq!(w.status(), StatusCode::OK);

    let evs = sink.events();
    assert_eq!(evs.len(), 1, "one event is created with one request through the wrapped handler function");
    assert_eq!(status_of(&evs[0]), 200);
    assert_eq!(size_of(&evs[0]), 0);
}

#[test]
fn test_wrap_handler_fn_teapot() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(|w, _| w.write_header(StatusCode::IM_A_TEAPOT), sink.clone());

    let w = serve(&h, &get("/fail"));
    assert_eq!(w.status(), StatusCode::IM_A_TEAPOT);

    let evs = sink.events();
    assert_eq!(evs.len(), 1);
    assert_eq!(status_of(&evs[0]), 418, "served /fail request should have status 418");
}

#[test]
fn test_wrapped_functions_on_a_mux() {
    let sink = Arc::new(MemorySink::new());
    let mut mux = ServeMux::new();
    mux.handle("/hello", wrap_handler_fn(|_, _| {}, sink.clone()))
        .unwrap()
        .handle(
            "/fail",
            wrap_handler_fn(|w, _| w.write_header(StatusCode::IM_A_TEAPOT), sink.clone()),
        )
        .unwrap();

    serve(&mux, &get("/hello"));
    serve(&mux, &get("/fail"));

    let evs = sink.events();
    assert_eq!(evs.len(), 2);
    assert_eq!(status_of(&evs[0]), 200);
    assert_eq!(status_of(&evs[1]), 418);
}

#[test]
fn test_wrap_handler_dispatcher_in_request_order() {
    let sink = Arc::new(MemorySink::new());
    let mut mux = ServeMux::new();
    mux.handle_fn("/hello", |_, _| {})
        .unwrap()
        .handle_fn("/fail", |w, _| w.write_header(StatusCode::IM_A_TEAPOT))
        .unwrap();
    let h = wrap_handler(mux, sink.clone());

    assert_eq!(serve(&h, &get("/hello")).status(), StatusCode::OK);
    assert_eq!(serve(&h, &get("/fail")).status(), StatusCode::IM_A_TEAPOT);

    let evs = sink.events();
    assert_eq!(evs.len(), 2, "one event is created per request through the middleware");
    assert_eq!(status_of(&evs[0]), 200);
    assert_eq!(status_of(&evs[1]), 418);
    assert_eq!(evs[0].get(fields::REQUEST_PATH).unwrap().as_str(), Some("/hello"));
    assert_eq!(evs[1].get(fields::HANDLER_PATTERN).unwrap().as_str(), Some("/fail"));
}

#[test]
fn test_dispatcher_404_is_a_normal_event() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler(ServeMux::new(), sink.clone());

    let w = serve(&h, &get("/nowhere"));
    assert_eq!(w.status(), StatusCode::NOT_FOUND);

    let evs = sink.events();
    assert_eq!(evs.len(), 1);
    assert_eq!(status_of(&evs[0]), 404);
    assert_eq!(size_of(&evs[0]), w.body().len() as i64);
    assert!(!evs[0].contains(fields::HANDLER_PATTERN));
}

#[test]
fn test_body_without_status_reports_200_and_size() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(
        |w, _| {
            w.write(b"hello, ").unwrap();
            w.write(b"world").unwrap();
        },
        sink.clone(),
    );

    let w = serve(&h, &get("/greet"));
    assert_eq!(w.body(), b"hello, world");

    let evs = sink.events();
    assert_eq!(evs.len(), 1, "many writes still produce a single event");
    assert_eq!(status_of(&evs[0]), 200);
    assert_eq!(size_of(&evs[0]), 12);
}

#[test]
fn test_status_after_first_write_is_ignored() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(
        |w, _| {
            w.write_header(StatusCode::CREATED);
            w.write(b"made").unwrap();
            w.write_header(StatusCode::INTERNAL_SERVER_ERROR);
        },
        sink.clone(),
    );

    let w = serve(&h, &get("/things"));
    assert_eq!(w.status(), StatusCode::CREATED);
    assert_eq!(status_of(&sink.events()[0]), 201);
}

#[test]
fn test_double_wrap_emits_once() {
    let sink = Arc::new(MemorySink::new());
    let inner = wrap_handler_fn(|w, _| w.write_header(StatusCode::ACCEPTED), sink.clone());
    let outer = Instrumentation::new(sink.clone())
        .with_handler_name("outer")
        .wrap(inner);

    serve(&outer, &get("/jobs"));

    let evs = sink.events();
    assert_eq!(evs.len(), 1);
    assert_eq!(status_of(&evs[0]), 202);
    assert_eq!(evs[0].get(fields::HANDLER_NAME).unwrap().as_str(), Some("outer"));
}

#[test]
fn test_event_carries_request_context() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(|_, _| {}, sink.clone());
    let req = get("/hello")
        .with_header(
            axum::http::header::USER_AGENT,
            HeaderValue::from_static("integration/1.0"),
        )
        .with_header(
            axum::http::header::HOST,
            HeaderValue::from_static("svc.internal"),
        )
        .with_remote_addr("192.0.2.10:51000".parse().unwrap());

    serve(&h, &req);

    let evs = sink.events();
    let ev = &evs[0];
    assert_eq!(ev.get(fields::REQUEST_METHOD).unwrap().as_str(), Some("GET"));
    assert_eq!(ev.get(fields::REQUEST_HOST).unwrap().as_str(), Some("svc.internal"));
    assert_eq!(
        ev.get(fields::REQUEST_REMOTE_ADDR).unwrap().as_str(),
        Some("192.0.2.10:51000")
    );
    assert_eq!(
        ev.get("request.header.user_agent").unwrap().as_str(),
        Some("integration/1.0")
    );
    assert!(ev.get(fields::DURATION_MS).unwrap().as_f64().unwrap() >= 0.0);
}

#[test]
fn test_panicking_handler_still_emits() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(
        |w, _| {
            w.write(b"partial").unwrap();
            panic!("handler blew up");
        },
        sink.clone(),
    );

    let result = panic::catch_unwind(AssertUnwindSafe(|| serve(&h, &get("/boom"))));
    assert!(result.is_err(), "the panic propagates to the caller");

    let evs = sink.events();
    assert_eq!(evs.len(), 1);
    assert_eq!(
        status_of(&evs[0]),
        500,
        "a buffered response is discarded on panic, nothing reached the client"
    );
    assert_eq!(size_of(&evs[0]), 0);
    assert_eq!(evs[0].get(fields::HANDLER_PANICKED).unwrap().as_bool(), Some(true));
    assert_eq!(
        evs[0].get(fields::HANDLER_PANIC_MESSAGE).unwrap().as_str(),
        Some("handler blew up")
    );
}

#[test]
fn test_panic_before_any_write_reports_500() {
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(|_, _| panic!("early"), sink.clone());

    let result = panic::catch_unwind(AssertUnwindSafe(|| serve(&h, &get("/boom"))));
    assert!(result.is_err());
    assert_eq!(status_of(&sink.events()[0]), 500);
}

#[test]
fn test_concurrent_requests_each_emit_one_event() {
    let sink = Arc::new(MemorySink::new());
    let h = Arc::new(wrap_handler_fn(
        |w, req| {
            if req.path() == "/fail" {
                w.write_header(StatusCode::IM_A_TEAPOT);
            }
            w.write(req.path().as_bytes()).unwrap();
        },
        sink.clone(),
    ));

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let h = h.clone();
            thread::spawn(move || {
                let path = if i % 2 == 0 { "/hello" } else { "/fail" };
                for _ in 0..25 {
                    serve(&h, &get(path));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let evs = sink.events();
    assert_eq!(evs.len(), 200);
    let teapots = evs.iter().filter(|ev| status_of(ev) == 418).count();
    assert_eq!(teapots, 100);
    assert!(evs
        .iter()
        .all(|ev| size_of(ev) == ev.get(fields::REQUEST_PATH).unwrap().as_str().unwrap().len() as i64));
}

#[test]
fn test_instrumented_handler_is_a_handler() {
    fn assert_handler<H: Handler>(_: &H) {}
    let sink = Arc::new(MemorySink::new());
    let h = wrap_handler_fn(|_, _| {}, sink);
    assert_handler(&h);
}
