use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use fakehttp_core::{
    ErrorResponse, Handler, HandlerError, JsonHandler, MultipleHandler, Recorder, ResponseWriter,
    Route,
};
use serde_json::{json, Value};

fn request(method: &str, uri: &str) -> http::Request<Bytes> {
    http::Request::builder()
        .method(method)
        .uri(uri)
        .body(Bytes::new())
        .unwrap()
}

fn serve(h: &impl Handler, req: &http::Request<Bytes>) -> Recorder {
    let mut rec = Recorder::new();
    h.serve_http(&mut rec, req);
    rec
}

fn route(method: &str, path_fmt: &str) -> Box<dyn Route> {
    Box::new(JsonHandler::new(method, path_fmt))
}

#[test]
fn new_keeps_only_routable_handlers_in_order() {
    let cases: Vec<(Vec<Box<dyn Route>>, Vec<(&str, &str)>)> = vec![
        (
            vec![route("GET", "/users/*"), route("PUT", "/users/*"), route("POST", "/users")],
            vec![("GET", "/users/*"), ("PUT", "/users/*"), ("POST", "/users")],
        ),
        (
            vec![route("GET", "/users/*"), route("GET", "/users/*"), route("POST", "/users")],
            vec![("GET", "/users/*"), ("GET", "/users/*"), ("POST", "/users")],
        ),
        (vec![route("", "/users/*")], vec![]),
        (vec![route("GET", "")], vec![]),
        (vec![route("", "")], vec![]),
        (vec![], vec![]),
    ];
    for (input, want) in cases {
        let h = MultipleHandler::new(input);
        assert_eq!(h.routes(), want);
        assert_eq!(h.len(), want.len());
    }
}

#[test]
fn add_handler_applies_same_filter() {
    let cases = [
        (("GET", "/users/*"), vec![("GET", "/users/*")]),
        (("", "/users/*"), vec![]),
        (("GET", ""), vec![]),
        (("", ""), vec![]),
    ];
    for ((method, path_fmt), want) in cases {
        let mut h = MultipleHandler::default();
        h.add_handler(JsonHandler::new(method, path_fmt));
        assert_eq!(h.routes(), want);
        assert_eq!(h.is_empty(), want.is_empty());
    }
}

#[test]
fn add_handler_appends_after_constructed_routes() {
    let mut h = MultipleHandler::new(vec![route("GET", "/a")]);
    h.add_handler(JsonHandler::new("POST", "/b"));
    assert_eq!(h.routes(), vec![("GET", "/a"), ("POST", "/b")]);
}

#[test]
fn first_matching_route_wins() {
    let first_calls = Arc::new(AtomicUsize::new(0));
    let second_calls = Arc::new(AtomicUsize::new(0));

    let first = {
        let calls = Arc::clone(&first_calls);
        JsonHandler::new("GET", "/users/*").with_response_fn(move |_, params, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!({ "called": params[0] })))
        })
    };
    let second = {
        let calls = Arc::clone(&second_calls);
        JsonHandler::new("GET", "/users/*").with_response_fn(move |_, params, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(json!({ "never_called": params[0] })))
        })
    };
    let h = MultipleHandler::new(vec![Box::new(first) as Box<dyn Route>, Box::new(second)]);

    for _ in 0..3 {
        let rec = serve(&h, &request("GET", "/users/1"));
        assert_eq!(rec.status(), 200);
        assert_eq!(rec.json::<Value>().unwrap(), json!({ "called": "1" }));
    }
    assert_eq!(first_calls.load(Ordering::SeqCst), 3);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn routes_by_method_and_path() {
    let mut h = MultipleHandler::default();
    h.add_handler(
        JsonHandler::new("GET", "/users/*").with_response_fn(|_, p, _| Ok(Some(json!({ "get": p[0] })))),
    );
    h.add_handler(
        JsonHandler::new("PUT", "/users/*").with_response_fn(|_, p, _| Ok(Some(json!({ "put": p[0] })))),
    );
    h.add_handler(
        JsonHandler::new("GET", "/groups/*/users/*")
            .with_response_fn(|_, p, _| Ok(Some(json!({ "group": p[0], "user": p[1] })))),
    );

    let rec = serve(&h, &request("PUT", "/users/9"));
    assert_eq!(rec.json::<Value>().unwrap(), json!({ "put": "9" }));
    let rec = serve(&h, &request("GET", "/groups/g/users/u"));
    assert_eq!(rec.json::<Value>().unwrap(), json!({ "group": "g", "user": "u" }));
}

#[test]
fn unmatched_requests_are_not_found() {
    let h = MultipleHandler::new(vec![route("GET", "/users/*")]);
    for (method, path) in [("GET", "/hoge"), ("POST", "/users/1")] {
        let rec = serve(&h, &request(method, path));
        assert_eq!(rec.status(), 404, "{method} {path}");
        // First route formats the error.
        let body: ErrorResponse = rec.json().unwrap();
        assert_eq!(body.message, "not found");
        assert_eq!(body.handler["PathFmt"], "/users/*");
    }
}

#[test]
fn empty_handler_answers_plain_text_not_found() {
    let h = MultipleHandler::default();
    let rec = serve(&h, &request("GET", "/anything"));
    assert_eq!(rec.status(), 404);
    assert_eq!(rec.body_string(), "not found");
    assert_eq!(rec.header("content-type"), None);
}

#[test]
fn composite_err_response_fn_takes_precedence() {
    let h = MultipleHandler::new(vec![route("GET", "/users/*")]).with_err_response_fn(
        |w: &mut dyn ResponseWriter, err: Option<&HandlerError>, status: u16| {
            w.write_header(status + 1);
            w.write(format!("custom: {}", err.map(ToString::to_string).unwrap_or_default()).as_bytes());
        },
    );
    let rec = serve(&h, &request("GET", "/nope"));
    assert_eq!(rec.status(), 405);
    assert_eq!(rec.body_string(), "custom: not found");
}

#[test]
fn matched_route_uses_its_own_error_path() {
    let h = MultipleHandler::new(vec![Box::new(
        JsonHandler::new("GET", "/users/*")
            .with_response_fn(|_, _, _| Err::<Option<Value>, _>(HandlerError::msg("user gone"))),
    ) as Box<dyn Route>]);
    let rec = serve(&h, &request("GET", "/users/3"));
    assert_eq!(rec.status(), 400);
    let body: ErrorResponse = rec.json().unwrap();
    assert_eq!(body.message, "user gone");
}

#[test]
fn bad_pattern_reports_and_keeps_scanning() {
    let h = MultipleHandler::new(vec![
        route("GET", "/users/["),
        Box::new(
            JsonHandler::new("GET", "/users/*")
                .with_response_fn(|_, p, _| Ok(Some(json!({ "id": p[0] })))),
        ) as Box<dyn Route>,
    ]);

    // The 500 goes out first, the matching route's body follows it.
    let rec = serve(&h, &request("GET", "/users/5"));
    assert_eq!(rec.status(), 500);
    let mut values = serde_json::Deserializer::from_slice(rec.body()).into_iter::<Value>();
    let first: ErrorResponse = serde_json::from_value(values.next().unwrap().unwrap()).unwrap();
    assert_eq!(first.message, "syntax error in pattern");
    assert_eq!(values.next().unwrap().unwrap(), json!({ "id": "5" }));
}

#[test]
fn bad_pattern_then_not_found() {
    let h = MultipleHandler::new(vec![route("GET", "/users/[")]);
    let rec = serve(&h, &request("GET", "/users/5"));
    assert_eq!(rec.status(), 500);
    let messages: Vec<String> = serde_json::Deserializer::from_slice(rec.body())
        .into_iter::<ErrorResponse>()
        .map(|r| r.unwrap().message)
        .collect();
    assert_eq!(messages, vec!["syntax error in pattern", "not found"]);
}

#[test]
fn other_methods_skip_pattern_check() {
    let h = MultipleHandler::new(vec![route("POST", "/users/[")]);
    let rec = serve(&h, &request("GET", "/users/5"));
    assert_eq!(rec.status(), 404);
}

#[test]
fn encoded_path_reaches_literal_route() {
    let h = MultipleHandler::new(vec![
        route("GET", "/files/*"),
        Box::new(
            JsonHandler::new("GET", "/docs/a b/*")
                .with_response_fn(|_, p, _| Ok(Some(json!({ "name": p[0] })))),
        ) as Box<dyn Route>,
    ]);
    let rec = serve(&h, &request("GET", "/docs/a%20b/x%2Fy"));
    assert_eq!(rec.status(), 404);

    let rec = serve(&h, &request("GET", "/docs/a%20b/john%40example.com"));
    assert_eq!(rec.status(), 200);
    assert_eq!(rec.json::<Value>().unwrap(), json!({ "name": "john@example.com" }));
}
