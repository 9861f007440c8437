//! JsonHandler: one mocked endpoint that receives and returns JSON.
//!
//! Request lifecycle, stopping at the first failure:
//! ```text
//! path   → check_path          (404 on mismatch or bad pattern)
//! method → check_method        (404 on mismatch)
//! header → check_content_type  (400)
//! body   → decode into Req     (400)
//! call   → response function  (400 on Err)
//! write  → JSON + response code, nothing at all when the function returns None
//! ```

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Uri};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::pattern::{has_meta, match_pattern};
use crate::query::{parse_query, QueryParams};
use crate::writer::ResponseWriter;
use crate::{HandlerError, APPLICATION_JSON};

/// Builds the response value from (decoded body, path params, query params).
/// Returning `Ok(None)` leaves the response untouched.
pub type ResponseFn<Req, Res> = Arc<
    dyn Fn(Option<Req>, &[String], &QueryParams) -> Result<Option<Res>, HandlerError>
        + Send
        + Sync,
>;

/// Takes over error responses entirely: headers, status and body.
pub type ErrResponseFn =
    Arc<dyn Fn(&mut dyn ResponseWriter, Option<&HandlerError>, u16) + Send + Sync>;

/// Something that answers HTTP requests.
pub trait Handler: Send + Sync {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>);
}

/// A handler bound to one method and path pattern, routable by [`crate::MultipleHandler`].
pub trait Route: Handler {
    fn method(&self) -> &str;
    fn path_fmt(&self) -> &str;
    fn error_response(&self, w: &mut dyn ResponseWriter, err: Option<&HandlerError>, status: u16);
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) {
        (**self).serve_http(w, req)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) {
        (**self).serve_http(w, req)
    }
}

impl<R: Route + ?Sized> Route for Box<R> {
    fn method(&self) -> &str {
        (**self).method()
    }

    fn path_fmt(&self) -> &str {
        (**self).path_fmt()
    }

    fn error_response(&self, w: &mut dyn ResponseWriter, err: Option<&HandlerError>, status: u16) {
        (**self).error_response(w, err, status)
    }
}

/// Default error body: `{"Message": ..., "Handler": ...}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "Handler")]
    pub handler: Value,
}

enum Responder<Req, Res> {
    Echo,
    Custom(ResponseFn<Req, Res>),
}

impl<Req, Res> Clone for Responder<Req, Res> {
    fn clone(&self) -> Self {
        match self {
            Responder::Echo => Responder::Echo,
            Responder::Custom(f) => Responder::Custom(Arc::clone(f)),
        }
    }
}

/// Mock of one JSON endpoint.
///
/// `Req` is the type request bodies decode into and `Res` the type the
/// response function returns; both default to `serde_json::Value`.
///
/// ```
/// use fakehttp_core::{JsonHandler, Recorder, Handler};
/// use serde_json::json;
///
/// let h = JsonHandler::new("GET", "/users/*")
///     .with_response_fn(|_, params, _| Ok(Some(json!({ "id": params[0] }))));
///
/// let req = http::Request::get("/users/42").body(bytes::Bytes::new()).unwrap();
/// let mut rec = Recorder::new();
/// h.serve_http(&mut rec, &req);
/// assert_eq!(rec.status(), 200);
/// assert_eq!(rec.json::<serde_json::Value>().unwrap(), json!({ "id": "42" }));
/// ```
pub struct JsonHandler<Req = Value, Res = Value> {
    path_fmt: String,
    method: String,
    request_body: Option<Req>,
    response_code: u16,
    responder: Responder<Req, Res>,
    err_response_fn: Option<ErrResponseFn>,
}

impl JsonHandler {
    /// Handler for `method` requests on paths matching `path_fmt`.
    /// An empty method or pattern skips that check. Answers 200 and echoes
    /// the request body until configured otherwise.
    pub fn new(method: impl Into<String>, path_fmt: impl Into<String>) -> Self {
        Self {
            path_fmt: path_fmt.into(),
            method: method.into(),
            request_body: None,
            response_code: 200,
            responder: Responder::Echo,
            err_response_fn: None,
        }
    }

    /// Handler that accepts every method and path.
    pub fn any() -> Self {
        Self::new("", "")
    }
}

impl<Req, Res> JsonHandler<Req, Res> {
    /// Decode request bodies as `T`; `template` is reported in error bodies.
    /// Also turns on the `Content-Type: application/json` check.
    ///
    /// Call this before [`with_response_fn`](Self::with_response_fn): a response
    /// function set earlier takes the old body type and is dropped.
    pub fn with_request_body<T>(self, template: T) -> JsonHandler<T, Res> {
        let responder = match self.responder {
            Responder::Echo => Responder::Echo,
            Responder::Custom(_) => {
                tracing::warn!(
                    method = %self.method,
                    path_fmt = %self.path_fmt,
                    "request body type changed, response function reset to echo"
                );
                Responder::Echo
            }
        };
        JsonHandler {
            path_fmt: self.path_fmt,
            method: self.method,
            request_body: Some(template),
            response_code: self.response_code,
            responder,
            err_response_fn: self.err_response_fn,
        }
    }

    /// Status written with successful responses.
    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = code;
        self
    }

    pub fn with_response_fn<R, F>(self, f: F) -> JsonHandler<Req, R>
    where
        F: Fn(Option<Req>, &[String], &QueryParams) -> Result<Option<R>, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        JsonHandler {
            path_fmt: self.path_fmt,
            method: self.method,
            request_body: self.request_body,
            response_code: self.response_code,
            responder: Responder::Custom(Arc::new(f)),
            err_response_fn: self.err_response_fn,
        }
    }

    pub fn with_err_response_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn ResponseWriter, Option<&HandlerError>, u16) + Send + Sync + 'static,
    {
        self.err_response_fn = Some(Arc::new(f));
        self
    }

    pub fn response_code(&self) -> u16 {
        self.response_code
    }

    pub fn request_body(&self) -> Option<&Req> {
        self.request_body.as_ref()
    }

    /// Match `req_path` against the pattern and pull out positional params:
    /// one per pattern segment holding a wildcard, class or escape, left to
    /// right. With an empty pattern every `/`-separated piece of the path is
    /// returned, including the leading empty one.
    pub fn check_path(&self, req_path: &str) -> Result<Vec<String>, HandlerError> {
        if self.path_fmt.is_empty() {
            return Ok(req_path.split('/').map(String::from).collect());
        }
        if !match_pattern(&self.path_fmt, req_path)? {
            return Err(HandlerError::PathMismatch {
                want: self.path_fmt.clone(),
                got: req_path.to_string(),
            });
        }

        let params = self
            .path_fmt
            .split('/')
            .zip(req_path.split('/'))
            .filter(|(fmt, _)| has_meta(fmt))
            .map(|(_, segment)| segment.to_string())
            .collect();
        Ok(params)
    }

    /// Exact, case-sensitive method check; an empty method accepts anything.
    pub fn check_method(&self, req_method: &str) -> Result<(), HandlerError> {
        if self.method.is_empty() || self.method == req_method {
            return Ok(());
        }
        Err(HandlerError::MethodMismatch {
            want: self.method.clone(),
            got: req_method.to_string(),
        })
    }

    /// Only enforced when a request body type is configured.
    pub fn check_content_type(&self, content_type: &str) -> Result<(), HandlerError> {
        if self.request_body.is_none() || content_type == APPLICATION_JSON {
            return Ok(());
        }
        Err(HandlerError::InvalidContentType(content_type.to_string()))
    }
}

impl<Req, Res> JsonHandler<Req, Res>
where
    Req: Serialize + DeserializeOwned,
    Res: Serialize,
{
    /// First JSON value of the body; trailing bytes are not inspected.
    fn decode_body(&self, body: &[u8]) -> Result<Option<Req>, HandlerError> {
        if self.request_body.is_none() {
            return Ok(None);
        }
        match serde_json::Deserializer::from_slice(body)
            .into_iter::<Req>()
            .next()
        {
            Some(value) => Ok(Some(value?)),
            None => Err(HandlerError::EmptyBody),
        }
    }

    fn respond(
        &self,
        body: Option<Req>,
        params: &[String],
        query: &QueryParams,
    ) -> Result<Option<Value>, HandlerError> {
        let value = match &self.responder {
            Responder::Echo => body.map(|b| serde_json::to_value(&b)).transpose(),
            Responder::Custom(f) => f(body, params, query)?
                .map(|r| serde_json::to_value(&r))
                .transpose(),
        };
        value.map_err(|e| HandlerError::Encode(e.to_string()))
    }

    fn reject(&self, w: &mut dyn ResponseWriter, err: HandlerError, status: u16) {
        tracing::debug!(
            method = %self.method,
            path_fmt = %self.path_fmt,
            status,
            error = %err,
            "request rejected"
        );
        self.error_response(w, Some(&err), status);
    }

    /// Write `err` with `status`, through the custom error function if set,
    /// otherwise as an [`ErrorResponse`] carrying this handler's settings.
    pub fn error_response(&self, w: &mut dyn ResponseWriter, err: Option<&HandlerError>, status: u16) {
        if let Some(f) = &self.err_response_fn {
            f(w, err, status);
            return;
        }
        let envelope = ErrorResponse {
            message: err.map_or_else(|| "nil".to_string(), ToString::to_string),
            handler: serde_json::to_value(self).unwrap_or(Value::Null),
        };
        match serde_json::to_value(&envelope) {
            Ok(value) => write_json(w, status, &value),
            Err(_) => {
                w.write_header(status);
                w.write(envelope.message.as_bytes());
            }
        }
    }
}

impl<Req, Res> Handler for JsonHandler<Req, Res>
where
    Req: Serialize + DeserializeOwned + Send + Sync,
    Res: Serialize,
{
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) {
        let params = match self.check_path(&decoded_path(req.uri())) {
            Ok(params) => params,
            Err(err) => return self.reject(w, err, 404),
        };
        // 404 rather than 405, which callers already depend on.
        if let Err(err) = self.check_method(req.method().as_str()) {
            return self.reject(w, err, 404);
        }
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if let Err(err) = self.check_content_type(content_type) {
            return self.reject(w, err, 400);
        }
        let body = match self.decode_body(req.body()) {
            Ok(body) => body,
            Err(err) => return self.reject(w, err, 400),
        };

        let query = parse_query(req.uri().query());
        let value = match self.respond(body, &params, &query) {
            Ok(Some(value)) => value,
            Ok(None) => return,
            Err(err @ HandlerError::Encode(_)) => return self.reject(w, err, 500),
            Err(err) => return self.reject(w, err, 400),
        };
        write_json(w, self.response_code, &value);
    }
}

impl<Req, Res> Route for JsonHandler<Req, Res>
where
    Req: Serialize + DeserializeOwned + Send + Sync,
    Res: Serialize,
{
    fn method(&self) -> &str {
        &self.method
    }

    fn path_fmt(&self) -> &str {
        &self.path_fmt
    }

    fn error_response(&self, w: &mut dyn ResponseWriter, err: Option<&HandlerError>, status: u16) {
        JsonHandler::error_response(self, w, err, status)
    }
}

/// Set the JSON content type, write `status` and the newline-terminated body.
/// Percent-decoded request path. Falls back to the raw path when the
/// decoded bytes are not UTF-8.
pub(crate) fn decoded_path(uri: &Uri) -> Cow<'_, str> {
    let raw = uri.path();
    percent_decode_str(raw).decode_utf8().unwrap_or(Cow::Borrowed(raw))
}

fn write_json(w: &mut dyn ResponseWriter, status: u16, value: &Value) {
    let mut body = value.to_string().into_bytes();
    body.push(b'\n');
    w.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
    w.write_header(status);
    w.write(&body);
}

impl<Req: Serialize, Res> Serialize for JsonHandler<Req, Res> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("JsonHandler", 4)?;
        state.serialize_field("PathFmt", &self.path_fmt)?;
        state.serialize_field("Method", &self.method)?;
        state.serialize_field("RequestBody", &self.request_body)?;
        state.serialize_field("ResponseCode", &self.response_code)?;
        state.end()
    }
}

impl<Req: Clone, Res> Clone for JsonHandler<Req, Res> {
    fn clone(&self) -> Self {
        Self {
            path_fmt: self.path_fmt.clone(),
            method: self.method.clone(),
            request_body: self.request_body.clone(),
            response_code: self.response_code,
            responder: self.responder.clone(),
            err_response_fn: self.err_response_fn.clone(),
        }
    }
}

impl<Req: fmt::Debug, Res> fmt::Debug for JsonHandler<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonHandler")
            .field("path_fmt", &self.path_fmt)
            .field("method", &self.method)
            .field("request_body", &self.request_body)
            .field("response_code", &self.response_code)
            .field("custom_response_fn", &matches!(self.responder, Responder::Custom(_)))
            .field("custom_err_response_fn", &self.err_response_fn.is_some())
            .finish()
    }
}
