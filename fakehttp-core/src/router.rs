//! MultipleHandler: ordered routes, first match on method + path pattern wins.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::Request;

use crate::handler::{decoded_path, ErrResponseFn, Handler, Route};
use crate::pattern::match_pattern;
use crate::writer::ResponseWriter;
use crate::HandlerError;

/// Routes requests to the first registered route whose method equals the
/// request method and whose pattern matches the path. Routes with an empty
/// method or pattern are never registered.
#[derive(Default)]
pub struct MultipleHandler {
    err_response_fn: Option<ErrResponseFn>,
    routes: Vec<Box<dyn Route>>,
}

impl MultipleHandler {
    /// Keep, in order, every route that has both a method and a pattern.
    pub fn new(routes: impl IntoIterator<Item = Box<dyn Route>>) -> Self {
        Self {
            err_response_fn: None,
            routes: routes.into_iter().filter(|r| is_routable(r.as_ref())).collect(),
        }
    }

    /// Append a route; silently ignored if its method or pattern is empty.
    pub fn add_handler(&mut self, route: impl Route + 'static) {
        if !is_routable(&route) {
            tracing::debug!(
                method = route.method(),
                path_fmt = route.path_fmt(),
                "route without method or pattern ignored"
            );
            return;
        }
        self.routes.push(Box::new(route));
    }

    pub fn with_err_response_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut dyn ResponseWriter, Option<&HandlerError>, u16) + Send + Sync + 'static,
    {
        self.err_response_fn = Some(Arc::new(f));
        self
    }

    /// (method, pattern) of every registered route, in match order.
    pub fn routes(&self) -> Vec<(&str, &str)> {
        self.routes
            .iter()
            .map(|r| (r.method(), r.path_fmt()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Composite error function first, then the first route's error format,
    /// then plain text.
    fn error_response(&self, w: &mut dyn ResponseWriter, err: Option<&HandlerError>, status: u16) {
        if let Some(f) = &self.err_response_fn {
            f(w, err, status);
            return;
        }
        if let Some(first) = self.routes.first() {
            first.error_response(w, err, status);
            return;
        }
        w.write_header(status);
        if let Some(err) = err {
            w.write(err.to_string().as_bytes());
        }
    }
}

impl Handler for MultipleHandler {
    fn serve_http(&self, w: &mut dyn ResponseWriter, req: &Request<Bytes>) {
        let method = req.method().as_str();
        let decoded = decoded_path(req.uri());
        let path: &str = &decoded;

        for (index, route) in self.routes.iter().enumerate() {
            if route.method() != method {
                continue;
            }
            // A broken pattern is reported but the scan goes on.
            match match_pattern(route.path_fmt(), path) {
                Ok(true) => {
                    tracing::debug!(index, method, path, path_fmt = route.path_fmt(), "route matched");
                    route.serve_http(w, req);
                    return;
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(index, path_fmt = route.path_fmt(), error = %err, "bad route pattern");
                    self.error_response(w, Some(&HandlerError::Pattern(err)), 500);
                }
            }
        }

        tracing::warn!(method, path, "no route matched");
        self.error_response(w, Some(&HandlerError::NotFound), 404);
    }
}

impl fmt::Debug for MultipleHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleHandler")
            .field("routes", &self.routes())
            .field("custom_err_response_fn", &self.err_response_fn.is_some())
            .finish()
    }
}

fn is_routable(route: &dyn Route) -> bool {
    !route.method().is_empty() && !route.path_fmt().is_empty()
}
