use std::sync::Arc;

use log::{error, warn, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, WithStatus};

use crate::errors::{BackendError, ErrorKind};

pub mod admin;
mod handlers;
mod rejection;
mod response;

pub use internal::*;

/// The maximum form data size to accept. This should be enforced by
/// the HTTP gateway, so on the Rust side it’s only a backstop; the
/// configured upload limit is checked when the file is validated.
const MAX_CONTENT_LENGTH: u64 = 256 * 1024 * 1024;

/// The maximum size of an administrator's requirements document.
const MAX_JSON_LENGTH: u64 = 64 * 1024;

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        let status = status_code_for(e);

        match e.kind() {
            ErrorKind::UpstreamStorage | ErrorKind::Internal => {
                error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status, "message" => %r.error)
            }
            _ => {
                warn!(logger, "Request rejected"; "context" => ?r.context, "status" => %status, "message" => %r.error)
            }
        }

        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    match e.kind() {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::UpstreamStorage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use warp::filters::multipart::form;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::Filter;
    use warp::Reply;
    use warp::{body, get as g, path as p, path::param as par, post, put};

    use super::{handlers, MAX_CONTENT_LENGTH, MAX_JSON_LENGTH};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let $route_variable = warp::any()
                .map(move || environment.clone());

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    route!(make_progress_route => progress, rt; par::<String>(), p("trips"), par::<String>(), p("progress"), end(), g());
    route!(make_dashboard_route => dashboard, rt; par::<String>(), p("dashboard"), end(), g());
    route!(make_upload_route => upload, rt; par::<String>(), p("documents"), end(), post(), form().max_length(MAX_CONTENT_LENGTH));
    route!(make_cancel_route => cancel, rt; par::<String>(), p("trips"), par::<String>(), p("cancel"), end(), post());
    route!(make_complete_route => complete, rt; par::<String>(), p("trips"), par::<String>(), p("complete"), end(), post());

    route!(make_required_documents_route => set_required_documents, rt; p("trips"), par::<String>(), p("required-documents"), end(), put(), body::content_length_limit(MAX_JSON_LENGTH), body::bytes());
    route!(make_admin_progress_route => admin_progress, rt; p("trips"), par::<String>(), p("progress"), end(), g());
}
