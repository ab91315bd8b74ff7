use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, o};
use warp::{
    filters::multipart::FormData,
    http::StatusCode,
    reject,
    reply::{json, with_header, with_status, Reply},
};

use crate::environment::Environment;
use crate::errors::BackendError;
use crate::ids::EntityId;
use crate::io::parse_upload;
use crate::progress::{compute_dashboard_summary, compute_trip_progress, trip_progress};
use crate::requirements::{self, RequiredDocuments};
use crate::routes::{
    rejection::{Context, Rejection},
    response::SuccessResponse,
};
use crate::trip::{self, load_owned_trip, TripStatus};
use crate::upload::{validate_and_accept_upload, UploadContext, UploadFile};

const SERVER_TIMING_HEADER: &str = "server-timing";
type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($expression:stmt);+) => {
        let start = Instant::now();

        // TODO when `try` blocks are stabilized, we can wrap the body
        // and return the headers even on errors
        let result = { $($expression)+ };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn progress(environment: Environment, username: String, trip: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::progress(Some(username.clone()), trip.clone()), e);

        let trip_id = EntityId::parse(&trip).map_err(error_handler)?;
        let logger = environment.logger.new(o!("username" => username.clone()));
        debug!(logger, "Computing trip progress..."; "trip" => %trip_id);

        let (_, loaded) = load_owned_trip(environment.db.as_ref(), &username, trip_id)
            .await
            .map_err(error_handler)?;

        let progress = trip_progress(environment.db.as_ref(), &logger, &loaded)
            .await
            .map_err(error_handler)?;

        json(&progress)
    }
}

pub async fn dashboard(environment: Environment, username: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::dashboard(username.clone()), e);

        let tutor = environment
            .db
            .retrieve_tutor_by_username(&username)
            .await
            .map_err(error_handler)?
            .ok_or_else(|| BackendError::TutorNotFound { username: username.clone() })
            .map_err(error_handler)?;
        debug!(environment.logger, "Summarizing dashboard..."; "username" => &username);

        let summary = compute_dashboard_summary(environment.db.as_ref(), &environment.logger, tutor.id)
            .await
            .map_err(error_handler)?;

        json(&summary)
    }
}

pub async fn upload(environment: Environment, username: String, content: FormData) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::upload(username.clone()), e);

        debug!(environment.logger, "Parsing submission..."; "username" => &username);
        let form = parse_upload(content).await.map_err(error_handler)?;

        let context: UploadContext = serde_json::from_slice(&form.metadata)
            .map_err(BackendError::MalformedUploadMetadata)
            .map_err(error_handler)?;

        let file = UploadFile {
            filename: form.filename,
            data: form.data,
        };

        let record = validate_and_accept_upload(&environment, &username, context, file)
            .await
            .map_err(error_handler)?;

        with_status(json(&record), StatusCode::CREATED)
    }
}

pub async fn cancel(environment: Environment, username: String, trip: String) -> RouteResult {
    change_status(environment, username, trip, TripStatus::Cancelled).await
}

pub async fn complete(environment: Environment, username: String, trip: String) -> RouteResult {
    change_status(environment, username, trip, TripStatus::Completed).await
}

async fn change_status(
    environment: Environment,
    username: String,
    trip: String,
    target: TripStatus,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| {
            Rejection::new(Context::status_change(username.clone(), trip.clone(), target.as_str()), e)
        };

        let trip_id = EntityId::parse(&trip).map_err(error_handler)?;

        let status = trip::change_status(
            environment.db.as_ref(),
            &environment.logger,
            &username,
            trip_id,
            target,
        )
        .await
        .map_err(error_handler)?;

        json(&SuccessResponse::Status { trip: trip_id, status })
    }
}

pub async fn set_required_documents(
    environment: Environment,
    trip: String,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::required_documents(trip.clone()), e);

        let trip_id = EntityId::parse(&trip).map_err(error_handler)?;

        let update: RequiredDocuments = serde_json::from_slice(&body)
            .map_err(BackendError::MalformedRequiredDocuments)
            .map_err(error_handler)?;

        let required = requirements::set_required_documents(
            environment.db.as_ref(),
            &environment.logger,
            trip_id,
            update.human_docs,
            update.pet_docs,
        )
        .await
        .map_err(error_handler)?;

        json(&required)
    }
}

pub async fn admin_progress(environment: Environment, trip: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::progress(None, trip.clone()), e);

        let trip_id = EntityId::parse(&trip).map_err(error_handler)?;

        let progress = compute_trip_progress(environment.db.as_ref(), &environment.logger, trip_id)
            .await
            .map_err(error_handler)?;

        json(&progress)
    }
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}
