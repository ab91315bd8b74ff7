use serde::Deserialize;
use serde_json::{json, Value};
use warp::http::StatusCode;
use warp::{reject::Rejection, Filter, Reply};

use petransport::db::Db;
use petransport::document::DocumentType;
use petransport::environment::Environment;
use petransport::ids::EntityId;
use petransport::routes;
use petransport::trip::TripStatus;

mod common;

use common::{Fixture, USERNAME};

const BOUNDARY: &str = "thisisaboundary1234";

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    kind: String,
    message: String,
}

fn main_routes(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let logger = environment.logger.clone();

    routes::make_progress_route(environment.clone())
        .or(routes::make_dashboard_route(environment.clone()))
        .or(routes::make_upload_route(environment.clone()))
        .or(routes::make_cancel_route(environment.clone()))
        .or(routes::make_complete_route(environment))
        .recover(move |r| routes::format_rejection(logger.clone(), r))
}

fn admin_routes(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let logger = environment.logger.clone();

    routes::admin::make_healthz_route()
        .or(routes::admin::make_required_documents_route(environment.clone()))
        .or(routes::admin::make_admin_progress_route(environment))
        .recover(move |r| routes::format_rejection(logger.clone(), r))
}

fn multipart_body(metadata: &Value, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{m}\r\n--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{f}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
        b = BOUNDARY,
        m = metadata,
        f = filename
    )
    .into_bytes();

    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    body
}

fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

fn parse<T: serde::de::DeserializeOwned>(body: &[u8]) -> T {
    serde_json::from_slice(body).expect("parse response body")
}

#[tokio::test]
async fn progress_is_reported_to_the_owner() {
    let f = Fixture::scenario();
    let filter = main_routes(f.environment.clone());

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/{}/trips/{}/progress", USERNAME, f.trip.id))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("server-timing"));

    let body: Value = parse(response.body());
    assert_eq!(body["tripId"], json!(f.trip.id.to_string()));
    assert_eq!(body["tutorProgress"], json!({"completed": 0, "total": 1}));
    assert_eq!(
        body["perPetProgress"][f.rex.id.to_string()],
        json!({"name": "Rex", "completed": 0, "total": 1})
    );
    assert_eq!(body["missingDocs"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["sentDocs"], json!([]));
}

#[tokio::test]
async fn errors_are_structured() {
    let f = Fixture::scenario();
    f.add_tutor("bruno");
    let filter = main_routes(f.environment.clone());

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/bruno/trips/{}/progress", f.trip.id))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(!response.headers().contains_key("server-timing"));
    let error: ErrorResponse = parse(response.body());
    assert_eq!(error.kind, "authorization");

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/{}/trips/not-a-trip/progress", USERNAME))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = parse(response.body());
    assert_eq!(body["kind"], json!("validation"));
    assert_eq!(body["trip"], json!("not-a-trip"));
    assert_eq!(body["username"], json!(USERNAME));

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/{}/trips/{}/progress", USERNAME, EntityId::new()))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploads_are_accepted_and_counted() {
    let f = Fixture::scenario();
    let filter = main_routes(f.environment.clone());

    let metadata = json!({
        "tripId": f.trip.id.to_string(),
        "petId": f.rex.id.to_string(),
        "documentType": "vaccinationCard",
    });

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/documents", USERNAME))
        .header("content-type", multipart_content_type())
        .body(multipart_body(&metadata, "card.pdf", b"%PDF-1.4"))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let record: Value = parse(response.body());
    assert_eq!(record["entity_type"], json!("travel"));
    assert_eq!(record["pet_id"], json!(f.rex.id.to_string()));
    assert_eq!(record["document_type"], json!("vaccinationCard"));
    assert_eq!(record["file_kind"], json!("pdf"));
    assert_eq!(record["size"], json!(8));
    assert!(record["created_at"].is_i64());

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/{}/trips/{}/progress", USERNAME, f.trip.id))
        .reply(&filter)
        .await;

    let body: Value = parse(response.body());
    assert_eq!(
        body["perPetProgress"][f.rex.id.to_string()]["completed"],
        json!(1)
    );
    assert_eq!(body["sentDocs"][0]["petName"], json!("Rex"));
    assert_eq!(body["sentDocs"][0]["matchedBy"], json!("exact"));

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/{}/dashboard", USERNAME))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = parse(response.body());
    assert_eq!(body["completed"], json!(1));
    assert_eq!(body["total"], json!(2));
    assert_eq!(body["perTripProgress"][0]["status"], json!("upcoming"));
}

#[tokio::test]
async fn form_parts_are_read_in_any_order() {
    let f = Fixture::scenario();
    let filter = main_routes(f.environment.clone());

    let metadata = json!({
        "tripId": f.trip.id.to_string(),
        "documentType": "passport",
    });

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"passport.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4\r\n--{b}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nignored\r\n--{b}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{m}\r\n--{b}--\r\n",
        b = BOUNDARY,
        m = metadata
    );

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/documents", USERNAME))
        .header("content-type", multipart_content_type())
        .body(body)
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let record: Value = parse(response.body());
    assert_eq!(record["filename"], json!("passport.pdf"));
    assert_eq!(record["pet_id"], Value::Null);
    assert_eq!(f.db.documents().len(), 1);
}

#[tokio::test]
async fn bad_uploads_are_rejected() {
    let f = Fixture::scenario();
    let filter = main_routes(f.environment.clone());

    let metadata = json!({
        "tripId": f.trip.id.to_string(),
        "documentType": "cvi",
    });

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/documents", USERNAME))
        .header("content-type", multipart_content_type())
        .body(multipart_body(&metadata, "cvi.pdf", b"%PDF-1.4"))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(response.body());
    assert_eq!(error.kind, "validation");
    assert_eq!(error.message, "document 'cvi' is not required for this trip");

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/documents", USERNAME))
        .header("content-type", multipart_content_type())
        .body(multipart_body(&json!({"tripId": 3}), "cvi.pdf", b"%PDF-1.4"))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(response.body());
    assert_eq!(error.message, "upload metadata is malformed");

    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\r\n{{}}\r\n--{b}--\r\n",
        b = BOUNDARY
    );
    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/documents", USERNAME))
        .header("content-type", multipart_content_type())
        .body(body)
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(response.body());
    assert_eq!(error.message, "missing form parts");

    assert!(f.db.documents().is_empty());
}

#[tokio::test]
async fn trips_can_be_cancelled_once() {
    let f = Fixture::scenario();
    let filter = main_routes(f.environment.clone());

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/trips/{}/cancel", USERNAME, f.trip.id))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = parse(response.body());
    assert_eq!(body["status"], json!("cancelled"));

    let response = warp::test::request()
        .method("POST")
        .path(&format!("/{}/trips/{}/complete", USERNAME, f.trip.id))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = parse(response.body());
    assert_eq!(body["target"], json!("completed"));

    let trip = f.db.retrieve_trip(&f.trip.id).await.unwrap().unwrap();
    assert_eq!(trip.status, TripStatus::Cancelled);
}

#[tokio::test]
async fn administrators_configure_requirements() {
    let f = Fixture::scenario();
    let filter = admin_routes(f.environment.clone());

    let response = warp::test::request()
        .method("GET")
        .path("/healthz")
        .reply(&filter)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = parse(response.body());
    assert!(body["version"].is_string());

    let update = json!({
        "humanDocs": ["passport", "travelTicket", "passport"],
        "petDocs": { f.rex.id.to_string(): ["cvi"] },
    });

    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/trips/{}/required-documents", f.trip.id))
        .json(&update)
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = parse(response.body());
    assert_eq!(body["humanDocs"], json!(["passport", "travelTicket"]));

    let trip = f.db.retrieve_trip(&f.trip.id).await.unwrap().unwrap();
    assert_eq!(
        trip.required_documents.for_pet(&f.rex.id),
        &[DocumentType::Cvi][..]
    );

    let response = warp::test::request()
        .method("GET")
        .path(&format!("/trips/{}/progress", f.trip.id))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = parse(response.body());
    assert_eq!(body["tutorProgress"]["total"], json!(2));

    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/trips/{}/required-documents", f.trip.id))
        .body("{\"humanDocs\": \"passport\"}")
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error: ErrorResponse = parse(response.body());
    assert_eq!(error.message, "required documents are malformed");

    let response = warp::test::request()
        .method("PUT")
        .path(&format!("/trips/{}/required-documents", EntityId::new()))
        .json(&json!({}))
        .reply(&filter)
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
