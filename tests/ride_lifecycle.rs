//! End-to-end ride lifecycle over the REST surface.

use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{access_token, create_test_app, register, send};

fn ride_request_body() -> serde_json::Value {
    json!({
        "pickupLocation": {"latitude": 1.0, "longitude": 1.0},
        "dropoffLocation": {"latitude": 2.0, "longitude": 2.0},
        "estimatedPrice": 10.0,
        "estimatedDistance": 4.2,
        "estimatedDuration": 17.0,
    })
}

#[tokio::test]
async fn full_lifecycle_with_competing_drivers_and_ratings() {
    let (app, _state) = create_test_app();
    let rider = access_token(&register(&app, "Rhea", "rhea@example.com", "rider").await);
    let driver_a = access_token(&register(&app, "Ana", "ana@example.com", "driver").await);
    let driver_b = access_token(&register(&app, "Ben", "ben@example.com", "driver").await);

    // rider creates the ride
    let (status, body) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(ride_request_body()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["ride"]["status"], "pending");
    assert!(body["ride"]["driverId"].is_null());
    let ride_id = body["ride"]["id"].as_str().unwrap().to_string();

    // driver A accepts
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/accept"),
        Some(&driver_a),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ride"]["status"], "accepted");
    let driver_a_id = body["ride"]["driverId"].as_str().unwrap().to_string();

    // driver B is too late
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/accept"),
        Some(&driver_b),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Ride cannot be accepted. Current status: accepted"
    );

    // completing before the ride started is a conflict
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/complete"),
        Some(&driver_a),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Ride cannot be completed. Current status: accepted"
    );

    // driver A starts the ride through the location-update path
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/location"),
        Some(&driver_a),
        Some(json!({
            "currentLocation": {"latitude": 1.1, "longitude": 1.1},
            "status": "in_progress",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ride"]["status"], "in_progress");
    assert!(body["ride"]["startTime"].is_string());
    assert_eq!(body["ride"]["currentLocation"]["latitude"], 1.1);

    // canceling an in-progress ride is rejected, on both paths
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/cancel"),
        Some(&rider),
        Some(json!({"reason": "too late"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Ride cannot be canceled. Current status: in_progress"
    );
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/location"),
        Some(&driver_a),
        Some(json!({"status": "canceled"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["message"],
        "Cannot update status from in_progress to canceled"
    );

    // driver A completes with an actual price
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/complete"),
        Some(&driver_a),
        Some(json!({"actualPrice": 12.50})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ride"]["status"], "completed");
    assert_eq!(body["ride"]["actualPrice"], 12.5);
    assert!(body["ride"]["endTime"].is_string());
    assert_eq!(body["ride"]["driverId"], driver_a_id.as_str());

    // rider rates the driver
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/rides/{ride_id}/rate"),
        Some(&rider),
        Some(json!({"rating": 5, "comment": "great ride"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["ride"]["driverRating"], 5);
    assert_eq!(body["ride"]["driverComment"], "great ride");

    // a second rating from the same side is rejected, the first kept
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/rides/{ride_id}/rate"),
        Some(&rider),
        Some(json!({"rating": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Ride already rated");

    // the driver's own rating goes to the other side
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/rides/{ride_id}/rate"),
        Some(&driver_a),
        Some(json!({"rating": 4})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ride"]["riderRating"], 4);
    assert_eq!(body["ride"]["driverRating"], 5);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/rides/{ride_id}/rate"),
        Some(&driver_a),
        Some(json!({"rating": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Ride already rated");
}

#[tokio::test]
async fn ride_request_requires_both_locations() {
    let (app, _state) = create_test_app();
    let rider = access_token(&register(&app, "Rhea", "rhea@example.com", "rider").await);
    let driver = access_token(&register(&app, "Ana", "ana@example.com", "driver").await);

    let (status, body) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(json!({
            "pickupLocation": {"latitude": 1.0, "longitude": 1.0},
            "estimatedPrice": 10.0,
            "estimatedDistance": 4.0,
            "estimatedDuration": 15.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Pickup and dropoff locations are required");

    // drivers cannot open ride requests
    let (status, _) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&driver),
        Some(ride_request_body()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn ride_access_is_limited_to_participants() {
    let (app, _state) = create_test_app();
    let rider = access_token(&register(&app, "Rhea", "rhea@example.com", "rider").await);
    let stranger = access_token(&register(&app, "Sam", "sam@example.com", "rider").await);

    let (_, body) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(ride_request_body()),
    )
    .await;
    let ride_id = body["ride"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/api/rides/{ride_id}"),
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        &format!("/api/rides/{ride_id}"),
        Some(&stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Unauthorized to access this ride");

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/cancel"),
        Some(&stranger),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // riders cannot accept, even their own ride
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/api/rides/{ride_id}/accept"),
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Only drivers can accept rides");

    // unknown ride id is a 404
    let (status, _) = send(
        &app,
        "GET",
        "/api/rides/00000000-0000-0000-0000-000000000000",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rating_score_is_validated_before_anything_else() {
    let (app, _state) = create_test_app();
    let rider = access_token(&register(&app, "Rhea", "rhea@example.com", "rider").await);

    // even against a ride that does not exist
    let (status, body) = send(
        &app,
        "POST",
        "/api/rides/00000000-0000-0000-0000-000000000000/rate",
        Some(&rider),
        Some(json!({"rating": 6})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Rating must be between 1 and 5");

    // and a pending ride cannot be rated at all
    let (_, body) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(ride_request_body()),
    )
    .await;
    let ride_id = body["ride"]["id"].as_str().unwrap().to_string();
    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/rides/{ride_id}/rate"),
        Some(&rider),
        Some(json!({"rating": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Only completed rides can be rated");
}

#[tokio::test]
async fn history_filters_by_role_and_status() {
    let (app, _state) = create_test_app();
    let rider = access_token(&register(&app, "Rhea", "rhea@example.com", "rider").await);
    let driver = access_token(&register(&app, "Ana", "ana@example.com", "driver").await);

    // two rides; the driver accepts and cancels the second
    let (_, body) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(ride_request_body()),
    )
    .await;
    let first = body["ride"]["id"].as_str().unwrap().to_string();
    let (_, body) = send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(ride_request_body()),
    )
    .await;
    let second = body["ride"]["id"].as_str().unwrap().to_string();

    send(
        &app,
        "PUT",
        &format!("/api/rides/{second}/accept"),
        Some(&driver),
        None,
    )
    .await;
    send(
        &app,
        "PUT",
        &format!("/api/rides/{second}/cancel"),
        Some(&driver),
        Some(json!({"reason": "no show"})),
    )
    .await;

    // rider sees both, newest first
    let (status, body) = send(
        &app,
        "GET",
        "/api/rides/user/history?role=rider",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 2);
    assert_eq!(body["rides"][0]["id"], second.as_str());
    assert_eq!(body["rides"][1]["id"], first.as_str());

    // the rider has no rides on the driver side
    let (_, body) = send(
        &app,
        "GET",
        "/api/rides/user/history?role=driver",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(body["count"], 0);

    // the driver was party to the canceled one only
    let (_, body) = send(
        &app,
        "GET",
        "/api/rides/user/history?role=driver",
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["rides"][0]["id"], second.as_str());
    assert_eq!(body["rides"][0]["cancelReason"], "no show");

    // status narrowing
    let (_, body) = send(
        &app,
        "GET",
        "/api/rides/user/history?status=pending",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["rides"][0]["id"], first.as_str());

    // bad filters are validation errors
    let (status, _) = send(
        &app,
        "GET",
        "/api/rides/user/history?role=owner",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(
        &app,
        "GET",
        "/api/rides/user/history?status=parked",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn available_rides_filter_by_distance_when_a_location_is_given() {
    let (app, _state) = create_test_app();
    let rider = access_token(&register(&app, "Rhea", "rhea@example.com", "rider").await);
    let driver = access_token(&register(&app, "Ana", "ana@example.com", "driver").await);

    // one pickup near the origin, one ~111 km north
    send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(json!({
            "pickupLocation": {"latitude": 10.0, "longitude": 10.0},
            "dropoffLocation": {"latitude": 10.2, "longitude": 10.2},
            "estimatedPrice": 8.0,
            "estimatedDistance": 3.0,
            "estimatedDuration": 10.0,
        })),
    )
    .await;
    send(
        &app,
        "POST",
        "/api/rides/request",
        Some(&rider),
        Some(json!({
            "pickupLocation": {"latitude": 11.0, "longitude": 10.0},
            "dropoffLocation": {"latitude": 11.2, "longitude": 10.2},
            "estimatedPrice": 8.0,
            "estimatedDistance": 3.0,
            "estimatedDuration": 10.0,
        })),
    )
    .await;

    // no location: every pending ride
    let (status, body) = send(
        &app,
        "GET",
        "/api/rides/available/requests",
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["count"], 2);

    // a 5 km default radius keeps only the nearby pickup
    let (_, body) = send(
        &app,
        "GET",
        "/api/rides/available/requests?latitude=10.0&longitude=10.0",
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["rides"][0]["pickupLocation"]["latitude"], 10.0);

    // a wide radius brings the far one back
    let (_, body) = send(
        &app,
        "GET",
        "/api/rides/available/requests?latitude=10.0&longitude=10.0&radius=200",
        Some(&driver),
        None,
    )
    .await;
    assert_eq!(body["count"], 2);

    // the feed is for drivers
    let (status, _) = send(
        &app,
        "GET",
        "/api/rides/available/requests",
        Some(&rider),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
