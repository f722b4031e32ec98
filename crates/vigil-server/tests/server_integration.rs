//! End-to-end coverage of the HTTP external interface and a handful of
//! the service's testable scenarios: registration, check-in gating,
//! camera lifecycle, and presence reporting.

mod common;

use anyhow::Result;
use base64::Engine;
use common::TestServer;
use image::{codecs::png::PngEncoder, ImageEncoder};
use serde_json::json;

/// A solid-color PNG. Varying `fill` yields a different pixel hash, which
/// the mock detector turns into a different embedding.
fn face_png_bytes(fill: u8) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 64, image::Rgb([fill, fill, fill]));
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(img.as_raw(), 64, 64, image::ExtendedColorType::Rgb8)
        .unwrap();
    png
}

/// Base64-encoded the way `/attendance/check-in` expects its body.
fn face_image_base64(fill: u8) -> String {
    base64::engine::general_purpose::STANDARD.encode(face_png_bytes(fill))
}

#[tokio::test]
async fn health_reports_ok() -> Result<()> {
    let server = TestServer::start().await?;
    let resp = server.get("/health").send().await?;
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["status"], "ok");
    Ok(())
}

async fn register_and_enroll(server: &TestServer, external_id: &str, fill: u8) -> Result<()> {
    server
        .post("/students/register")
        .json(&json!({
            "external_id": external_id,
            "first_name": "Ada",
            "last_name": "Lovelace",
            "group": "cs101",
        }))
        .send()
        .await?;

    let form = reqwest::multipart::Form::new()
        .part("image", reqwest::multipart::Part::bytes(face_png_bytes(fill)).file_name("face.png"));
    let resp = server
        .client
        .post(format!("{}/students/{external_id}/upload-images", server.base_url()))
        .multipart(form)
        .send()
        .await?;
    assert!(resp.status().is_success(), "enrollment upload should succeed");
    Ok(())
}

#[tokio::test]
async fn register_then_check_in_creates_attendance() -> Result<()> {
    let server = TestServer::start().await?;
    register_and_enroll(&server, "stu-1", 10).await?;

    let resp = server
        .post("/attendance/check-in")
        .json(&json!({ "image_base64": face_image_base64(10) }))
        .send()
        .await?;
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["status"], "success");
    assert!(body["confidence"].as_f64().unwrap() >= 0.6);
    assert!(body["attendance_id"].is_number());
    assert!(!body["check_in_time"].is_null());

    Ok(())
}

#[tokio::test]
async fn second_check_in_same_day_reports_already_attended() -> Result<()> {
    let server = TestServer::start().await?;
    register_and_enroll(&server, "stu-2", 20).await?;

    let first = server
        .post("/attendance/check-in")
        .json(&json!({ "image_base64": face_image_base64(20) }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(first["status"], "success");

    let second = server
        .post("/attendance/check-in")
        .json(&json!({ "image_base64": face_image_base64(20) }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(second["status"], "already_attended");
    assert_eq!(second["check_in_time"], first["check_in_time"]);

    Ok(())
}

#[tokio::test]
async fn check_in_with_unenrolled_face_reports_no_match() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .post("/attendance/check-in")
        .json(&json!({ "image_base64": face_image_base64(200) }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(resp["status"], "no_match");
    assert!(resp["person"].is_null());

    Ok(())
}

#[tokio::test]
async fn check_in_below_attendance_min_reports_no_match() -> Result<()> {
    let server = TestServer::start_with(|config| {
        config.attendance.attendance_min = 0.99;
    })
    .await?;
    register_and_enroll(&server, "stu-3", 30).await?;

    let resp = server
        .post("/attendance/check-in")
        .json(&json!({ "image_base64": face_image_base64(30) }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(resp["status"], "no_match");

    Ok(())
}

#[tokio::test]
async fn check_in_with_undecodable_image_reports_error() -> Result<()> {
    let server = TestServer::start().await?;

    let resp = server
        .post("/attendance/check-in")
        .json(&json!({ "image_base64": base64::engine::general_purpose::STANDARD.encode(b"not an image") }))
        .send()
        .await?
        .json::<serde_json::Value>()
        .await?;
    assert_eq!(resp["status"], "error");

    Ok(())
}

#[tokio::test]
async fn room_and_camera_lifecycle() -> Result<()> {
    let server = TestServer::start().await?;

    let room: serde_json::Value = server
        .post("/rooms")
        .json(&json!({ "name": "Room A" }))
        .send()
        .await?
        .json()
        .await?;
    let room_id = room["id"].as_i64().unwrap();

    let camera: serde_json::Value = server
        .post(&format!("/rooms/{room_id}/cameras"))
        .json(&json!({ "name": "Cam 1", "source_address": "mock://cam1" }))
        .send()
        .await?
        .json()
        .await?;
    let camera_id = camera["id"].as_i64().unwrap();

    let resp = server
        .post(&format!("/rooms/{room_id}/cameras/{camera_id}/start"))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let health: serde_json::Value = server.get("/health").send().await?.json().await?;
    assert_eq!(health["active_cameras"], 1);

    let resp = server
        .post(&format!("/rooms/{room_id}/cameras/{camera_id}/stop"))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let health: serde_json::Value = server.get("/health").send().await?.json().await?;
    assert_eq!(health["active_cameras"], 0);

    Ok(())
}

#[tokio::test]
async fn presence_endpoints_respond_empty_with_no_cameras_running() -> Result<()> {
    let server = TestServer::start().await?;
    let resp = server.get("/rooms/presence/all").send().await?;
    assert!(resp.status().is_success());
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["total_occupants"], 0);
    Ok(())
}

#[tokio::test]
async fn list_students_paginates() -> Result<()> {
    let server = TestServer::start().await?;
    for i in 0..3 {
        server
            .post("/students/register")
            .json(&json!({
                "external_id": format!("stu-list-{i}"),
                "first_name": "Test",
                "last_name": format!("Person{i}"),
                "group": null,
            }))
            .send()
            .await?;
    }

    let resp: serde_json::Value = server.get("/students?limit=2").send().await?.json().await?;
    assert_eq!(resp["students"].as_array().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn delete_student_removes_record() -> Result<()> {
    let server = TestServer::start().await?;
    server
        .post("/students/register")
        .json(&json!({
            "external_id": "stu-del",
            "first_name": "Delete",
            "last_name": "Me",
            "group": null,
        }))
        .send()
        .await?;

    let resp = server.delete("/students/stu-del").send().await?;
    assert!(resp.status().is_success());

    let resp = server.get("/students/stu-del").send().await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}
