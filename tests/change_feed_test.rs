mod common;

use std::time::Duration;

use common::{client, signup_school, signup_senior, spawn};
use futures::StreamExt;

/// Read from an SSE byte stream until a full `change` event arrives or the
/// timeout hits.
async fn next_change_event(resp: reqwest::Response) -> Option<String> {
    let mut stream = resp.bytes_stream();
    let mut buf = String::new();

    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.ok()?;
            buf.push_str(&String::from_utf8_lossy(&chunk));
            if let Some(data) = buf.split("\n\n").find_map(|block| {
                if !block.contains("event: change") {
                    return None;
                }
                block
                    .lines()
                    .find_map(|l| l.strip_prefix("data: "))
                    .map(str::to_string)
            }) {
                return Some(data);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

#[tokio::test]
async fn seniors_receive_invitation_changes() {
    let server = spawn().await;

    let senior = client();
    signup_senior(&senior, &server.base_url, "asha@example.com").await;

    let feed = senior
        .get(format!("{}/events", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(feed.status(), 200);

    let school = client();
    signup_school(&school, &server.base_url, "office@gvh.edu").await;
    let resp = school
        .post(format!("{}/invitations", server.base_url))
        .json(&serde_json::json!({ "title": "Guest Lecture" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let data = next_change_event(feed).await.expect("no change event received");
    let event: serde_json::Value = serde_json::from_str(&data).unwrap();
    assert_eq!(event["table"], "invitations");
    assert_eq!(event["op"], "insert");
}

#[tokio::test]
async fn students_do_not_see_foreign_profile_changes() {
    let server = spawn().await;

    let student = client();
    common::signup_student(&student, &server.base_url, "ravi@example.com").await;

    let feed = student
        .get(format!("{}/events", server.base_url))
        .send()
        .await
        .unwrap();

    // Another user's profile changes...
    let senior = client();
    signup_senior(&senior, &server.base_url, "asha@example.com").await;
    senior
        .put(format!("{}/profile", server.base_url))
        .json(&serde_json::json!({
            "full_name": "Asha K.",
            "age": 69,
            "mobile_number": "9876543210",
            "email": "asha@example.com",
            "interests": ["Cooking"],
        }))
        .send()
        .await
        .unwrap();

    // ...and the student's feed stays quiet.
    let mut stream = feed.bytes_stream();
    let got_event = tokio::time::timeout(Duration::from_secs(2), async {
        let mut buf = String::new();
        while let Some(Ok(chunk)) = stream.next().await {
            buf.push_str(&String::from_utf8_lossy(&chunk));
            if buf.contains("event: change") {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);

    assert!(!got_event, "foreign profile change leaked into the feed");
}
