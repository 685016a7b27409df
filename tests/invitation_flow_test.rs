mod common;

use common::{client, signup_school, signup_senior, spawn};

/// A school invites, two seniors answer, one changes their mind, and the
/// school reviews the final tally.
#[tokio::test]
async fn invitation_lifecycle() {
    let server = spawn().await;

    let school = client();
    signup_school(&school, &server.base_url, "office@gvh.edu").await;

    let asha = client();
    signup_senior(&asha, &server.base_url, "asha@example.com").await;
    let bimal = client();
    signup_senior(&bimal, &server.base_url, "bimal@example.com").await;

    // School publishes an invitation.
    let resp = school
        .post(format!("{}/invitations", server.base_url))
        .json(&serde_json::json!({
            "title": "Guest Lecture",
            "description": "Share your farming experience with grade 8",
            "event_date": "2026-09-10T10:00:00+05:30",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: serde_json::Value = resp.json().await.unwrap();
    let invitation_id = body["id"].as_str().unwrap().to_string();

    // Both seniors see it in their feed.
    let feed: serde_json::Value = asha
        .get(format!("{}/invitations", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["title"], "Guest Lecture");
    assert_eq!(feed[0]["school_name"], "Green Valley High");
    assert!(feed[0]["my_status"].is_null());

    // Asha accepts, Bimal rejects.
    let resp = asha
        .post(format!(
            "{}/invitations/{}/respond",
            server.base_url, invitation_id
        ))
        .json(&serde_json::json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    bimal
        .post(format!(
            "{}/invitations/{}/respond",
            server.base_url, invitation_id
        ))
        .json(&serde_json::json!({ "status": "rejected" }))
        .send()
        .await
        .unwrap();

    // The school's own listing shows the acceptance inline on the card.
    let listing: serde_json::Value = school
        .get(format!("{}/invitations", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing[0]["accepted_count"], 1);
    assert_eq!(listing[0]["accepted_responders"].as_array().unwrap().len(), 1);
    assert_eq!(
        listing[0]["accepted_responders"][0]["email"],
        "asha@example.com"
    );

    // Asha changes her mind.
    asha.post(format!(
        "{}/invitations/{}/respond",
        server.base_url, invitation_id
    ))
    .json(&serde_json::json!({ "status": "rejected" }))
    .send()
    .await
    .unwrap();

    // Her feed shows only the latest answer.
    let feed: serde_json::Value = asha
        .get(format!("{}/invitations", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed[0]["my_status"], "rejected");

    // The school sees one row per senior, latest status, zero accepted.
    let review: serde_json::Value = school
        .get(format!(
            "{}/invitations/{}/responses",
            server.base_url, invitation_id
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(review["responses"].as_array().unwrap().len(), 2);
    assert_eq!(review["accepted_count"], 0);
}

#[tokio::test]
async fn only_the_owning_school_reviews_responses() {
    let server = spawn().await;

    let school = client();
    signup_school(&school, &server.base_url, "office@gvh.edu").await;
    let other_school = client();
    signup_school(&other_school, &server.base_url, "office@other.edu").await;

    let resp = school
        .post(format!("{}/invitations", server.base_url))
        .json(&serde_json::json!({ "title": "Craft Workshop" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let invitation_id = body["id"].as_str().unwrap().to_string();

    let resp = other_school
        .get(format!(
            "{}/invitations/{}/responses",
            server.base_url, invitation_id
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // Nor can the other school delete it.
    let resp = other_school
        .delete(format!("{}/invitations/{}", server.base_url, invitation_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    // The owner can.
    let resp = school
        .delete(format!("{}/invitations/{}", server.base_url, invitation_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
}

#[tokio::test]
async fn schools_only_see_their_own_invitations() {
    let server = spawn().await;

    let school = client();
    signup_school(&school, &server.base_url, "office@gvh.edu").await;
    let other_school = client();
    signup_school(&other_school, &server.base_url, "office@other.edu").await;

    school
        .post(format!("{}/invitations", server.base_url))
        .json(&serde_json::json!({ "title": "Mine" }))
        .send()
        .await
        .unwrap();

    let feed: serde_json::Value = other_school
        .get(format!("{}/invitations", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(feed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn responding_to_a_deleted_invitation_is_not_found() {
    let server = spawn().await;

    let school = client();
    signup_school(&school, &server.base_url, "office@gvh.edu").await;
    let asha = client();
    signup_senior(&asha, &server.base_url, "asha@example.com").await;

    let resp = school
        .post(format!("{}/invitations", server.base_url))
        .json(&serde_json::json!({ "title": "Short-lived" }))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    let invitation_id = body["id"].as_str().unwrap().to_string();

    school
        .delete(format!("{}/invitations/{}", server.base_url, invitation_id))
        .send()
        .await
        .unwrap();

    let resp = asha
        .post(format!(
            "{}/invitations/{}/respond",
            server.base_url, invitation_id
        ))
        .json(&serde_json::json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
