//! Surgery request -> budget -> patient decision, end to end over HTTP.

mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{decimal, spawn_app, spawn_app_with, with_token, TestApp};

struct Flow {
    app: TestApp,
    staff: String,
    patient: String,
    patient_id: Uuid,
}

async fn flow_with(app: TestApp) -> Flow {
    app.provision("secretaria@clinica.com", "senha-sec", "secretary").await;
    let patient_id = app.provision("paciente@clinica.com", "senha-pac", "user").await;
    let staff = app.login("secretaria@clinica.com", "senha-sec").await;
    let patient = app.login("paciente@clinica.com", "senha-pac").await;
    Flow {
        app,
        staff,
        patient,
        patient_id,
    }
}

async fn flow() -> Flow {
    flow_with(spawn_app().await).await
}

impl Flow {
    async fn surgery_request(&self) -> Value {
        let response = with_token(self.app.server.post("/api/surgery-requests"), &self.staff)
            .json(&json!({
                "patient_id": self.patient_id,
                "doctor_id": Uuid::new_v4(),
                "needs_icu": true,
                "icu_days": "3",
                "ward_days": 2,
                "room_days": "",
                "doctor_fee": "5000",
                "opme_requests": [{ "opme_id": Uuid::new_v4(), "quantity": 2 }]
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json()
    }

    async fn budget(&self, surgery_request_id: &Value) -> Value {
        let supplier = Uuid::new_v4();
        let response = with_token(self.app.server.post("/api/budgets"), &self.staff)
            .json(&json!({
                "surgery_request_id": surgery_request_id,
                "hospital_id": Uuid::new_v4(),
                "icu_daily_cost": "1000,00",
                "ward_daily_cost": 0,
                "anesthetist_fee": 800,
                "opme_quotes": [{
                    "opme_id": Uuid::new_v4(),
                    "description": "Parafuso pedicular",
                    "selected_supplier_id": supplier,
                    "quotes": [
                        { "supplier_id": supplier, "price": "1200" },
                        { "supplier_id": Uuid::new_v4(), "price": 1500 }
                    ]
                }],
                "total_cost": 1
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json()
    }

    async fn tracking(&self, surgery_request_id: &Value) -> Value {
        let response = with_token(self.app.server.post("/api/tracking"), &self.staff)
            .json(&json!({
                "surgery_request_id": surgery_request_id,
                "user_id": self.patient_id
            }))
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json()
    }

    async fn attach(&self, tracking_id: &str, budget_id: &Value) -> axum_test::TestResponse {
        with_token(
            self.app.server.post(&format!("/api/tracking/{}/budget", tracking_id)),
            &self.staff,
        )
        .json(&json!({ "budget_id": budget_id }))
        .await
    }

    async fn decide(&self, token: &str, tracking_id: &str, body: Value) -> axum_test::TestResponse {
        with_token(
            self.app.server.post(&format!("/api/tracking/{}/decision", tracking_id)),
            token,
        )
        .json(&body)
        .await
    }

    /// Request, budget and tracking with the budget already sent to the patient.
    async fn awaiting_patient(&self) -> (Value, String) {
        let request = self.surgery_request().await;
        let budget = self.budget(&request["id"]).await;
        let tracking = self.tracking(&request["id"]).await;
        let tracking_id = tracking["id"].as_str().unwrap().to_string();

        let attached = self.attach(&tracking_id, &budget["id"]).await;
        assert_eq!(attached.status_code(), StatusCode::OK);
        assert_eq!(attached.json::<Value>()["status"], "awaiting_patient");
        (budget, tracking_id)
    }
}

#[tokio::test]
async fn test_budget_total_is_computed_not_accepted() {
    let f = flow().await;
    let request = f.surgery_request().await;
    let budget = f.budget(&request["id"]).await;

    assert_eq!(decimal(&budget["breakdown"]["subtotal"]), dec!(10000));
    assert_eq!(decimal(&budget["breakdown"]["serviceFee"]), dec!(200));
    assert_eq!(decimal(&budget["breakdown"]["total"]), dec!(10200));
    assert_eq!(
        decimal(&budget["total_cost"]),
        dec!(10200),
        "Client-supplied total_cost must be ignored"
    );
    assert_eq!(budget["status"], "AWAITING_QUOTE");

    let fetched: Value = with_token(
        f.app.server.get(&format!("/api/budgets/{}", budget["id"].as_str().unwrap())),
        &f.staff,
    )
    .await
    .json();
    assert_eq!(decimal(&fetched["total_cost"]), dec!(10200));
}

#[tokio::test]
async fn test_patient_reads_only_requests_they_track() {
    let f = flow().await;
    let request = f.surgery_request().await;
    let budget = f.budget(&request["id"]).await;
    let request_path = format!("/api/surgery-requests/{}", request["id"].as_str().unwrap());
    let budget_path = format!("/api/budgets/{}", budget["id"].as_str().unwrap());

    // No tracking yet: the patient has no link to this request.
    let before = with_token(f.app.server.get(&budget_path), &f.patient).await;
    assert_eq!(before.status_code(), StatusCode::FORBIDDEN);

    f.tracking(&request["id"]).await;
    let own_request = with_token(f.app.server.get(&request_path), &f.patient).await;
    assert_eq!(own_request.status_code(), StatusCode::OK);
    assert_eq!(own_request.json::<Value>()["id"], request["id"]);
    let own_budget = with_token(f.app.server.get(&budget_path), &f.patient).await;
    assert_eq!(own_budget.status_code(), StatusCode::OK);
    assert_eq!(decimal(&own_budget.json::<Value>()["total_cost"]), dec!(10200));

    f.app.provision("outro@clinica.com", "senha-out", "user").await;
    let other = f.app.login("outro@clinica.com", "senha-out").await;
    for path in [&request_path, &budget_path] {
        let response = with_token(f.app.server.get(path), &other).await;
        assert_eq!(response.status_code(), StatusCode::FORBIDDEN, "{} must not leak", path);
        assert!(response.json::<Value>()["error"].is_string());
    }
}

#[tokio::test]
async fn test_amounts_beyond_limits_are_rejected() {
    let f = flow().await;
    let request = f.surgery_request().await;

    let cases = [
        json!({ "surgery_request_id": request["id"], "hospital_id": Uuid::new_v4(), "icu_daily_cost": "79228162514264337593543950335" }),
        json!({ "surgery_request_id": request["id"], "hospital_id": Uuid::new_v4(), "anesthetist_fee": "100.005" }),
    ];
    for body in cases {
        let response = with_token(f.app.server.post("/api/budgets"), &f.staff)
            .json(&body)
            .await;
        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST, "Body {} must be rejected", body);
    }
}

#[tokio::test]
async fn test_budget_update_recomputes_total() {
    let f = flow().await;
    let request = f.surgery_request().await;
    let budget = f.budget(&request["id"]).await;

    let response = with_token(
        f.app.server.put(&format!("/api/budgets/{}", budget["id"].as_str().unwrap())),
        &f.staff,
    )
    .json(&json!({
        "surgery_request_id": request["id"],
        "hospital_id": budget["hospital_id"],
        "icu_daily_cost": 2000,
        "doctor_fee": 6000
    }))
    .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let updated: Value = response.json();
    // 3 ICU days at 2000 plus the budget's own doctor fee.
    assert_eq!(decimal(&updated["breakdown"]["subtotal"]), dec!(12000));
    assert_eq!(decimal(&updated["total_cost"]), dec!(12240));
}

#[tokio::test]
async fn test_service_fee_rate_comes_from_config() {
    let app = spawn_app_with(|config| {
        config.service_fee_rate =
            cirplane::services::pricing::ServiceFeeRate::new(dec!(0.05)).unwrap();
    })
    .await;
    let f = flow_with(app).await;
    let request = f.surgery_request().await;
    let budget = f.budget(&request["id"]).await;

    assert_eq!(decimal(&budget["breakdown"]["serviceFee"]), dec!(500));
    assert_eq!(decimal(&budget["total_cost"]), dec!(10500));
}

#[tokio::test]
async fn test_patient_approves_budget() {
    let f = flow().await;
    let (budget, tracking_id) = f.awaiting_patient().await;

    let response = f
        .decide(
            &f.patient,
            &tracking_id,
            json!({ "decision": "approved", "feedback": "Pode agendar" }),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let record: Value = response.json();
    assert_eq!(record["status"], "approved");
    assert_eq!(record["user_approval"], "approved");
    assert_eq!(record["user_feedback"], "Pode agendar");
    assert_eq!(record["budget_id"], budget["id"]);

    // Recording a decision never touches the budget.
    let after: Value = with_token(
        f.app.server.get(&format!("/api/budgets/{}", budget["id"].as_str().unwrap())),
        &f.staff,
    )
    .await
    .json();
    assert_eq!(after["status"], budget["status"]);
    assert_eq!(after["total_cost"], budget["total_cost"]);
    assert_eq!(after["updated_at"], budget["updated_at"]);
}

#[tokio::test]
async fn test_blank_feedback_is_stored_as_absent() {
    let f = flow().await;
    let (_, tracking_id) = f.awaiting_patient().await;

    let response = f
        .decide(&f.patient, &tracking_id, json!({ "decision": "rejected", "feedback": "   " }))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let record: Value = response.json();
    assert_eq!(record["status"], "rejected");
    assert!(record["user_feedback"].is_null());
}

#[tokio::test]
async fn test_second_decision_conflicts() {
    let f = flow().await;
    let (_, tracking_id) = f.awaiting_patient().await;

    let first = f
        .decide(&f.patient, &tracking_id, json!({ "decision": "revision_requested" }))
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);

    let second = f
        .decide(&f.patient, &tracking_id, json!({ "decision": "approved" }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);

    let record: Value = with_token(
        f.app.server.get(&format!("/api/tracking/{}", tracking_id)),
        &f.patient,
    )
    .await
    .json();
    assert_eq!(record["status"], "revision_requested", "Rejected decision must not change the record");
}

#[tokio::test]
async fn test_decision_before_budget_is_sent_conflicts() {
    let f = flow().await;
    let request = f.surgery_request().await;
    let tracking = f.tracking(&request["id"]).await;

    let response = f
        .decide(
            &f.patient,
            tracking["id"].as_str().unwrap(),
            json!({ "decision": "approved" }),
        )
        .await;

    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert!(response.json::<Value>()["error"].as_str().unwrap().contains("in_progress"));
}

#[tokio::test]
async fn test_only_owner_or_admin_decides() {
    let f = flow().await;
    let (_, tracking_id) = f.awaiting_patient().await;
    f.app.provision("intruso@clinica.com", "senha-int", "user").await;
    let intruder = f.app.login("intruso@clinica.com", "senha-int").await;

    let response = f
        .decide(&intruder, &tracking_id, json!({ "decision": "approved" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let read = with_token(
        f.app.server.get(&format!("/api/tracking/{}", tracking_id)),
        &intruder,
    )
    .await;
    assert_eq!(read.status_code(), StatusCode::FORBIDDEN);

    let admin = f.app.admin_token().await;
    let response = f
        .decide(&admin, &tracking_id, json!({ "decision": "approved" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_budget_cannot_be_attached_twice_without_revision_cycle() {
    let f = flow().await;
    let (budget, tracking_id) = f.awaiting_patient().await;

    let again = f.attach(&tracking_id, &budget["id"]).await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);

    f.decide(&f.patient, &tracking_id, json!({ "decision": "revision_requested" }))
        .await;
    let after_revision = f.attach(&tracking_id, &budget["id"]).await;
    assert_eq!(after_revision.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_revision_cycle_allows_resending() {
    let app = spawn_app_with(|config| config.allow_revision_cycle = true).await;
    let f = flow_with(app).await;
    let (budget, tracking_id) = f.awaiting_patient().await;

    f.decide(&f.patient, &tracking_id, json!({ "decision": "revision_requested" }))
        .await;
    let resent = f.attach(&tracking_id, &budget["id"]).await;

    assert_eq!(resent.status_code(), StatusCode::OK);
    assert_eq!(resent.json::<Value>()["status"], "awaiting_patient");
}

#[tokio::test]
async fn test_budget_from_other_request_cannot_be_attached() {
    let f = flow().await;
    let first = f.surgery_request().await;
    let second = f.surgery_request().await;
    let foreign_budget = f.budget(&second["id"]).await;
    let tracking = f.tracking(&first["id"]).await;

    let response = f
        .attach(tracking["id"].as_str().unwrap(), &foreign_budget["id"])
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_patients_cannot_manage_budgets() {
    let f = flow().await;
    let request = f.surgery_request().await;

    let response = with_token(f.app.server.post("/api/budgets"), &f.patient)
        .json(&json!({
            "surgery_request_id": request["id"],
            "hospital_id": Uuid::new_v4()
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let other = with_token(f.app.server.post("/api/tracking"), &f.patient)
        .json(&json!({
            "surgery_request_id": request["id"],
            "user_id": Uuid::new_v4()
        }))
        .await;
    assert_eq!(other.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_surgery_request_validation() {
    let f = flow().await;

    let negative = with_token(f.app.server.post("/api/surgery-requests"), &f.staff)
        .json(&json!({
            "patient_id": f.patient_id,
            "doctor_id": Uuid::new_v4(),
            "ward_days": -1,
            "doctor_fee": 100
        }))
        .await;
    assert_eq!(negative.status_code(), StatusCode::BAD_REQUEST);

    let garbage = with_token(f.app.server.post("/api/surgery-requests"), &f.staff)
        .json(&json!({
            "patient_id": f.patient_id,
            "doctor_id": Uuid::new_v4(),
            "doctor_fee": "cinco mil"
        }))
        .await;
    assert!(garbage.status_code().is_client_error());

    let missing = with_token(f.app.server.get(&format!("/api/surgery-requests/{}", Uuid::new_v4())), &f.staff).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_requires_session() {
    let app = spawn_app().await;
    let response = app.server.get("/api/doctors").await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(response.json::<Value>()["error"].is_string());
}
