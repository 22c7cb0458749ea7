#[cfg(test)]
mod integration_tests {
    use crate::handlers::ai::SuggestionsResponse;
    use crate::handlers::auth::TokenResponse;
    use crate::handlers::categories::CategoryResponse;
    use crate::handlers::imports::{ConfirmImportResponse, ImportUploadResponse};
    use crate::handlers::transactions::{TransactionPage, TransactionResponse};
    use crate::handlers::users::UserResponse;
    use crate::schemas::{ApiResponse, ErrorResponse};
    use crate::test_utils::test_utils::{
        StubModel, StubOcr, bearer, create_user_with_token, png_bytes, server_for, setup_test_app_state_with,
        setup_test_server, test_keys,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use chrono::{NaiveDate, Utc};
    use common::{
        CandidateTransaction, ChartKind, ImportMethod, ImportPreview, Insight, ReceiptExtraction, ReceiptMethod,
        StatsSummary, TransactionKind,
    };
    use compute::ai::UnconfiguredModel;
    use compute::import::StoredPreview;
    use rust_decimal::Decimal;
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    async fn create_transaction(server: &TestServer, token: &str, body: Value) -> TransactionResponse {
        let (name, value) = bearer(token);
        let response = server.post("/api/v1/transactions").add_header(name, value).json(&body).await;
        response.assert_status(StatusCode::CREATED);
        response.json::<ApiResponse<TransactionResponse>>().data
    }

    fn expense(amount: &str, occurred_on: NaiveDate, merchant: &str) -> Value {
        json!({
            "kind": "expense",
            "amount": amount,
            "occurred_on": occurred_on,
            "merchant": merchant,
        })
    }

    fn statement_row(occurred_on: NaiveDate, amount: i64, kind: TransactionKind, merchant: &str) -> CandidateTransaction {
        CandidateTransaction {
            occurred_on,
            amount: Decimal::new(amount, 0),
            kind,
            merchant: Some(merchant.to_string()),
            note: None,
            payment_method: Some("bank_transfer".to_string()),
            category_id: None,
            duplicate: false,
        }
    }

    #[tokio::test]
    async fn test_health_check() {
        let (server, _) = setup_test_server().await;

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (server, _) = setup_test_server().await;

        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "Alice@Example.com",
                "password": "correct horse",
                "display_name": "Alice",
            }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: ApiResponse<UserResponse> = response.json();
        assert!(body.success);
        assert_eq!(body.message, "User registered successfully");
        assert_eq!(body.data.email, "alice@example.com");

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({"email": "alice@example.com", "password": "correct horse"}))
            .await;
        response.assert_status(StatusCode::OK);
        let token: ApiResponse<TokenResponse> = response.json();
        assert_eq!(token.data.token_type, "bearer");
        assert_eq!(token.data.expires_in, 24 * 3600);

        let (name, value) = bearer(&token.data.access_token);
        let me = server.get("/api/v1/users/me").add_header(name, value).await;
        me.assert_status(StatusCode::OK);
        let me: ApiResponse<UserResponse> = me.json();
        assert_eq!(me.data.id, body.data.id);
        assert_eq!(me.data.display_name, "Alice");
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let (server, state) = setup_test_server().await;
        create_user_with_token(&state, "taken@example.com").await;

        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "email": "TAKEN@example.com",
                "password": "long enough",
                "display_name": "Someone",
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        let body: ErrorResponse = response.json();
        assert_eq!(body.code, "EMAIL_ALREADY_REGISTERED");
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let (server, _) = setup_test_server().await;

        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({"email": "short@example.com", "password": "123", "display_name": "Short"}))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorResponse = response.json();
        assert_eq!(body.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (server, _) = setup_test_server().await;
        server
            .post("/api/v1/auth/register")
            .json(&json!({"email": "bob@example.com", "password": "right password", "display_name": "Bob"}))
            .await
            .assert_status(StatusCode::CREATED);

        for (email, password) in [("bob@example.com", "wrong password"), ("nobody@example.com", "right password")] {
            let response = server
                .post("/api/v1/auth/login")
                .json(&json!({"email": email, "password": password}))
                .await;
            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: ErrorResponse = response.json();
            assert_eq!(body.error, "Invalid credentials");
        }
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_valid_token() {
        let (server, state) = setup_test_server().await;

        let missing = server.get("/api/v1/transactions").await;
        missing.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(missing.json::<ErrorResponse>().code, "AUTH_ERROR");

        let (name, value) = bearer("not-a-jwt");
        server
            .get("/api/v1/transactions")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        // Signed correctly, but the user is gone.
        let (user_id, token) = create_user_with_token(&state, "ghost@example.com").await;
        let (name, value) = bearer(&token);
        server
            .delete("/api/v1/users/me")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .get("/api/v1/users/me")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let expired = test_keys()
            .sign(&crate::auth::Claims {
                sub: user_id.to_string(),
                iat: Utc::now().timestamp() - 7200,
                exp: Utc::now().timestamp() - 3600,
            })
            .unwrap();
        let (name, value) = bearer(&expired);
        server
            .get("/api/v1/categories")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_me() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "rename@example.com").await;
        let (name, value) = bearer(&token);

        let response = server
            .put("/api/v1/users/me")
            .add_header(name, value)
            .json(&json!({"display_name": "  Renamed "}))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<UserResponse> = response.json();
        assert_eq!(body.data.display_name, "Renamed");
    }

    #[tokio::test]
    async fn test_transaction_create_then_fetch() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "crud@example.com").await;

        let created = create_transaction(
            &server,
            &token,
            json!({
                "kind": "expense",
                "amount": "12.50",
                "occurred_on": "2024-03-02",
                "merchant": "Corner Cafe",
                "note": "Lunch",
                "payment_method": "card",
            }),
        )
        .await;
        assert_eq!(created.amount, Decimal::new(1250, 2));
        assert_eq!(created.kind, TransactionKind::Expense);

        let (name, value) = bearer(&token);
        let response = server
            .get(&format!("/api/v1/transactions/{}", created.id))
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::OK);
        let fetched: ApiResponse<TransactionResponse> = response.json();
        assert_eq!(fetched.data.id, created.id);
        assert_eq!(fetched.data.amount, created.amount);
        assert_eq!(fetched.data.occurred_on, created.occurred_on);
        assert_eq!(fetched.data.merchant.as_deref(), Some("Corner Cafe"));
        assert_eq!(fetched.data.note.as_deref(), Some("Lunch"));
        assert_eq!(fetched.data.payment_method.as_deref(), Some("card"));
    }

    #[tokio::test]
    async fn test_transaction_amount_must_be_positive() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "amounts@example.com").await;

        for amount in ["0", "-5.00", "0.004"] {
            let (name, value) = bearer(&token);
            let response = server
                .post("/api/v1/transactions")
                .add_header(name, value)
                .json(&expense(amount, day(1), "Nowhere"))
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<ErrorResponse>().code, "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_transaction_rejects_unknown_kind() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "kinds@example.com").await;
        let (name, value) = bearer(&token);

        let response = server
            .post("/api/v1/transactions")
            .add_header(name, value)
            .json(&json!({"kind": "transfer", "amount": "10.00", "occurred_on": "2024-03-01"}))
            .await;

        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_transaction_pagination() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "pages@example.com").await;
        for d in 1..=5 {
            create_transaction(&server, &token, expense("10.00", day(d), &format!("Shop {d}"))).await;
        }

        let (name, value) = bearer(&token);
        let response = server
            .get("/api/v1/transactions")
            .add_header(name, value)
            .add_query_param("limit", 2)
            .add_query_param("offset", 2)
            .await;

        response.assert_status(StatusCode::OK);
        assert_eq!(response.header("x-total-count"), "5");
        let page: ApiResponse<TransactionPage> = response.json();
        assert_eq!(page.data.total, 5);
        assert_eq!((page.data.limit, page.data.offset), (2, 2));
        let days: Vec<NaiveDate> = page.data.items.iter().map(|t| t.occurred_on).collect();
        assert_eq!(days, vec![day(3), day(2)]);
    }

    #[tokio::test]
    async fn test_transaction_list_filters_and_limits() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "filters@example.com").await;
        create_transaction(&server, &token, expense("10.00", day(1), "Early")).await;
        create_transaction(&server, &token, expense("20.00", day(10), "Late")).await;
        create_transaction(
            &server,
            &token,
            json!({"kind": "income", "amount": "100.00", "occurred_on": day(5)}),
        )
        .await;

        let (name, value) = bearer(&token);
        let response = server
            .get("/api/v1/transactions")
            .add_header(name.clone(), value.clone())
            .add_query_param("kind", "expense")
            .add_query_param("start_date", "2024-03-05")
            .await;
        let page: ApiResponse<TransactionPage> = response.json();
        assert_eq!(page.data.total, 1);
        assert_eq!(page.data.items[0].merchant.as_deref(), Some("Late"));

        server
            .get("/api/v1/transactions")
            .add_header(name, value)
            .add_query_param("limit", 101)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_transactions_are_private() {
        let (server, state) = setup_test_server().await;
        let (_, owner) = create_user_with_token(&state, "owner@example.com").await;
        let (_, other) = create_user_with_token(&state, "other@example.com").await;
        let created = create_transaction(&server, &owner, expense("5.00", day(1), "Mine")).await;
        let path = format!("/api/v1/transactions/{}", created.id);

        let (name, value) = bearer(&other);
        server.get(&path).add_header(name.clone(), value.clone()).await.assert_status(StatusCode::NOT_FOUND);
        server
            .put(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": "1.00"}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server.delete(&path).add_header(name, value).await.assert_status(StatusCode::NOT_FOUND);

        let (name, value) = bearer(&owner);
        server.get(&path).add_header(name, value).await.assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_transaction_update_and_delete() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "edit@example.com").await;
        let created = create_transaction(&server, &token, expense("5.00", day(1), "Before")).await;
        let path = format!("/api/v1/transactions/{}", created.id);
        let (name, value) = bearer(&token);

        let response = server
            .put(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"amount": "7.25", "merchant": "After"}))
            .await;
        response.assert_status(StatusCode::OK);
        let updated: ApiResponse<TransactionResponse> = response.json();
        assert_eq!(updated.data.amount, Decimal::new(725, 2));
        assert_eq!(updated.data.merchant.as_deref(), Some("After"));
        assert_eq!(updated.data.occurred_on, day(1));

        server.delete(&path).add_header(name.clone(), value.clone()).await.assert_status(StatusCode::NO_CONTENT);
        server.get(&path).add_header(name, value).await.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_transaction_category_can_be_cleared() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "recategorize@example.com").await;
        let (name, value) = bearer(&token);
        let category: ApiResponse<CategoryResponse> = server
            .post("/api/v1/categories")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Coffee"}))
            .await
            .json();

        let mut body = expense("3.80", day(4), "Corner Cafe");
        body["category_id"] = json!(category.data.id);
        let created = create_transaction(&server, &token, body).await;
        assert_eq!(created.category_id, Some(category.data.id));
        let path = format!("/api/v1/transactions/{}", created.id);

        let untouched: ApiResponse<TransactionResponse> = server
            .put(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"note": "oat latte"}))
            .await
            .json();
        assert_eq!(untouched.data.category_id, Some(category.data.id));

        let cleared: ApiResponse<TransactionResponse> = server
            .put(&path)
            .add_header(name.clone(), value.clone())
            .json(&json!({"category_id": null}))
            .await
            .json();
        assert_eq!(cleared.data.category_id, None);
        assert_eq!(cleared.data.note.as_deref(), Some("oat latte"));

        let fetched: ApiResponse<TransactionResponse> = server.get(&path).add_header(name, value).await.json();
        assert_eq!(fetched.data.category_id, None);
    }

    #[tokio::test]
    async fn test_categories_visibility_and_ownership() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "cats@example.com").await;
        let (_, other) = create_user_with_token(&state, "othercats@example.com").await;
        let (name, value) = bearer(&token);

        let listed: ApiResponse<Vec<CategoryResponse>> =
            server.get("/api/v1/categories").add_header(name.clone(), value.clone()).await.json();
        let system = listed.data.iter().find(|c| c.is_system).expect("system categories are seeded").clone();

        let created = server
            .post("/api/v1/categories")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "  Hobbies ", "description": "Fun stuff"}))
            .await;
        created.assert_status(StatusCode::CREATED);
        let created: ApiResponse<CategoryResponse> = created.json();
        assert_eq!(created.data.name, "Hobbies");
        assert!(!created.data.is_system);

        let duplicate = server
            .post("/api/v1/categories")
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "hobbies"}))
            .await;
        duplicate.assert_status(StatusCode::CONFLICT);
        assert_eq!(duplicate.json::<ErrorResponse>().code, "DUPLICATE_CATEGORY");

        let forbidden = server
            .put(&format!("/api/v1/categories/{}", system.id))
            .add_header(name.clone(), value.clone())
            .json(&json!({"name": "Renamed"}))
            .await;
        forbidden.assert_status(StatusCode::FORBIDDEN);
        server
            .delete(&format!("/api/v1/categories/{}", system.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&other);
        server
            .get(&format!("/api/v1/categories/{}", created.data.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .delete(&format!("/api/v1/categories/{}", created.data.id))
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NOT_FOUND);
        let others: ApiResponse<Vec<CategoryResponse>> =
            server.get("/api/v1/categories").add_header(name, value).await.json();
        assert!(others.data.iter().all(|c| c.id != created.data.id));
    }

    #[tokio::test]
    async fn test_transaction_with_foreign_category_is_rejected() {
        let (server, state) = setup_test_server().await;
        let (_, owner) = create_user_with_token(&state, "catowner@example.com").await;
        let (_, other) = create_user_with_token(&state, "catthief@example.com").await;

        let (name, value) = bearer(&owner);
        let category: ApiResponse<CategoryResponse> = server
            .post("/api/v1/categories")
            .add_header(name, value)
            .json(&json!({"name": "Private"}))
            .await
            .json();

        let (name, value) = bearer(&other);
        let response = server
            .post("/api/v1/transactions")
            .add_header(name, value)
            .json(&json!({
                "kind": "expense",
                "amount": "3.00",
                "occurred_on": "2024-03-01",
                "category_id": category.data.id,
            }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_summary() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "stats@example.com").await;
        create_transaction(&server, &token, json!({"kind": "income", "amount": "100.00", "occurred_on": day(1)}))
            .await;
        create_transaction(&server, &token, expense("40.50", day(2), "Groceries")).await;
        create_transaction(&server, &token, expense("9.50", day(20), "Later")).await;
        let (name, value) = bearer(&token);

        let all: ApiResponse<StatsSummary> =
            server.get("/api/v1/stats/summary").add_header(name.clone(), value.clone()).await.json();
        assert_eq!(all.data.income, Decimal::new(100, 0));
        assert_eq!(all.data.expense, Decimal::new(50, 0));
        assert_eq!(all.data.net, Decimal::new(50, 0));
        assert_eq!(all.data.transaction_count, 3);

        let ranged: ApiResponse<StatsSummary> = server
            .get("/api/v1/stats/summary")
            .add_header(name.clone(), value.clone())
            .add_query_param("end_date", "2024-03-10")
            .await
            .json();
        assert_eq!(ranged.data.expense, Decimal::new(4050, 2));
        assert_eq!(ranged.data.transaction_count, 2);

        server
            .get("/api/v1/stats/by-category")
            .add_header(name, value)
            .add_query_param("start_date", "2024-03-10")
            .add_query_param("end_date", "2024-03-01")
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_by_date_buckets() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "buckets@example.com").await;
        create_transaction(&server, &token, expense("10.00", day(2), "A")).await;
        create_transaction(&server, &token, expense("5.00", day(20), "B")).await;
        let (name, value) = bearer(&token);

        let response = server
            .get("/api/v1/stats/by-date")
            .add_header(name, value)
            .add_query_param("bucket", "month")
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Vec<common::DateBucketTotal>> = response.json();
        assert_eq!(body.data.len(), 1);
        assert_eq!(body.data[0].bucket, day(1));
        assert_eq!(body.data[0].expense, Decimal::new(15, 0));
    }

    #[tokio::test]
    async fn test_confirm_without_preview() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "nopreview@example.com").await;
        let (name, value) = bearer(&token);

        let response = server.post("/api/v1/imports/confirm").add_header(name.clone(), value.clone()).await;

        response.assert_status(StatusCode::CONFLICT);
        assert_eq!(response.json::<ErrorResponse>().code, "INVALID_STATE");
        let page: ApiResponse<TransactionPage> =
            server.get("/api/v1/transactions").add_header(name, value).await.json();
        assert_eq!(page.data.total, 0);
    }

    #[tokio::test]
    async fn test_confirm_selected_rows_of_a_preview() {
        let (server, state) = setup_test_server().await;
        let (user_id, token) = create_user_with_token(&state, "confirm@example.com").await;
        state
            .previews
            .put(
                user_id,
                StoredPreview::new(
                    ImportMethod::Text,
                    vec![
                        statement_row(day(1), 30, TransactionKind::Expense, "Gym"),
                        statement_row(day(2), 2000, TransactionKind::Income, "Salary"),
                        statement_row(day(3), 12, TransactionKind::Expense, "Books"),
                    ],
                ),
            )
            .await;
        let (name, value) = bearer(&token);

        let preview = server.get("/api/v1/imports/preview").add_header(name.clone(), value.clone()).await;
        preview.assert_status(StatusCode::OK);
        assert_eq!(preview.json::<ApiResponse<ImportPreview>>().data.total_count, 3);

        let out_of_range = server
            .post("/api/v1/imports/confirm")
            .add_header(name.clone(), value.clone())
            .json(&json!({"selected": [0, 7]}))
            .await;
        out_of_range.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/v1/imports/confirm")
            .add_header(name.clone(), value.clone())
            .json(&json!({"selected": [2, 1]}))
            .await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<ConfirmImportResponse> = response.json();
        assert_eq!(body.message, "Successfully imported 2 transactions");
        assert_eq!(body.data.imported, 2);
        let merchants: Vec<_> = body.data.transactions.iter().filter_map(|t| t.merchant.clone()).collect();
        assert_eq!(merchants, vec!["Salary".to_string(), "Books".to_string()]);

        server
            .get("/api/v1/imports/preview")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_discard_preview() {
        let (server, state) = setup_test_server().await;
        let (user_id, token) = create_user_with_token(&state, "discard@example.com").await;
        state
            .previews
            .put(
                user_id,
                StoredPreview::new(ImportMethod::Table, vec![statement_row(day(1), 1, TransactionKind::Expense, "X")]),
            )
            .await;
        let (name, value) = bearer(&token);

        server
            .delete("/api/v1/imports/preview")
            .add_header(name.clone(), value.clone())
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete("/api/v1/imports/preview")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_statement_upload_flags_duplicates_and_confirms() {
        let model = StubModel::structuring(json!([
            {"date": "2024-03-01", "description": "Coffee Shop", "amount": -4.5},
            {"date": "2024-03-02", "description": "Salary", "amount": 2500, "type": "income"}
        ]));
        let state = setup_test_app_state_with(Arc::new(model), Arc::new(StubOcr(""))).await;
        let server = server_for(&state);
        let (_, token) = create_user_with_token(&state, "importer@example.com").await;
        create_transaction(&server, &token, expense("4.50", day(1), "Coffee Shop")).await;
        let (name, value) = bearer(&token);

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"scanned statement without a text layer".to_vec())
                .file_name("statement.PDF")
                .mime_type("application/pdf"),
        );
        let response = server
            .post("/api/v1/imports/bank-statement")
            .add_header(name.clone(), value.clone())
            .multipart(form)
            .await;

        response.assert_status(StatusCode::OK);
        let upload: ApiResponse<ImportUploadResponse> = response.json();
        assert!(upload.data.success);
        assert_eq!(upload.data.method, ImportMethod::Ai);
        assert_eq!(upload.data.total_count, 2);
        assert_eq!(upload.data.duplicate_count, 1);
        assert!(upload.data.transactions[0].duplicate);

        let response = server.post("/api/v1/imports/confirm").add_header(name.clone(), value.clone()).await;
        response.assert_status(StatusCode::OK);
        let confirmed: ApiResponse<ConfirmImportResponse> = response.json();
        assert_eq!(confirmed.data.imported, 1);
        assert_eq!(confirmed.data.transactions[0].kind, TransactionKind::Income);

        let page: ApiResponse<TransactionPage> =
            server.get("/api/v1/transactions").add_header(name, value).await.json();
        assert_eq!(page.data.total, 2);
    }

    #[tokio::test]
    async fn test_statement_upload_rejections() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "rejects@example.com").await;
        let (name, value) = bearer(&token);

        let not_pdf = MultipartForm::new()
            .add_part("file", Part::bytes(b"a,b,c".to_vec()).file_name("statement.csv").mime_type("text/csv"));
        let response = server
            .post("/api/v1/imports/bank-statement")
            .add_header(name.clone(), value.clone())
            .multipart(not_pdf)
            .await;
        response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(response.json::<ErrorResponse>().code, "UNSUPPORTED_MEDIA_TYPE");

        let too_large = MultipartForm::new().add_part(
            "file",
            Part::bytes(vec![b'x'; 1024 * 1024 + 512 * 1024]).file_name("big.pdf").mime_type("application/pdf"),
        );
        let response = server
            .post("/api/v1/imports/bank-statement")
            .add_header(name.clone(), value.clone())
            .multipart(too_large)
            .await;
        response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);

        let wrong_field = MultipartForm::new().add_text("document", "nothing");
        server
            .post("/api/v1/imports/bank-statement")
            .add_header(name.clone(), value.clone())
            .multipart(wrong_field)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        // No model is configured, so every strategy gives up.
        let unreadable = MultipartForm::new()
            .add_part("file", Part::bytes(b"garbage".to_vec()).file_name("statement.pdf").mime_type("application/pdf"));
        let response = server
            .post("/api/v1/imports/bank-statement")
            .add_header(name, value)
            .multipart(unreadable)
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<ErrorResponse>().code, "EXTRACTION_FAILED");
    }

    #[tokio::test]
    async fn test_receipt_extraction() {
        let ocr = StubOcr("CORNER CAFE\n12/03/2024\nTotal 8.47\n");
        let state = setup_test_app_state_with(Arc::new(UnconfiguredModel), Arc::new(ocr)).await;
        let server = server_for(&state);
        let (_, token) = create_user_with_token(&state, "receipts@example.com").await;
        let (name, value) = bearer(&token);

        let form = MultipartForm::new()
            .add_part("file", Part::bytes(png_bytes()).file_name("receipt.png").mime_type("image/png"));
        let response = server
            .post("/api/v1/receipts/extract")
            .add_header(name, value)
            .multipart(form)
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<ReceiptExtraction> = response.json();
        assert_eq!(body.message, "Receipt processed successfully");
        assert_eq!(body.data.method, ReceiptMethod::Ocr);
        assert_eq!(body.data.candidate.amount, Some(Decimal::new(847, 2)));
        assert_eq!(body.data.candidate.merchant.as_deref(), Some("CORNER CAFE"));
        assert!(body.data.confidence > 0.0 && body.data.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_receipt_rejections() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "badreceipts@example.com").await;
        let (name, value) = bearer(&token);

        let gif = MultipartForm::new()
            .add_part("file", Part::bytes(b"GIF89a".to_vec()).file_name("receipt.gif").mime_type("image/gif"));
        server
            .post("/api/v1/receipts/extract")
            .add_header(name.clone(), value.clone())
            .multipart(gif)
            .await
            .assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let blank = MultipartForm::new()
            .add_part("file", Part::bytes(png_bytes()).file_name("blank.png").mime_type("image/png"));
        let response = server
            .post("/api/v1/receipts/extract")
            .add_header(name.clone(), value.clone())
            .multipart(blank)
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.json::<ErrorResponse>().code, "NO_TEXT_FOUND");

        let empty = MultipartForm::new()
            .add_part("file", Part::bytes(Vec::<u8>::new()).file_name("empty.png").mime_type("image/png"));
        server
            .post("/api/v1/receipts/extract")
            .add_header(name, value)
            .multipart(empty)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ai_spending_preset() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "ai@example.com").await;
        create_transaction(&server, &token, expense("30.00", day(1), "Grocer")).await;
        create_transaction(&server, &token, expense("10.00", day(2), "Cinema")).await;
        let (name, value) = bearer(&token);

        let response = server
            .post("/api/v1/ai/query")
            .add_header(name, value)
            .json(&json!({"preset": "spending"}))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Insight> = response.json();
        assert!(!body.data.insight.is_empty());
        let chart = body.data.chart.expect("spending preset includes a chart");
        assert_eq!(chart.kind, ChartKind::Bar);
        assert_eq!(chart.labels, vec!["Grocer".to_string(), "Cinema".to_string()]);
    }

    #[tokio::test]
    async fn test_ai_free_text_query() {
        let state =
            setup_test_app_state_with(Arc::new(StubModel::answering("You spend most on food.")), Arc::new(StubOcr("")))
                .await;
        let server = server_for(&state);
        let (_, token) = create_user_with_token(&state, "askai@example.com").await;
        create_transaction(&server, &token, expense("12.00", day(1), "Bistro")).await;
        let (name, value) = bearer(&token);

        let response = server
            .post("/api/v1/ai/query")
            .add_header(name.clone(), value.clone())
            .json(&json!({"query": "Where does my money go?"}))
            .await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Insight> = response.json();
        assert_eq!(body.data.insight, "You spend most on food.");

        server
            .post("/api/v1/ai/query")
            .add_header(name, value)
            .json(&json!({"query": "   "}))
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ai_query_survives_model_outage() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "outage@example.com").await;
        create_transaction(&server, &token, expense("12.00", day(1), "Bistro")).await;
        let (name, value) = bearer(&token);

        let response = server
            .post("/api/v1/ai/query")
            .add_header(name, value)
            .json(&json!({"query": "How am I doing?"}))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Insight> = response.json();
        assert!(body.data.chart.is_none());
        assert!(!body.data.insight.is_empty());
    }

    #[tokio::test]
    async fn test_ai_suggestions() {
        let (server, state) = setup_test_server().await;
        let (_, token) = create_user_with_token(&state, "suggest@example.com").await;
        let (name, value) = bearer(&token);

        let response = server.get("/api/v1/ai/suggestions").add_header(name, value).await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<SuggestionsResponse> = response.json();
        assert!(!body.data.suggestions.is_empty());
        assert!(body.data.suggestions.iter().any(|s| s.preset.is_some()));
    }

    #[tokio::test]
    async fn test_delete_me_cascades() {
        let (server, state) = setup_test_server().await;
        let (user_id, token) = create_user_with_token(&state, "leaving@example.com").await;
        create_transaction(&server, &token, expense("1.00", day(1), "Last")).await;
        let (name, value) = bearer(&token);

        server.delete("/api/v1/users/me").add_header(name, value).await.assert_status(StatusCode::NO_CONTENT);

        let remaining = compute::records::load_records(&state.db, user_id, None, None, None).await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_metrics_not_installed_in_tests() {
        let (server, _) = setup_test_server().await;

        server.get("/metrics").await.assert_status(StatusCode::NOT_FOUND);
    }
}
