// III-IV
// Copyright 2023 Julio Merino
//
// Licensed under the Apache License, Version 2.0 (the "License"); you may not
// use this file except in compliance with the License.  You may obtain a copy
// of the License at:
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS, WITHOUT
// WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.  See the
// License for the specific language governing permissions and limitations
// under the License.

//! API to replace the details of one employee.

use crate::driver::Driver;
use crate::model::EmployeeId;
use crate::rest::{EmployeeRequest, RestError, RestResult};
use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

/// API handler.
pub(crate) async fn handler(
    State(driver): State<Driver>,
    Path(id): Path<EmployeeId>,
    Json(request): Json<EmployeeRequest>,
) -> RestResult<impl IntoResponse> {
    let fields = request.into_fields()?;

    // The lookup and the update are separate operations, so the employee could vanish in between.
    // The update then fails with its own not found error.
    let employee = match driver.clone().get_employee(id).await? {
        Some(employee) => employee,
        None => return Err(RestError::NotFound(format!("Employee {} not found", id))),
    };

    let employee = driver.update_employee(employee.with_fields(fields)).await?;

    Ok(Json(employee))
}

#[cfg(test)]
mod tests {
    use crate::model::{Employee, EmployeeId};
    use crate::rest::testutils::*;
    use serde_json::json;

    fn route(id: i64) -> (http::Method, String) {
        (http::Method::PUT, format!("/api/employees/{}", id))
    }

    #[tokio::test]
    async fn test_ok() {
        let context = TestContext::setup().await;

        let employee = context.create_employee("Ives", "He", "ivesxxx@google.com.tw").await;
        let other = context.create_employee("ccc", "He", "xxsddfs@gmail.com").await;

        let response = OneShotBuilder::new(context.app(), route(employee.id().as_i64()))
            .send_json(json!({
                "firstname": "Ives",
                "lastname": "Ho",
                "email": "ives@example.com",
            }))
            .await
            .expect_json::<Employee>()
            .await;
        assert_eq!(*employee.id(), *response.id());
        assert_eq!("Ho", response.lastname().as_str());
        assert_eq!("ives@example.com", response.email().as_str());

        assert_eq!(Some(response), context.get_employee(*employee.id()).await);
        assert_eq!(Some(other.clone()), context.get_employee(*other.id()).await);
    }

    #[tokio::test]
    async fn test_body_id_is_ignored() {
        let context = TestContext::setup().await;

        let employee = context.create_employee("Ives", "He", "ivesxxx@google.com.tw").await;

        let response = OneShotBuilder::new(context.app(), route(employee.id().as_i64()))
            .send_json(json!({
                "id": employee.id().as_i64() + 100,
                "firstname": "ccc",
                "lastname": "He",
                "email": "ivesxxx@google.com.tw",
            }))
            .await
            .expect_json::<Employee>()
            .await;
        assert_eq!(*employee.id(), *response.id());
        assert_eq!("ccc", response.firstname().as_str());
    }

    #[tokio::test]
    async fn test_not_found() {
        let context = TestContext::setup().await;

        OneShotBuilder::new(context.app(), route(999))
            .send_json(json!({
                "firstname": "Ives",
                "lastname": "He",
                "email": "ivesxxx@google.com.tw",
            }))
            .await
            .expect_status(http::StatusCode::NOT_FOUND)
            .expect_error("Employee 999 not found")
            .await;

        assert_eq!(None, context.get_employee(EmployeeId::from(999)).await);
        assert!(context.get_employees().await.is_empty());
    }

    #[tokio::test]
    async fn test_email_conflict() {
        let context = TestContext::setup().await;

        let employee = context.create_employee("Ives", "He", "ivesxxx@google.com.tw").await;
        context.create_employee("ccc", "He", "xxsddfs@gmail.com").await;

        OneShotBuilder::new(context.app(), route(employee.id().as_i64()))
            .send_json(json!({
                "firstname": "Ives",
                "lastname": "He",
                "email": "xxsddfs@gmail.com",
            }))
            .await
            .expect_status(http::StatusCode::CONFLICT)
            .expect_error("already exists")
            .await;

        assert_eq!(Some(employee.clone()), context.get_employee(*employee.id()).await);
    }

    #[tokio::test]
    async fn test_invalid_fields() {
        let context = TestContext::setup().await;

        let employee = context.create_employee("Ives", "He", "ivesxxx@google.com.tw").await;

        OneShotBuilder::new(context.app(), route(employee.id().as_i64()))
            .send_json(json!({
                "firstname": "Ives",
                "lastname": "He",
                "email": "not an email",
            }))
            .await
            .expect_status(http::StatusCode::BAD_REQUEST)
            .expect_error("Email does not look like a valid address")
            .await;

        assert_eq!(Some(employee.clone()), context.get_employee(*employee.id()).await);
    }

    test_payload_must_be_json!(TestContext::setup().await.into_app(), route(1));
}
