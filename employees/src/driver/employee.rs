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

//! Operations on one employee.

use crate::db::{self, DbError};
use crate::driver::{Driver, DriverResult, email_taken};
use crate::model::{Employee, EmployeeId};
use log::debug;

impl Driver {
    /// Deletes the employee with identifier `id`.  Deleting an employee that does not exist is
    /// not an error.
    pub(crate) async fn delete_employee(self, id: EmployeeId) -> DriverResult<()> {
        match db::delete_employee(&mut self.db.ex().await?, id).await {
            Ok(()) | Err(DbError::NotFound) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Gets the employee with identifier `id`, if any.
    pub(crate) async fn get_employee(self, id: EmployeeId) -> DriverResult<Option<Employee>> {
        let employee = db::get_employee(&mut self.db.ex().await?, id).await?;
        Ok(employee)
    }

    /// Replaces the stored fields of the employee with the identifier of `employee`.
    ///
    /// The new email address must not belong to any other employee.
    pub(crate) async fn update_employee(self, employee: Employee) -> DriverResult<Employee> {
        let mut tx = self.db.begin().await?;

        if let Some(owner) = db::get_employee_by_email(tx.ex(), employee.email()).await? {
            if owner.id() != employee.id() {
                debug!(
                    "Rejecting update of employee {} with email {} owned by {}",
                    employee.id(),
                    employee.email().as_str(),
                    owner.id()
                );
                return Err(email_taken(employee.email()));
            }
        }

        match db::update_employee(tx.ex(), &employee).await {
            Ok(()) => (),
            Err(DbError::AlreadyExists) => return Err(email_taken(employee.email())),
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        Ok(employee)
    }
}
