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

//! Operations on the collection of employees.

use crate::db::{self, DbError};
use crate::driver::{Driver, DriverResult, email_taken};
use crate::model::{Employee, EmployeeFilter, NewEmployee};
use log::debug;

impl Driver {
    /// Creates a new employee from `fields` and returns it with its assigned identifier.
    ///
    /// Fails with `AlreadyExists` and leaves the database untouched if another employee already
    /// uses the same email address.
    pub(crate) async fn create_employee(self, fields: NewEmployee) -> DriverResult<Employee> {
        let mut tx = self.db.begin().await?;

        if db::get_employee_by_email(tx.ex(), fields.email()).await?.is_some() {
            debug!("Rejecting new employee with duplicate email {}", fields.email().as_str());
            return Err(email_taken(fields.email()));
        }

        let employee = match db::create_employee(tx.ex(), &fields).await {
            Ok(employee) => employee,
            Err(DbError::AlreadyExists) => return Err(email_taken(fields.email())),
            Err(e) => return Err(e.into()),
        };

        tx.commit().await?;
        Ok(employee)
    }

    /// Gets all employees that match `filter`, sorted by their identifier.
    pub(crate) async fn get_employees(self, filter: EmployeeFilter) -> DriverResult<Vec<Employee>> {
        let mut ex = self.db.ex().await?;
        let employees = match (filter.firstname.as_ref(), filter.lastname.as_ref()) {
            (None, None) => db::get_employees(&mut ex).await?,
            (Some(firstname), Some(lastname)) => {
                db::find_employees_by_names(&mut ex, firstname, lastname).await?
            }
            _ => db::find_employees(&mut ex, &filter).await?,
        };
        Ok(employees)
    }
}
