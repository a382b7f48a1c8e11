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

//! Test utilities for the business layer.

use crate::db::sqlite::SqliteDb;
use crate::db::{self, Db, Executor};
use crate::driver::Driver;
use crate::model::{EmailAddress, Employee, NewEmployee, PersonName};
use std::sync::Arc;

/// State of a driver test backed by an in-memory database.
pub(crate) struct TestContext {
    /// The database backing the driver, for direct access.
    db: Arc<SqliteDb>,

    /// The driver under test.
    driver: Driver,
}

impl TestContext {
    /// Creates a new driver backed by a fresh in-memory database.
    pub(crate) async fn setup() -> Self {
        let db = Arc::new(db::sqlite::testutils::setup().await);
        let driver = Driver::new(db.clone());
        Self { db, driver }
    }

    /// Obtains a direct executor against the database.
    pub(crate) async fn ex(&self) -> Executor {
        self.db.ex().await.unwrap()
    }

    /// Runs the raw `sql` statement against the database.
    pub(crate) async fn execute_raw(&self, sql: &str) {
        self.db.execute_raw(sql).await
    }

    /// Returns a clone of the driver under test.
    pub(crate) fn driver(&self) -> Driver {
        self.driver.clone()
    }

    /// Stores a new employee directly in the database, bypassing the driver.
    pub(crate) async fn create_employee(
        &self,
        firstname: &str,
        lastname: &str,
        email: &str,
    ) -> Employee {
        let fields = NewEmployee::new(
            PersonName::from(firstname),
            PersonName::from(lastname),
            EmailAddress::from(email),
        );
        db::create_employee(&mut self.ex().await, &fields).await.unwrap()
    }
}
