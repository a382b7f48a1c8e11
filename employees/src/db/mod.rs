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

//! Database abstraction in terms of the operations needed by the server.
//!
//! The PostgreSQL backend is for production use and the SQLite backend is primarily intended to
//! support tests and local runs.  All employee operations are free functions that take an
//! `Executor`, which can be backed by a direct connection or by an open transaction.

use crate::env::{get_optional_var, get_required_var};
use crate::model::{
    EmailAddress, Employee, EmployeeFilter, EmployeeId, ModelError, NewEmployee, PersonName,
};
use async_trait::async_trait;
use futures::TryStreamExt;
#[cfg(feature = "postgres")]
use sqlx::Row;
use std::sync::Arc;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(any(feature = "sqlite", test))]
pub mod sqlite;

/// Database errors.  Any unexpected errors that come from the database are classified as
/// `BackendError`, but errors we know about have more specific types.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DbError {
    /// Indicates that a write failed because it would violate a uniqueness constraint.
    #[error("Already exists")]
    AlreadyExists,

    /// Catch-all error type for unexpected database errors.
    #[error("Database error: {0}")]
    BackendError(String),

    /// Indicates a failure processing the data that already exists in the database.
    #[error("Data integrity error: {0}")]
    DataIntegrityError(String),

    /// Indicates that a requested entry does not exist.
    #[error("Entity not found")]
    NotFound,

    /// Indicates that the database is not available (maybe because of too many active concurrent
    /// connections).
    #[error("Unavailable")]
    Unavailable,
}

impl From<ModelError> for DbError {
    fn from(e: ModelError) -> Self {
        DbError::DataIntegrityError(e.to_string())
    }
}

/// Result type for this module.
pub type DbResult<T> = Result<T, DbError>;

/// A database executor that can talk to multiple database implementations.
///
/// Users of this type are forced to destructure it and issue different calls for each database,
/// which is what allows queries to use the placeholder syntax of each backend.
pub enum Executor {
    /// A PostgreSQL executor.
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresExecutor),

    /// A SQLite executor.
    #[cfg(any(feature = "sqlite", test))]
    Sqlite(sqlite::SqliteExecutor),
}

/// A wrapper for a database executor backed by an open transaction.
pub struct TxExecutor(Executor);

impl TxExecutor {
    /// Returns the executor wrapped by this transaction.
    pub fn ex(&mut self) -> &mut Executor {
        &mut self.0
    }

    /// Commits the transaction.
    pub async fn commit(self) -> DbResult<()> {
        match self.0 {
            #[cfg(feature = "postgres")]
            Executor::Postgres(ex) => ex.commit().await,

            #[cfg(any(feature = "sqlite", test))]
            Executor::Sqlite(ex) => ex.commit().await,
        }
    }
}

/// Abstraction over the database connection.
#[async_trait]
pub trait Db {
    /// Obtains an executor for direct access to the pool.
    async fn ex(&self) -> DbResult<Executor>;

    /// Begins a transaction.
    ///
    /// It is the responsibility of the caller to call `commit` on the returned executor.  Otherwise
    /// the transaction is rolled back on drop.
    async fn begin(&self) -> DbResult<TxExecutor>;

    /// Closes the connection pool, waiting for all connections to be returned.
    async fn close(&self);
}

/// Options to select and configure the database backend.
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub enum DbOptions {
    /// Use a PostgreSQL database.
    #[cfg(feature = "postgres")]
    Postgres(postgres::PostgresOptions),

    /// Use a SQLite database identified by the given connection URI.
    #[cfg(any(feature = "sqlite", test))]
    Sqlite(String),
}

impl DbOptions {
    /// Initializes the options from environment variables whose name is prefixed with `prefix`.
    ///
    /// `<prefix>_DB_BACKEND` selects the backend and defaults to `postgres`.  The PostgreSQL
    /// backend is then configured from the `<prefix>_PGSQL_*` variables and the SQLite backend
    /// from `<prefix>_SQLITE_URI`.
    pub fn from_env(prefix: &str) -> Result<Self, String> {
        let backend =
            get_optional_var::<String>(prefix, "DB_BACKEND")?.unwrap_or_else(|| "postgres".into());
        match backend.as_str() {
            #[cfg(feature = "postgres")]
            "postgres" => Ok(DbOptions::Postgres(postgres::PostgresOptions::from_env(&format!(
                "{}_PGSQL",
                prefix
            ))?)),

            #[cfg(any(feature = "sqlite", test))]
            "sqlite" => Ok(DbOptions::Sqlite(get_required_var::<String>(prefix, "SQLITE_URI")?)),

            other => Err(format!("Unsupported database backend '{}'", other)),
        }
    }
}

/// Establishes a connection to the database described by `opts`.
pub async fn connect(opts: DbOptions) -> DbResult<Arc<dyn Db + Send + Sync>> {
    let db: Arc<dyn Db + Send + Sync> = match opts {
        #[cfg(feature = "postgres")]
        DbOptions::Postgres(opts) => Arc::new(postgres::PostgresDb::connect(opts)?),

        #[cfg(any(feature = "sqlite", test))]
        DbOptions::Sqlite(uri) => Arc::new(sqlite::connect(&uri).await?),
    };
    Ok(db)
}

/// Initializes the database schema.
pub async fn init_schema(ex: &mut Executor) -> DbResult<()> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => postgres::run_schema(ex, include_str!("postgres.sql")).await,

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => sqlite::run_schema(ex, include_str!("sqlite.sql")).await,
    }
}

/// Inserts a new employee with the given `fields` and returns it with its assigned identifier.
pub async fn create_employee(ex: &mut Executor, fields: &NewEmployee) -> DbResult<Employee> {
    let id = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                INSERT INTO employees (first_name, last_name, email)
                VALUES ($1, $2, $3)
                RETURNING id
            ";
            let row = sqlx::query(query_str)
                .bind(fields.firstname().as_str())
                .bind(fields.lastname().as_str())
                .bind(fields.email().as_str())
                .fetch_one(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            row.try_get::<i64, _>("id").map_err(postgres::map_sqlx_error)?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "INSERT INTO employees (first_name, last_name, email) VALUES (?, ?, ?)";
            let done = sqlx::query(query_str)
                .bind(fields.firstname().as_str())
                .bind(fields.lastname().as_str())
                .bind(fields.email().as_str())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            if done.rows_affected() != 1 {
                return Err(DbError::BackendError(
                    "Insertion affected more than one row".to_owned(),
                ));
            }
            done.last_insert_rowid()
        }
    };

    Ok(Employee::from_fields(EmployeeId::from(id), fields.clone()))
}

/// Gets the employee with identifier `id`, or `None` if it does not exist.
pub async fn get_employee(ex: &mut Executor, id: EmployeeId) -> DbResult<Option<Employee>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "SELECT * FROM employees WHERE id = $1";
            let maybe_row = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            maybe_row.map(Employee::try_from).transpose()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "SELECT * FROM employees WHERE id = ?";
            let maybe_row = sqlx::query(query_str)
                .bind(id.as_i64())
                .fetch_optional(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            maybe_row.map(Employee::try_from).transpose()
        }
    }
}

/// Gets the employee that owns the `email` address, or `None` if there is none.
pub async fn get_employee_by_email(
    ex: &mut Executor,
    email: &EmailAddress,
) -> DbResult<Option<Employee>> {
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "SELECT * FROM employees WHERE email = $1";
            let maybe_row = sqlx::query(query_str)
                .bind(email.as_str())
                .fetch_optional(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            maybe_row.map(Employee::try_from).transpose()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "SELECT * FROM employees WHERE email = ?";
            let maybe_row = sqlx::query(query_str)
                .bind(email.as_str())
                .fetch_optional(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            maybe_row.map(Employee::try_from).transpose()
        }
    }
}

/// Gets all existing employees sorted by their identifier.
pub async fn get_employees(ex: &mut Executor) -> DbResult<Vec<Employee>> {
    let query_str = "SELECT * FROM employees ORDER BY id";
    let mut employees = vec![];
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let mut rows = sqlx::query(query_str).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(postgres::map_sqlx_error)? {
                employees.push(Employee::try_from(row)?);
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let mut rows = sqlx::query(query_str).fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(sqlite::map_sqlx_error)? {
                employees.push(Employee::try_from(row)?);
            }
        }
    }
    Ok(employees)
}

/// Gets all employees named exactly `firstname` `lastname`, sorted by their identifier.
pub async fn find_employees_by_names(
    ex: &mut Executor,
    firstname: &PersonName,
    lastname: &PersonName,
) -> DbResult<Vec<Employee>> {
    let employees = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                SELECT * FROM employees
                WHERE first_name = $1 AND last_name = $2
                ORDER BY id
            ";
            let rows = sqlx::query(query_str)
                .bind(firstname.as_str())
                .bind(lastname.as_str())
                .fetch_all(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            rows.into_iter()
                .map(Employee::try_from)
                .collect::<DbResult<Vec<Employee>>>()?
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                SELECT * FROM employees
                WHERE first_name = ?1 AND last_name = ?2
                ORDER BY id
            ";
            let rows = sqlx::query(query_str)
                .bind(firstname.as_str())
                .bind(lastname.as_str())
                .fetch_all(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            rows.into_iter()
                .map(Employee::try_from)
                .collect::<DbResult<Vec<Employee>>>()?
        }
    };
    Ok(employees)
}

/// Gets all employees that match `filter`, sorted by their identifier.
///
/// Unlike `find_employees_by_names`, the query is assembled at runtime with only the conditions
/// for the fields that are set in the filter.
pub async fn find_employees(
    ex: &mut Executor,
    filter: &EmployeeFilter,
) -> DbResult<Vec<Employee>> {
    let mut employees = vec![];
    match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let mut builder =
                sqlx::QueryBuilder::<sqlx::Postgres>::new("SELECT * FROM employees WHERE TRUE");
            if let Some(firstname) = filter.firstname.as_ref() {
                builder.push(" AND first_name = ").push_bind(firstname.as_str());
            }
            if let Some(lastname) = filter.lastname.as_ref() {
                builder.push(" AND last_name = ").push_bind(lastname.as_str());
            }
            builder.push(" ORDER BY id");

            let mut rows = builder.build().fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(postgres::map_sqlx_error)? {
                employees.push(Employee::try_from(row)?);
            }
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let mut builder =
                sqlx::QueryBuilder::<sqlx::Sqlite>::new("SELECT * FROM employees WHERE 1 = 1");
            if let Some(firstname) = filter.firstname.as_ref() {
                builder.push(" AND first_name = ").push_bind(firstname.as_str());
            }
            if let Some(lastname) = filter.lastname.as_ref() {
                builder.push(" AND last_name = ").push_bind(lastname.as_str());
            }
            builder.push(" ORDER BY id");

            let mut rows = builder.build().fetch(ex.conn());
            while let Some(row) = rows.try_next().await.map_err(sqlite::map_sqlx_error)? {
                employees.push(Employee::try_from(row)?);
            }
        }
    }
    Ok(employees)
}

/// Overwrites the mutable fields of the stored employee with the identifier of `employee`.
pub async fn update_employee(ex: &mut Executor, employee: &Employee) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let query_str = "
                UPDATE employees
                SET first_name = $1, last_name = $2, email = $3
                WHERE id = $4
            ";
            let done = sqlx::query(query_str)
                .bind(employee.firstname().as_str())
                .bind(employee.lastname().as_str())
                .bind(employee.email().as_str())
                .bind(employee.id().as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let query_str = "
                UPDATE employees
                SET first_name = ?, last_name = ?, email = ?
                WHERE id = ?
            ";
            let done = sqlx::query(query_str)
                .bind(employee.firstname().as_str())
                .bind(employee.lastname().as_str())
                .bind(employee.email().as_str())
                .bind(employee.id().as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Update affected more than one row".to_owned())),
    }
}

/// Deletes the employee with identifier `id`.
pub async fn delete_employee(ex: &mut Executor, id: EmployeeId) -> DbResult<()> {
    let rows_affected = match ex {
        #[cfg(feature = "postgres")]
        Executor::Postgres(ex) => {
            let done = sqlx::query("DELETE FROM employees WHERE id = $1")
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(postgres::map_sqlx_error)?;
            done.rows_affected()
        }

        #[cfg(any(feature = "sqlite", test))]
        Executor::Sqlite(ex) => {
            let done = sqlx::query("DELETE FROM employees WHERE id = ?")
                .bind(id.as_i64())
                .execute(ex.conn())
                .await
                .map_err(sqlite::map_sqlx_error)?;
            done.rows_affected()
        }
    };

    match rows_affected {
        0 => Err(DbError::NotFound),
        1 => Ok(()),
        _ => Err(DbError::BackendError("Deletion affected more than one row".to_owned())),
    }
}

#[cfg(test)]
mod schema_tests {
    use super::*;

    #[test]
    fn test_db_options_from_env_sqlite() {
        temp_env::with_vars(
            [
                ("TEST_DB_BACKEND", Some("sqlite")),
                ("TEST_SQLITE_URI", Some("sqlite::memory:")),
            ],
            || {
                assert_eq!(
                    DbOptions::Sqlite("sqlite::memory:".to_owned()),
                    DbOptions::from_env("TEST").unwrap()
                );
            },
        );
    }

    #[test]
    fn test_db_options_from_env_sqlite_missing_uri() {
        temp_env::with_vars(
            [("TEST_DB_BACKEND", Some("sqlite")), ("TEST_SQLITE_URI", None)],
            || {
                assert_eq!(
                    "Required environment variable TEST_SQLITE_URI not present",
                    DbOptions::from_env("TEST").unwrap_err()
                );
            },
        );
    }

    #[test]
    fn test_db_options_from_env_bad_backend() {
        temp_env::with_var("TEST_DB_BACKEND", Some("mysql"), || {
            assert_eq!(
                "Unsupported database backend 'mysql'",
                DbOptions::from_env("TEST").unwrap_err()
            );
        });
    }
}
