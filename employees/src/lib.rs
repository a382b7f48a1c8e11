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

//! REST service to manage employee records.
//!
//! The service is layered as follows, from the leaves to the root: `model` holds the validated
//! data types, `db` persists them in PostgreSQL or SQLite, `driver` implements the business
//! rules on top of the database, and `rest` exposes the driver over HTTP.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

#[cfg(not(any(feature = "postgres", feature = "sqlite", test)))]
compile_error!("At least one of the postgres or sqlite features must be enabled");

use db::Db;
use driver::Driver;
use log::info;
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod db;
mod driver;
pub mod env;
pub mod model;
mod rest;

/// Serves the application on `listener` with `db` as its persistence layer until `shutdown`
/// completes.
///
/// The database is closed once all in-flight requests have been served.  While it'd be nice to
/// push this responsibility to `main`, doing so would force us to expose many crate-internal
/// types to the public, which in turn would make dead code detection harder.
pub async fn serve<F>(
    listener: TcpListener,
    db: Arc<dyn Db + Send + Sync>,
    shutdown: F,
) -> Result<(), Box<dyn Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = rest::app(Driver::new(db.clone()));

    info!("Listening on http://{}", listener.local_addr()?);
    let result = axum::serve(listener, app).with_graceful_shutdown(shutdown).await;
    info!("Server stopped; closing database");
    db.close().await;

    Ok(result?)
}
