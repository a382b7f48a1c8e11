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

//! Entry point to the employees service.
//!
//! All configuration is taken from `EMPLOYEES_*` environment variables.  See `db::DbOptions` for
//! the database settings and use `EMPLOYEES_PORT` to change the default port of 3000.

// Keep these in sync with other top-level files.
#![warn(anonymous_parameters, bad_style, clippy::missing_docs_in_private_items, missing_docs)]
#![warn(unused, unused_extern_crates, unused_import_braces, unused_qualifications)]
#![warn(unsafe_code)]

use employees::db::{self, DbOptions, init_schema};
use employees::env::get_optional_var;
use employees::serve;
use std::net::Ipv4Addr;
use tokio::net::TcpListener;

/// Prefix of all environment variables that configure the service.
const ENV_PREFIX: &str = "EMPLOYEES";

#[tokio::main]
async fn main() {
    env_logger::init();

    let port = get_optional_var::<u16>(ENV_PREFIX, "PORT").unwrap().unwrap_or(3000);

    let db_opts = DbOptions::from_env(ENV_PREFIX).unwrap();
    let db = db::connect(db_opts).await.unwrap();
    init_schema(&mut db.ex().await.unwrap()).await.unwrap();

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await.unwrap();
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to wait for Ctrl-C: {}", e);
        }
    };
    serve(listener, db, shutdown).await.unwrap()
}
