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

//! High-level data types.

use derive_getters::Getters;
use derive_more::Constructor;
use serde::de::Visitor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length of the text columns in the `employees` table, per the schema.
pub(crate) const MAX_TEXT_LENGTH: usize = 255;

/// Model errors.  These errors indicate that a value does not satisfy the invariants of its type.
#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct ModelError(pub String);

/// Result type for this module.
pub type ModelResult<T> = Result<T, ModelError>;

/// Identifier of an employee, as assigned by the database on insertion.
///
/// Identifiers coming from the outside world are not validated: a lookup of an identifier that
/// was never assigned simply finds nothing.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct EmployeeId(i64);

impl EmployeeId {
    /// Returns the identifier as an `i64` for use in database queries.
    pub fn as_i64(self) -> i64 {
        self.0
    }
}

impl From<i64> for EmployeeId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EmployeeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Generates a `Deserialize` implementation for a string newtype whose `new` constructor
/// validates its input.
macro_rules! deserialize_validated_string [
    ( $t:ident, $visitor:ident, $expecting:expr ) => {
        /// Visitor to deserialize the newtype from a string.
        struct $visitor;

        impl Visitor<'_> for $visitor {
            type Value = $t;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str($expecting)
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                $t::new(v).map_err(|e| E::custom(format!("{}", e)))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                $t::new(v).map_err(|e| E::custom(format!("{}", e)))
            }
        }

        impl<'de> Deserialize<'de> for $t {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                deserializer.deserialize_string($visitor)
            }
        }
    }
];

/// Represents a first or last name of an employee.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct PersonName(String);

impl PersonName {
    /// Creates a new name from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();

        if s.trim().is_empty() {
            return Err(ModelError("Name cannot be empty".to_owned()));
        }
        if s.len() > MAX_TEXT_LENGTH {
            return Err(ModelError("Name is too long".to_owned()));
        }

        Ok(Self(s))
    }

    /// Returns a string view of the name.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
impl From<&str> for PersonName {
    fn from(raw_name: &str) -> Self {
        Self::new(raw_name).expect("Hardcoded names for testing must be valid")
    }
}

deserialize_validated_string!(PersonName, PersonNameVisitor, "a non-empty name");

/// Represents a correctly-formatted email address.
///
/// Email addresses are unique across employees and are compared case-sensitively, which is
/// also how the database's unique constraint treats them.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a new email address from an untrusted string `s`, making sure it is valid.
    pub fn new<S: Into<String>>(s: S) -> ModelResult<Self> {
        let s = s.into();

        if s.trim().is_empty() {
            return Err(ModelError("Email address cannot be empty".to_owned()));
        }
        if s.len() > MAX_TEXT_LENGTH {
            return Err(ModelError("Email address is too long".to_owned()));
        }

        // Only do enough validation to catch obvious mistakes.  Anything stricter rejects
        // addresses that are perfectly deliverable.
        if !s.contains('@') || s.contains(' ') {
            return Err(ModelError(format!("Email does not look like a valid address '{}'", s)));
        }

        Ok(Self(s))
    }

    /// Creates a new email address from an untrusted string `s`, without validation.  Useful for
    /// testing purposes only.
    #[cfg(test)]
    pub(crate) fn new_invalid<S: Into<String>>(s: S) -> Self {
        Self(s.into())
    }

    /// Returns a string view of the email address.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(test)]
impl From<&str> for EmailAddress {
    fn from(raw_email: &str) -> Self {
        Self::new(raw_email).expect("Hardcoded email addresses for testing must be valid")
    }
}

deserialize_validated_string!(EmailAddress, EmailAddressVisitor, "an email address");

/// The mutable fields of an employee, without the identifier that the database assigns.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct NewEmployee {
    /// First name of the employee.
    firstname: PersonName,

    /// Last name of the employee.
    lastname: PersonName,

    /// Email address of the employee.  Must be unique.
    email: EmailAddress,
}

/// An employee as stored in the database.
#[derive(Clone, Constructor, Debug, Deserialize, Getters, PartialEq, Serialize)]
pub struct Employee {
    /// Identifier assigned by the database.
    id: EmployeeId,

    /// First name of the employee.
    firstname: PersonName,

    /// Last name of the employee.
    lastname: PersonName,

    /// Email address of the employee.  Must be unique.
    email: EmailAddress,
}

impl Employee {
    /// Creates an employee with identifier `id` from its mutable `fields`.
    pub fn from_fields(id: EmployeeId, fields: NewEmployee) -> Self {
        Self { id, firstname: fields.firstname, lastname: fields.lastname, email: fields.email }
    }

    /// Replaces all mutable fields of this employee with `fields`, preserving the identifier.
    pub fn with_fields(self, fields: NewEmployee) -> Self {
        Self::from_fields(self.id, fields)
    }
}

/// Criteria to narrow down a listing of employees.  Unset fields match everything.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct EmployeeFilter {
    /// Only match employees with this exact first name.
    pub firstname: Option<PersonName>,

    /// Only match employees with this exact last name.
    pub lastname: Option<PersonName>,
}

impl EmployeeFilter {
    /// Returns true if the filter matches all employees.
    pub fn is_empty(&self) -> bool {
        self.firstname.is_none() && self.lastname.is_none()
    }
}
