//! Row-level access policy.
//!
//! Every store operation goes through [`gate`], which resolves the session
//! identity to its account row with a fresh query and asks [`access`] what the
//! resulting principal may touch. Nothing about the caller is cached between
//! operations, so role or link changes apply to the very next call.

use crate::error::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Principal,
    Teacher,
    Student,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "principal" => Some(Role::Principal),
            "teacher" => Some(Role::Teacher),
            "student" => Some(Role::Student),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Principal => "principal",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Accounts,
    Students,
    Teachers,
    Marks,
    Grades,
    Attendance,
}

impl Table {
    /// Singular noun used in `not_found` messages.
    pub fn entity(self) -> &'static str {
        match self {
            Table::Accounts => "account",
            Table::Students => "student",
            Table::Teachers => "teacher",
            Table::Marks => "mark",
            Table::Grades => "grade",
            Table::Attendance => "attendance record",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Accounts => "accounts",
            Table::Students => "students",
            Table::Teachers => "teachers",
            Table::Marks => "marks",
            Table::Grades => "grades",
            Table::Attendance => "attendance",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
}

impl Operation {
    fn is_read(self) -> bool {
        matches!(self, Operation::Select)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// The caller as resolved from `accounts` at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub account_id: i64,
    pub username: String,
    pub role: Role,
    pub student_id: Option<i64>,
}

/// Which rows of a table an operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    OwnStudent(i64),
    Denied,
}

impl Scope {
    /// `owner` is the owning student key of the row, `None` for tables whose
    /// rows belong to no student.
    pub fn admits(self, owner: Option<i64>) -> bool {
        match self {
            Scope::All => true,
            Scope::OwnStudent(sid) => owner == Some(sid),
            Scope::Denied => false,
        }
    }
}

/// The policy table. This is the only place role rules live.
pub fn access(principal: &Principal, table: Table, op: Operation) -> Scope {
    match principal.role {
        Role::Principal => Scope::All,
        Role::Teacher => match table {
            Table::Accounts => Scope::Denied,
            _ => Scope::All,
        },
        Role::Student => {
            let Some(sid) = principal.student_id else {
                return Scope::Denied;
            };
            match (table, op) {
                (Table::Students | Table::Marks | Table::Grades, Operation::Select) => {
                    Scope::OwnStudent(sid)
                }
                (Table::Attendance, Operation::Select | Operation::Insert | Operation::Update) => {
                    Scope::OwnStudent(sid)
                }
                _ => Scope::Denied,
            }
        }
    }
}

pub fn resolve_principal(conn: &Connection, identity: &str) -> StoreResult<Option<Principal>> {
    let row = conn
        .query_row(
            "SELECT id, username, role, student_id FROM accounts WHERE username = ?",
            [identity],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<i64>>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((account_id, username, role, student_id)) = row else {
        return Ok(None);
    };
    let Some(role) = Role::parse(&role) else {
        // The CHECK constraint makes this unreachable for rows written by us.
        tracing::warn!(account_id, role = %role, "account has unknown role");
        return Ok(None);
    };
    Ok(Some(Principal {
        account_id,
        username,
        role,
        student_id,
    }))
}

/// An admitted (table, operation) pair for one resolved caller.
#[derive(Debug, Clone)]
pub struct Gate {
    pub principal: Principal,
    pub table: Table,
    pub op: Operation,
    pub scope: Scope,
}

/// Resolve `identity` and evaluate the policy for `table`/`op`.
///
/// A denied scope is not an error here: list reads turn it into an empty
/// result, everything else calls [`Gate::require`] or [`Gate::admit`].
pub fn gate(conn: &Connection, identity: &str, table: Table, op: Operation) -> StoreResult<Gate> {
    let principal = resolve_principal(conn, identity)?.ok_or(StoreError::Unauthenticated)?;
    let scope = access(&principal, table, op);
    Ok(Gate {
        principal,
        table,
        op,
        scope,
    })
}

impl Gate {
    fn denial(&self) -> StoreError {
        tracing::debug!(
            user = %self.principal.username,
            role = self.principal.role.as_str(),
            table = %self.table,
            op = %self.op,
            "access denied"
        );
        if self.op.is_read() {
            StoreError::NotFound(self.table.entity())
        } else {
            StoreError::Forbidden
        }
    }

    /// Fails unless the operation is allowed on at least some rows.
    pub fn require(&self) -> StoreResult<()> {
        if self.scope == Scope::Denied {
            return Err(self.denial());
        }
        Ok(())
    }

    /// Fails unless the policy reaches every row of the table.
    pub fn require_all(&self) -> StoreResult<()> {
        if self.scope != Scope::All {
            tracing::debug!(
                user = %self.principal.username,
                table = %self.table,
                op = %self.op,
                "table-wide access denied"
            );
            return Err(StoreError::Forbidden);
        }
        Ok(())
    }

    /// Checks a concrete row by its owning student key.
    pub fn admit(&self, owner: Option<i64>) -> StoreResult<()> {
        if !self.scope.admits(owner) {
            return Err(self.denial());
        }
        Ok(())
    }

    /// Error for a row that does not exist. Only callers with table-wide
    /// access learn that it is missing.
    pub fn missing(&self) -> StoreError {
        if self.scope == Scope::All {
            StoreError::NotFound(self.table.entity())
        } else {
            self.denial()
        }
    }

    /// Student key to filter list queries on, if the scope is narrowed.
    pub fn owner_filter(&self) -> Option<i64> {
        match self.scope {
            Scope::OwnStudent(sid) => Some(sid),
            _ => None,
        }
    }

    pub fn is_denied(&self) -> bool {
        self.scope == Scope::Denied
    }

    /// Same caller and table under another operation, without a second
    /// lookup. Upserts need both insert and update rights.
    pub fn with_op(&self, op: Operation) -> Gate {
        Gate {
            principal: self.principal.clone(),
            table: self.table,
            op,
            scope: access(&self.principal, self.table, op),
        }
    }

    /// Same caller on another table, without a second lookup.
    pub fn on(&self, table: Table, op: Operation) -> Gate {
        Gate {
            principal: self.principal.clone(),
            table,
            op,
            scope: access(&self.principal, table, op),
        }
    }
}
