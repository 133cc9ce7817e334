//! Uniform result abstraction over rows, columns, and streams (spec §3).
//!
//! Every variant carries a disposer: closing a `QueryResult` idempotently
//! closes its lazy row source and any tracked closable resources, even if
//! one of them errors (spec invariant: "closing a Result idempotently
//! closes its lazy sources").

use crate::error::Result as JdbcxResult;
use crate::value::{Field, Row, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A resource an executor registered as needing release when the owning
/// result closes (spec §4.3: `resourceTracker`).
pub trait Closable: Send + Sync {
    fn close(&self) -> JdbcxResult<()>;
}

impl<F: Fn() -> JdbcxResult<()> + Send + Sync> Closable for F {
    fn close(&self) -> JdbcxResult<()> {
        self()
    }
}

/// A lazy source of rows. Finite unless backed by a live cursor (spec §3).
pub trait RowSource: Send {
    fn next_row(&mut self) -> JdbcxResult<Option<Row>>;
}

/// A `RowSource` over an already-materialized vector, the common case for
/// executors that buffer their own output (db, query, help, ...).
pub struct VecRowSource {
    rows: std::vec::IntoIter<Row>,
}

impl VecRowSource {
    pub fn new(rows: Vec<Row>) -> Self {
        VecRowSource { rows: rows.into_iter() }
    }
}

impl RowSource for VecRowSource {
    fn next_row(&mut self) -> JdbcxResult<Option<Row>> {
        Ok(self.rows.next())
    }
}

pub enum ResultBody {
    Row {
        fields: Vec<Field>,
        rows: Box<dyn RowSource>,
    },
    Scalar(Value),
    Stream {
        bytes: Vec<u8>,
        declared_format: String,
        declared_compression: String,
    },
    Update {
        affected: i64,
    },
}

/// Tagged-union query result with an idempotent disposer.
pub struct QueryResult {
    pub body: ResultBody,
    resources: Vec<Arc<dyn Closable>>,
    closed: AtomicBool,
}

impl QueryResult {
    pub fn row(fields: Vec<Field>, rows: Box<dyn RowSource>) -> Self {
        QueryResult {
            body: ResultBody::Row { fields, rows },
            resources: Vec::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn rows_vec(fields: Vec<Field>, rows: Vec<Row>) -> Self {
        Self::row(fields, Box::new(VecRowSource::new(rows)))
    }

    pub fn scalar(value: Value) -> Self {
        QueryResult {
            body: ResultBody::Scalar(value),
            resources: Vec::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn scalar_str(s: impl Into<String>) -> Self {
        Self::scalar(Value::Str(s.into()))
    }

    pub fn stream(bytes: Vec<u8>, format: impl Into<String>, compression: impl Into<String>) -> Self {
        QueryResult {
            body: ResultBody::Stream {
                bytes,
                declared_format: format.into(),
                declared_compression: compression.into(),
            },
            resources: Vec::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn update(affected: i64) -> Self {
        QueryResult {
            body: ResultBody::Update { affected },
            resources: Vec::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn track(&mut self, resource: Arc<dyn Closable>) {
        self.resources.push(resource);
    }

    /// Render the single-field, single-row "treated as a table" view a
    /// `ScalarResult` presents to serializers (spec §3).
    pub fn as_fields_and_rows(&mut self) -> JdbcxResult<(Vec<Field>, Vec<Row>)> {
        match &mut self.body {
            ResultBody::Row { fields, rows } => {
                let mut out = Vec::new();
                while let Some(row) = rows.next_row()? {
                    out.push(row);
                }
                Ok((fields.clone(), out))
            }
            ResultBody::Scalar(v) => {
                let field = Field::new("result", crate::value::JdbcType::Other);
                Ok((vec![field], vec![vec![v.clone()]]))
            }
            ResultBody::Update { affected } => {
                let field = Field::new("affected_rows", crate::value::JdbcType::BigInt);
                Ok((
                    vec![field],
                    vec![vec![Value::Integral { width: 64, signed: true, value: *affected }]],
                ))
            }
            ResultBody::Stream { .. } => Err(crate::error::Error::Unsupported(
                "cannot materialize opaque stream result as rows".into(),
            )),
        }
    }

    /// Idempotently close every tracked resource, collecting (not
    /// short-circuiting on) individual failures, per spec invariant 4.
    pub fn close(&self) -> JdbcxResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut first_err = None;
        for resource in &self.resources {
            if let Err(e) = resource.close() {
                tracing::debug!(error = %e, "resource close failed during QueryResult::close");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        if !self.closed.load(Ordering::SeqCst) {
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "QueryResult dropped without explicit close and a resource failed to release");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn close_is_idempotent_and_calls_every_resource() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut r = QueryResult::update(1);
        for _ in 0..3 {
            let calls = calls.clone();
            r.track(Arc::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }));
        }
        r.close().unwrap();
        r.close().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn close_releases_all_resources_even_if_one_throws() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut r = QueryResult::update(1);
        r.track(Arc::new(|| Err(crate::error::Error::InvalidState("boom".into()))));
        let calls2 = calls.clone();
        r.track(Arc::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));
        let res = r.close();
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn scalar_renders_as_single_row_single_column() {
        let mut r = QueryResult::scalar_str("hello");
        let (fields, rows) = r.as_fields_and_rows().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1);
    }
}
