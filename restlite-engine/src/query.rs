//! Query compiler
//!
//! Builds the list, count and by-key statements for one table. Every
//! identifier is checked against the table's live columns before it is
//! interpolated, and every value is bound.

use restlite_common::error::{Error, Result};

use crate::catalog::{escape_like, TableShape};
use crate::ddl::UPDATED_AT;
use crate::filter::{parse_filters, FilterClause, FilterOperator, FilterValue};
use crate::ident::{self, quote, qualified};
use crate::pagination::PageRequest;
use crate::port::Row;
use crate::relation::Expansion;
use crate::stmt::{placeholders, SqlValue, Statement};

// ============================================================================
// Request Types
// ============================================================================

/// Listing parameters for one request, still in their raw query form
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub page: PageRequest,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub schema: Option<String>,
    pub extend: Option<String>,
    pub filters: Option<String>,
    pub lookup_field: Option<String>,
}

impl QueryRequest {
    pub fn extend_columns(&self) -> Vec<String> {
        split_list(self.extend.as_deref())
    }

    pub fn schema_columns(&self) -> Vec<String> {
        split_list(self.schema.as_deref())
    }

    /// Parameters carried over into pagination links, in link order
    pub fn link_params(&self) -> Vec<(&'static str, &str)> {
        [
            ("_filters", &self.filters),
            ("_search", &self.search),
            ("_ordering", &self.ordering),
            ("_schema", &self.schema),
            ("_extend", &self.extend),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

/// Comma separated list with blanks removed
pub fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// `field` or `-field`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering {
    pub field: String,
    pub descending: bool,
}

impl Ordering {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: raw.to_string(),
                descending: false,
            },
        }
    }

    pub fn direction(&self) -> &'static str {
        if self.descending {
            "DESC"
        } else {
            "ASC"
        }
    }
}

/// Comma separated key values addressed by a by-key request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySet(Vec<String>);

impl KeySet {
    pub fn parse(raw: &str) -> Result<Self> {
        let keys = split_list(Some(raw));
        if keys.is_empty() {
            return Err(Error::InvalidQueryParam(
                "at least one key value is required".to_string(),
            ));
        }
        Ok(Self(keys))
    }

    pub fn values(&self) -> &[String] {
        &self.0
    }

    fn params(&self) -> Vec<SqlValue> {
        self.0.iter().map(SqlValue::text).collect()
    }
}

// ============================================================================
// WHERE Clause
// ============================================================================

/// Predicate shared by the list and count statements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereClause {
    conditions: Vec<String>,
    params: Vec<SqlValue>,
}

impl WhereClause {
    /// Filters joined with `AND`, then the search group
    pub fn build(shape: &TableShape, filters: &[FilterClause], search: Option<&str>) -> Result<Self> {
        let mut clause = Self::default();

        for filter in filters {
            clause.push_filter(shape, filter)?;
        }

        if let Some(term) = search.filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(term));
            let group: Vec<String> = shape
                .column_names()
                .map(|c| format!("{} LIKE ? ESCAPE '\\'", qualified(&shape.name, c)))
                .collect();
            if !group.is_empty() {
                clause
                    .params
                    .extend(std::iter::repeat(SqlValue::text(pattern)).take(group.len()));
                clause.conditions.push(format!("({})", group.join(" OR ")));
            }
        }

        Ok(clause)
    }

    fn push_filter(&mut self, shape: &TableShape, filter: &FilterClause) -> Result<()> {
        let column = qualified(&shape.name, shape.require_column(&filter.field)?);

        match (&filter.value, filter.operator) {
            (FilterValue::None, op) => {
                self.conditions.push(format!("{column} {}", op.as_sql()));
            }
            (FilterValue::Scalar(value), op) => {
                self.conditions.push(format!("{column} {} ?", op.as_sql()));
                self.params.push(SqlValue::text(value.as_str()));
            }
            (FilterValue::List(values), op) => {
                let keyword = if op == FilterOperator::Neq { "NOT IN" } else { "IN" };
                self.conditions
                    .push(format!("{column} {keyword} ({})", placeholders(values.len())));
                self.params.extend(values.iter().map(SqlValue::text));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// ` WHERE ...` or an empty string
    pub fn sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }
}

// ============================================================================
// Statement Builders
// ============================================================================

/// Statements backing one listing page
#[derive(Debug, Clone)]
pub struct ListStatements {
    pub list: Statement,
    pub count: Statement,
}

fn projection(shape: &TableShape, schema: &[String], expansion: &Expansion) -> Result<String> {
    let mut fields = if schema.is_empty() {
        vec![format!("{}.*", quote(&shape.name))]
    } else {
        schema
            .iter()
            .map(|field| {
                shape
                    .require_column(field)
                    .map(|c| qualified(&shape.name, c))
            })
            .collect::<Result<Vec<_>>>()?
    };
    fields.extend(expansion.projection_fragments());
    Ok(fields.join(", "))
}

fn source(shape: &TableShape, expansion: &Expansion) -> String {
    let mut from = quote(&shape.name);
    for join in expansion.join_clauses() {
        from.push(' ');
        from.push_str(&join);
    }
    from
}

fn order_by(shape: &TableShape, ordering: Option<&str>) -> Result<String> {
    match ordering.filter(|s| !s.trim().is_empty()).map(Ordering::parse) {
        Some(order) => {
            let column = shape.require_column(&order.field)?;
            Ok(format!(
                " ORDER BY {} {}",
                qualified(&shape.name, column),
                order.direction()
            ))
        }
        // Stable pages for tables with a declared key
        None if shape.columns.iter().any(|c| c.is_primary_key()) => Ok(format!(
            " ORDER BY {} ASC",
            qualified(&shape.name, shape.primary_key())
        )),
        None => Ok(String::new()),
    }
}

/// Compile the page query and its companion count
pub fn compile_list(
    shape: &TableShape,
    expansion: &Expansion,
    request: &QueryRequest,
) -> Result<ListStatements> {
    let filters = match request.filters.as_deref() {
        Some(raw) => parse_filters(raw)?,
        None => Vec::new(),
    };
    let predicate = WhereClause::build(shape, &filters, request.search.as_deref())?;

    let mut params = predicate.params().to_vec();
    params.push(SqlValue::from(request.page.limit));
    params.push(SqlValue::from(request.page.offset()));

    let list = Statement::with_params(
        format!(
            "SELECT {} FROM {}{}{} LIMIT ? OFFSET ?",
            projection(shape, &request.schema_columns(), expansion)?,
            source(shape, expansion),
            predicate.sql(),
            order_by(shape, request.ordering.as_deref())?
        ),
        params,
    );

    let count = Statement::with_params(
        format!(
            "SELECT COUNT(*) AS total FROM {}{}",
            quote(&shape.name),
            predicate.sql()
        ),
        predicate.params().to_vec(),
    );

    Ok(ListStatements { list, count })
}

/// Column addressed by a by-key request, defaulting to the primary key
pub fn resolve_lookup_field(shape: &TableShape, requested: Option<&str>) -> Result<String> {
    match requested.filter(|s| !s.is_empty()) {
        Some(field) => Ok(shape.require_column(ident::validate(field)?)?.to_string()),
        None => Ok(shape.primary_key().to_string()),
    }
}

fn key_predicate(shape: &TableShape, lookup_field: &str, keys: &KeySet) -> String {
    format!(
        "{} IN ({})",
        qualified(&shape.name, lookup_field),
        placeholders(keys.values().len())
    )
}

/// `SELECT` every row whose lookup field is in `keys`
pub fn compile_lookup(
    shape: &TableShape,
    expansion: &Expansion,
    schema: &[String],
    lookup_field: &str,
    keys: &KeySet,
) -> Result<Statement> {
    Ok(Statement::with_params(
        format!(
            "SELECT {} FROM {} WHERE {}",
            projection(shape, schema, expansion)?,
            source(shape, expansion),
            key_predicate(shape, lookup_field, keys)
        ),
        keys.params(),
    ))
}

/// `UPDATE` every row whose lookup field is in `keys`
pub fn compile_update(
    shape: &TableShape,
    lookup_field: &str,
    keys: &KeySet,
    fields: &Row,
) -> Result<Statement> {
    if fields.is_empty() {
        return Err(Error::NoFieldsProvided);
    }

    let mut assignments = Vec::with_capacity(fields.len() + 1);
    let mut params = Vec::with_capacity(fields.len() + keys.values().len());
    for (name, value) in fields {
        let column = shape.require_column(name)?;
        assignments.push(format!("{} = ?", quote(column)));
        params.push(SqlValue::from(value));
    }
    if shape.is_managed_timestamp(UPDATED_AT) && !fields.contains_key(UPDATED_AT) {
        assignments.push(format!("{} = CURRENT_TIMESTAMP", quote(UPDATED_AT)));
    }
    params.extend(keys.params());

    Ok(Statement::with_params(
        format!(
            "UPDATE {} SET {} WHERE {}",
            quote(&shape.name),
            assignments.join(", "),
            key_predicate(shape, lookup_field, keys)
        ),
        params,
    ))
}

/// `DELETE` every row whose lookup field is in `keys`
pub fn compile_delete(shape: &TableShape, lookup_field: &str, keys: &KeySet) -> Statement {
    Statement::with_params(
        format!(
            "DELETE FROM {} WHERE {}",
            quote(&shape.name),
            key_predicate(shape, lookup_field, keys)
        ),
        keys.params(),
    )
}

/// Single or multi-row `INSERT`
///
/// A single row drops its null fields and falls back to `DEFAULT VALUES` when
/// nothing is left. Multiple rows must share one key set.
pub fn compile_insert(shape: &TableShape, rows: &[Row]) -> Result<Statement> {
    let table = quote(&shape.name);

    let rows: Vec<Row> = match rows {
        [] => {
            return Err(Error::ValidationError(
                "at least one row is required".to_string(),
            ))
        }
        [single] => {
            let row: Row = single
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if row.is_empty() {
                return Ok(Statement::new(format!("INSERT INTO {table} DEFAULT VALUES")));
            }
            vec![row]
        }
        many => many.to_vec(),
    };

    let columns: Vec<&String> = rows[0].keys().collect();
    if columns.is_empty() {
        return Err(Error::ValidationError(
            "rows in a bulk insert must not be empty".to_string(),
        ));
    }
    let mut quoted = Vec::with_capacity(columns.len());
    for column in &columns {
        quoted.push(quote(shape.require_column(column)?));
    }

    let mut params = Vec::with_capacity(columns.len() * rows.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        if row.len() != columns.len() || !columns.iter().all(|c| row.contains_key(*c)) {
            return Err(Error::ValidationError(format!(
                "row {index} does not have the same fields as the first row"
            )));
        }
        params.extend(columns.iter().map(|c| SqlValue::from(&row[*c])));
        tuples.push(format!("({})", placeholders(columns.len())));
    }

    Ok(Statement::with_params(
        format!(
            "INSERT INTO {table} ({}) VALUES {}",
            quoted.join(", "),
            tuples.join(", ")
        ),
        params,
    ))
}
