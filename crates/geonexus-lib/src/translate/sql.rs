use rusqlite::types::Value as SqlValue;

use crate::error::Result;
use crate::query::{FieldSelection, QueryDescriptor};
use crate::translate::filter::{parse_filter, Comparison, FilterLiteral, FilterOp};
use crate::translate::TableRef;

/// A parameterized `SELECT` against a feature table.
///
/// `sql` never contains caller-supplied text other than the validated table
/// reference; all values travel through `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRequest {
    pub table: TableRef,
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub fields: FieldSelection,
}

/// Translate `query` into a statement over the table named by its resource id.
///
/// Feature tables carry `id`, `geometry` (GeoJSON text), `properties` (JSON
/// text) and the envelope columns `min_x`, `min_y`, `max_x`, `max_y`.
pub fn translate_sql(
    default_schema: &str,
    max_records: u32,
    query: &QueryDescriptor,
) -> Result<SqlRequest> {
    let table = TableRef::parse(&query.resource_id)?;
    let mut predicates = Vec::new();
    let mut params = Vec::new();

    if let Some(bbox) = &query.bbox {
        predicates.push("max_x >= ? AND min_x <= ? AND max_y >= ? AND min_y <= ?".to_string());
        params.extend([
            SqlValue::Real(bbox.min_x),
            SqlValue::Real(bbox.max_x),
            SqlValue::Real(bbox.min_y),
            SqlValue::Real(bbox.max_y),
        ]);
    }

    if let Some(filter) = &query.attribute_filter {
        for comparison in parse_filter(filter)? {
            push_comparison(&comparison, &mut predicates, &mut params);
        }
    }

    let mut sql = format!(
        "SELECT id, geometry, properties FROM {}",
        table.to_sql(default_schema)
    );
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    sql.push_str(" ORDER BY rowid LIMIT ? OFFSET ?");
    params.push(SqlValue::Integer(i64::from(query.limit.min(max_records))));
    params.push(SqlValue::Integer(i64::from(query.offset)));

    Ok(SqlRequest {
        table,
        sql,
        params,
        fields: query.fields.clone(),
    })
}

fn push_comparison(
    comparison: &Comparison,
    predicates: &mut Vec<String>,
    params: &mut Vec<SqlValue>,
) {
    params.push(SqlValue::Text(format!("$.{}", comparison.field)));
    let operand = "json_extract(properties, ?)";

    let value = match &comparison.value {
        FilterLiteral::Null => {
            let test = if comparison.op == FilterOp::Eq {
                "IS NULL"
            } else {
                "IS NOT NULL"
            };
            predicates.push(format!("{} {}", operand, test));
            return;
        }
        FilterLiteral::Text(text) => SqlValue::Text(text.clone()),
        FilterLiteral::Integer(integer) => SqlValue::Integer(*integer),
        FilterLiteral::Real(real) => SqlValue::Real(*real),
        FilterLiteral::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
    };

    predicates.push(format!("{} {} ?", operand, comparison.op.as_sql()));
    params.push(value);
}
