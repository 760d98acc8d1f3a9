// SPDX-License-Identifier: Apache-2.0

//! Composable filter predicates.
//!
//! Conditions form an algebraic tree compiled into a SQL fragment plus
//! positional arguments. The tree never owns placeholder numbering — the
//! surrounding compiler does, through [`ArgList`] — so the same tree
//! compiles identically in a WHERE or HAVING position, after any number of
//! previously bound arguments.

use crate::dialect::{Dialect, DialectKind};
use crate::error::{Error, Result};
use crate::schema::model::Schema;
use crate::value::Value;

/// Comparison operators for [`Condition::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    fn sql(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

/// Argument accumulator owning placeholder numbering.
pub struct ArgList<'d> {
    dialect: &'d dyn Dialect,
    values: Vec<Value>,
}

impl<'d> ArgList<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self {
            dialect,
            values: Vec::new(),
        }
    }

    /// Binds a value and returns its placeholder.
    pub fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        self.dialect.placeholder(self.values.len())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Field-resolution context for condition compilation.
pub struct ConditionContext<'a> {
    pub schema: &'a Schema,
    pub alias: Option<&'a str>,
    pub dialect: &'a dyn Dialect,
}

impl ConditionContext<'_> {
    /// Quoted, optionally alias-qualified column for a schema field.
    pub fn column(&self, field: &str) -> Result<String> {
        let column = self.schema.column_name(field)?;
        let quoted = self.dialect.quote_ident(column);
        Ok(match self.alias {
            Some(alias) => format!("{}.{}", self.dialect.quote_ident(alias), quoted),
            None => quoted,
        })
    }
}

/// An algebraic filter predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Compare {
        field: String,
        op: CompareOp,
        value: Value,
    },
    In {
        field: String,
        values: Vec<Value>,
        negated: bool,
    },
    Null {
        field: String,
        is_null: bool,
    },
    Between {
        field: String,
        low: Value,
        high: Value,
    },
    Like {
        field: String,
        pattern: String,
        case_insensitive: bool,
        /// True when the pattern contains `\`-escaped wildcards and needs an
        /// explicit ESCAPE clause.
        escaped: bool,
    },
}

/// Escapes LIKE wildcards in a literal needle.
fn escape_like(needle: &str) -> (String, bool) {
    if !needle.contains(['%', '_', '\\']) {
        return (needle.to_string(), false);
    }
    let mut out = String::with_capacity(needle.len() + 4);
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    (out, true)
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Ne, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, CompareOp::Gte, value)
    }

    pub fn compare(field: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Condition::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Raw LIKE with a caller-supplied pattern.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Like {
            field: field.into(),
            pattern: pattern.into(),
            case_insensitive: false,
            escaped: false,
        }
    }

    pub fn not_like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Condition::Not(Box::new(Self::like(field, pattern)))
    }

    /// Substring match; wildcards in the needle are escaped.
    pub fn contains(field: impl Into<String>, needle: &str) -> Self {
        let (escaped_needle, escaped) = escape_like(needle);
        Condition::Like {
            field: field.into(),
            pattern: format!("%{escaped_needle}%"),
            case_insensitive: false,
            escaped,
        }
    }

    pub fn starts_with(field: impl Into<String>, prefix: &str) -> Self {
        let (escaped_prefix, escaped) = escape_like(prefix);
        Condition::Like {
            field: field.into(),
            pattern: format!("{escaped_prefix}%"),
            case_insensitive: false,
            escaped,
        }
    }

    pub fn ends_with(field: impl Into<String>, suffix: &str) -> Self {
        let (escaped_suffix, escaped) = escape_like(suffix);
        Condition::Like {
            field: field.into(),
            pattern: format!("%{escaped_suffix}"),
            case_insensitive: false,
            escaped,
        }
    }

    /// Case-insensitive variant of any LIKE-shaped condition.
    pub fn case_insensitive(mut self) -> Self {
        if let Condition::Like {
            case_insensitive, ..
        } = &mut self
        {
            *case_insensitive = true;
        }
        self
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Condition::Null {
            field: field.into(),
            is_null: true,
        }
    }

    pub fn is_not_null(field: impl Into<String>) -> Self {
        Condition::Null {
            field: field.into(),
            is_null: false,
        }
    }

    pub fn in_list<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<V: Into<Value>>(
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Condition::Between {
            field: field.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn and(self, other: Condition) -> Self {
        match self {
            Condition::And(mut children) => {
                children.push(other);
                Condition::And(children)
            }
            _ => Condition::And(vec![self, other]),
        }
    }

    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut children) => {
                children.push(other);
                Condition::Or(children)
            }
            _ => Condition::Or(vec![self, other]),
        }
    }

    pub fn negate(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Compiles to a SQL fragment, binding values through `args`.
    pub fn compile(&self, ctx: &ConditionContext<'_>, args: &mut ArgList<'_>) -> Result<String> {
        match self {
            Condition::And(children) => {
                if children.is_empty() {
                    return Ok("1=1".to_string());
                }
                let parts = children
                    .iter()
                    .map(|c| c.compile_child(ctx, args))
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(" AND "))
            }
            Condition::Or(children) => {
                if children.is_empty() {
                    return Ok("1=0".to_string());
                }
                let parts = children
                    .iter()
                    .map(|c| c.compile_child(ctx, args))
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(" OR "))
            }
            Condition::Not(child) => {
                let inner = child.compile(ctx, args)?;
                Ok(format!("NOT ({inner})"))
            }
            Condition::Compare { field, op, value } => {
                let column = ctx.column(field)?;
                if value.is_null() {
                    return Err(Error::sql_compile(format!(
                        "comparison against NULL on field {field}; use is_null/is_not_null"
                    )));
                }
                let placeholder = args.push(value.clone());
                Ok(format!("{column} {} {placeholder}", op.sql()))
            }
            Condition::In {
                field,
                values,
                negated,
            } => {
                let column = ctx.column(field)?;
                if values.is_empty() {
                    // IN () is invalid SQL; compile to the operator identity.
                    return Ok(if *negated { "1=1" } else { "1=0" }.to_string());
                }
                let placeholders: Vec<String> =
                    values.iter().map(|v| args.push(v.clone())).collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                Ok(format!("{column} {op} ({})", placeholders.join(", ")))
            }
            Condition::Null { field, is_null } => {
                let column = ctx.column(field)?;
                Ok(if *is_null {
                    format!("{column} IS NULL")
                } else {
                    format!("{column} IS NOT NULL")
                })
            }
            Condition::Between { field, low, high } => {
                let column = ctx.column(field)?;
                let low_ph = args.push(low.clone());
                let high_ph = args.push(high.clone());
                Ok(format!("{column} BETWEEN {low_ph} AND {high_ph}"))
            }
            Condition::Like {
                field,
                pattern,
                case_insensitive,
                escaped,
            } => {
                let column = ctx.column(field)?;
                let keyword = if *case_insensitive && ctx.dialect.kind() == DialectKind::Postgres
                {
                    "ILIKE"
                } else {
                    "LIKE"
                };
                let placeholder = args.push(Value::Text(pattern.clone()));
                let escape = if *escaped { " ESCAPE '\\'" } else { "" };
                Ok(format!("{column} {keyword} {placeholder}{escape}"))
            }
        }
    }

    fn compile_child(&self, ctx: &ConditionContext<'_>, args: &mut ArgList<'_>) -> Result<String> {
        let sql = self.compile(ctx, args)?;
        Ok(match self {
            Condition::And(c) | Condition::Or(c) if c.len() > 1 => format!("({sql})"),
            _ => sql,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::schema::model::{Field, FieldType};

    fn user_schema() -> Schema {
        Schema::new("User")
            .add_field(Field::new("id", FieldType::Int).primary_key().auto_increment())
            .add_field(Field::new("name", FieldType::String))
            .add_field(Field::new("age", FieldType::Int))
            .add_field(Field::new("createdAt", FieldType::DateTime).column("created_at"))
    }

    fn compile(cond: &Condition, dialect: &dyn Dialect) -> (String, Vec<Value>) {
        let schema = user_schema();
        let ctx = ConditionContext {
            schema: &schema,
            alias: None,
            dialect,
        };
        let mut args = ArgList::new(dialect);
        let sql = cond.compile(&ctx, &mut args).unwrap();
        (sql, args.into_values())
    }

    #[test]
    fn contains_and_gte_on_postgres() {
        let cond = Condition::contains("name", "li").and(Condition::gte("age", 25));
        let dialect = PostgresDialect;
        let (sql, args) = compile(&cond, &dialect);
        assert_eq!(sql, "\"name\" LIKE $1 AND \"age\" >= $2");
        assert_eq!(args, vec![Value::Text("%li%".into()), Value::Int(25)]);
    }

    #[test]
    fn compilation_is_pure() {
        let cond = Condition::eq("name", "Ada").or(Condition::between("age", 20, 30));
        let dialect = MySqlDialect;
        let first = compile(&cond, &dialect);
        let second = compile(&cond, &dialect);
        assert_eq!(first, second);
    }

    #[test]
    fn mysql_uses_question_placeholders() {
        let cond = Condition::eq("name", "Ada").and(Condition::ne("age", 3));
        let dialect = MySqlDialect;
        let (sql, args) = compile(&cond, &dialect);
        assert_eq!(sql, "`name` = ? AND `age` != ?");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn empty_in_is_constant_false() {
        let dialect = PostgresDialect;
        let (sql, args) = compile(&Condition::in_list("age", Vec::<i64>::new()), &dialect);
        assert_eq!(sql, "1=0");
        assert!(args.is_empty());

        let (sql, _) = compile(&Condition::not_in("age", Vec::<i64>::new()), &dialect);
        assert_eq!(sql, "1=1");
    }

    #[test]
    fn empty_groups_compile_to_identities() {
        let dialect = PostgresDialect;
        let (and_sql, _) = compile(&Condition::And(vec![]), &dialect);
        assert_eq!(and_sql, "1=1");
        let (or_sql, _) = compile(&Condition::Or(vec![]), &dialect);
        assert_eq!(or_sql, "1=0");
    }

    #[test]
    fn nested_groups_are_parenthesized() {
        let cond = Condition::eq("age", 1).and(Condition::eq("age", 2).or(Condition::eq("age", 3)));
        let dialect = PostgresDialect;
        let (sql, _) = compile(&cond, &dialect);
        assert_eq!(sql, "\"age\" = $1 AND (\"age\" = $2 OR \"age\" = $3)");
    }

    #[test]
    fn not_wraps_child() {
        let cond = Condition::eq("age", 7).negate();
        let dialect = PostgresDialect;
        let (sql, _) = compile(&cond, &dialect);
        assert_eq!(sql, "NOT (\"age\" = $1)");
    }

    #[test]
    fn wildcards_in_needle_are_escaped() {
        let cond = Condition::contains("name", "50%");
        let dialect = PostgresDialect;
        let (sql, args) = compile(&cond, &dialect);
        assert_eq!(sql, "\"name\" LIKE $1 ESCAPE '\\'");
        assert_eq!(args, vec![Value::Text("%50\\%%".into())]);
    }

    #[test]
    fn ilike_only_on_postgres() {
        let cond = Condition::contains("name", "li").case_insensitive();
        let pg = PostgresDialect;
        let (sql, _) = compile(&cond, &pg);
        assert!(sql.contains("ILIKE"));

        let my = MySqlDialect;
        let (sql, _) = compile(&cond, &my);
        assert!(sql.contains("LIKE") && !sql.contains("ILIKE"));
    }

    #[test]
    fn alias_qualifies_columns() {
        let schema = user_schema();
        let dialect = PostgresDialect;
        let ctx = ConditionContext {
            schema: &schema,
            alias: Some("t0"),
            dialect: &dialect,
        };
        let mut args = ArgList::new(&dialect);
        let sql = Condition::eq("createdAt", "2024-01-01")
            .compile(&ctx, &mut args)
            .unwrap();
        assert_eq!(sql, "\"t0\".\"created_at\" = $1");
    }

    #[test]
    fn unknown_field_errors() {
        let schema = user_schema();
        let dialect = PostgresDialect;
        let ctx = ConditionContext {
            schema: &schema,
            alias: None,
            dialect: &dialect,
        };
        let mut args = ArgList::new(&dialect);
        assert!(Condition::eq("ghost", 1).compile(&ctx, &mut args).is_err());
    }
}
