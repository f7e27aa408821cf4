//! Filter compiler: raw caller clauses → validated [`QueryPlan`].
//!
//! The backing store answers conference queries under one restriction: at most
//! one field per query may use a non-equality comparison, and results must be
//! sorted on that field first. The compiler enforces the restriction up front so
//! an invalid query is rejected before anything executes.
//!
//! # Example
//!
//! ```
//! use conference::filter::{Field, FilterCompiler, RawClause};
//!
//! let plan = FilterCompiler::compile(&[
//!     RawClause::new("CITY", "EQ", "London"),
//!     RawClause::new("MONTH", "GT", "6"),
//!     RawClause::new("MONTH", "LTEQ", "9"),
//! ])?;
//!
//! assert_eq!(plan.primary_sort(), Field::Month);
//! assert_eq!(plan.secondary_sort(), Some(Field::Name));
//! # Ok::<(), conference::ValidationError>(())
//! ```

use crate::error::ValidationError;
use std::cmp::Ordering;
use std::fmt;

/// A conference field that can appear in a filter or a sort.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Host city (text)
    City,
    /// Any of the topics (text, multi-valued)
    Topic,
    /// Start month (integer)
    Month,
    /// Capacity (integer)
    MaxAttendees,
    /// Unallocated seats (integer); not reachable from caller tokens
    SeatsAvailable,
    /// Conference name; the canonical sort field
    Name,
}

impl Field {
    /// Map a caller token to a field.
    ///
    /// Only `CITY`, `TOPIC`, `MONTH` and `MAX_ATTENDEES` are accepted.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "CITY" => Some(Self::City),
            "TOPIC" => Some(Self::Topic),
            "MONTH" => Some(Self::Month),
            "MAX_ATTENDEES" => Some(Self::MaxAttendees),
            _ => None,
        }
    }

    /// Stored property name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Topic => "topics",
            Self::Month => "month",
            Self::MaxAttendees => "maxAttendees",
            Self::SeatsAvailable => "seatsAvailable",
            Self::Name => "name",
        }
    }

    /// Whether values of this field are integers.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Month | Self::MaxAttendees | Self::SeatsAvailable)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `=`
    Eq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `!=`
    Ne,
}

impl Operator {
    /// Map a caller token (`EQ`, `GT`, `GTEQ`, `LT`, `LTEQ`, `NE`) to an operator.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "EQ" => Some(Self::Eq),
            "GT" => Some(Self::Gt),
            "GTEQ" => Some(Self::GtEq),
            "LT" => Some(Self::Lt),
            "LTEQ" => Some(Self::LtEq),
            "NE" => Some(Self::Ne),
            _ => None,
        }
    }

    /// Every operator except `=` is an inequality.
    #[must_use]
    pub const fn is_inequality(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Whether `ordering` (of stored value relative to the filter value) satisfies this operator.
    #[must_use]
    pub const fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::GtEq => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::LtEq => !matches!(ordering, Ordering::Greater),
            Self::Ne => !matches!(ordering, Ordering::Equal),
        }
    }

    /// Comparison symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Ne => "!=",
        }
    }
}

/// A filter operand, typed by its field.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterValue {
    /// Value of a text field
    Text(String),
    /// Value of a numeric field
    Integer(i64),
}

impl FilterValue {
    /// Compare two values of the same kind. Values of different kinds are incomparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

/// A filter clause exactly as the caller supplied it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawClause {
    /// Field token, e.g. `"CITY"`
    pub field: String,
    /// Operator token, e.g. `"GTEQ"`
    pub operator: String,
    /// Value as text
    pub value: String,
}

impl RawClause {
    /// Build a raw clause.
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A validated filter clause.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PredicateClause {
    field: Field,
    operator: Operator,
    value: FilterValue,
}

impl PredicateClause {
    /// Build a clause, rejecting a value whose kind does not match the field.
    ///
    /// # Errors
    ///
    /// [`ValidationError::InvalidValue`] on a kind mismatch.
    pub fn new(field: Field, operator: Operator, value: FilterValue) -> Result<Self, ValidationError> {
        let kind_matches = matches!(
            (&value, field.is_numeric()),
            (FilterValue::Integer(_), true) | (FilterValue::Text(_), false)
        );
        if !kind_matches {
            return Err(ValidationError::InvalidValue {
                field: field.name(),
                value: value.to_string(),
            });
        }
        Ok(Self {
            field,
            operator,
            value,
        })
    }

    /// Map and coerce a raw clause.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidFieldOrOperator`] for an unknown token
    /// - [`ValidationError::InvalidValue`] when a numeric field's value is not an integer
    pub fn parse(raw: &RawClause) -> Result<Self, ValidationError> {
        let (Some(field), Some(operator)) = (
            Field::from_token(&raw.field),
            Operator::from_token(&raw.operator),
        ) else {
            return Err(ValidationError::InvalidFieldOrOperator {
                field: raw.field.clone(),
                operator: raw.operator.clone(),
            });
        };

        let value = if field.is_numeric() {
            raw.value
                .trim()
                .parse::<i64>()
                .map(FilterValue::Integer)
                .map_err(|_| ValidationError::InvalidValue {
                    field: field.name(),
                    value: raw.value.clone(),
                })?
        } else {
            FilterValue::Text(raw.value.clone())
        };

        Self::new(field, operator, value)
    }

    /// The filtered field.
    #[must_use]
    pub const fn field(&self) -> Field {
        self.field
    }

    /// The comparison operator.
    #[must_use]
    pub const fn operator(&self) -> Operator {
        self.operator
    }

    /// The operand.
    #[must_use]
    pub const fn value(&self) -> &FilterValue {
        &self.value
    }
}

impl fmt::Display for PredicateClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.operator.symbol(), self.value)
    }
}

/// An executable conference query.
///
/// Built only by [`FilterCompiler`], so the single-inequality rule and the sort
/// rule always hold. Plans have no serialized form to sneak around that:
///
/// ```compile_fail
/// fn decodable<T: serde::de::DeserializeOwned>() {}
/// decodable::<conference::filter::QueryPlan>();
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    filters: Vec<PredicateClause>,
    primary_sort: Field,
    secondary_sort: Option<Field>,
}

impl QueryPlan {
    /// Filters in input order.
    #[must_use]
    pub fn filters(&self) -> &[PredicateClause] {
        &self.filters
    }

    /// First sort key: the inequality field, or `Name`.
    #[must_use]
    pub const fn primary_sort(&self) -> Field {
        self.primary_sort
    }

    /// Second sort key: `Name` when there is an inequality field.
    #[must_use]
    pub const fn secondary_sort(&self) -> Option<Field> {
        self.secondary_sort
    }

    /// The field carrying non-equality operators, if any.
    #[must_use]
    pub const fn inequality_field(&self) -> Option<Field> {
        match self.secondary_sort {
            Some(_) => Some(self.primary_sort),
            None => None,
        }
    }

    /// Sort keys in application order.
    pub fn sorts(&self) -> impl Iterator<Item = Field> + '_ {
        std::iter::once(self.primary_sort).chain(self.secondary_sort)
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filters: Vec<String> = self.filters.iter().map(ToString::to_string).collect();
        let sorts: Vec<&str> = self.sorts().map(Field::name).collect();
        write!(
            f,
            "WHERE {} ORDER BY {}",
            if filters.is_empty() {
                "true".to_string()
            } else {
                filters.join(" AND ")
            },
            sorts.join(", ")
        )
    }
}

/// Compiles caller filters into [`QueryPlan`]s. Pure; holds no state.
pub struct FilterCompiler;

impl FilterCompiler {
    /// Compile raw caller clauses.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidFieldOrOperator`] for an unknown token
    /// - [`ValidationError::InvalidValue`] for a non-integer numeric value
    /// - [`ValidationError::MultipleInequalityFields`] when two different fields
    ///   use non-equality operators
    pub fn compile(raw: &[RawClause]) -> Result<QueryPlan, ValidationError> {
        let clauses = raw
            .iter()
            .map(PredicateClause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Self::plan(clauses)
    }

    /// Build a plan from already-typed clauses.
    ///
    /// `Name` is the tiebreak sort and never an inequality field.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::InvalidFieldOrOperator`] for an inequality on `Name`
    /// - [`ValidationError::MultipleInequalityFields`] when two different fields
    ///   use non-equality operators
    pub(crate) fn plan(clauses: Vec<PredicateClause>) -> Result<QueryPlan, ValidationError> {
        let mut inequality: Option<Field> = None;

        for clause in &clauses {
            if !clause.operator.is_inequality() {
                continue;
            }
            if clause.field == Field::Name {
                return Err(ValidationError::InvalidFieldOrOperator {
                    field: Field::Name.name().to_string(),
                    operator: clause.operator.symbol().to_string(),
                });
            }
            match inequality {
                Some(first) if first != clause.field => {
                    return Err(ValidationError::MultipleInequalityFields {
                        first: first.name(),
                        second: clause.field.name(),
                    });
                }
                _ => inequality = Some(clause.field),
            }
        }

        Ok(QueryPlan {
            filters: clauses,
            primary_sort: inequality.unwrap_or(Field::Name),
            secondary_sort: inequality.map(|_| Field::Name),
        })
    }
}
