//! Typed JSON column for Diesel TEXT fields.
//!
//! Email rows keep their `ExtractedInfo` as a JSON document in a TEXT
//! column; this wrapper does the serde work at the database boundary so
//! the rest of the code only ever sees the typed value.

use diesel::deserialize::{FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{IsNull, Output, ToSql};
use diesel::sql_types::Text;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::ops::Deref;

/// A value stored as JSON in a TEXT column.
///
/// ```ignore
/// use shared_types::{ExtractedInfo, JsonWrapper};
///
/// pub struct EmailRow {
///     pub extracted_info: JsonWrapper<ExtractedInfo>,
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[serde(transparent)]
#[diesel(sql_type = Text)]
pub struct JsonWrapper<T>(pub T);

impl<T> JsonWrapper<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Default> Default for JsonWrapper<T> {
    fn default() -> Self {
        JsonWrapper(T::default())
    }
}

impl<T> Deref for JsonWrapper<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<T> for JsonWrapper<T> {
    fn from(value: T) -> Self {
        JsonWrapper(value)
    }
}

impl<T> FromSql<Text, Pg> for JsonWrapper<T>
where
    T: DeserializeOwned,
{
    fn from_sql(bytes: PgValue<'_>) -> diesel::deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        let value: T = serde_json::from_str(&s)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
        Ok(JsonWrapper(value))
    }
}

impl<T> ToSql<Text, Pg> for JsonWrapper<T>
where
    T: Serialize + fmt::Debug,
{
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> diesel::serialize::Result {
        let s = serde_json::to_string(&self.0)?;
        out.write_all(s.as_bytes())?;
        Ok(IsNull::No)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtractedInfo;

    fn sample() -> ExtractedInfo {
        ExtractedInfo {
            phone: Some("+1 555 0100".to_string()),
            alternate_email: None,
            keywords: vec!["invoice".to_string(), "refund".to_string()],
            urgency_indicators: vec!["asap".to_string()],
            customer_type: Some("enterprise".to_string()),
        }
    }

    #[test]
    fn test_wrapper_deref_reaches_inner_fields() {
        let wrapped = JsonWrapper::from(sample());
        assert_eq!(wrapped.keywords.len(), 2);
        assert_eq!(wrapped.customer_type.as_deref(), Some("enterprise"));
    }

    #[test]
    fn test_wrapper_is_transparent_in_json() {
        let wrapped = JsonWrapper::from(sample());
        let json = serde_json::to_string(&wrapped).unwrap();
        assert!(json.starts_with(r#"{"phone":"+1 555 0100""#));

        let parsed: JsonWrapper<ExtractedInfo> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.into_inner(), sample());
    }

    #[test]
    fn test_wrapper_tolerates_sparse_documents() {
        let parsed: JsonWrapper<ExtractedInfo> = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.0, ExtractedInfo::default());
    }
}
