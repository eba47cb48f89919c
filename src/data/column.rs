//! SeaORM column support for [`SerializableValue`]
//!
//! Lets an entity declare `pub field: SerializableValue` backed by a
//! nullable text column:
//!
//! ```ignore
//! #[sea_orm(column_type = "Text", nullable)]
//! pub settings: SerializableValue,
//! ```

use sea_orm::sea_query::{ArrayType, ColumnType, Nullable, Value, ValueType, ValueTypeErr};
use sea_orm::{ColIdx, QueryResult, TryGetError, TryGetable};

use super::SerializableValue;

impl From<SerializableValue> for Value {
    fn from(value: SerializableValue) -> Self {
        Value::String(value.into_serialized().map(Box::new))
    }
}

impl TryGetable for SerializableValue {
    fn try_get_by<I: ColIdx>(res: &QueryResult, index: I) -> Result<Self, TryGetError> {
        <Option<String> as TryGetable>::try_get_by(res, index).map(SerializableValue::new)
    }
}

impl ValueType for SerializableValue {
    fn try_from(v: Value) -> Result<Self, ValueTypeErr> {
        <Option<String> as ValueType>::try_from(v).map(SerializableValue::new)
    }

    fn type_name() -> String {
        "SerializableValue".to_owned()
    }

    fn array_type() -> ArrayType {
        ArrayType::String
    }

    fn column_type() -> ColumnType {
        ColumnType::Text
    }
}

impl Nullable for SerializableValue {
    fn null() -> Value {
        Value::String(None)
    }
}
