use crate::{
    codec::{encode_scalar, encode_uint, split_value},
    config::SaveConfig,
    db::store::{Precondition, PutAttribute},
    error::InternalError,
    model::EnumMode,
    value::Value,
};

///
/// WritePlan
///
/// Attribute operations computed for one entity, in field order.
///

#[derive(Debug, Default)]
pub(super) struct WritePlan {
    pub(super) puts: Vec<PutAttribute>,
    pub(super) deletes: Vec<String>,
    pub(super) precondition: Option<Precondition>,
    pub(super) next_version: Option<u64>,
}

impl WritePlan {
    pub(super) fn delete(&mut self, column: &str) {
        if !self.deletes.iter().any(|d| d == column) {
            self.deletes.push(column.to_string());
        }
    }

    pub(super) fn put(&mut self, column: &str, value: impl Into<String>) {
        self.puts.push(PutAttribute::replacing(column, value));
    }

    /// Scalar or plain collection value.
    pub(super) fn put_value(
        &mut self,
        column: &str,
        value: &Value,
        config: &SaveConfig,
    ) -> Result<(), InternalError> {
        match value {
            Value::Null => self.delete(column),
            Value::List(elements) if elements.is_empty() => self.delete(column),
            Value::List(elements) => {
                for element in elements {
                    self.put(column, encode_scalar(element)?);
                }
            }
            scalar => {
                let encoded = encode_scalar(scalar)?;
                let chunks = split_value(&encoded, config.max_value_bytes, config.chunk_bytes);

                // only the first chunk clears prior values
                for (i, chunk) in chunks.into_iter().enumerate() {
                    self.puts.push(PutAttribute {
                        name: column.to_string(),
                        value: chunk,
                        replace: i == 0,
                    });
                }
            }
        }

        Ok(())
    }

    /// Increment the version and guard the write on the current value.
    /// A null version is the initial state.
    pub(super) fn put_version(&mut self, column: &str, current: &Value) -> Result<(), InternalError> {
        let current = if current.is_null() {
            0
        } else {
            current.as_u64().ok_or_else(|| {
                InternalError::encoding(format!(
                    "version field '{column}' holds a non-integral value: {current:?}"
                ))
            })?
        };
        let next = current.checked_add(1).ok_or_else(|| {
            InternalError::encoding(format!("version field '{column}' overflowed"))
        })?;

        self.put(column, encode_uint(next));
        self.precondition = Some(if current > 0 {
            Precondition::Equals {
                name: column.to_string(),
                value: encode_uint(current),
            }
        } else {
            Precondition::NotExists {
                name: column.to_string(),
            }
        });
        self.next_version = Some(next);

        Ok(())
    }

    pub(super) fn put_enum(
        &mut self,
        column: &str,
        mode: EnumMode,
        variants: &[&str],
        value: &Value,
    ) -> Result<(), InternalError> {
        if value.is_null() {
            self.delete(column);
            return Ok(());
        }

        let name = value.as_text().ok_or_else(|| {
            InternalError::encoding(format!("enum field '{column}' holds a non-enum value"))
        })?;
        let ordinal = variants.iter().position(|v| *v == name).ok_or_else(|| {
            InternalError::encoding(format!(
                "enum field '{column}': no declared variant matches '{name}'"
            ))
        })?;

        match mode {
            EnumMode::String => self.put(column, name),
            EnumMode::Ordinal => self.put(column, ordinal.to_string()),
        }

        Ok(())
    }
}

///
/// TESTS
///
