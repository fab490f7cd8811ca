use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::protocol::{InvocationError, OperationDescriptor};

/// JSON codec for operation arguments and results
///
/// Channels exchange `serde_json::Value`s. The codec is the only place typed
/// values cross that boundary, so encode and decode failures are always
/// reported against the operation that produced them.
///
/// # Example
///
/// ```
/// use proxyrpc_common::{JsonCodec, OperationDescriptor};
/// use serde_json::json;
///
/// let op = OperationDescriptor::new("get_value").param::<i32>().returns::<String>();
///
/// let arg = JsonCodec::encode_argument(&op, 0, &42).unwrap();
/// assert_eq!(arg, json!(42));
///
/// let result: String = JsonCodec::decode_result(&op, json!("ok")).unwrap();
/// assert_eq!(result, "ok");
/// ```
pub struct JsonCodec;

impl JsonCodec {
    /// Encode one argument
    ///
    /// # Arguments
    ///
    /// * `operation` - The operation the argument belongs to
    /// * `index` - Position of the argument in the parameter list
    /// * `value` - The argument to encode
    pub fn encode_argument<T: Serialize + ?Sized>(
        operation: &OperationDescriptor,
        index: usize,
        value: &T,
    ) -> Result<Value, InvocationError> {
        serde_json::to_value(value).map_err(|source| InvocationError::Encode {
            operation: operation.name().to_string(),
            index,
            source,
        })
    }

    /// Decode the result of an operation
    ///
    /// Void operations return `Value::Null`, which decodes into `()`.
    pub fn decode_result<T: DeserializeOwned>(
        operation: &OperationDescriptor,
        value: Value,
    ) -> Result<T, InvocationError> {
        serde_json::from_value(value).map_err(|source| InvocationError::Decode {
            operation: operation.name().to_string(),
            source,
        })
    }
}
