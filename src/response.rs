use serde::Serialize;

/// The uniform result wrapper every operation resolves to.
///
/// Serializes as `{"data": ...}` on success and
/// `{"message": "...", "statusCode": 404}` on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response<T> {
    Success {
        data: T,
    },
    Error {
        message: String,
        #[serde(rename = "statusCode", skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
    },
}

impl<T> Response<T> {
    pub fn success(data: T) -> Self {
        Response::Success { data }
    }

    pub fn error(message: impl Into<String>, status_code: Option<u16>) -> Self {
        Response::Error {
            message: message.into(),
            status_code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }

    /// Returns the payload, or `None` for the error variant.
    pub fn data(self) -> Option<T> {
        match self {
            Response::Success { data } => Some(data),
            Response::Error { .. } => None,
        }
    }
}

impl<T> From<crate::Result<T>> for Response<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(data) => Response::success(data),
            Err(e) => Response::error(e.to_string(), Some(e.status_code())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use serde_json::json;

    #[test]
    fn test_success_envelope_shape() {
        let resp: Response<Vec<i32>> = Ok(vec![1, 2]).into();
        assert!(resp.is_success());
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"data": [1, 2]}));
    }

    #[test]
    fn test_error_envelope_shape() {
        let resp: Response<()> = Err(Error::NotFound("no document matches".to_string())).into();
        assert!(!resp.is_success());
        assert_eq!(
            serde_json::to_value(&resp).unwrap(),
            json!({"message": "not found: no document matches", "statusCode": 404})
        );
        assert_eq!(resp.data(), None);
    }

    #[test]
    fn test_error_without_status_code() {
        let resp: Response<()> = Response::error("boom", None);
        assert_eq!(serde_json::to_value(&resp).unwrap(), json!({"message": "boom"}));
    }
}
