//! Incoming signing requests
//!
//! Browsers send `name` and `type` either as `multipart/form-data` (a
//! `FormData` object), as `application/x-www-form-urlencoded`, or as a JSON
//! object. All three end up as the same [`UploadRequest`].

use super::UploadError;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use std::collections::HashMap;

/// Validated request: both fields present and non-empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
}

/// Body encodings the signing endpoint understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Multipart { boundary: String },
    UrlEncoded,
}

impl BodyFormat {
    /// Pick a decoder from the request's `Content-Type`
    ///
    /// A missing or unknown content type is treated as url-encoded form data.
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, UploadError> {
        let Some(content_type) = content_type else {
            return Ok(BodyFormat::UrlEncoded);
        };

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            "application/json" => Ok(BodyFormat::Json),
            "multipart/form-data" => {
                let boundary = multer::parse_boundary(content_type).map_err(|e| {
                    UploadError::Validation(format!("Invalid multipart body: {}", e))
                })?;
                Ok(BodyFormat::Multipart { boundary })
            }
            _ => Ok(BodyFormat::UrlEncoded),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct JsonBody {
    name: Option<String>,
    #[serde(rename = "type")]
    mime_type: Option<String>,
}

impl UploadRequest {
    /// Validate raw field values
    ///
    /// Missing and empty values are both rejected; the error lists every
    /// offending field.
    pub fn new(file_name: Option<String>, mime_type: Option<String>) -> Result<Self, UploadError> {
        let file_name = file_name.filter(|s| !s.is_empty());
        let mime_type = mime_type.filter(|s| !s.is_empty());

        match (file_name, mime_type) {
            (Some(file_name), Some(mime_type)) => Ok(Self {
                file_name,
                mime_type,
            }),
            (file_name, mime_type) => {
                let missing: Vec<&str> = [("name", file_name.is_none()), ("type", mime_type.is_none())]
                    .into_iter()
                    .filter_map(|(field, missing)| missing.then_some(field))
                    .collect();
                Err(UploadError::Validation(format!(
                    "Missing required field(s): {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Decode a body in the given format
    pub async fn from_body(format: &BodyFormat, body: Bytes) -> Result<Self, UploadError> {
        match format {
            BodyFormat::Json => Self::from_json(&body),
            BodyFormat::UrlEncoded => Self::from_form(&body),
            BodyFormat::Multipart { boundary } => Self::from_multipart(body, boundary).await,
        }
    }

    /// Parse `name=...&type=...`
    ///
    /// `+` decodes to a space; for repeated fields the last value wins.
    pub fn from_form(body: &[u8]) -> Result<Self, UploadError> {
        let body = String::from_utf8_lossy(body);
        let mut fields = HashMap::new();

        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let mut kv = pair.splitn(2, '=');
            if let Some(key) = kv.next() {
                let value = kv.next().unwrap_or("");
                fields.insert(decode_form_component(key), decode_form_component(value));
            }
        }

        Self::new(fields.remove("name"), fields.remove("type"))
    }

    /// Parse `{"name": "...", "type": "..."}`
    pub fn from_json(body: &[u8]) -> Result<Self, UploadError> {
        let parsed: JsonBody = serde_json::from_slice(body).map_err(|e| {
            UploadError::Validation(format!("Request body is not a valid JSON object: {}", e))
        })?;
        Self::new(parsed.name, parsed.mime_type)
    }

    /// Parse the text fields of a `multipart/form-data` body
    pub async fn from_multipart(body: Bytes, boundary: &str) -> Result<Self, UploadError> {
        let stream = futures::stream::once(async move { Ok::<_, std::convert::Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);

        let mut file_name = None;
        let mut mime_type = None;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Validation(format!("Invalid multipart body: {}", e)))?
        {
            let target = match field.name() {
                Some("name") => &mut file_name,
                Some("type") => &mut mime_type,
                _ => continue,
            };
            let value = field
                .text()
                .await
                .map_err(|e| UploadError::Validation(format!("Invalid multipart body: {}", e)))?;
            *target = Some(value);
        }

        Self::new(file_name, mime_type)
    }
}

fn decode_form_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_form() {
        let req = UploadRequest::from_form(b"name=my+photo%281%29.png&type=image%2Fpng").unwrap();
        assert_eq!(req.file_name, "my photo(1).png");
        assert_eq!(req.mime_type, "image/png");
    }

    #[test]
    fn test_from_form_missing_both() {
        let err = UploadRequest::from_form(b"").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field(s): name, type");
    }

    #[test]
    fn test_from_form_empty_value_is_missing() {
        let err = UploadRequest::from_form(b"name=a.png&type=").unwrap_err();
        assert_eq!(err.to_string(), "Missing required field(s): type");
    }

    #[test]
    fn test_from_json() {
        let req = UploadRequest::from_json(br#"{"name": "a.png", "type": "image/png"}"#).unwrap();
        assert_eq!(req.file_name, "a.png");
        assert_eq!(req.mime_type, "image/png");
    }

    #[test]
    fn test_from_json_empty_object() {
        let err = UploadRequest::from_json(b"{}").unwrap_err();
        assert!(matches!(err, UploadError::Validation(_)));
        assert!(err.to_string().contains("name, type"));
    }

    #[test]
    fn test_from_json_garbage() {
        assert!(matches!(
            UploadRequest::from_json(b"not json"),
            Err(UploadError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_from_multipart() {
        let body = "--XyZ\r\n\
Content-Disposition: form-data; name=\"type\"\r\n\r\n\
image/png\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"name\"\r\n\r\n\
a.png\r\n\
--XyZ--\r\n";
        let req = UploadRequest::from_multipart(Bytes::from(body), "XyZ")
            .await
            .unwrap();
        assert_eq!(req.file_name, "a.png");
        assert_eq!(req.mime_type, "image/png");
    }

    #[test]
    fn test_body_format_detection() {
        assert_eq!(
            BodyFormat::from_content_type(Some("application/json; charset=utf-8")).unwrap(),
            BodyFormat::Json
        );
        assert_eq!(
            BodyFormat::from_content_type(Some("multipart/form-data; boundary=abc")).unwrap(),
            BodyFormat::Multipart {
                boundary: "abc".into()
            }
        );
        assert_eq!(
            BodyFormat::from_content_type(None).unwrap(),
            BodyFormat::UrlEncoded
        );
        assert!(BodyFormat::from_content_type(Some("multipart/form-data")).is_err());
    }
}
