//! Request body → [`FormData`]
//!
//! `multipart/form-data` parts with a file name become files, every other
//! part is a text field. JSON bodies must be objects; scalars are
//! stringified and `null` reads as an empty field.

use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header,
};
use serde_json::Value;

use crate::api::middleware::ApiError;
use crate::services::form::{FormData, UploadedFile};

impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(false, |v| v.to_ascii_lowercase().starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| ApiError::field("body", e.body_text()))?;
            return read_multipart(multipart).await;
        }

        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::field("body", e.body_text()))?;
        parse_json(&bytes)
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormData, ApiError> {
    let mut form = FormData::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::field("body", e.body_text()))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::field(&name, e.body_text()))?;
                // Browsers submit empty file inputs as nameless, empty parts.
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                form.insert_file(&name, UploadedFile::new(file_name, content_type, bytes.to_vec()));
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::field(&name, e.body_text()))?;
                form.insert_field(&name, text);
            }
        }
    }
    Ok(form)
}

fn parse_json(bytes: &[u8]) -> Result<FormData, ApiError> {
    let mut form = FormData::new();
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(form);
    }
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| ApiError::field("body", format!("The request body is not valid JSON: {}", e)))?;
    let Value::Object(map) = value else {
        return Err(ApiError::field("body", "The request body must be a JSON object."));
    };
    for (name, value) in map {
        let text = match value {
            Value::Null => String::new(),
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        form.insert_field(&name, text);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_json_scalars_become_text() {
        let form = parse_json(br#"{"name":"Kit","price_cents":1999,"remote":true,"excerpt":null}"#).unwrap();
        assert_eq!(form.text("name"), Some("Kit"));
        assert_eq!(form.text("price_cents"), Some("1999"));
        assert_eq!(form.text("remote"), Some("true"));
        assert_eq!(form.text("excerpt"), Some(""));
        assert!(form.has("excerpt"));
    }

    #[test]
    fn test_json_must_be_object() {
        assert!(parse_json(b"[1,2]").is_err());
        assert!(parse_json(b"{oops").is_err());
        assert!(!parse_json(b"  ").unwrap().has("anything"));
    }

    #[tokio::test]
    async fn test_multipart_fields_and_files() {
        let boundary = "XBOUNDARY";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nKit\r\n\
             --{b}\r\nContent-Disposition: form-data; name=\"cover_image\"; filename=\"c.png\"\r\n\
             Content-Type: image/png\r\n\r\nPNGDATA\r\n--{b}--\r\n",
            b = boundary
        );
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();

        let form = FormData::from_request(request, &()).await.unwrap();
        assert_eq!(form.text("name"), Some("Kit"));
        let file = form.file("cover_image").unwrap();
        assert_eq!(file.content_type, "image/png");
        assert_eq!(file.bytes, b"PNGDATA".to_vec());
    }
}
