//! Request body extraction for product writes.
//!
//! Accepts `multipart/form-data` (text fields plus an `image` file part),
//! `application/x-www-form-urlencoded` and `application/json`. Everything
//! else is answered with 415.

use crate::service::error::ServiceError;
use crate::service::validation::{ImageField, ProductInput, UploadedFile};
use axum::{
    Form, Json,
    extract::{FromRequest, Multipart, Request, multipart::MultipartError},
    http::{StatusCode, header::CONTENT_TYPE},
};
use serde_json::{Map, Value};

pub(crate) struct ProductForm(pub(crate) ProductInput);

fn content_type_of(request: &Request) -> Option<String> {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_ascii_lowercase())
}

fn multipart_error(error: MultipartError) -> ServiceError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(error.body_text())
    } else {
        ServiceError::bad_request(format!("invalid multipart payload: {}", error.body_text()))
    }
}

fn body_rejection(status: StatusCode, body_text: String) -> ServiceError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ServiceError::PayloadTooLarge(body_text)
    } else {
        ServiceError::bad_request(body_text)
    }
}

fn assign_text(input: &mut ProductInput, name: &str, value: String) {
    match name {
        "name" => input.name = Some(Value::String(value)),
        "description" => input.description = Some(Value::String(value)),
        "price" => input.price = Some(Value::String(value)),
        "image" if value.trim().is_empty() => input.image = ImageField::Missing,
        "image" => input.image = ImageField::NotAFile,
        _ => {}
    }
}

async fn parse_multipart(mut multipart: Multipart) -> Result<ProductInput, ServiceError> {
    let mut input = ProductInput::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        // A part is a file only when it carries a filename; text parts may
        // still be labelled `text/plain`.
        if field.file_name().is_none() {
            let value = field.text().await.map_err(multipart_error)?;
            assign_text(&mut input, &name, value);
            continue;
        }

        if name != "image" {
            continue;
        }

        let original_filename = field.file_name().map(str::to_owned);
        let content_type = field.content_type().map(str::to_owned);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        // Browsers send an empty, unnamed part when no file was chosen.
        let nothing_chosen =
            bytes.is_empty() && original_filename.as_deref().is_none_or(str::is_empty);
        input.image = if nothing_chosen {
            ImageField::Missing
        } else {
            ImageField::File(UploadedFile {
                original_filename,
                content_type,
                bytes: bytes.to_vec(),
            })
        };
    }

    Ok(input)
}

fn from_json_object(mut object: Map<String, Value>) -> ProductInput {
    let image = match object.remove("image") {
        None | Some(Value::Null) => ImageField::Missing,
        Some(_) => ImageField::NotAFile,
    };

    ProductInput {
        name: object.remove("name"),
        description: object.remove("description"),
        price: object.remove("price"),
        image,
    }
}

impl<S> FromRequest<S> for ProductForm
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = content_type_of(&request).unwrap_or_default();

        if content_type.starts_with("multipart/form-data") {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|rejection| ServiceError::bad_request(rejection.body_text()))?;
            return parse_multipart(multipart).await.map(ProductForm);
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, state)
                .await
                .map_err(|rejection| body_rejection(rejection.status(), rejection.body_text()))?;

            let mut input = ProductInput::default();
            for (name, value) in pairs {
                assign_text(&mut input, &name, value);
            }
            return Ok(ProductForm(input));
        }

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<Value>::from_request(request, state)
                .await
                .map_err(|rejection| body_rejection(rejection.status(), rejection.body_text()))?;

            return match value {
                Value::Object(object) => Ok(ProductForm(from_json_object(object))),
                _ => Err(ServiceError::bad_request("request body must be a JSON object")),
            };
        }

        let shown = if content_type.is_empty() {
            "none".to_string()
        } else {
            content_type
        };
        Err(ServiceError::UnsupportedMediaType(format!(
            "unsupported content type `{shown}`, expected multipart/form-data, application/x-www-form-urlencoded or application/json"
        )))
    }
}
