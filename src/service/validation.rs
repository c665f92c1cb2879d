//! Request validation for product payloads.
//!
//! Every field is checked and all failures are collected. Within one field
//! the rules run in order and stop at the first failure. Strings are trimmed
//! and an empty string counts as missing.

use common_http_server::FieldErrors;
use serde_json::Value;
use std::fmt;

pub(crate) const NAME_MAX_CHARS: usize = 255;
pub(crate) const DESCRIPTION_MAX_CHARS: usize = 1000;
pub(crate) const PRICE_MIN: f64 = 0.0;
pub(crate) const IMAGE_MAX_KILOBYTES: usize = 2048;
const ALLOWED_IMAGE_TYPES: &str = "jpeg, png, jpg";

#[derive(Debug, Clone)]
pub(crate) struct UploadedFile {
    pub(crate) original_filename: Option<String>,
    pub(crate) content_type: Option<String>,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub(crate) enum ImageField {
    #[default]
    Missing,
    /// `image` was sent as a plain value instead of a file part.
    NotAFile,
    File(UploadedFile),
}

/// Raw product fields as received, before any rule ran.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProductInput {
    pub(crate) name: Option<Value>,
    pub(crate) description: Option<Value>,
    pub(crate) price: Option<Value>,
    pub(crate) image: ImageField,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageRule {
    Required,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// Identify the format from the file signature.
    pub(crate) fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            [b'B', b'M', ..] => Some(Self::Bmp),
            _ => None,
        }
    }

    fn is_allowed(self) -> bool {
        matches!(self, Self::Jpeg | Self::Png)
    }

    pub(crate) fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ValidImage {
    pub(crate) format: ImageFormat,
    pub(crate) original_filename: Option<String>,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidProduct {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) price: f64,
    pub(crate) image: Option<ValidImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ValidationErrors(FieldErrors);

impl ValidationErrors {
    pub(crate) fn add(&mut self, field: &str, message: String) {
        self.0.entry(field.to_string()).or_default().push(message);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub(crate) fn into_inner(self) -> FieldErrors {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

fn required_message(field: &str) -> String {
    format!("The {field} field is required.")
}

fn required_string(field: &str, value: Option<&Value>, max_chars: usize) -> Result<String, String> {
    match value {
        None | Some(Value::Null) => Err(required_message(field)),
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                Err(required_message(field))
            } else if trimmed.chars().count() > max_chars {
                Err(format!(
                    "The {field} field must not be greater than {max_chars} characters."
                ))
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(_) => Err(format!("The {field} field must be a string.")),
    }
}

fn required_number(field: &str, value: Option<&Value>, min: f64) -> Result<f64, String> {
    let not_a_number = || format!("The {field} field must be a number.");

    let number = match value {
        None | Some(Value::Null) => return Err(required_message(field)),
        Some(Value::String(raw)) if raw.trim().is_empty() => return Err(required_message(field)),
        Some(Value::String(raw)) => raw.trim().parse::<f64>().map_err(|_| not_a_number())?,
        Some(Value::Number(number)) => number.as_f64().ok_or_else(not_a_number)?,
        Some(_) => return Err(not_a_number()),
    };

    if !number.is_finite() {
        return Err(not_a_number());
    }
    if number < min {
        return Err(format!("The {field} field must be at least {min}."));
    }
    Ok(number)
}

fn image_file(field: &str, image: ImageField, rule: ImageRule) -> Result<Option<ValidImage>, String> {
    let file = match (image, rule) {
        (ImageField::File(file), _) => file,
        (ImageField::Missing, ImageRule::Required) => return Err(required_message(field)),
        (ImageField::NotAFile, ImageRule::Required) => {
            return Err(format!("The {field} field must be a file."));
        }
        // Updates keep the current image unless a real file arrives.
        (ImageField::Missing | ImageField::NotAFile, ImageRule::Optional) => return Ok(None),
    };

    let Some(format) = ImageFormat::sniff(&file.bytes) else {
        return Err(format!("The {field} field must be an image."));
    };
    if !format.is_allowed() {
        return Err(format!(
            "The {field} field must be a file of type: {ALLOWED_IMAGE_TYPES}."
        ));
    }
    if file.bytes.len() > IMAGE_MAX_KILOBYTES * 1024 {
        return Err(format!(
            "The {field} field must not be greater than {IMAGE_MAX_KILOBYTES} kilobytes."
        ));
    }

    tracing::debug!(
        declared = ?file.content_type,
        detected = ?format,
        size = file.bytes.len(),
        "image upload accepted"
    );

    Ok(Some(ValidImage {
        format,
        original_filename: file.original_filename,
        bytes: file.bytes,
    }))
}

pub(crate) fn validate_product(
    input: ProductInput,
    image_rule: ImageRule,
) -> Result<ValidProduct, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let name = required_string("name", input.name.as_ref(), NAME_MAX_CHARS)
        .map_err(|message| errors.add("name", message))
        .ok();
    let description = required_string(
        "description",
        input.description.as_ref(),
        DESCRIPTION_MAX_CHARS,
    )
    .map_err(|message| errors.add("description", message))
    .ok();
    let price = required_number("price", input.price.as_ref(), PRICE_MIN)
        .map_err(|message| errors.add("price", message))
        .ok();
    let image = image_file("image", input.image, image_rule)
        .map_err(|message| errors.add("image", message))
        .ok();

    match (name, description, price, image) {
        (Some(name), Some(description), Some(price), Some(image)) if errors.is_empty() => {
            Ok(ValidProduct {
                name,
                description,
                price,
                image,
            })
        }
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{GIF_BYTES, JPEG_BYTES, PNG_BYTES};
    use serde_json::json;

    fn file(bytes: &[u8], name: &str) -> ImageField {
        ImageField::File(UploadedFile {
            original_filename: Some(name.to_string()),
            content_type: None,
            bytes: bytes.to_vec(),
        })
    }

    fn valid_input() -> ProductInput {
        ProductInput {
            name: Some(json!("  Walnut desk ")),
            description: Some(json!("Solid walnut")),
            price: Some(json!("149.90")),
            image: file(PNG_BYTES, "desk.png"),
        }
    }

    fn errors_for(input: ProductInput, rule: ImageRule) -> ValidationErrors {
        validate_product(input, rule).expect_err("input should be rejected")
    }

    #[test]
    fn accepts_complete_input_and_trims_strings() {
        let valid = validate_product(valid_input(), ImageRule::Required).unwrap();

        assert_eq!(valid.name, "Walnut desk");
        assert_eq!(valid.description, "Solid walnut");
        assert_eq!(valid.price, 149.9);
        let image = valid.image.unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!(image.original_filename.as_deref(), Some("desk.png"));
    }

    #[test]
    fn json_numbers_are_accepted_as_price() {
        let input = ProductInput {
            price: Some(json!(0)),
            ..valid_input()
        };
        assert_eq!(
            validate_product(input, ImageRule::Required).unwrap().price,
            0.0
        );
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let errors = errors_for(ProductInput::default(), ImageRule::Required);

        assert_eq!(errors.get("name").unwrap(), ["The name field is required."]);
        assert_eq!(
            errors.get("description").unwrap(),
            ["The description field is required."]
        );
        assert_eq!(errors.get("price").unwrap(), ["The price field is required."]);
        assert_eq!(errors.get("image").unwrap(), ["The image field is required."]);
    }

    #[test]
    fn blank_name_counts_as_missing() {
        let input = ProductInput {
            name: Some(json!("   ")),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);

        assert_eq!(errors.get("name").unwrap(), ["The name field is required."]);
        assert!(errors.get("price").is_none());
    }

    #[test]
    fn overlong_strings_are_rejected() {
        let input = ProductInput {
            name: Some(json!("n".repeat(NAME_MAX_CHARS + 1))),
            description: Some(json!("d".repeat(DESCRIPTION_MAX_CHARS + 1))),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);

        assert_eq!(
            errors.get("name").unwrap(),
            ["The name field must not be greater than 255 characters."]
        );
        assert_eq!(
            errors.get("description").unwrap(),
            ["The description field must not be greater than 1000 characters."]
        );
    }

    #[test]
    fn length_limit_counts_characters_not_bytes() {
        let input = ProductInput {
            name: Some(json!("é".repeat(NAME_MAX_CHARS))),
            ..valid_input()
        };
        assert!(validate_product(input, ImageRule::Required).is_ok());
    }

    #[test]
    fn non_string_name_is_rejected() {
        let input = ProductInput {
            name: Some(json!(42)),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);
        assert_eq!(
            errors.get("name").unwrap(),
            ["The name field must be a string."]
        );
    }

    #[test]
    fn negative_price_is_rejected() {
        let input = ProductInput {
            price: Some(json!("-1")),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);
        assert_eq!(
            errors.get("price").unwrap(),
            ["The price field must be at least 0."]
        );
    }

    #[test]
    fn non_numeric_price_is_rejected() {
        for price in [json!("ten"), json!("NaN"), json!("inf"), json!(true)] {
            let input = ProductInput {
                price: Some(price),
                ..valid_input()
            };
            let errors = errors_for(input, ImageRule::Required);
            assert_eq!(
                errors.get("price").unwrap(),
                ["The price field must be a number."]
            );
        }
    }

    #[test]
    fn non_image_upload_is_rejected() {
        let input = ProductInput {
            image: file(b"just some text", "notes.png"),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);
        assert_eq!(
            errors.get("image").unwrap(),
            ["The image field must be an image."]
        );
    }

    #[test]
    fn image_of_disallowed_type_is_rejected() {
        let input = ProductInput {
            image: file(GIF_BYTES, "anim.gif"),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);
        assert_eq!(
            errors.get("image").unwrap(),
            ["The image field must be a file of type: jpeg, png, jpg."]
        );
    }

    #[test]
    fn oversized_image_is_rejected() {
        let mut bytes = JPEG_BYTES.to_vec();
        bytes.resize(IMAGE_MAX_KILOBYTES * 1024 + 1, 0);
        let input = ProductInput {
            image: file(&bytes, "huge.jpg"),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);
        assert_eq!(
            errors.get("image").unwrap(),
            ["The image field must not be greater than 2048 kilobytes."]
        );
    }

    #[test]
    fn image_at_exact_limit_is_accepted() {
        let mut bytes = JPEG_BYTES.to_vec();
        bytes.resize(IMAGE_MAX_KILOBYTES * 1024, 0);
        let input = ProductInput {
            image: file(&bytes, "limit.jpg"),
            ..valid_input()
        };
        let valid = validate_product(input, ImageRule::Required).unwrap();
        assert_eq!(valid.image.unwrap().format, ImageFormat::Jpeg);
    }

    #[test]
    fn text_value_for_required_image_is_not_a_file() {
        let input = ProductInput {
            image: ImageField::NotAFile,
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Required);
        assert_eq!(
            errors.get("image").unwrap(),
            ["The image field must be a file."]
        );
    }

    #[test]
    fn optional_image_may_be_absent() {
        for image in [ImageField::Missing, ImageField::NotAFile] {
            let input = ProductInput {
                image,
                ..valid_input()
            };
            let valid = validate_product(input, ImageRule::Optional).unwrap();
            assert!(valid.image.is_none());
        }
    }

    #[test]
    fn optional_image_is_still_checked_when_sent() {
        let input = ProductInput {
            image: file(GIF_BYTES, "anim.gif"),
            ..valid_input()
        };
        let errors = errors_for(input, ImageRule::Optional);
        assert!(errors.get("image").is_some());
    }

    #[test]
    fn sniffing_recognises_common_signatures() {
        assert_eq!(ImageFormat::sniff(JPEG_BYTES), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(PNG_BYTES), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(GIF_BYTES), Some(ImageFormat::Gif));
        assert_eq!(
            ImageFormat::sniff(b"RIFF\x10\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
        assert_eq!(ImageFormat::sniff(b"BM\x00\x00"), Some(ImageFormat::Bmp));
        assert_eq!(ImageFormat::sniff(b""), None);
    }
}
