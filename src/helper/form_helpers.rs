//! Form schemas for every page that accepts input.
//!
//! Each form is a plain struct validated with `validator`; the submission
//! structs wrap a form together with its CSRF token for the `Csrf` extractor.

use crate::error::BlogError;
use crate::models::{Post, PostDraft, User};
use actix_csrf::extractor::{CsrfGuarded, CsrfToken};
use actix_multipart::Multipart;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use futures_util::StreamExt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use validator::{Validate, ValidateEmail, ValidationError, ValidationErrors};

/// Field name to the messages shown next to that field.
pub type FormErrors = BTreeMap<String, Vec<String>>;

/// Result of binding a submitted form: either it was stored, or it comes
/// back to the page with errors.
#[derive(Debug)]
pub enum Submission<T> {
    Saved(T),
    Rejected(FormErrors),
}

const REQUIRED: &str = "This field is required.";
const MAX_TEXT_FIELD_BYTES: usize = 1024 * 1024;

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").unwrap());

pub fn collect_errors(errors: &ValidationErrors) -> FormErrors {
    errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid value ({}).", e.code),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

pub fn add_error(errors: &mut FormErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(error("required", REQUIRED));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(error("required", REQUIRED));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(error(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

fn validate_optional_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() || email.validate_email() {
        Ok(())
    } else {
        Err(error("email", "Enter a valid email address."))
    }
}

fn validate_pub_date(raw: &str) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        return Err(error("required", REQUIRED));
    }
    match parse_pub_date(raw) {
        Some(_) => Ok(()),
        None => Err(error("pub_date", "Enter a valid date.")),
    }
}

/// Publication dates come from a `datetime-local` picker. A bare date means
/// midnight UTC.
pub fn parse_pub_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|dt| dt.and_utc())
}

/// Value for the `datetime-local` picker. Seconds are kept when set so that
/// re-saving a post does not move its publication time.
pub fn pub_date_input_value(pub_date: DateTime<Utc>) -> String {
    if pub_date.second() == 0 {
        pub_date.format("%Y-%m-%dT%H:%M").to_string()
    } else {
        pub_date.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

// --- Comment ---

#[derive(Debug, Default, Clone, Serialize, Validate)]
pub struct CommentForm {
    #[validate(custom(function = "validate_required"))]
    pub text: String,
}

#[derive(Deserialize)]
pub struct CommentSubmission {
    pub csrf_token: CsrfToken,
    #[serde(default)]
    pub text: String,
}

impl CsrfGuarded for CommentSubmission {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

impl CommentSubmission {
    pub fn into_form(self) -> (String, CommentForm) {
        (self.csrf_token.get().to_string(), CommentForm { text: self.text })
    }
}

/// Body of the confirmation forms behind delete buttons.
#[derive(Deserialize)]
pub struct ConfirmSubmission {
    pub csrf_token: CsrfToken,
}

impl CsrfGuarded for ConfirmSubmission {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

// --- Profile ---

#[derive(Debug, Default, Clone, Serialize, Validate)]
pub struct UserForm {
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub first_name: String,
    #[validate(length(max = 150, message = "Ensure this value has at most 150 characters."))]
    pub last_name: String,
    #[validate(
        custom(function = "validate_username"),
        length(max = 150, message = "Ensure this value has at most 150 characters.")
    )]
    pub username: String,
    #[validate(custom(function = "validate_optional_email"))]
    pub email: String,
}

impl From<&User> for UserForm {
    fn from(user: &User) -> Self {
        UserForm {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct UserSubmission {
    pub csrf_token: CsrfToken,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

impl CsrfGuarded for UserSubmission {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

impl UserSubmission {
    pub fn into_form(self) -> (String, UserForm) {
        let form = UserForm {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
        };
        (self.csrf_token.get().to_string(), form)
    }
}

// --- Registration and login ---

#[derive(Debug, Default, Clone, Serialize, Validate)]
pub struct RegistrationForm {
    #[validate(
        custom(function = "validate_username"),
        length(max = 150, message = "Ensure this value has at most 150 characters.")
    )]
    pub username: String,
    #[validate(custom(function = "validate_optional_email"))]
    pub email: String,
    #[serde(skip_serializing)]
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password1: String,
    #[serde(skip_serializing)]
    #[validate(must_match(other = "password1", message = "The two password fields didn't match."))]
    pub password2: String,
}

#[derive(Deserialize)]
pub struct RegistrationSubmission {
    pub csrf_token: CsrfToken,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl CsrfGuarded for RegistrationSubmission {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

impl RegistrationSubmission {
    pub fn into_form(self) -> (String, RegistrationForm) {
        let form = RegistrationForm {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password1: self.password1,
            password2: self.password2,
        };
        (self.csrf_token.get().to_string(), form)
    }
}

#[derive(Debug, Default, Clone, Serialize, Validate)]
pub struct LoginForm {
    #[validate(custom(function = "validate_required"))]
    pub username: String,
    #[serde(skip_serializing)]
    #[validate(custom(function = "validate_required"))]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginSubmission {
    pub csrf_token: CsrfToken,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

impl CsrfGuarded for LoginSubmission {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

impl LoginSubmission {
    pub fn into_form(self) -> (String, LoginForm, Option<String>) {
        let form = LoginForm { username: self.username.trim().to_string(), password: self.password };
        (self.csrf_token.get().to_string(), form, self.next)
    }
}

// --- Post ---

/// An uploaded image held in memory until the rest of the form validates.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub extension: &'static str,
}

#[derive(Debug, Default, Clone, Serialize, Validate)]
pub struct PostForm {
    #[validate(
        custom(function = "validate_required"),
        length(max = 256, message = "Ensure this value has at most 256 characters.")
    )]
    pub title: String,
    #[validate(custom(function = "validate_required"))]
    pub text: String,
    pub category: Option<i64>,
    pub location: Option<i64>,
    pub is_published: bool,
    #[validate(custom(function = "validate_pub_date"))]
    pub pub_date: String,
    /// Media path of the image currently attached to the post.
    pub image: Option<String>,
    #[serde(skip)]
    pub upload: Option<ImageUpload>,
    #[serde(skip)]
    pub clear_image: bool,
}

impl PostForm {
    /// Blank form for a new post: published, dated now.
    pub fn new_post(now: DateTime<Utc>) -> Self {
        PostForm {
            is_published: true,
            pub_date: pub_date_input_value(now.with_second(0).unwrap_or(now)),
            ..PostForm::default()
        }
    }

    /// Field values for the stored post. `image` is the media path to keep
    /// after upload handling. Returns `None` if the date does not parse,
    /// which validation rules out.
    pub fn to_draft(&self, image: Option<String>) -> Option<PostDraft> {
        Some(PostDraft {
            title: self.title.trim().to_string(),
            text: self.text.clone(),
            image,
            pub_date: parse_pub_date(&self.pub_date)?,
            is_published: self.is_published,
            category_id: self.category,
            location_id: self.location,
        })
    }
}

impl From<&Post> for PostForm {
    fn from(post: &Post) -> Self {
        PostForm {
            title: post.title.clone(),
            text: post.text.clone(),
            category: post.category.as_ref().map(|c| c.id),
            location: post.location.as_ref().map(|l| l.id),
            is_published: post.is_published,
            pub_date: pub_date_input_value(post.pub_date),
            image: post.image.clone(),
            upload: None,
            clear_image: false,
        }
    }
}

/// A post form read from a multipart body, plus the problems found while
/// reading it (bad choice ids, oversized or non-image uploads).
pub struct PostSubmission {
    pub csrf_token: String,
    pub form: PostForm,
    pub errors: FormErrors,
}

fn image_extension(mime_type: &str) -> Option<&'static str> {
    let map: HashMap<&str, &str> = [
        ("image/gif", "gif"),
        ("image/jpeg", "jpg"),
        ("image/png", "png"),
        ("image/webp", "webp"),
    ]
    .into_iter()
    .collect();

    map.get(mime_type).copied()
}

fn parse_choice(value: &str, field: &str, errors: &mut FormErrors) -> Option<i64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match value.parse::<i64>() {
        Ok(id) => Some(id),
        Err(_) => {
            add_error(errors, field, "Select a valid choice. That choice is not one of the available choices.");
            None
        }
    }
}

fn multipart_error(e: actix_multipart::MultipartError) -> BlogError {
    BlogError::BadRequest(format!("Malformed form data: {}", e))
}

/// Reads the post form fields from a multipart request body. The image is
/// kept in memory; `max_image_bytes` bounds its size.
pub async fn read_post_submission(
    mut payload: Multipart,
    max_image_bytes: usize,
) -> Result<PostSubmission, BlogError> {
    let mut form = PostForm::default();
    let mut errors = FormErrors::new();
    let mut csrf_token = String::new();

    while let Some(item) = payload.next().await {
        let mut field = item.map_err(multipart_error)?;
        let field_name = field.content_disposition().get_name().unwrap_or_default().to_string();

        if field_name == "image" {
            let filename = field.content_disposition().get_filename().unwrap_or_default().to_string();
            let content_type = field.content_type().map(|m| m.essence_str().to_string());
            let mut data: Vec<u8> = Vec::new();
            let mut too_large = false;
            while let Some(chunk) = field.next().await {
                let chunk = chunk.map_err(multipart_error)?;
                if too_large || data.len() + chunk.len() > max_image_bytes {
                    too_large = true;
                    continue;
                }
                data.extend_from_slice(&chunk);
            }

            // Browsers send an empty part when no file was chosen.
            if filename.is_empty() && data.is_empty() {
                continue;
            }
            if too_large {
                add_error(
                    &mut errors,
                    "image",
                    format!("The image must not exceed {} MB.", max_image_bytes / (1024 * 1024)),
                );
                continue;
            }
            match content_type.as_deref().and_then(image_extension) {
                Some(extension) if !data.is_empty() => form.upload = Some(ImageUpload { bytes: data, extension }),
                _ => add_error(
                    &mut errors,
                    "image",
                    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
                ),
            }
            continue;
        }

        let mut data: Vec<u8> = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(multipart_error)?;
            if data.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
                return Err(BlogError::BadRequest(format!("Field '{}' is too large.", field_name)));
            }
            data.extend_from_slice(&chunk);
        }
        let value = String::from_utf8(data)
            .map_err(|_| BlogError::BadRequest("Invalid UTF-8 in form field.".to_string()))?;

        match field_name.as_str() {
            "csrf_token" => csrf_token = value,
            "title" => form.title = value,
            "text" => form.text = value,
            "category" => form.category = parse_choice(&value, "category", &mut errors),
            "location" => form.location = parse_choice(&value, "location", &mut errors),
            "is_published" => form.is_published = true,
            "pub_date" => form.pub_date = value.trim().to_string(),
            "image-clear" => form.clear_image = true,
            _ => (),
        }
    }

    Ok(PostSubmission { csrf_token, form, errors })
}
