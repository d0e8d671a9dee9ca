//! Input validation module
//!
//! Every payload that reaches a store passes through here first. Failures
//! collect every offending path instead of stopping at the first one.

use crate::error::ValidationErrors;
use crate::models::{
    CreateForm, FieldInput, FieldType, FieldValueInput, FormDefinition, FormField, FormPatch,
    PageRequest, UpdateForm, ValidationRule,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use validator::Validate;

const MAX_VALUE_LENGTH: usize = 10_000;

/// Page size policy for list endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageDefaults {
    pub default_limit: i64,
    pub max_limit: i64,
}

impl Default for PageDefaults {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

// =============================================================================
// Form definitions
// =============================================================================

/// Validate and normalize a new form definition.
pub fn validate_form_definition(input: &CreateForm) -> Result<FormDefinition, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    collect_derived(input.validate(), "", &mut errors);

    let name = input.name.trim().to_string();
    if !input.name.is_empty() && name.is_empty() {
        errors.add("name", "is required");
    }

    let form_type = input.form_type.trim().to_lowercase();
    if !form_type.is_empty() && !is_valid_slug(&form_type) {
        errors.add(
            "formType",
            "must be lowercase alphanumeric with hyphens or underscores",
        );
    }

    let version = input.version.unwrap_or(1);
    if version < 1 {
        errors.add("version", "must be a positive integer");
    }

    let document_name = input.document_name.trim().to_string();
    if !input.document_name.is_empty() && document_name.is_empty() {
        errors.add("documentName", "is required");
    }
    let document_url = input.document_url.trim().to_string();
    if !document_url.is_empty() && !is_valid_document_url(&document_url) {
        errors.add("documentUrl", "must be an http(s) URL or an absolute path");
    }

    if input.fields.is_empty() {
        errors.add("fields", "at least one field is required");
    }
    let fields = validate_fields(&input.fields, &mut errors);

    errors.into_result(FormDefinition {
        name,
        description: trimmed(input.description.as_deref()),
        form_type,
        version,
        is_active: input.is_active.unwrap_or(true),
        document_name,
        document_url,
        fields,
    })
}

/// Validate and normalize a partial form update.
///
/// Blanking the document reference is rejected earlier by the form store;
/// here a supplied reference only has to be well formed.
pub fn validate_form_update(input: &UpdateForm) -> Result<FormPatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    collect_derived(input.validate(), "", &mut errors);

    let mut patch = FormPatch::default();

    if let Some(ref name) = input.name {
        let name = name.trim();
        if name.is_empty() {
            errors.add("name", "must not be blank");
        }
        patch.changes.name = Some(name.to_string());
    }
    if let Some(ref form_type) = input.form_type {
        let form_type = form_type.trim().to_lowercase();
        if !is_valid_slug(&form_type) {
            errors.add(
                "formType",
                "must be lowercase alphanumeric with hyphens or underscores",
            );
        }
        patch.changes.form_type = Some(form_type);
    }
    if let Some(ref url) = input.document_url {
        let url = url.trim();
        if !is_valid_document_url(url) {
            errors.add("documentUrl", "must be an http(s) URL or an absolute path");
        }
        patch.changes.document_url = Some(url.to_string());
    }
    patch.changes.document_name = input.document_name.as_deref().map(|n| n.trim().to_string());
    patch.changes.description = input.description.as_deref().map(|d| d.trim().to_string());
    patch.changes.is_active = input.is_active;

    if let Some(ref fields) = input.fields {
        if fields.is_empty() {
            errors.add("fields", "at least one field is required");
        }
        patch.fields = Some(validate_fields(fields, &mut errors));
    }

    errors.into_result(patch)
}

/// Check a field set and return it normalized. Order is kept as given.
fn validate_fields(fields: &[FieldInput], errors: &mut ValidationErrors) -> Vec<FieldInput> {
    let mut names = HashSet::new();
    let mut orders = HashSet::new();
    let mut normalized = Vec::with_capacity(fields.len());

    for (i, field) in fields.iter().enumerate() {
        let prefix = format!("fields[{}].", i);
        collect_derived(field.validate(), &prefix, errors);

        let mut field = field.clone();
        field.field_name = field.field_name.trim().to_string();
        field.field_label = field.field_label.trim().to_string();

        if !field.field_name.is_empty() && !is_valid_field_name(&field.field_name) {
            errors.add(
                format!("{}fieldName", prefix),
                "must start with a letter and contain only letters, digits and underscores",
            );
        }
        if !names.insert(field.field_name.clone()) {
            errors.add(
                format!("{}fieldName", prefix),
                format!("duplicate field name '{}'", field.field_name),
            );
        }
        if field.field_order < 0 {
            errors.add(format!("{}fieldOrder", prefix), "must not be negative");
        }
        if !orders.insert(field.field_order) {
            errors.add(
                format!("{}fieldOrder", prefix),
                format!("duplicate field order {}", field.field_order),
            );
        }

        if field.field_type == FieldType::Select {
            match field.options {
                Some(ref options) if !options.is_empty() => {
                    let mut values = HashSet::new();
                    for (j, option) in options.iter().enumerate() {
                        if option.value.trim().is_empty() {
                            errors.add(format!("{}options[{}].value", prefix, j), "is required");
                        }
                        if !values.insert(option.value.as_str()) {
                            errors.add(
                                format!("{}options[{}].value", prefix, j),
                                format!("duplicate option value '{}'", option.value),
                            );
                        }
                    }
                }
                _ => errors.add(
                    format!("{}options", prefix),
                    "select fields must declare at least one option",
                ),
            }
        }

        if let Some(ref rule) = field.validation_rule {
            validate_rule(rule, &format!("{}validationRule", prefix), errors);
        }

        normalized.push(field);
    }

    normalized
}

fn validate_rule(rule: &ValidationRule, path: &str, errors: &mut ValidationErrors) {
    if let (Some(min), Some(max)) = (rule.min, rule.max) {
        if min > max {
            errors.add(path, "min must not exceed max");
        }
    }
    if let (Some(min), Some(max)) = (rule.min_length, rule.max_length) {
        if min > max {
            errors.add(path, "minLength must not exceed maxLength");
        }
    }
    if let Some(ref pattern) = rule.pattern {
        if let Err(e) = Regex::new(pattern) {
            errors.add(path, format!("invalid pattern: {}", e));
        }
    }
}

// =============================================================================
// Submission payloads
// =============================================================================

/// Validate a full submission payload against the form's current fields.
///
/// Produces exactly one entry per declared field, in field order, with
/// `None` for absent optional values.
pub fn validate_submission_payload(
    values: &Map<String, Value>,
    fields: &[FormField],
) -> Result<Vec<FieldValueInput>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    reject_unknown_keys(values, fields, &mut errors);

    let mut normalized = Vec::with_capacity(fields.len());
    for field in fields {
        let raw = values.get(&field.field_name).unwrap_or(&Value::Null);
        match check_field_value(field, raw) {
            Ok(value) => {
                if value.is_none() && field.is_required {
                    errors.add(field.field_name.clone(), "is required");
                }
                normalized.push(FieldValueInput {
                    field_id: field.id,
                    field_name: field.field_name.clone(),
                    value,
                });
            }
            Err(reasons) => {
                for reason in reasons {
                    errors.add(field.field_name.clone(), reason);
                }
            }
        }
    }

    errors.into_result(normalized)
}

/// Validate a targeted edit. Only the supplied keys are checked and returned.
pub fn validate_field_patch(
    values: &Map<String, Value>,
    fields: &[FormField],
) -> Result<Vec<FieldValueInput>, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    reject_unknown_keys(values, fields, &mut errors);

    let mut normalized = Vec::with_capacity(values.len());
    for field in fields {
        let Some(raw) = values.get(&field.field_name) else {
            continue;
        };
        match check_field_value(field, raw) {
            Ok(None) if field.is_required => {
                errors.add(field.field_name.clone(), "is required");
            }
            Ok(value) => normalized.push(FieldValueInput {
                field_id: field.id,
                field_name: field.field_name.clone(),
                value,
            }),
            Err(reasons) => {
                for reason in reasons {
                    errors.add(field.field_name.clone(), reason);
                }
            }
        }
    }

    errors.into_result(normalized)
}

fn reject_unknown_keys(
    values: &Map<String, Value>,
    fields: &[FormField],
    errors: &mut ValidationErrors,
) {
    for key in values.keys() {
        if !fields.iter().any(|f| &f.field_name == key) {
            errors.add(key.clone(), "is not a field of this form");
        }
    }
}

/// Normalize one value and check it against its field's type and rule.
fn check_field_value(field: &FormField, raw: &Value) -> Result<Option<String>, Vec<String>> {
    let text = crate::codec::value_to_text(field.field_type, raw).map_err(|e| vec![e])?;
    let Some(text) = text else {
        return Ok(None);
    };

    let mut reasons = Vec::new();
    if text.chars().count() > MAX_VALUE_LENGTH {
        reasons.push(format!("must be at most {} characters", MAX_VALUE_LENGTH));
    }

    match field.field_type {
        FieldType::Email if !is_valid_email(&text) => {
            reasons.push("must be a valid email address".to_string());
        }
        FieldType::Date if chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d").is_err() => {
            reasons.push("must be a date in YYYY-MM-DD format".to_string());
        }
        FieldType::Select => {
            let allowed = field
                .options
                .as_ref()
                .map(|options| options.iter().any(|o| o.value == text))
                .unwrap_or(false);
            if !allowed {
                reasons.push(format!("'{}' is not one of the allowed options", text));
            }
        }
        _ => {}
    }

    if let Some(ref rule) = field.validation_rule {
        let rule_reasons = check_rule(field.field_type, rule, &text);
        if !rule_reasons.is_empty() {
            match rule.message {
                Some(ref message) => reasons.push(message.clone()),
                None => reasons.extend(rule_reasons),
            }
        }
    }

    if reasons.is_empty() {
        Ok(Some(text))
    } else {
        Err(reasons)
    }
}

fn check_rule(field_type: FieldType, rule: &ValidationRule, text: &str) -> Vec<String> {
    let mut reasons = Vec::new();
    let length = text.chars().count();

    if let Some(min) = rule.min_length {
        if length < min {
            reasons.push(format!("must be at least {} characters", min));
        }
    }
    if let Some(max) = rule.max_length {
        if length > max {
            reasons.push(format!("must be at most {} characters", max));
        }
    }

    if field_type == FieldType::Number {
        if let Ok(number) = text.parse::<f64>() {
            if let Some(min) = rule.min {
                if number < min {
                    reasons.push(format!("must be at least {}", min));
                }
            }
            if let Some(max) = rule.max {
                if number > max {
                    reasons.push(format!("must be at most {}", max));
                }
            }
        }
    }

    if let Some(ref pattern) = rule.pattern {
        match Regex::new(&format!("^(?:{})$", pattern)) {
            Ok(re) if !re.is_match(text) => {
                reasons.push("has an invalid format".to_string());
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Ignoring stored pattern that does not compile: {}", e);
            }
        }
    }

    reasons
}

// =============================================================================
// Pagination
// =============================================================================

/// Resolve page/limit query values. Non-positive values are rejected and
/// oversized limits are clamped.
pub fn validate_pagination(
    page: Option<i64>,
    limit: Option<i64>,
    defaults: PageDefaults,
) -> Result<PageRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let page = page.unwrap_or(1);
    let limit = limit.unwrap_or(defaults.default_limit);

    if page < 1 {
        errors.add("page", "must be a positive integer");
    }
    if limit < 1 {
        errors.add("limit", "must be a positive integer");
    }

    let limit = limit.min(defaults.max_limit);
    if page >= 1 && limit >= 1 && (page - 1).checked_mul(limit).is_none() {
        errors.add("page", "is out of range");
    }

    errors.into_result(PageRequest { page, limit })
}

// =============================================================================
// Helpers
// =============================================================================

fn collect_derived(
    result: Result<(), validator::ValidationErrors>,
    prefix: &str,
    errors: &mut ValidationErrors,
) {
    let Err(derived) = result else {
        return;
    };
    for (field, failures) in derived.field_errors() {
        for failure in failures.iter() {
            let message = failure
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| failure.code.to_string());
            errors.add(format!("{}{}", prefix, to_camel_case(field)), message);
        }
    }
}

fn to_camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Form type slug: lowercase letters, digits, hyphens and underscores.
fn is_valid_slug(slug: &str) -> bool {
    if slug.is_empty() || slug.len() > 64 {
        return false;
    }
    let is_valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
    is_valid && !slug.starts_with('-') && !slug.ends_with('-')
}

fn is_valid_field_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_document_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://") || url.starts_with('/')
}

/// Simple email validation
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty() && !domain.is_empty() && domain.contains('.') && domain.len() > 2
}
