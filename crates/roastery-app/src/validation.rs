// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::NodeId;
use crate::binding::{FIELD_ERROR, RULES};
use crate::dom::Document;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rule {
    Required,
    Min(f64),
    Max(f64),
    Email,
    Numeric,
}

impl Rule {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (name, argument) = match raw.split_once(':') {
            Some((name, argument)) => (name.trim(), Some(argument.trim())),
            None => (raw, None),
        };
        let bound = || argument?.parse::<f64>().ok().filter(|value| value.is_finite());
        match name {
            "required" => Some(Self::Required),
            "email" => Some(Self::Email),
            "numeric" => Some(Self::Numeric),
            "min" => bound().map(Self::Min),
            "max" => bound().map(Self::Max),
            _ => None,
        }
    }

    /// Parses a `|`-separated rule list, skipping entries it cannot read.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        raw.split('|')
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| {
                let rule = Self::parse(part);
                if rule.is_none() {
                    tracing::warn!(rule = part.trim(), "ignoring unknown validation rule");
                }
                rule
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationError {
    Required,
    TooShort(f64),
    TooLong(f64),
    BelowMinimum(f64),
    AboveMaximum(f64),
    InvalidEmail,
    NotNumeric,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => f.write_str("this field is required"),
            Self::TooShort(min) => write!(f, "use at least {min} characters"),
            Self::TooLong(max) => write!(f, "use at most {max} characters"),
            Self::BelowMinimum(min) => write!(f, "must be at least {min}"),
            Self::AboveMaximum(max) => write!(f, "must be at most {max}"),
            Self::InvalidEmail => f.write_str("enter a valid email address"),
            Self::NotNumeric => f.write_str("enter a number"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

/// Checks `value` against `rules`. A blank value only fails `required`.
/// With `numeric` present, `min`/`max` bound the number instead of the
/// character count.
pub fn check(rules: &[Rule], value: &str) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        if rules.contains(&Rule::Required) {
            return Err(ValidationError::Required);
        }
        return Ok(());
    }

    let number = if rules.contains(&Rule::Numeric) {
        Some(
            value
                .parse::<f64>()
                .ok()
                .filter(|number| number.is_finite())
                .ok_or(ValidationError::NotNumeric)?,
        )
    } else {
        None
    };
    let length = value.chars().count() as f64;

    for rule in rules {
        match (*rule, number) {
            (Rule::Min(min), Some(number)) if number < min => {
                return Err(ValidationError::BelowMinimum(min));
            }
            (Rule::Max(max), Some(number)) if number > max => {
                return Err(ValidationError::AboveMaximum(max));
            }
            (Rule::Min(min), None) if length < min => return Err(ValidationError::TooShort(min)),
            (Rule::Max(max), None) if length > max => return Err(ValidationError::TooLong(max)),
            (Rule::Email, _) if !is_email(value) => return Err(ValidationError::InvalidEmail),
            _ => {}
        }
    }
    Ok(())
}

fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedField {
    pub node: NodeId,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: NodeId,
    pub error: ValidationError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormValidator {
    form: NodeId,
    fields: Vec<ValidatedField>,
}

impl FormValidator {
    pub fn bind(doc: &Document, form: NodeId) -> Self {
        let fields = doc
            .descendants(form)
            .into_iter()
            .filter_map(|node| {
                let rules = Rule::parse_list(doc.attr(node, RULES)?);
                (!rules.is_empty()).then_some(ValidatedField { node, rules })
            })
            .collect();
        Self { form, fields }
    }

    pub fn form(&self) -> NodeId {
        self.form
    }

    pub fn fields(&self) -> &[ValidatedField] {
        &self.fields
    }

    pub fn watches(&self, node: NodeId) -> bool {
        self.fields.iter().any(|field| field.node == node)
    }

    /// Replaces every inline error in the form with the current failures.
    /// An empty result means the form may be submitted.
    pub fn validate(&self, doc: &mut Document) -> Vec<FieldError> {
        for stale in doc
            .descendants(self.form)
            .into_iter()
            .filter(|node| doc.has_attr(*node, FIELD_ERROR))
            .collect::<Vec<_>>()
        {
            doc.remove(stale);
        }

        let mut failures = Vec::new();
        for field in &self.fields {
            match check(&field.rules, doc.value(field.node)) {
                Ok(()) => doc.remove_attr(field.node, "aria-invalid"),
                Err(error) => {
                    let note = doc.create_element("span");
                    doc.set_attr(note, FIELD_ERROR, field.node.to_string());
                    doc.set_attr(note, "role", "alert");
                    doc.set_text(note, error.to_string());
                    doc.insert_after(field.node, note);
                    doc.set_attr(field.node, "aria-invalid", "true");
                    failures.push(FieldError {
                        field: field.node,
                        error,
                    });
                }
            }
        }
        if !failures.is_empty() {
            tracing::debug!(form = %self.form, failures = failures.len(), "form failed validation");
        }
        failures
    }

    /// Drops the inline error belonging to `field`, if any.
    pub fn clear_field(&self, doc: &mut Document, field: NodeId) -> bool {
        let marker = field.to_string();
        let notes: Vec<NodeId> = doc
            .descendants(self.form)
            .into_iter()
            .filter(|node| doc.attr(*node, FIELD_ERROR) == Some(marker.as_str()))
            .collect();
        doc.remove_attr(field, "aria-invalid");
        let cleared = !notes.is_empty();
        for note in notes {
            doc.remove(note);
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::{FormValidator, Rule, ValidationError, check};
    use crate::binding::{FIELD_ERROR, RULES};
    use crate::dom::Document;

    #[test]
    fn rule_lists_skip_unknown_entries() {
        assert_eq!(
            Rule::parse_list("required| min:3 |shouty|max:x|numeric"),
            vec![Rule::Required, Rule::Min(3.0), Rule::Numeric]
        );
    }

    #[test]
    fn blank_values_only_fail_required() {
        assert_eq!(check(&[Rule::Email, Rule::Min(3.0)], "  "), Ok(()));
        assert_eq!(check(&[Rule::Required], " "), Err(ValidationError::Required));
    }

    #[test]
    fn bounds_switch_to_numbers_with_numeric() {
        let rules = [Rule::Numeric, Rule::Min(0.0), Rule::Max(100.0)];
        assert_eq!(check(&rules, "25.90"), Ok(()));
        assert_eq!(check(&rules, "-1"), Err(ValidationError::BelowMinimum(0.0)));
        assert_eq!(check(&rules, "150"), Err(ValidationError::AboveMaximum(100.0)));
        assert_eq!(check(&rules, "vinte"), Err(ValidationError::NotNumeric));

        assert_eq!(check(&[Rule::Min(3.0)], "ab"), Err(ValidationError::TooShort(3.0)));
        assert_eq!(check(&[Rule::Max(3.0)], "café"), Err(ValidationError::TooLong(3.0)));
        assert_eq!(check(&[Rule::Max(4.0)], "café"), Ok(()));
    }

    #[test]
    fn email_shape() {
        for good in ["compras@cafeteria.com.br", "a@b.co"] {
            assert_eq!(check(&[Rule::Email], good), Ok(()), "{good}");
        }
        for bad in ["sem-arroba", "@b.co", "a@b", "a@.co", "a@b.co.", "a b@c.co", "a@b@c.co"] {
            assert_eq!(check(&[Rule::Email], bad), Err(ValidationError::InvalidEmail), "{bad}");
        }
    }

    #[test]
    fn errors_are_rendered_once_after_each_field() {
        let mut doc = Document::new();
        let form = doc.element(doc.root(), "form");
        let wrapper = doc.element(form, "div");
        let name = doc.element(wrapper, "input");
        doc.set_attr(name, RULES, "required|min:3");
        let label = doc.element(wrapper, "small");
        let price = doc.element(form, "input");
        doc.set_attr(price, RULES, "required|numeric");
        doc.set_value(price, "12.50");

        let validator = FormValidator::bind(&doc, form);
        assert_eq!(validator.fields().len(), 2);

        let failures = validator.validate(&mut doc);
        let slots = doc.len();
        validator.validate(&mut doc);
        assert_eq!(doc.len(), slots);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].error, ValidationError::Required);
        assert_eq!(doc.find_by_attr(FIELD_ERROR).len(), 1);
        let note = doc.children(wrapper)[1];
        assert!(doc.has_attr(note, FIELD_ERROR));
        assert_eq!(doc.children(wrapper)[2], label);
        assert_eq!(doc.attr(name, "aria-invalid"), Some("true"));

        assert!(validator.clear_field(&mut doc, name));
        assert!(doc.find_by_attr(FIELD_ERROR).is_empty());
        assert_eq!(doc.attr(name, "aria-invalid"), None);

        doc.set_value(name, "Café Gourmet");
        assert!(validator.validate(&mut doc).is_empty());
    }
}
