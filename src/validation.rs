use chrono::NaiveDate;

use crate::error::AppError;

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

pub fn require_valid_id(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must be a valid ID")));
    }
    Ok(())
}

/// Accepts `YYYY-MM-DD` only; stored dates are always in this form.
pub fn require_date(field: &str, value: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation(format!("{field} must be a YYYY-MM-DD date")))
}

pub fn require_non_negative(field: &str, value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::Validation(format!("{field} must be a non-negative number")));
    }
    Ok(())
}

pub fn require_email(field: &str, value: &str) -> Result<(), AppError> {
    let value = value.trim();
    let valid = match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.ends_with('.'),
        None => false,
    };
    if !valid {
        return Err(AppError::Validation(format!("{field} must be an email address")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dates() {
        assert_eq!(
            require_date("due_date", "2024-01-05").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
        assert!(require_date("due_date", "05/01/2024").is_err());
    }

    #[test]
    fn test_email() {
        assert!(require_email("email", "ana@empresa.com.br").is_ok());
        assert!(require_email("email", "ana@localhost").is_err());
        assert!(require_email("email", "@empresa.com").is_err());
    }

    #[test]
    fn test_numbers() {
        assert!(require_non_negative("value", 0.0).is_ok());
        assert!(require_non_negative("value", -1.0).is_err());
        assert!(require_non_negative("value", f64::NAN).is_err());
    }
}
