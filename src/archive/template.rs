//! Product name templates
//!
//! Archive locations can be given as path templates using the tokens
//! `${yyyy}`, `${MM}`, `${dd}` and `${name}`. Date tokens are filled from
//! the acquisition date embedded in the product name.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::{FexError, FexResult};

/// Substitutes product-specific tokens into a path template
pub trait ProductNameResolver: Send + Sync {
    /// Resolve every token of `template` for the given product
    fn resolve(&self, template: &str, product_name: &str) -> FexResult<String>;
}

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"\d{8,}").unwrap();
}

/// Acquisition date embedded in a product name
///
/// The first eight consecutive digits forming a valid calendar date win,
/// e.g. `MER_RR__1PRACR20080713_184950_...` gives 2008-07-13.
pub fn product_date(product_name: &str) -> Option<NaiveDate> {
    DIGIT_RUN.find_iter(product_name).find_map(|run| {
        let digits = run.as_str();
        (0..=digits.len() - 8)
            .find_map(|start| NaiveDate::parse_from_str(&digits[start..start + 8], "%Y%m%d").ok())
    })
}

/// Resolver filling date tokens from the product name
#[derive(Debug, Default, Clone, Copy)]
pub struct DateTokenResolver;

impl ProductNameResolver for DateTokenResolver {
    fn resolve(&self, template: &str, product_name: &str) -> FexResult<String> {
        let mut resolved = template.replace("${name}", product_name);

        if ["${yyyy}", "${MM}", "${dd}"].iter().any(|t| resolved.contains(t)) {
            let date = product_date(product_name).ok_or_else(|| FexError::Configuration(format!(
                "No acquisition date in product name '{}' for template '{}'", product_name, template)))?;
            resolved = resolved
                .replace("${yyyy}", &format!("{:04}", date.year()))
                .replace("${MM}", &format!("{:02}", date.month()))
                .replace("${dd}", &format!("{:02}", date.day()));
        }

        if resolved.contains("${") {
            return Err(FexError::Configuration(format!(
                "Unresolved token in template '{}' for product '{}'", template, product_name)));
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: &str = "MER_RR__1PRACR20080713_184950_000026382070_00185_33305_0000.N1";

    #[test]
    fn resolves_date_and_name_tokens() {
        let resolved = DateTokenResolver.resolve("/testdata/${yyyy}/${MM}/${dd}/${name}", PRODUCT).unwrap();
        assert_eq!(resolved, format!("/testdata/2008/07/13/{}", PRODUCT));
    }

    #[test]
    fn skips_digit_runs_that_are_not_dates() {
        assert_eq!(product_date("S1_99999999_20150102"), NaiveDate::from_ymd_opt(2015, 1, 2));
        assert_eq!(product_date("A_120140228X"), NaiveDate::from_ymd_opt(2014, 2, 28));
        assert_eq!(product_date("no_date_here"), None);
    }

    #[test]
    fn missing_date_or_unknown_token_fails() {
        assert!(DateTokenResolver.resolve("/d/${yyyy}/${name}", "plain").is_err());
        assert!(DateTokenResolver.resolve("/d/${month}/${name}", PRODUCT).is_err());
        assert_eq!(DateTokenResolver.resolve("/d/${name}", "plain").unwrap(), "/d/plain");
    }
}
