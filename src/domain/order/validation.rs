use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::errors::{OrderError, ValidationErrors};
use super::value_objects::normalize_price;
use crate::domain::product::{NewProduct, ProductId, ProductRef, PRODUCT_NAME_MAX_LEN};
use crate::store::{NewOrder, NewOrderDetail};

// ============================================================================
// Payload Validation
// ============================================================================
//
// Request bodies arrive as raw JSON and are checked here before anything is
// written. Every problem is collected under its field path so the caller
// sees all of them at once. Fields the server owns (`id`, `status`,
// `created_at`) are never read.
//
// ============================================================================

pub const EXTERNAL_ID_MAX_LEN: usize = 128;

const REQUIRED: &str = "This field is required.";

/// Check a create-order body and turn it into a `NewOrder`.
pub fn parse_create_payload(payload: &Value) -> Result<NewOrder, OrderError> {
    let mut errors = ValidationErrors::default();

    let Some(body) = payload.as_object() else {
        errors.add("non_field_errors", "Expected a JSON object.");
        return Err(OrderError::Validation(errors));
    };

    let external_id = external_id_field(body, true, &mut errors);

    let details = match body.get("details") {
        None | Some(Value::Null) => {
            errors.add("details", REQUIRED);
            Vec::new()
        }
        Some(Value::Array(items)) if items.is_empty() => {
            errors.add("details", "This list may not be empty.");
            Vec::new()
        }
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| detail_item(item, &format!("details[{i}]"), &mut errors))
            .collect(),
        Some(_) => {
            errors.add("details", "Expected a list of items.");
            Vec::new()
        }
    };

    let order = NewOrder {
        external_id: external_id.unwrap_or_default(),
        details,
    };
    errors.into_result(order)
}

/// Check an update body. Only `external_id` is read; everything else in
/// the body is ignored. With `partial` the field may be left out.
pub fn parse_update_payload(payload: &Value, partial: bool) -> Result<Option<String>, OrderError> {
    let mut errors = ValidationErrors::default();

    let Some(body) = payload.as_object() else {
        errors.add("non_field_errors", "Expected a JSON object.");
        return Err(OrderError::Validation(errors));
    };

    let external_id = external_id_field(body, !partial, &mut errors);
    errors.into_result(external_id)
}

fn external_id_field(
    body: &Map<String, Value>,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<String> {
    match body.get("external_id") {
        None | Some(Value::Null) => {
            if required {
                errors.add("external_id", REQUIRED);
            }
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add("external_id", "This field may not be blank.");
            None
        }
        Some(Value::String(s)) if s.chars().count() > EXTERNAL_ID_MAX_LEN => {
            errors.add(
                "external_id",
                format!("Ensure this field has no more than {EXTERNAL_ID_MAX_LEN} characters."),
            );
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errors.add("external_id", "Not a valid string.");
            None
        }
    }
}

fn detail_item(item: &Value, path: &str, errors: &mut ValidationErrors) -> Option<NewOrderDetail> {
    let Some(detail) = item.as_object() else {
        errors.add(path, "Expected an object.");
        return None;
    };

    let amount = amount_field(detail.get("amount"), &format!("{path}.amount"), errors);
    let price = price_field(detail.get("price"), &format!("{path}.price"), errors);
    let product = product_field(detail.get("product"), &format!("{path}.product"), errors);

    Some(NewOrderDetail {
        amount: amount?,
        price: price?,
        product: product?,
    })
}

fn amount_field(value: Option<&Value>, path: &str, errors: &mut ValidationErrors) -> Option<i32> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        errors.add(path, REQUIRED);
        return None;
    };

    let whole = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    match whole {
        None => {
            errors.add(path, "A valid integer is required.");
            None
        }
        Some(n) if n < 0 => {
            errors.add(path, "Ensure this value is greater than or equal to 0.");
            None
        }
        Some(n) => match i32::try_from(n) {
            Ok(amount) => Some(amount),
            Err(_) => {
                errors.add(
                    path,
                    format!("Ensure this value is less than or equal to {}.", i32::MAX),
                );
                None
            }
        },
    }
}

fn price_field(value: Option<&Value>, path: &str, errors: &mut ValidationErrors) -> Option<Decimal> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        errors.add(path, REQUIRED);
        return None;
    };

    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => String::new(),
    };

    let parsed = Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text));
    let Ok(price) = parsed else {
        errors.add(path, "A valid number is required.");
        return None;
    };

    match normalize_price(price) {
        Ok(price) => Some(price),
        Err(message) => {
            errors.add(path, message);
            None
        }
    }
}

fn product_field(
    value: Option<&Value>,
    path: &str,
    errors: &mut ValidationErrors,
) -> Option<ProductRef> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        errors.add(path, REQUIRED);
        return None;
    };
    let Some(product) = value.as_object() else {
        errors.add(path, "Expected an object with at least an \"id\".");
        return None;
    };

    let id = product_id_field(product.get("id"), &format!("{path}.id"), true, errors);
    let name = product_name_field(product.get("name"), &format!("{path}.name"), false, errors);

    match (id, name) {
        (Some(Some(id)), Ok(Some(name))) => Some(ProductRef::GetOrCreate { id, name }),
        (Some(Some(id)), Ok(None)) => Some(ProductRef::Existing(id)),
        _ => None,
    }
}

/// `None` when invalid, `Some(None)` when absent and optional.
fn product_id_field(
    value: Option<&Value>,
    path: &str,
    required: bool,
    errors: &mut ValidationErrors,
) -> Option<Option<ProductId>> {
    match value {
        None | Some(Value::Null) if required => {
            errors.add(path, REQUIRED);
            None
        }
        None | Some(Value::Null) => Some(None),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(id) if id > 0 => Some(Some(id)),
            _ => {
                errors.add(path, "Expected a positive integer.");
                None
            }
        },
        Some(_) => {
            errors.add(path, "Expected a positive integer.");
            None
        }
    }
}

fn product_name_field(
    value: Option<&Value>,
    path: &str,
    required: bool,
    errors: &mut ValidationErrors,
) -> Result<Option<String>, ()> {
    match value {
        None | Some(Value::Null) if required => {
            errors.add(path, REQUIRED);
            Err(())
        }
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => {
            errors.add(path, "This field may not be blank.");
            Err(())
        }
        Some(Value::String(s)) if s.chars().count() > PRODUCT_NAME_MAX_LEN => {
            errors.add(
                path,
                format!("Ensure this field has no more than {PRODUCT_NAME_MAX_LEN} characters."),
            );
            Err(())
        }
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => {
            errors.add(path, "Not a valid string.");
            Err(())
        }
    }
}

/// Check a create-product body. `name` is required; an `id` turns the
/// request into get-or-create under that id.
pub fn parse_product_payload(payload: &Value) -> Result<(Option<ProductId>, NewProduct), OrderError> {
    let mut errors = ValidationErrors::default();

    let Some(body) = payload.as_object() else {
        errors.add("non_field_errors", "Expected a JSON object.");
        return Err(OrderError::Validation(errors));
    };

    let id = product_id_field(body.get("id"), "id", false, &mut errors);
    let name = product_name_field(body.get("name"), "name", true, &mut errors);

    match (id, name) {
        (Some(id), Ok(Some(name))) => errors.into_result((id, NewProduct { name })),
        _ => Err(OrderError::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field_names(err: OrderError) -> Vec<String> {
        match err {
            OrderError::Validation(errors) => {
                errors.fields().iter().map(|(field, _)| field.clone()).collect()
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_payload() {
        let order = parse_create_payload(&json!({
            "external_id": "X",
            "details": [
                {"amount": 5, "price": 7.55, "product": {"id": 1, "name": "Widget"}},
                {"amount": "2", "price": "10", "product": {"id": 2}}
            ]
        }))
        .unwrap();

        assert_eq!(order.external_id, "X");
        assert_eq!(order.details.len(), 2);
        assert_eq!(order.details[0].amount, 5);
        assert_eq!(order.details[0].price.to_string(), "7.55");
        assert_eq!(
            order.details[0].product,
            ProductRef::GetOrCreate {
                id: 1,
                name: "Widget".to_string()
            }
        );
        assert_eq!(order.details[1].amount, 2);
        assert_eq!(order.details[1].price.to_string(), "10.00");
        assert_eq!(order.details[1].product, ProductRef::Existing(2));
    }

    #[test]
    fn test_server_owned_fields_are_ignored() {
        let order = parse_create_payload(&json!({
            "id": 99,
            "status": "accepted",
            "created_at": "01-01-2020 00:00:00",
            "external_id": "X",
            "details": [{"amount": 1, "price": 1, "product": {"id": 1}}]
        }))
        .unwrap();
        assert_eq!(order.external_id, "X");
    }

    #[test]
    fn test_missing_details() {
        let err = parse_create_payload(&json!({"external_id": "X"})).unwrap_err();
        assert_eq!(field_names(err), vec!["details"]);
    }

    #[test]
    fn test_empty_details() {
        let err = parse_create_payload(&json!({"external_id": "X", "details": []})).unwrap_err();
        assert_eq!(field_names(err), vec!["details"]);
    }

    #[test]
    fn test_details_not_a_list() {
        let err = parse_create_payload(&json!({
            "external_id": "X",
            "details": {"amount": 1, "price": 1, "product": {"id": 1}}
        }))
        .unwrap_err();
        assert_eq!(field_names(err), vec!["details"]);
    }

    #[test]
    fn test_all_errors_are_collected() {
        let err = parse_create_payload(&json!({
            "details": [
                {"amount": -1, "price": 7.555, "product": {"name": "Widget"}},
                "not-an-object"
            ]
        }))
        .unwrap_err();

        assert_eq!(
            field_names(err),
            vec![
                "external_id",
                "details[0].amount",
                "details[0].price",
                "details[0].product.id",
                "details[1]",
            ]
        );
    }

    #[test]
    fn test_external_id_rules() {
        let blank = parse_create_payload(&json!({
            "external_id": "  ",
            "details": [{"amount": 1, "price": 1, "product": {"id": 1}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(blank), vec!["external_id"]);

        let long = "x".repeat(EXTERNAL_ID_MAX_LEN + 1);
        let too_long = parse_create_payload(&json!({
            "external_id": long,
            "details": [{"amount": 1, "price": 1, "product": {"id": 1}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(too_long), vec!["external_id"]);

        let number = parse_create_payload(&json!({
            "external_id": 12,
            "details": [{"amount": 1, "price": 1, "product": {"id": 1}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(number), vec!["external_id"]);
    }

    #[test]
    fn test_amount_accepts_whole_floats_only() {
        let ok = parse_create_payload(&json!({
            "external_id": "X",
            "details": [{"amount": 100.0, "price": 1, "product": {"id": 1}}]
        }))
        .unwrap();
        assert_eq!(ok.details[0].amount, 100);

        let err = parse_create_payload(&json!({
            "external_id": "X",
            "details": [{"amount": 1.5, "price": 1, "product": {"id": 1}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(err), vec!["details[0].amount"]);
    }

    #[test]
    fn test_price_limits() {
        let err = parse_create_payload(&json!({
            "external_id": "X",
            "details": [{"amount": 1, "price": "12345678901", "product": {"id": 1}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(err), vec!["details[0].price"]);

        let err = parse_create_payload(&json!({
            "external_id": "X",
            "details": [{"amount": 1, "price": "abc", "product": {"id": 1}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(err), vec!["details[0].price"]);
    }

    #[test]
    fn test_product_name_rules() {
        let err = parse_create_payload(&json!({
            "external_id": "X",
            "details": [{"amount": 1, "price": 1, "product": {"id": 1, "name": ""}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(err), vec!["details[0].product.name"]);

        let err = parse_create_payload(&json!({
            "external_id": "X",
            "details": [{"amount": 1, "price": 1, "product": {"id": 0}}]
        }))
        .unwrap_err();
        assert_eq!(field_names(err), vec!["details[0].product.id"]);
    }

    #[test]
    fn test_non_object_body() {
        let err = parse_create_payload(&json!([1, 2])).unwrap_err();
        assert_eq!(field_names(err), vec!["non_field_errors"]);
    }

    #[test]
    fn test_update_payload_reads_only_external_id() {
        let external_id = parse_update_payload(
            &json!({
                "id": 2,
                "status": "accepted",
                "external_id": "wrong_test_id",
                "details": {"product": {"id": 2, "name": "new_test_product"}}
            }),
            false,
        )
        .unwrap();
        assert_eq!(external_id.as_deref(), Some("wrong_test_id"));
    }

    #[test]
    fn test_update_payload_requires_external_id_unless_partial() {
        let err = parse_update_payload(&json!({"status": "failed"}), false).unwrap_err();
        assert_eq!(field_names(err), vec!["external_id"]);

        let none = parse_update_payload(&json!({"status": "failed"}), true).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn test_product_payload() {
        let (id, product) = parse_product_payload(&json!({"name": "Widget"})).unwrap();
        assert_eq!(id, None);
        assert_eq!(product.name, "Widget");

        let (id, _) = parse_product_payload(&json!({"id": 4, "name": "Gadget"})).unwrap();
        assert_eq!(id, Some(4));
    }

    #[test]
    fn test_product_payload_errors() {
        let err = parse_product_payload(&json!({"id": 0})).unwrap_err();
        assert_eq!(field_names(err), vec!["id", "name"]);

        let err = parse_product_payload(&json!({"name": "  "})).unwrap_err();
        assert_eq!(field_names(err), vec!["name"]);
    }
}
