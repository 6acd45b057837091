use std::sync::Arc;

use indoc::indoc;
use xmlview_lib::coerce::parse_integer;
use xmlview_lib::{
    ExtensionDecl, Field, FieldError, Instance, Item, Meta, NodeRef, RawResult, Schema, Value,
};

const FUNCTIONS: &str = "urn:local:number-functions";

const NUMBERS: &str = indoc! {"
    <numbers>
        <num>1</num>
        <num>2</num>
        <num>3</num>
        <num>4</num>
        <num>5</num>
        <num>6</num>
        <num>7</num>
    </numbers>
"};

fn integers(arg: Option<&RawResult>) -> Result<Vec<i64>, String> {
    let items = arg.cloned().map(RawResult::into_items).unwrap_or_default();
    items
        .iter()
        .map(|item| {
            let text = item.to_text();
            parse_integer(&text).ok_or_else(|| format!("{text:?} is not a number"))
        })
        .collect()
}

fn is_even(_: &Instance, _: Option<&NodeRef>, args: &[RawResult]) -> Result<RawResult, String> {
    let numbers = integers(args.first())?;
    Ok(RawResult::Scalar(Item::Boolean(
        numbers.iter().all(|n| n % 2 == 0),
    )))
}

fn sum_of_squares(_: &Instance, _: Option<&NodeRef>, args: &[RawResult]) -> Result<RawResult, String> {
    let numbers = integers(args.first())?;
    let sum: i64 = numbers.iter().map(|n| n * n).sum();
    Ok(RawResult::Scalar(Item::Number(sum as f64)))
}

/// Mean of the instance's own `all_numbers` field.
fn mean(instance: &Instance, _: Option<&NodeRef>, _: &[RawResult]) -> Result<RawResult, String> {
    let all = instance.get("all_numbers").map_err(|e| e.to_string())?;
    let numbers: Vec<i64> = all
        .as_list()
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_integer)
        .collect();
    if numbers.is_empty() {
        return Ok(RawResult::Scalar(Item::Number(f64::NAN)));
    }
    let mean = numbers.iter().sum::<i64>() as f64 / numbers.len() as f64;
    Ok(RawResult::Scalar(Item::Number(mean)))
}

fn schema() -> Arc<Schema> {
    Schema::builder("numbers")
        .meta(
            Meta::new()
                .namespace("fn", FUNCTIONS)
                .extension_namespace_uri(FUNCTIONS),
        )
        .field("all_numbers", Field::integers("//num"))
        .field("even_numbers", Field::integers("//num[fn:is-even(.)]"))
        .field("sum_of_squares", Field::integer("fn:sum-of-squares(//num)"))
        .field("above_mean", Field::integers("//num[. > fn:mean()]"))
        .field("first_odd", Field::integer("//num[not(fn:is-even(.))]").ignore_extra_nodes())
        .field("bad", Field::integer("fn:sum-of-squares(/numbers)").required(false))
        .extension(ExtensionDecl::new("is-even", is_even))
        .extension(ExtensionDecl::new("sum-of-squares", sum_of_squares))
        .extension(ExtensionDecl::new("mean", mean))
        .prepare()
        .unwrap()
}

fn numbers(instance: &Instance, field: &str) -> Vec<i64> {
    let value = instance.get(field).unwrap();
    value
        .as_list()
        .unwrap()
        .iter()
        .filter_map(Value::as_integer)
        .collect()
}

#[test]
fn all_numbers() {
    let example = Instance::from_str(&schema(), NUMBERS).unwrap();
    assert_eq!(numbers(&example, "all_numbers"), [1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn boolean_extension_in_a_predicate() {
    let example = Instance::from_str(&schema(), NUMBERS).unwrap();
    assert_eq!(numbers(&example, "even_numbers"), [2, 4, 6]);
}

#[test]
fn aggregate_extension() {
    let example = Instance::from_str(&schema(), NUMBERS).unwrap();
    assert_eq!(example.get("sum_of_squares").unwrap().as_integer(), Some(140));
}

#[test]
fn extensions_read_sibling_fields() {
    let example = Instance::from_str(&schema(), NUMBERS).unwrap();
    assert_eq!(numbers(&example, "above_mean"), [5, 6, 7]);
    assert!(example.is_initialized("all_numbers"));
}

#[test]
fn extra_nodes_can_be_ignored() {
    let example = Instance::from_str(&schema(), NUMBERS).unwrap();
    assert_eq!(example.get("first_odd").unwrap().as_integer(), Some(1));
}

#[test]
fn extension_failures_stay_local_to_the_field() {
    let example = Instance::from_str(&schema(), NUMBERS).unwrap();
    let err = example.get("bad").unwrap_err();
    assert!(matches!(err, FieldError::Query { ref field, .. } if field == "bad"));
    assert!(err.to_string().contains("is not a number"));

    assert!(!example.is_initialized("bad"));
    assert_eq!(example.get("sum_of_squares").unwrap().as_integer(), Some(140));
}

#[test]
fn each_instance_binds_its_own_extensions() {
    let schema = schema();
    let small = Instance::from_str(&schema, "<numbers><num>1</num><num>3</num></numbers>").unwrap();
    let large = Instance::from_str(&schema, NUMBERS).unwrap();

    assert_eq!(numbers(&small, "above_mean"), [3]);
    assert_eq!(numbers(&large, "above_mean"), [5, 6, 7]);
}
