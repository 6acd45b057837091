//! Per-field accessors.
//!
//! Every prepared field gets one accessor, stored on the schema by field
//! name. The instance routes reads and writes through it. Slots move from
//! uninitialized to initialized on the first non-null value, whether it was
//! evaluated or assigned; immutable fields reject later assignments.

use std::rc::Rc;
use std::sync::Arc;

use xmlview_core::Item;

use crate::coerce::{Coercion, accepts, coerce_item, coerce_text};
use crate::error::FieldError;
use crate::field::{Field, FieldKind, QuerySpec, Target, TargetSlot};
use crate::instance::Instance;
use crate::schema::Schema;
use crate::value::Value;

pub trait FieldAccessor: Send + Sync {
    /// Cached value, evaluating on first read.
    fn get(&self, instance: &Instance) -> Result<Rc<Value>, FieldError>;

    /// Coerce and store an assigned value.
    fn set(&self, instance: &Instance, value: Value) -> Result<(), FieldError>;
}

pub(crate) fn accessor_for(index: usize, field: Arc<Field>) -> Box<dyn FieldAccessor> {
    match field.kind {
        FieldKind::Root => Box::new(RootAccessor { index, field }),
        FieldKind::Element => Box::new(ElementAccessor { index, field }),
        FieldKind::Query(_) => Box::new(QueryAccessor { index, field }),
        FieldKind::Transform(_) => Box::new(ProgramAccessor { index, field }),
        FieldKind::Embedded { .. } | FieldKind::EmbeddedTransform { .. } => {
            Box::new(EmbeddedAccessor { index, field })
        }
    }
}

/// Return the cached value or run `evaluate`, caching what it produces.
///
/// A failed evaluation leaves the slot as it was.
fn cached<F>(
    index: usize,
    field: &Field,
    instance: &Instance,
    evaluate: F,
) -> Result<Rc<Value>, FieldError>
where
    F: FnOnce() -> Result<Value, FieldError>,
{
    let state = instance.with_slot(index, |slot| {
        if let Some(value) = &slot.value {
            return Ok(Some(value.clone()));
        }
        if slot.evaluating {
            return Err(FieldError::CyclicEvaluation(field.name().to_string()));
        }
        slot.evaluating = true;
        Ok(None)
    })?;
    if let Some(value) = state {
        return Ok(value);
    }

    tracing::trace!(field = field.name(), "evaluating");
    let result = evaluate();
    instance.with_slot(index, |slot| {
        slot.evaluating = false;
        let value = Rc::new(result?);
        if !value.is_null() {
            slot.initialized = true;
        }
        slot.value = Some(value.clone());
        Ok(value)
    })
}

/// Store an already-coerced value.
///
/// Null clears the slot so the next read evaluates again, except on an
/// initialized immutable field, where it is a no-op.
fn store(index: usize, field: &Field, instance: &Instance, value: Value) -> Result<(), FieldError> {
    instance.with_slot(index, |slot| {
        let locked = field.immutable && slot.initialized;
        if value.is_null() {
            if !locked {
                slot.value = None;
            }
            return Ok(());
        }
        if locked {
            return Err(FieldError::ImmutableField {
                schema: instance.schema().key(),
                field: field.name().to_string(),
            });
        }
        slot.value = Some(Rc::new(value));
        slot.initialized = true;
        Ok(())
    })
}

/// Apply cardinality, coercion, defaults and presence rules to query results.
pub(crate) fn select(field: &Field, spec: &QuerySpec, items: Vec<Item>) -> Result<Value, FieldError> {
    let name = field.name();
    let coerce = |item: &Item| coerce_item(name, &spec.coercion, &spec.none_values, item);

    let mut mapped_to_null = None;
    let value = if spec.list {
        let values = items.iter().map(coerce).collect::<Result<Vec<_>, _>>()?;
        if values.is_empty() {
            Value::Null
        } else {
            Value::List(values)
        }
    } else {
        let item = match items.as_slice() {
            [] => None,
            [item] => Some(item),
            [first, ..] if spec.ignore_extra_nodes => Some(first),
            _ => {
                return Err(FieldError::MultipleResults {
                    field: name.to_string(),
                    query: spec.query.clone(),
                });
            }
        };
        match item {
            Some(item) => {
                let value = coerce(item)?;
                if value.is_null() {
                    mapped_to_null = Some(item.to_text());
                }
                value
            }
            None => Value::Null,
        }
    };
    if !value.is_null() {
        return Ok(value);
    }

    if let Some(default) = &field.default {
        let value = coerce_text(name, &spec.coercion, default)?;
        return Ok(if spec.list {
            Value::List(vec![value])
        } else {
            value
        });
    }
    if !field.required {
        return Ok(Value::Null);
    }
    let message = match mapped_to_null {
        Some(text) => format!("field is required, but value {text:?} is mapped to null"),
        None => format!("query `{}` did not match any nodes", spec.query),
    };
    Err(FieldError::MissingResult {
        field: name.to_string(),
        message,
    })
}

/// Coerce a value assigned by the caller.
fn coerce_assigned(field: &Field, spec: &QuerySpec, value: Value) -> Result<Value, FieldError> {
    let name = field.name();
    match value {
        Value::Null => Ok(Value::Null),
        Value::List(items) if spec.list => items
            .into_iter()
            .map(|v| coerce_one(name, &spec.coercion, v))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        other if spec.list => Err(FieldError::Validation {
            field: name.to_string(),
            message: format!("expected a list, got {}", other.type_name()),
        }),
        other => coerce_one(name, &spec.coercion, other),
    }
}

fn coerce_one(field: &str, coercion: &Coercion, value: Value) -> Result<Value, FieldError> {
    match value {
        Value::Text(text) if !matches!(coercion, Coercion::Text | Coercion::Node) => {
            coerce_text(field, coercion, &text)
        }
        Value::Node(node) => coerce_item(field, coercion, &[], &Item::Node(node)),
        value if accepts(coercion, &value) => Ok(value),
        value => Err(FieldError::Validation {
            field: field.to_string(),
            message: format!(
                "cannot assign a {} value to a {} field",
                value.type_name(),
                coercion.name()
            ),
        }),
    }
}

fn expect_element(field: &Field, value: &Value) -> Result<(), FieldError> {
    match value {
        Value::Null => Ok(()),
        Value::Node(node) if node.is_element() => Ok(()),
        other => Err(FieldError::Validation {
            field: field.name().to_string(),
            message: format!("expected an element, got {}", other.type_name()),
        }),
    }
}

struct RootAccessor {
    index: usize,
    field: Arc<Field>,
}

impl FieldAccessor for RootAccessor {
    fn get(&self, instance: &Instance) -> Result<Rc<Value>, FieldError> {
        cached(self.index, &self.field, instance, || {
            Ok(Value::Node(instance.root().clone()))
        })
    }

    fn set(&self, instance: &Instance, value: Value) -> Result<(), FieldError> {
        expect_element(&self.field, &value)?;
        if let (Value::Node(node), Some(schema)) =
            (&value, &instance.schema().options().structural_schema)
        {
            schema.validate(node).map_err(FieldError::SchemaValidation)?;
        }
        store(self.index, &self.field, instance, value)
    }
}

struct ElementAccessor {
    index: usize,
    field: Arc<Field>,
}

impl FieldAccessor for ElementAccessor {
    fn get(&self, instance: &Instance) -> Result<Rc<Value>, FieldError> {
        Ok(instance
            .with_slot(self.index, |slot| slot.value.clone())
            .unwrap_or_else(|| Rc::new(Value::Null)))
    }

    fn set(&self, instance: &Instance, value: Value) -> Result<(), FieldError> {
        expect_element(&self.field, &value)?;
        store(self.index, &self.field, instance, value)
    }
}

struct QueryAccessor {
    index: usize,
    field: Arc<Field>,
}

impl QueryAccessor {
    fn spec(&self) -> &QuerySpec {
        match &self.field.kind {
            FieldKind::Query(spec) => spec,
            _ => unreachable!("query accessor over a non-query field"),
        }
    }
}

impl FieldAccessor for QueryAccessor {
    fn get(&self, instance: &Instance) -> Result<Rc<Value>, FieldError> {
        let spec = self.spec();
        cached(self.index, &self.field, instance, || {
            let raw = instance.run_query(&self.field, &spec.query)?;
            select(&self.field, spec, raw.into_items())
        })
    }

    fn set(&self, instance: &Instance, value: Value) -> Result<(), FieldError> {
        let value = coerce_assigned(&self.field, self.spec(), value)?;
        store(self.index, &self.field, instance, value)
    }
}

struct ProgramAccessor {
    index: usize,
    field: Arc<Field>,
}

impl FieldAccessor for ProgramAccessor {
    fn get(&self, instance: &Instance) -> Result<Rc<Value>, FieldError> {
        cached(self.index, &self.field, instance, || {
            match instance.run_program(&self.field, &[])? {
                Value::Output(output) if output.is_empty() => {
                    missing_output(&self.field, "transform produced no output")
                }
                value => Ok(value),
            }
        })
    }

    fn set(&self, instance: &Instance, value: Value) -> Result<(), FieldError> {
        match value {
            Value::Null | Value::Output(_) | Value::Validation(_) => {
                store(self.index, &self.field, instance, value)
            }
            other => Err(FieldError::Validation {
                field: self.field.name().to_string(),
                message: format!("cannot assign a {} value to a transform field", other.type_name()),
            }),
        }
    }
}

/// A program result with nothing in it: an error when the field is required.
fn missing_output(field: &Field, message: &str) -> Result<Value, FieldError> {
    if field.required {
        Err(FieldError::MissingResult {
            field: field.name().to_string(),
            message: message.to_string(),
        })
    } else {
        Ok(Value::Null)
    }
}

struct EmbeddedAccessor {
    index: usize,
    field: Arc<Field>,
}

impl EmbeddedAccessor {
    fn slot(&self) -> &TargetSlot {
        match &self.field.kind {
            FieldKind::Embedded { target, .. } | FieldKind::EmbeddedTransform { target, .. } => target,
            _ => unreachable!("embedded accessor over a non-embedded field"),
        }
    }

    fn embed(&self, target: &Arc<Schema>, value: Value) -> Result<Value, FieldError> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Node(node) => Instance::new(target, node).map(Value::Instance),
            Value::Instance(instance) => {
                if instance.schema().extends(target) {
                    Ok(Value::Instance(instance))
                } else {
                    Err(FieldError::Validation {
                        field: self.field.name().to_string(),
                        message: format!(
                            "expected an instance of {}, got {}",
                            target.key(),
                            instance.schema().key()
                        ),
                    })
                }
            }
            Value::List(items) => items
                .into_iter()
                .map(|v| self.embed(target, v))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            Value::Output(output) => match output.root_element() {
                Some(root) => Instance::new(target, root).map(Value::Instance),
                None => self.empty_output(),
            },
            Value::Validation(validation) => match validation.output.root_element() {
                Some(root) => Instance::new(target, root).map(Value::Instance),
                None => self.empty_output(),
            },
            other => Err(FieldError::Validation {
                field: self.field.name().to_string(),
                message: format!("cannot embed a {} value", other.type_name()),
            }),
        }
    }

    fn empty_output(&self) -> Result<Value, FieldError> {
        missing_output(&self.field, "transform produced no element")
    }
}

impl FieldAccessor for EmbeddedAccessor {
    fn get(&self, instance: &Instance) -> Result<Rc<Value>, FieldError> {
        cached(self.index, &self.field, instance, || {
            let target = target_schema(&self.field, self.slot(), instance)?;
            let value = match &self.field.kind {
                FieldKind::Embedded { query, .. } => {
                    let raw = instance.run_query(&self.field, &query.query)?;
                    select(&self.field, query, raw.into_items())?
                }
                _ => instance.run_program(&self.field, &[])?,
            };
            self.embed(&target, value)
        })
    }

    fn set(&self, instance: &Instance, value: Value) -> Result<(), FieldError> {
        let list = matches!(&self.field.kind, FieldKind::Embedded { query, .. } if query.list);
        if list != matches!(value, Value::List(_)) && !value.is_null() {
            return Err(FieldError::Validation {
                field: self.field.name().to_string(),
                message: format!("cannot assign a {} value to this field", value.type_name()),
            });
        }
        let target = target_schema(&self.field, self.slot(), instance)?;
        let value = self.embed(&target, value)?;
        store(self.index, &self.field, instance, value)
    }
}

/// The schema an embedded field produces for `instance`.
fn target_schema(
    field: &Field,
    slot: &TargetSlot,
    instance: &Instance,
) -> Result<Arc<Schema>, FieldError> {
    if let Target::SelfRef = slot.target {
        return Ok(instance.schema().clone());
    }
    slot.resolved()
        .cloned()
        .ok_or_else(|| FieldError::UnresolvedTarget {
            field: field.name().to_string(),
            target: slot.target.to_string(),
        })
}
