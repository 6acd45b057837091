//! Stylesheet execution.

use indexmap::IndexMap;
use sxd_xpath::Value;
use sxd_xpath::nodeset::Node;
use xmlview_compiler::diagnostics::Span;
use xmlview_compiler::ir::{Avt, AvtPart, ResultName};
use xmlview_compiler::stylesheet::{Binding, BindingValue, Instruction, Stylesheet, Template};

use super::error::RuntimeError;
use super::eval::Evaluator;
use super::output::OutputBuilder;

/// Headroom kept free before recursing into another template.
const STACK_RED_ZONE: usize = 128 * 1024;
/// Size of each extra stack segment.
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

pub(crate) struct Apply<'p, 'd, 'o, 'v> {
    stylesheet: &'p Stylesheet,
    eval: &'v mut Evaluator<'p, 'd>,
    out: &'v mut OutputBuilder<'o>,
}

impl<'p, 'd, 'o, 'v> Apply<'p, 'd, 'o, 'v> {
    pub(crate) fn new(
        stylesheet: &'p Stylesheet,
        eval: &'v mut Evaluator<'p, 'd>,
        out: &'v mut OutputBuilder<'o>,
    ) -> Self {
        Self {
            stylesheet,
            eval,
            out,
        }
    }

    /// Bind the top-level parameters and process the root.
    pub(crate) fn run(&mut self, params: &IndexMap<String, String>) -> Result<(), RuntimeError> {
        let stylesheet = self.stylesheet;
        let root = self.eval.root();
        for global in &stylesheet.globals {
            let value = match params.get(&global.name) {
                Some(given) if global.is_param => Value::String(given.clone()),
                _ => self.binding_value(global, root)?,
            };
            self.eval.bind(&global.name, value);
        }
        self.process(root, None, Vec::new())
    }

    fn process(
        &mut self,
        node: Node<'d>,
        mode: Option<&str>,
        with: Vec<(String, Value<'d>)>,
    ) -> Result<(), RuntimeError> {
        self.eval.tick()?;
        stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            match self.find_template(node, mode)? {
                Some(template) => self.invoke(template, node, with),
                None => self.builtin(node, mode),
            }
        })
    }

    /// Highest priority wins; among equals, the last in the stylesheet.
    fn find_template(
        &mut self,
        node: Node<'d>,
        mode: Option<&str>,
    ) -> Result<Option<&'p Template>, RuntimeError> {
        let stylesheet = self.stylesheet;
        let mut best: Option<(f64, &'p Template)> = None;
        for template in &stylesheet.templates {
            if template.mode.as_deref() != mode {
                continue;
            }
            for pattern in &template.patterns {
                if best.is_some_and(|(priority, _)| pattern.priority < priority) {
                    continue;
                }
                if self.eval.matches(pattern.expr, node)? {
                    best = Some((pattern.priority, template));
                }
            }
        }
        Ok(best.map(|(_, template)| template))
    }

    fn builtin(&mut self, node: Node<'d>, mode: Option<&str>) -> Result<(), RuntimeError> {
        match node {
            Node::Root(_) | Node::Element(_) => {
                for child in node.children() {
                    self.process(child, mode, Vec::new())?;
                }
            }
            Node::Text(t) => self.out.text(t.text()),
            Node::Attribute(a) => self.out.text(a.value()),
            _ => {}
        }
        Ok(())
    }

    fn invoke(
        &mut self,
        template: &'p Template,
        node: Node<'d>,
        mut with: Vec<(String, Value<'d>)>,
    ) -> Result<(), RuntimeError> {
        self.eval.enter()?;
        let mark = self.eval.scope_mark();
        for param in &template.params {
            let value = match with.iter().position(|(name, _)| *name == param.name) {
                Some(index) => with.swap_remove(index).1,
                None => self.binding_value(param, node)?,
            };
            self.eval.bind(&param.name, value);
        }
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || {
            self.execute(&template.body, node)
        });
        self.eval.restore(mark);
        self.eval.leave();
        result
    }

    fn execute(&mut self, body: &'p [Instruction], node: Node<'d>) -> Result<(), RuntimeError> {
        let mark = self.eval.scope_mark();
        let result = body
            .iter()
            .try_for_each(|instruction| self.instruction(instruction, node));
        self.eval.restore(mark);
        result
    }

    fn instruction(&mut self, instruction: &'p Instruction, node: Node<'d>) -> Result<(), RuntimeError> {
        self.eval.tick()?;
        match instruction {
            Instruction::Text(text) => self.out.text(text),
            Instruction::ValueOf(expr) => {
                let text = self.eval.string(*expr, node)?;
                self.out.text(&text);
            }
            Instruction::CopyOf(expr) => match self.eval.evaluate(*expr, node)? {
                Value::Nodeset(nodes) => {
                    let span = self.eval.span(*expr);
                    for selected in nodes.document_order() {
                        self.out.copy(selected).map_err(|m| output_error(m, span))?;
                    }
                }
                other => self.out.text(&other.into_string()),
            },
            Instruction::Copy(body) => self.copy(body, node)?,
            Instruction::ApplyTemplates {
                select,
                mode,
                params,
            } => {
                let selected = match select {
                    Some(expr) => self.eval.nodes(*expr, node)?,
                    None => node.children(),
                };
                let with = self.with_params(params, node)?;
                for child in selected {
                    self.process(child, mode.as_deref(), with.clone())?;
                }
            }
            Instruction::CallTemplate { name, params } => {
                let stylesheet = self.stylesheet;
                let Some(template) = stylesheet.template(name) else {
                    return Err(RuntimeError::Evaluation {
                        message: format!("template `{name}` is not defined"),
                        span: None,
                    });
                };
                let with = self.with_params(params, node)?;
                self.invoke(template, node, with)?;
            }
            Instruction::ForEach { select, body } => {
                for selected in self.eval.nodes(*select, node)? {
                    self.execute(body, selected)?;
                }
            }
            Instruction::If { test, body } => {
                if self.eval.boolean(*test, node)? {
                    self.execute(body, node)?;
                }
            }
            Instruction::Choose {
                branches,
                otherwise,
            } => {
                let mut chosen = otherwise.as_slice();
                for (test, body) in branches {
                    if self.eval.boolean(*test, node)? {
                        chosen = body.as_slice();
                        break;
                    }
                }
                self.execute(chosen, node)?;
            }
            Instruction::Element {
                name,
                namespace,
                body,
            } => {
                let (prefix, local, uri) = self.computed_name(name, namespace.as_ref(), node)?;
                self.out
                    .start_element(uri.as_deref(), &local, prefix.as_deref())
                    .map_err(|m| output_error(m, None))?;
                self.execute(body, node)?;
                self.out.end_element();
            }
            Instruction::Attribute {
                name,
                namespace,
                body,
            } => {
                let (prefix, local, uri) = self.computed_name(name, namespace.as_ref(), node)?;
                let value = self.capture(body, node)?;
                self.out
                    .attribute(uri.as_deref(), &local, prefix.as_deref(), &value)
                    .map_err(|m| output_error(m, None))?;
            }
            Instruction::Comment(body) => {
                let text = self.capture(body, node)?;
                self.out.comment(&text);
            }
            Instruction::Variable(binding) => {
                let value = self.binding_value(binding, node)?;
                self.eval.bind(&binding.name, value);
            }
            Instruction::Message {
                body,
                terminate,
                span,
            } => {
                let text = self.capture(body, node)?;
                tracing::info!(terminate = *terminate, "{}", text);
                if *terminate {
                    return Err(RuntimeError::Terminated {
                        message: text,
                        span: *span,
                    });
                }
                self.eval.message(&text, *span);
            }
            Instruction::LiteralElement {
                name,
                attributes,
                body,
            } => self.literal_element(name, attributes, body, node)?,
        }
        Ok(())
    }

    fn copy(&mut self, body: &'p [Instruction], node: Node<'d>) -> Result<(), RuntimeError> {
        match node {
            Node::Element(element) => {
                self.out
                    .start_copy(element)
                    .map_err(|m| output_error(m, None))?;
                self.execute(body, node)?;
                self.out.end_element();
            }
            Node::Root(_) => self.execute(body, node)?,
            Node::Text(_) | Node::Attribute(_) | Node::Comment(_) => {
                self.out.copy(node).map_err(|m| output_error(m, None))?;
            }
            Node::ProcessingInstruction(_) | Node::Namespace(_) => {}
        }
        Ok(())
    }

    fn literal_element(
        &mut self,
        name: &'p ResultName,
        attributes: &'p [(ResultName, Avt)],
        body: &'p [Instruction],
        node: Node<'d>,
    ) -> Result<(), RuntimeError> {
        self.out
            .start_element(
                name.namespace.as_deref(),
                &name.local,
                name.prefix.as_deref(),
            )
            .map_err(|m| output_error(m, None))?;
        for (attribute, value) in attributes {
            let value = self.avt(value, node)?;
            self.out
                .attribute(
                    attribute.namespace.as_deref(),
                    &attribute.local,
                    attribute.prefix.as_deref(),
                    &value,
                )
                .map_err(|m| output_error(m, None))?;
        }
        self.execute(body, node)?;
        self.out.end_element();
        Ok(())
    }

    /// Run `body` and keep only the text it writes.
    fn capture(&mut self, body: &'p [Instruction], node: Node<'d>) -> Result<String, RuntimeError> {
        self.out.begin_capture();
        let result = self.execute(body, node);
        let text = self.out.end_capture();
        result.map(|()| text)
    }

    fn binding_value(&mut self, binding: &'p Binding, node: Node<'d>) -> Result<Value<'d>, RuntimeError> {
        Ok(match &binding.value {
            BindingValue::Select(expr) => self.eval.evaluate(*expr, node)?,
            BindingValue::Content(body) => Value::String(self.capture(body, node)?),
            BindingValue::Empty => Value::String(String::new()),
        })
    }

    fn with_params(
        &mut self,
        params: &'p [Binding],
        node: Node<'d>,
    ) -> Result<Vec<(String, Value<'d>)>, RuntimeError> {
        params
            .iter()
            .map(|param| Ok((param.name.clone(), self.binding_value(param, node)?)))
            .collect()
    }

    fn avt(&mut self, avt: &'p Avt, node: Node<'d>) -> Result<String, RuntimeError> {
        let mut out = String::new();
        for part in &avt.0 {
            match part {
                AvtPart::Literal(text) => out.push_str(text),
                AvtPart::Expr(expr) => out.push_str(&self.eval.string(*expr, node)?),
            }
        }
        Ok(out)
    }

    /// Resolve a computed `prefix:local` name against the stylesheet's namespaces.
    fn computed_name(
        &mut self,
        name: &'p Avt,
        namespace: Option<&'p Avt>,
        node: Node<'d>,
    ) -> Result<(Option<String>, String, Option<String>), RuntimeError> {
        let qname = self.avt(name, node)?;
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
            None => (None, qname.clone()),
        };
        if local.is_empty() {
            return Err(output_error(format!("`{qname}` is not a valid name"), None));
        }
        let uri = match namespace {
            Some(avt) => Some(self.avt(avt, node)?).filter(|uri| !uri.is_empty()),
            None => match &prefix {
                Some(prefix) => Some(
                    self.stylesheet
                        .namespaces
                        .get(prefix)
                        .cloned()
                        .ok_or_else(|| output_error(format!("prefix `{prefix}` is not declared"), None))?,
                ),
                None => None,
            },
        };
        Ok((prefix, local, uri))
    }
}

fn output_error(message: String, span: Option<Span>) -> RuntimeError {
    RuntimeError::Output { message, span }
}
