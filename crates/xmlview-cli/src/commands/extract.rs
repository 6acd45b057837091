use std::path::PathBuf;

use xmlview_core::Colors;
use xmlview_lib::{Instance, Registry, decl};

use super::input::fail;
use super::json;

pub struct ExtractArgs {
    pub file: PathBuf,
    pub schema: PathBuf,
    pub name: String,
    pub compact: bool,
    pub color: bool,
}

pub fn run(args: ExtractArgs) {
    let registry = Registry::new();
    let schemas = decl::load(&args.schema, &registry).unwrap_or_else(|e| fail(e));
    if let Err(e) = registry.finalize() {
        fail(e);
    }

    let group = schemas.first().map(|s| s.group().to_string()).unwrap_or_default();
    let Some(schema) = registry.lookup(&args.name, &group) else {
        fail(format!(
            "schema `{}` is not declared in '{}'",
            args.name,
            args.schema.display()
        ));
    };

    let instance = Instance::from_file(&schema, &args.file).unwrap_or_else(|e| fail(e));
    let value = instance.to_json().unwrap_or_else(|e| fail(e));
    println!("{}", json::format(&value, !args.compact, Colors::new(args.color)));
}
