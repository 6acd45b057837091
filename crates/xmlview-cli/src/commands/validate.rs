use std::path::PathBuf;

use xmlview_compiler::compile_rules;
use xmlview_core::ParserOptions;
use xmlview_vm::VM;

use super::input::{ProgramFile, fail, load_document};

pub struct ValidateArgs {
    pub file: PathBuf,
    pub rules: PathBuf,
    pub phase: Option<String>,
    pub color: bool,
}

pub fn run(args: ValidateArgs) {
    let program = ProgramFile::read(&args.rules).unwrap_or_else(|e| fail(e));
    let schema = match compile_rules(&program.source, ParserOptions::default(), args.phase.as_deref())
    {
        Ok((schema, warnings)) => {
            program.report(&warnings, args.color);
            schema
        }
        Err(e) => {
            program.report(e.diagnostics(), args.color);
            fail(e);
        }
    };

    let doc = load_document(&args.file).unwrap_or_else(|e| fail(e));
    let validation = match VM::default().validate(&schema, &doc.root()) {
        Ok(validation) => validation,
        Err(e) => {
            program.report(&e.diagnostics, args.color);
            std::process::exit(1);
        }
    };

    println!("{}", validation.output.render());

    let failed = validation.report.failed_asserts().count();
    tracing::info!(
        fired_rules = validation.report.fired_rules,
        failed,
        "validation finished"
    );
    if failed > 0 {
        eprintln!("{failed} assertion(s) failed");
        std::process::exit(1);
    }
}
